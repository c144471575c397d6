//! Per-request access log.
//!
//! Handlers collect annotations in a [`LogDetails`] and attach it to their
//! response; [`access_log`] emits one record per request on the
//! `htsnexus::access` target once the response is ready.

use axum::extract::{ConnectInfo, Request};
use axum::middleware::Next;
use axum::response::Response;
use std::fmt;
use std::net::SocketAddr;
use std::time::Instant;

/// Ordered `(key, value)` annotations for the access log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogDetails(Vec<(&'static str, String)>);

impl LogDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, key: &'static str, value: impl ToString) {
        self.0.push((key, value.to_string()));
    }

    pub fn extend(&mut self, other: LogDetails) {
        self.0.extend(other.0);
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for LogDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (key, value)) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}={}", key, value)?;
        }
        Ok(())
    }
}

pub async fn access_log(request: Request, next: Next) -> Response {
    let started = Instant::now();
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string());
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let query = request
        .uri()
        .query()
        .filter(|q| !q.is_empty())
        .map(str::to_string);

    let response = next.run(request).await;

    let details = response
        .extensions()
        .get::<LogDetails>()
        .filter(|d| !d.is_empty())
        .map(|d| d.to_string());
    tracing::info!(
        target: "htsnexus::access",
        remote = remote.as_deref().unwrap_or("-"),
        %method,
        path,
        status = response.status().as_u16(),
        duration_ms = started.elapsed().as_millis() as u64,
        query,
        details,
    );
    response
}
