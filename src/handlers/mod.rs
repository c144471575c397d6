mod data;
mod reads;
mod service_info;
mod variants;

pub use data::get_data;
pub use reads::{get_namespaced_reads, get_reads};
pub use service_info::service_info;
pub use variants::{get_namespaced_variants, get_variants};

use crate::logging::{LogDetails, access_log};
use crate::service::{Endpoint, TicketService};
use crate::types::TicketParams;
use crate::{Error, Result};
use axum::{
    Json, Router,
    extract::{Query, rejection::QueryRejection},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<TicketService>,
    /// Namespace for routes that name only an accession.
    pub default_namespace: String,
    /// Largest span the data endpoint serves in one response.
    pub max_payload: u64,
}

/// All routes, with the access log and request tracing layers.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/reads/{accession}", get(get_reads))
        .route("/reads/{namespace}/{accession}", get(get_namespaced_reads))
        .route("/variants/{accession}", get(get_variants))
        .route("/variants/{namespace}/{accession}", get(get_namespaced_variants))
        .route("/data/{format}/{namespace}/{accession}", get(get_data))
        .route("/", get(service_info))
        .route("/service-info", get(service_info))
        .with_state(state)
        .layer(middleware::from_fn(access_log))
        .layer(TraceLayer::new_for_http())
}

/// Query strings that fail to deserialize (a repeated `start`, say) are
/// reported as htsget `InvalidQuery` errors.
fn ticket_params(
    query: std::result::Result<Query<TicketParams>, QueryRejection>,
) -> Result<TicketParams> {
    query
        .map(|Query(params)| params)
        .map_err(|e| Error::InvalidQuery(e.body_text()))
}

async fn ticket_response(
    state: &AppState,
    endpoint: Endpoint,
    namespace: &str,
    accession: &str,
    params: Result<TicketParams>,
) -> Response {
    let mut details = LogDetails::new();
    let ticket = match params {
        Ok(params) => {
            state
                .service
                .ticket(endpoint, namespace, accession, params, &mut details)
                .await
        }
        Err(e) => Err(e),
    };
    let mut response = match ticket {
        Ok(ticket) => Json(ticket).into_response(),
        Err(e) => {
            let mut response = e.into_response();
            if let Some(error_details) = response.extensions_mut().remove::<LogDetails>() {
                details.extend(error_details);
            }
            response
        }
    };
    response.extensions_mut().insert(details);
    response
}
