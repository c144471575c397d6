//! Shapes resolved ranges into htsget tickets and errors into htsget error
//! bodies.
//!
//! Ranges of local files are split so that no single URL asks the data
//! endpoint for more than its payload limit. Remote URLs are left whole.

use crate::index::Accession;
use crate::location::Location;
use crate::logging::LogDetails;
use crate::range::{ByteRange, HeaderSlice, ResolvedRange};
use crate::types::{DataClass, HtsgetError, HtsgetErrorBody, HtsgetResponse, HtsgetResponseBody, UrlEntry};
use crate::{Error, Result};
use axum::Json;
use axum::response::{IntoResponse, Response};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::collections::BTreeMap;
use url::Url;

const DATA_URI_PREFIX: &str = "data:application/octet-stream;base64,";

#[derive(Debug, Clone)]
pub struct ResponseAssembler {
    base: Url,
    max_chunk: u64,
}

impl ResponseAssembler {
    /// `base_url` is the externally visible root of this server. `max_chunk`
    /// must not exceed what the data endpoint serves in one response.
    pub fn new(base_url: &str, max_chunk: u64) -> Result<Self> {
        let base = Url::parse(base_url)
            .map_err(|e| Error::Internal(format!("invalid base URL {}: {}", base_url, e)))?;
        if base.cannot_be_a_base() {
            return Err(Error::Internal(format!("invalid base URL {}", base_url)));
        }
        Ok(Self {
            base,
            max_chunk: max_chunk.max(1),
        })
    }

    /// URL of the data endpoint serving a local accession.
    pub fn data_url(&self, accession: &Accession) -> String {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([
                "data",
                accession.format().as_str(),
                accession.key.namespace.as_str(),
                accession.key.accession.as_str(),
            ]);
        }
        url.to_string()
    }

    pub fn assemble(
        &self,
        accession: &Accession,
        resolved: &ResolvedRange,
        location: &Location,
    ) -> HtsgetResponse {
        let (file_url, chunk, size) = match location {
            Location::Local { size, .. } => (self.data_url(accession), self.max_chunk, Some(*size)),
            Location::Remote { url, .. } => (url.clone(), u64::MAX, None),
        };
        let split = |range: &ByteRange, class: Option<DataClass>| {
            chunks(*range, chunk)
                .map(|piece| range_entry(&file_url, &piece, class))
                .collect::<Vec<_>>()
        };

        let mut urls = Vec::new();
        match resolved {
            ResolvedRange::WholeFile => match size {
                Some(size) if size > chunk => urls.extend(split(&ByteRange::new(0, size), None)),
                _ => urls.push(UrlEntry {
                    url: file_url.clone(),
                    headers: None,
                    class: None,
                }),
            },
            ResolvedRange::Slice {
                header,
                ranges,
                footer,
            } => {
                match header {
                    Some(HeaderSlice::Inline(bytes)) => {
                        urls.push(inline_entry(bytes, DataClass::Header))
                    }
                    Some(HeaderSlice::Range(range)) => {
                        urls.extend(split(range, Some(DataClass::Header)))
                    }
                    None => {}
                }
                for range in ranges {
                    urls.extend(split(range, Some(DataClass::Body)));
                }
                if let Some(footer) = footer {
                    urls.push(inline_entry(footer, DataClass::Body));
                }
            }
        }

        // clients expect at least one entry
        if urls.is_empty() {
            urls.push(UrlEntry {
                url: DATA_URI_PREFIX.to_string(),
                headers: None,
                class: None,
            });
        }

        HtsgetResponse {
            htsget: HtsgetResponseBody {
                format: accession.format(),
                urls,
            },
        }
    }
}

/// Consecutive pieces of `range`, each at most `max` bytes long.
fn chunks(range: ByteRange, max: u64) -> impl Iterator<Item = ByteRange> {
    let mut start = range.start;
    std::iter::from_fn(move || {
        if start >= range.end {
            return None;
        }
        let end = start.saturating_add(max).min(range.end);
        let piece = ByteRange::new(start, end);
        start = end;
        Some(piece)
    })
}

fn range_entry(url: &str, range: &ByteRange, class: Option<DataClass>) -> UrlEntry {
    let mut headers = BTreeMap::new();
    headers.insert("Range".to_string(), range.range_header());
    UrlEntry {
        url: url.to_string(),
        headers: Some(headers),
        class,
    }
}

fn inline_entry(bytes: &[u8], class: DataClass) -> UrlEntry {
    UrlEntry {
        url: format!("{}{}", DATA_URI_PREFIX, STANDARD.encode(bytes)),
        headers: None,
        class: Some(class),
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if !self.is_client_error() {
            tracing::error!(error = self.kind(), "{}", self);
        }

        let mut details = LogDetails::new();
        details.add("error", self.kind());
        details.add("message", &self);

        let body = HtsgetError {
            htsget: HtsgetErrorBody {
                error: self.kind().to_string(),
                message: self.to_string(),
            },
        };
        let mut response = (self.status_code(), Json(body)).into_response();
        response.extensions_mut().insert(details);
        response
    }
}
