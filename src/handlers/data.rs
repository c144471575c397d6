use super::AppState;
use crate::index::AccessionKey;
use crate::location::local;
use crate::range::ByteRange;
use crate::types::Format;
use crate::{Error, Result};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    response::Response,
};

/// A parsed `Range` request header against a file of known length.
#[derive(Debug, PartialEq, Eq)]
enum RangeRequest {
    Full,
    Partial(ByteRange),
    Unsatisfiable,
}

/// Single-range `bytes=` forms: `a-b`, `a-` and `-n`.
fn parse_range(value: &str, len: u64) -> Result<RangeRequest> {
    let malformed = || Error::InvalidQuery(format!("unsupported Range header: {}", value));

    let ranges = value.trim().strip_prefix("bytes=").ok_or_else(malformed)?;
    if ranges.contains(',') {
        return Err(malformed());
    }
    let (first, last) = ranges.split_once('-').ok_or_else(malformed)?;
    let (first, last) = (first.trim(), last.trim());

    let range = match (first.is_empty(), last.is_empty()) {
        (true, true) => return Err(malformed()),
        (true, false) => {
            let suffix: u64 = last.parse().map_err(|_| malformed())?;
            if suffix == 0 {
                return Ok(RangeRequest::Unsatisfiable);
            }
            ByteRange::new(len.saturating_sub(suffix), len)
        }
        (false, _) => {
            let start: u64 = first.parse().map_err(|_| malformed())?;
            let end = if last.is_empty() {
                len
            } else {
                let inclusive: u64 = last.parse().map_err(|_| malformed())?;
                if inclusive < start {
                    return Err(malformed());
                }
                inclusive.saturating_add(1).min(len)
            };
            ByteRange::new(start, end)
        }
    };

    if range.start >= len {
        return Ok(RangeRequest::Unsatisfiable);
    }
    Ok(RangeRequest::Partial(range))
}

/// Serve bytes of a locally stored file; ticket URLs for local files point here.
pub async fn get_data(
    State(state): State<AppState>,
    Path((format, namespace, accession)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Result<Response> {
    let format = Format::parse(&format)
        .ok_or_else(|| Error::UnsupportedFormat(format!("unknown format {}", format)))?;
    let key = AccessionKey::new(namespace, accession, format);
    let (_, path) = state.service.local_file(&key).await?;
    let len = local::file_len(&path).await?;

    let request = match headers.get(header::RANGE) {
        None => RangeRequest::Full,
        Some(value) => {
            let value = value
                .to_str()
                .map_err(|_| Error::InvalidQuery("non-ASCII Range header".to_string()))?;
            parse_range(value, len)?
        }
    };

    let builder = Response::builder()
        .header(header::CONTENT_TYPE, format.content_type())
        .header(header::ACCEPT_RANGES, "bytes");

    let response = match request {
        RangeRequest::Unsatisfiable => builder
            .status(StatusCode::RANGE_NOT_SATISFIABLE)
            .header(header::CONTENT_RANGE, format!("bytes */{}", len))
            .body(Body::empty()),
        RangeRequest::Full => {
            let bytes = local::read_range(&path, ByteRange::new(0, len), state.max_payload).await?;
            builder
                .status(StatusCode::OK)
                .header(header::CONTENT_LENGTH, bytes.len())
                .body(Body::from(bytes))
        }
        RangeRequest::Partial(range) => {
            let bytes = local::read_range(&path, range, state.max_payload).await?;
            builder
                .status(StatusCode::PARTIAL_CONTENT)
                .header(
                    header::CONTENT_RANGE,
                    format!("bytes {}-{}/{}", range.start, range.end - 1, len),
                )
                .header(header::CONTENT_LENGTH, bytes.len())
                .body(Body::from(bytes))
        }
    };

    response.map_err(|e| Error::Internal(format!("failed to build response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range_forms() {
        assert_eq!(
            parse_range("bytes=0-999", 5000).unwrap(),
            RangeRequest::Partial(ByteRange::new(0, 1000))
        );
        assert_eq!(
            parse_range("bytes=4000-", 5000).unwrap(),
            RangeRequest::Partial(ByteRange::new(4000, 5000))
        );
        assert_eq!(
            parse_range("bytes=-100", 5000).unwrap(),
            RangeRequest::Partial(ByteRange::new(4900, 5000))
        );
        // end past the file is clamped
        assert_eq!(
            parse_range("bytes=4000-9999", 5000).unwrap(),
            RangeRequest::Partial(ByteRange::new(4000, 5000))
        );
    }

    #[test]
    fn test_parse_range_unsatisfiable() {
        assert_eq!(
            parse_range("bytes=5000-6000", 5000).unwrap(),
            RangeRequest::Unsatisfiable
        );
        assert_eq!(parse_range("bytes=-0", 5000).unwrap(), RangeRequest::Unsatisfiable);
    }

    #[test]
    fn test_parse_range_malformed() {
        for value in ["items=0-1", "bytes=0-1,5-6", "bytes=-", "bytes=9-3", "bytes=a-b"] {
            assert!(
                matches!(parse_range(value, 5000), Err(Error::InvalidQuery(_))),
                "{}",
                value
            );
        }
    }
}
