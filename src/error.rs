use axum::http::StatusCode;
use std::sync::Arc;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("unknown accession: {0}")]
    UnknownAccession(String),

    #[error("unknown reference sequence: {0}")]
    UnknownReference(String),

    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("index corrupt: {0}")]
    IndexCorrupt(String),

    #[error("location unavailable: {0}")]
    LocationUnavailable(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wire name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidQuery(_) => "InvalidQuery",
            Error::UnknownAccession(_) => "UnknownAccession",
            Error::UnknownReference(_) => "UnknownReference",
            Error::UnsupportedFormat(_) => "UnsupportedFormat",
            Error::IndexCorrupt(_) => "IndexCorrupt",
            Error::LocationUnavailable(_) => "LocationUnavailable",
            Error::Timeout(_) => "Timeout",
            Error::Io(_) | Error::Internal(_) => "InternalError",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidQuery(_) | Error::UnsupportedFormat(_) => StatusCode::BAD_REQUEST,
            Error::UnknownAccession(_) | Error::UnknownReference(_) => StatusCode::NOT_FOUND,
            Error::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            Error::IndexCorrupt(_)
            | Error::LocationUnavailable(_)
            | Error::Io(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// True for failures caused by the request itself rather than the deployment.
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    fn duplicate(&self) -> Error {
        match self {
            Error::InvalidQuery(m) => Error::InvalidQuery(m.clone()),
            Error::UnknownAccession(m) => Error::UnknownAccession(m.clone()),
            Error::UnknownReference(m) => Error::UnknownReference(m.clone()),
            Error::UnsupportedFormat(m) => Error::UnsupportedFormat(m.clone()),
            Error::IndexCorrupt(m) => Error::IndexCorrupt(m.clone()),
            Error::LocationUnavailable(m) => Error::LocationUnavailable(m.clone()),
            Error::Timeout(m) => Error::Timeout(m.clone()),
            Error::Io(e) => Error::Io(std::io::Error::new(e.kind(), e.to_string())),
            Error::Internal(m) => Error::Internal(m.clone()),
        }
    }
}

// Failed cache loads hand the same error to every waiter.
impl From<Arc<Error>> for Error {
    fn from(shared: Arc<Error>) -> Self {
        Arc::try_unwrap(shared).unwrap_or_else(|shared| shared.duplicate())
    }
}

impl From<rusqlite::Error> for Error {
    fn from(e: rusqlite::Error) -> Self {
        Error::IndexCorrupt(format!("index database: {}", e))
    }
}

impl From<tokio::task::JoinError> for Error {
    fn from(e: tokio::task::JoinError) -> Self {
        Error::Internal(format!("blocking task failed: {}", e))
    }
}
