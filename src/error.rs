use std::time::Duration;

use actix_web::http::StatusCode;
use actix_web::HttpResponse;
use actix_web::ResponseError;
use serde::Serialize;

/// Failure reported by a key-value store backend.
#[derive(Debug, thiserror::Error)]
pub(crate) enum StoreError {
    #[error("no such key: {0}")]
    NotFound(String),
    #[error("store call timed out after {0:?}")]
    Timeout(Duration),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Failure surfaced by the location operations. Every store failure is
/// classified into one of these before it leaves `core`.
#[derive(Debug, thiserror::Error)]
pub(crate) enum Error {
    #[error("{0}")]
    Validation(&'static str),
    #[error("No such toilet")]
    NotFound,
    #[error("{message}")]
    Storage {
        message: &'static str,
        #[source]
        source: StoreError,
    },
}

impl Error {
    pub(crate) fn storage(message: &'static str, source: StoreError) -> Self {
        Self::Storage { message, source }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ResponseError for Error {
    fn status_code(&self) -> StatusCode {
        match self {
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::Storage { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse<actix_web::body::BoxBody> {
        // Display never includes the source, so storage details stay in the logs.
        HttpResponse::build(self.status_code()).json(ErrorBody { error: self.to_string() })
    }
}
