use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

/// Typed failures at the core boundary. The HTTP layer maps each variant to a
/// status code; anything else (an unexpected `sqlx::Error`) rolls back and
/// surfaces as 500.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unauthenticated")]
    Unauthenticated,
    #[error("forbidden")]
    Forbidden,
    #[error("not found")]
    NotFound,
    #[error("unknown instrument: {0}")]
    UnknownInstrument(String),
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("duplicate instrument: {0}")]
    DuplicateInstrument(String),
    #[error("validation: {0}")]
    Validation(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl Error {
    fn status(&self) -> StatusCode {
        match self {
            Error::Unauthenticated => StatusCode::UNAUTHORIZED,
            Error::Forbidden => StatusCode::FORBIDDEN,
            Error::NotFound => StatusCode::NOT_FOUND,
            Error::UnknownInstrument(_) => StatusCode::BAD_REQUEST,
            Error::InsufficientFunds => StatusCode::BAD_REQUEST,
            Error::DuplicateInstrument(_) => StatusCode::BAD_REQUEST,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        if let Error::Database(ref e) = self {
            tracing::error!("unhandled database error: {}", e);
        }
        let status = self.status();
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
