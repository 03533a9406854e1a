//! Web Error

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::error;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] hook_config::error::Error),

    #[error(transparent)]
    Store(#[from] hook_store::error::Error),

    #[error("Failed to dispatch job - {0}")]
    Dispatch(String),

    #[error("Invalid request body - {0}")]
    BadRequest(String),

    #[error("Job not found")]
    JobNotFound,

    /* Api Errors */
    #[error("API Forbidden")]
    ApiForbidden,
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        error!("Creating API error response for error: {:?}", self);
        let (status, message) = match self {
            // Unknown jobs and handles answer with nothing but the status.
            Error::JobNotFound => return StatusCode::NOT_FOUND.into_response(),
            Error::ApiForbidden => (StatusCode::FORBIDDEN, "Access forbidden"),
            Error::BadRequest(_) => (StatusCode::BAD_REQUEST, "Invalid request body"),
            Error::Config(_) | Error::Store(_) | Error::Dispatch(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = Json(json!({
            "error": {
                "message": message,
                "status": status.as_u16()
            }
        }));
        (status, body).into_response()
    }
}
