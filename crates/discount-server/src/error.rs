use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use discount_sdk::api::ErrorResponse;
use discount_sdk::source::DISCOUNT_CODE_INVALID;
use discount_sdk::SdkError;
use thiserror::Error;
use tracing::error;

pub type Result<T> = std::result::Result<T, ServerError>;

/// Returned for every fault whose cause must stay server-side
pub const UNEXPECTED_ERROR: &str = "An unexpected error occurred";

#[derive(Error, Debug)]
pub enum ServerError {
    #[error("{0}")]
    InvalidRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Address has already claimed a discounted name")]
    AlreadyClaimed,

    /// Unknown, expired and exhausted codes all look the same to the caller
    #[error("Discount code invalid")]
    DiscountCodeInvalid,

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("RPC error: {0}")]
    Rpc(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<SdkError> for ServerError {
    fn from(e: SdkError) -> Self {
        if e.is_input_error() {
            ServerError::InvalidRequest(e.to_string())
        } else {
            ServerError::Internal(e.to_string())
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            ServerError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            ServerError::NotFound(_) => (StatusCode::NOT_FOUND, self.to_string()),
            ServerError::AlreadyClaimed => (StatusCode::CONFLICT, self.to_string()),
            ServerError::DiscountCodeInvalid => (
                StatusCode::INTERNAL_SERVER_ERROR,
                DISCOUNT_CODE_INVALID.to_string(),
            ),
            ServerError::Signing(_)
            | ServerError::Store(_)
            | ServerError::Rpc(_)
            | ServerError::Config(_)
            | ServerError::Internal(_) => {
                error!("request failed: {}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, UNEXPECTED_ERROR.to_string())
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}
