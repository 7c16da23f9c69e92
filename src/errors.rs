use thiserror::Error;

/// Error taxonomy for the service layer.
///
/// Every variant maps onto the status-code contract the HTTP front end
/// exposes; transient network failures during scans and polls never reach
/// this type — they are logged and folded into per-item results.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Invocation error: {0}")]
    Invocation(String),
}

impl ApiError {
    /// HTTP status code the front end should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Validation(_) => 400,
            ApiError::NotFound(_) => 404,
            ApiError::Conflict(_) => 409,
            ApiError::Invocation(_) => 400,
        }
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
