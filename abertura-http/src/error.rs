//! Transport errors and their mapping onto [`ApiError`].

use abertura_core::ApiError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("HTTP error ({status}): {message}")]
    Status { status: u16, message: String },

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Client build error: {0}")]
    Build(String),
}

impl From<reqwest::Error> for HttpError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            HttpError::Timeout
        } else if err.is_builder() {
            HttpError::Build(err.to_string())
        } else if let Some(status) = err.status() {
            HttpError::Status {
                status: status.as_u16(),
                message: err.to_string(),
            }
        } else if err.is_decode() {
            HttpError::Serialization(err.to_string())
        } else {
            HttpError::Connection(err.to_string())
        }
    }
}

impl From<serde_json::Error> for HttpError {
    fn from(err: serde_json::Error) -> Self {
        HttpError::Serialization(err.to_string())
    }
}

impl From<HttpError> for ApiError {
    fn from(err: HttpError) -> Self {
        match err {
            HttpError::Status {
                status: 404,
                message,
            } => ApiError::NotFound(message),
            HttpError::Status { status, message } => ApiError::Status { status, message },
            HttpError::Connection(message) => ApiError::Network(message),
            HttpError::Timeout => ApiError::Timeout,
            HttpError::Serialization(message) => ApiError::Decode(message),
            HttpError::Build(message) => ApiError::Configuration(message),
        }
    }
}
