//! Error types for the streaming service provider

use bridge_traits::error::BridgeError;
use bridge_traits::remote::RemoteApiError;
use std::time::Duration;
use thiserror::Error;

/// Reason the service attaches to player errors when no device is active.
pub const NO_ACTIVE_DEVICE_REASON: &str = "NO_ACTIVE_DEVICE";

/// Streaming provider errors
#[derive(Error, Debug)]
pub enum StreamingError {
    /// API request returned a non-success status
    #[error("Streaming API error (status {status_code}): {message}")]
    ApiError {
        status_code: u16,
        message: String,
        /// Machine-readable reason from the error body, if any.
        reason: Option<String>,
        /// Parsed `Retry-After` header on 429 responses.
        retry_after: Option<Duration>,
    },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Bridge error (transport failures from the host HTTP client)
    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for streaming provider operations
pub type Result<T> = std::result::Result<T, StreamingError>;

impl From<StreamingError> for RemoteApiError {
    fn from(error: StreamingError) -> Self {
        match error {
            StreamingError::ApiError {
                status_code: 401, ..
            } => RemoteApiError::AuthRequired,
            StreamingError::ApiError {
                status_code: 404,
                reason: Some(reason),
                ..
            } if reason == NO_ACTIVE_DEVICE_REASON => RemoteApiError::NoActiveDevice,
            StreamingError::ApiError {
                status_code: 404,
                message,
                ..
            } => RemoteApiError::NotFound(message),
            StreamingError::ApiError {
                status_code: 429,
                retry_after,
                ..
            } => RemoteApiError::RateLimited { retry_after },
            StreamingError::ApiError {
                status_code,
                message,
                ..
            } => RemoteApiError::ServerError {
                status: status_code,
                message,
            },
            StreamingError::ParseError(msg) => RemoteApiError::ServerError {
                status: 200,
                message: format!("Unreadable response: {}", msg),
            },
            StreamingError::BridgeError(e) => RemoteApiError::Transport(e.to_string()),
        }
    }
}
