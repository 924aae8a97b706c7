use thiserror::Error;

/// Errors raised while acquiring, refreshing or persisting session credentials.
///
/// The type is `Clone` so one refresh outcome can be handed to every caller
/// that joined the same in-flight refresh.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AuthError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Authorization state mismatch")]
    InvalidState,

    #[error("No authorization in progress")]
    NoAuthorizationInProgress,

    #[error("Token exchange failed: {0}")]
    TokenExchangeFailed(String),

    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("Refresh token rejected: {0}")]
    RefreshRejected(String),

    #[error("No refresh token available")]
    NoRefreshToken,

    #[error("Secure storage unavailable: {0}")]
    SecureStorageUnavailable(String),

    #[error("Stored credentials are corrupted")]
    TokenCorrupted,

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Operation timed out after {0}s")]
    OperationTimeout(u64),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AuthError {
    /// Whether the user has to authorize again to recover.
    pub fn requires_sign_in(&self) -> bool {
        matches!(
            self,
            AuthError::NotAuthenticated
                | AuthError::RefreshRejected(_)
                | AuthError::NoRefreshToken
                | AuthError::TokenCorrupted
        )
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
