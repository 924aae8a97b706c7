use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource not ready: {0}")]
    NotReady(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Whether the failure is expected to clear up on its own (e.g. a
    /// download still in progress).
    pub fn is_transient(&self) -> bool {
        matches!(self, BridgeError::NotReady(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
