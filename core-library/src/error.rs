use bridge_traits::error::BridgeError;
use bridge_traits::remote::RemoteApiError;
use core_auth::AuthError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Entity not found: {entity_type} with id {id}")]
    NotFound { entity_type: String, id: String },

    #[error("Invalid input: {field} - {message}")]
    InvalidInput { field: String, message: String },

    #[error("Metadata extraction failed: {0}")]
    Metadata(String),

    #[error("Remote catalog error: {0}")]
    Remote(#[from] RemoteApiError),

    #[error("Remote catalog is not configured")]
    RemoteCatalogUnavailable,

    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl LibraryError {
    pub(crate) fn track_not_found(id: impl ToString) -> Self {
        LibraryError::NotFound {
            entity_type: "Track".to_string(),
            id: id.to_string(),
        }
    }

    pub(crate) fn playlist_not_found(id: impl ToString) -> Self {
        LibraryError::NotFound {
            entity_type: "Playlist".to_string(),
            id: id.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LibraryError>;
