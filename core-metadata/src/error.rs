use core_library::LibraryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Failed to extract metadata: {0}")]
    ExtractionFailed(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<MetadataError> for LibraryError {
    fn from(error: MetadataError) -> Self {
        LibraryError::Metadata(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MetadataError>;
