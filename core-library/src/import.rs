//! Import pipeline types
//!
//! The file-provider import needs tags from audio files; reading them is
//! delegated to a [`MetadataExtractor`] so this crate stays free of codec
//! dependencies.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Tags read from an audio file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub year: Option<i32>,
    pub duration_secs: Option<f64>,
}

/// Reads tags from a local audio file.
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    async fn extract(&self, path: &Path) -> Result<ExtractedTags>;
}

/// Outcome of one import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    /// Resources seen, whether new or not.
    pub processed: usize,
    /// Tracks created by this run.
    pub added: usize,
    /// Resources already in the library.
    pub skipped: usize,
    /// Resources that could not be imported.
    pub failed: usize,
}
