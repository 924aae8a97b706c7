//! Track repository trait

use crate::error::Result;
use crate::models::{Track, TrackId};
use async_trait::async_trait;

/// Track repository interface for data access operations
#[async_trait]
pub trait TrackRepository: Send + Sync {
    /// Insert or replace a track
    ///
    /// # Errors
    /// Returns error if:
    /// - Track validation fails
    /// - The underlying store fails
    async fn save(&self, track: &Track) -> Result<()>;

    /// Find a track by its ID
    ///
    /// # Returns
    /// - `Ok(Some(track))` if found
    /// - `Ok(None)` if not found
    async fn find_by_id(&self, id: &TrackId) -> Result<Option<Track>>;

    /// All tracks, in no particular order
    async fn find_all(&self) -> Result<Vec<Track>>;

    /// Delete a track by ID
    ///
    /// # Returns
    /// - `Ok(true)` if track was deleted
    /// - `Ok(false)` if track was not found
    async fn delete(&self, id: &TrackId) -> Result<bool>;

    /// Count total tracks
    async fn count(&self) -> Result<usize> {
        Ok(self.find_all().await?.len())
    }
}
