//! Playlist repository trait

use crate::error::Result;
use crate::models::{Playlist, PlaylistId};
use async_trait::async_trait;

/// Playlist repository interface for data access operations
#[async_trait]
pub trait PlaylistRepository: Send + Sync {
    /// Insert or replace a playlist
    ///
    /// # Errors
    /// Returns error if:
    /// - Playlist validation fails
    /// - The underlying store fails
    async fn save(&self, playlist: &Playlist) -> Result<()>;

    /// Find a playlist by its ID
    async fn find_by_id(&self, id: &PlaylistId) -> Result<Option<Playlist>>;

    /// All playlists, in no particular order
    async fn find_all(&self) -> Result<Vec<Playlist>>;

    /// Delete a playlist by ID
    ///
    /// # Returns
    /// - `Ok(true)` if playlist was deleted
    /// - `Ok(false)` if playlist was not found
    async fn delete(&self, id: &PlaylistId) -> Result<bool>;
}
