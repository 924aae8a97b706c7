//! In-memory repository implementation

use crate::error::{LibraryError, Result};
use crate::models::{Playlist, PlaylistId, Track, TrackId};
use crate::repositories::{PlaylistRepository, TrackRepository};
use async_trait::async_trait;
use core_async::sync::RwLock;
use std::collections::HashMap;

/// Library store keeping tracks and playlists in memory.
///
/// Implements both repository traits; share one instance behind an `Arc`
/// for the track and playlist sides.
#[derive(Default)]
pub struct InMemoryLibraryStore {
    tracks: RwLock<HashMap<TrackId, Track>>,
    playlists: RwLock<HashMap<PlaylistId, Playlist>>,
}

impl InMemoryLibraryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TrackRepository for InMemoryLibraryStore {
    async fn save(&self, track: &Track) -> Result<()> {
        track
            .validate()
            .map_err(|message| LibraryError::InvalidInput {
                field: "track".to_string(),
                message,
            })?;
        self.tracks.write().await.insert(track.id, track.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &TrackId) -> Result<Option<Track>> {
        Ok(self.tracks.read().await.get(id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<Track>> {
        Ok(self.tracks.read().await.values().cloned().collect())
    }

    async fn delete(&self, id: &TrackId) -> Result<bool> {
        Ok(self.tracks.write().await.remove(id).is_some())
    }

    async fn count(&self) -> Result<usize> {
        Ok(self.tracks.read().await.len())
    }
}

#[async_trait]
impl PlaylistRepository for InMemoryLibraryStore {
    async fn save(&self, playlist: &Playlist) -> Result<()> {
        playlist
            .validate()
            .map_err(|message| LibraryError::InvalidInput {
                field: "playlist".to_string(),
                message,
            })?;
        self.playlists
            .write()
            .await
            .insert(playlist.id, playlist.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: &PlaylistId) -> Result<Option<Playlist>> {
        Ok(self.playlists.read().await.get(id).cloned())
    }

    async fn find_all(&self) -> Result<Vec<Playlist>> {
        Ok(self.playlists.read().await.values().cloned().collect())
    }

    async fn delete(&self, id: &PlaylistId) -> Result<bool> {
        Ok(self.playlists.write().await.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResourceHandle;
    use bridge_traits::storage::FileHandle;
    use chrono::Utc;

    fn track(path: &str) -> Track {
        Track::new(
            Some("Song".to_string()),
            Some("Band".to_string()),
            200.0,
            ResourceHandle::Local(FileHandle::new(path)),
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_save_and_find_track() {
        let store = InMemoryLibraryStore::new();
        let t = track("/a.mp3");

        TrackRepository::save(&store, &t).await.unwrap();

        let found = TrackRepository::find_by_id(&store, &t.id).await.unwrap();
        assert_eq!(found, Some(t.clone()));
        assert_eq!(TrackRepository::count(&store).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_save_replaces_existing_track() {
        let store = InMemoryLibraryStore::new();
        let mut t = track("/a.mp3");
        TrackRepository::save(&store, &t).await.unwrap();

        t.title = "Renamed".to_string();
        TrackRepository::save(&store, &t).await.unwrap();

        let all = TrackRepository::find_all(&store).await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].title, "Renamed");
    }

    #[tokio::test]
    async fn test_invalid_track_rejected() {
        let store = InMemoryLibraryStore::new();
        let mut t = track("/a.mp3");
        t.title = String::new();

        let result = TrackRepository::save(&store, &t).await;
        assert!(matches!(result, Err(LibraryError::InvalidInput { .. })));
    }

    #[tokio::test]
    async fn test_delete_track() {
        let store = InMemoryLibraryStore::new();
        let t = track("/a.mp3");
        TrackRepository::save(&store, &t).await.unwrap();

        assert!(TrackRepository::delete(&store, &t.id).await.unwrap());
        assert!(!TrackRepository::delete(&store, &t.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_playlist_round_trip() {
        let store = InMemoryLibraryStore::new();
        let mut playlist = Playlist::new("Favourites", Utc::now());
        playlist.track_ids.push(TrackId::new());

        PlaylistRepository::save(&store, &playlist).await.unwrap();
        let found = PlaylistRepository::find_by_id(&store, &playlist.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found, playlist);

        assert!(PlaylistRepository::delete(&store, &playlist.id).await.unwrap());
        assert!(PlaylistRepository::find_all(&store).await.unwrap().is_empty());
    }
}
