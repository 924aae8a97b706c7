//! Library/catalog manager
//!
//! # Overview
//!
//! [`LibraryManager`] owns the track and playlist collections:
//!
//! - **File import** walks the resources the file readiness provider exposes,
//!   downloads the ones that are not on the device yet, reads their tags and
//!   creates a track for every path not already in the library.
//! - **Remote import** pages through the user's saved tracks on the streaming
//!   service and creates a track for every URI not already in the library.
//!   A page shorter than the page size ends the listing.
//! - **CRUD** for tracks and playlists, with search.
//!
//! Both imports are idempotent and serialized with each other. Changes are
//! announced on the [`EventBus`] as [`LibraryEvent`]s.

use crate::error::{LibraryError, Result};
use crate::import::{ImportSummary, MetadataExtractor};
use crate::models::{
    Playlist, PlaylistId, RemoteResourceId, ResourceHandle, Track, TrackId, TrackSource,
};
use crate::repositories::{PlaylistRepository, TrackRepository};
use bridge_traits::remote::{RemoteApiClient, RemoteApiError, RemotePage, RemoteTrack};
use bridge_traits::storage::{FileHandle, FileReadinessProvider};
use bridge_traits::time::Clock;
use core_async::sync::Mutex;
use core_auth::AccessTokenProvider;
use core_runtime::config::{CoreConfig, MAX_IMPORT_PAGE_SIZE};
use core_runtime::events::{CoreEvent, EventBus, ImportOrigin, LibraryEvent};
use core_runtime::logging::strip_path;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Streaming-service catalog access used by the remote import.
#[derive(Clone)]
pub struct RemoteCatalog {
    api: Arc<dyn RemoteApiClient>,
    tokens: Arc<dyn AccessTokenProvider>,
}

impl RemoteCatalog {
    pub fn new(api: Arc<dyn RemoteApiClient>, tokens: Arc<dyn AccessTokenProvider>) -> Self {
        Self { api, tokens }
    }

    /// Fetch one page of saved tracks, refreshing once if the token is rejected.
    async fn saved_page(&self, offset: u32, limit: u32) -> Result<RemotePage<RemoteTrack>> {
        let token = self.tokens.valid_token().await?;
        match self.api.saved_tracks(&token, offset, limit).await {
            Err(RemoteApiError::AuthRequired) => {
                debug!(offset, "Catalog token rejected, refreshing");
                let token = self.tokens.force_refresh(&token).await?;
                Ok(self.api.saved_tracks(&token, offset, limit).await?)
            }
            other => Ok(other?),
        }
    }
}

/// Metadata changes applied by [`LibraryManager::update_track_metadata`].
/// `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackMetadataUpdate {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub year: Option<i32>,
    pub duration_secs: Option<f64>,
}

/// Owns the library collections and the import pipelines.
pub struct LibraryManager {
    tracks: Arc<dyn TrackRepository>,
    playlists: Arc<dyn PlaylistRepository>,
    files: Arc<dyn FileReadinessProvider>,
    extractor: Arc<dyn MetadataExtractor>,
    catalog: Option<RemoteCatalog>,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    page_size: u32,
    import_lock: Mutex<()>,
}

impl LibraryManager {
    pub fn new(
        tracks: Arc<dyn TrackRepository>,
        playlists: Arc<dyn PlaylistRepository>,
        files: Arc<dyn FileReadinessProvider>,
        extractor: Arc<dyn MetadataExtractor>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
    ) -> Self {
        Self {
            tracks,
            playlists,
            files,
            extractor,
            catalog: None,
            clock,
            event_bus,
            page_size: MAX_IMPORT_PAGE_SIZE,
            import_lock: Mutex::new(()),
        }
    }

    pub fn with_remote_catalog(mut self, catalog: RemoteCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_config(mut self, config: &CoreConfig) -> Self {
        self.page_size = config.import_page_size.clamp(1, MAX_IMPORT_PAGE_SIZE);
        self
    }

    fn emit(&self, event: LibraryEvent) {
        let _ = self.event_bus.emit(CoreEvent::Library(event));
    }

    // ========================================================================
    // Imports
    // ========================================================================

    /// Import every file the provider exposes that is not yet in the library.
    ///
    /// A file that cannot be downloaded or read is logged and counted as
    /// failed; it does not abort the run and is retried by the next run.
    #[instrument(skip(self))]
    pub async fn import_from_file_provider(&self) -> Result<ImportSummary> {
        let _guard = self.import_lock.lock().await;

        let handles = self.files.list_available_resources().await?;
        let mut known = self.known_keys(TrackSource::Local).await?;
        let mut summary = ImportSummary::default();

        for handle in handles {
            summary.processed += 1;

            if known.contains(handle.path()) {
                summary.skipped += 1;
                continue;
            }

            match self.import_file(&handle).await {
                Ok(track) => {
                    known.insert(handle.path().to_string());
                    summary.added += 1;
                    self.emit_track_added(&track);
                }
                Err(e) => {
                    warn!(file = %strip_path(handle.path()), error = %e, "Failed to import file");
                    summary.failed += 1;
                }
            }

            self.emit(LibraryEvent::ImportProgress {
                origin: ImportOrigin::FileProvider,
                processed: summary.processed,
            });
        }

        self.finish_import(ImportOrigin::FileProvider, summary);
        Ok(summary)
    }

    async fn import_file(&self, handle: &FileHandle) -> Result<Track> {
        if !self.files.is_available(handle) {
            debug!(file = %strip_path(handle.path()), "Downloading before import");
            self.files.ensure_available(handle).await?;
        }

        let path = self.files.local_path(handle);
        let tags = self.extractor.extract(&path).await?;

        let track = Track::new(
            tags.title,
            tags.artist,
            tags.duration_secs.unwrap_or(0.0),
            ResourceHandle::Local(handle.clone()),
            self.clock.now(),
        )
        .with_album(tags.album)
        .with_genre(tags.genre)
        .with_year(tags.year);

        self.tracks.save(&track).await?;
        Ok(track)
    }

    /// Import the user's saved tracks from the streaming service.
    ///
    /// `progress` receives the cumulative number of catalog items seen after
    /// every page.
    #[instrument(skip(self, progress))]
    pub async fn import_from_remote_catalog<F>(&self, mut progress: F) -> Result<ImportSummary>
    where
        F: FnMut(usize) + Send,
    {
        let catalog = self
            .catalog
            .as_ref()
            .ok_or(LibraryError::RemoteCatalogUnavailable)?;
        let _guard = self.import_lock.lock().await;

        let mut known = self.known_keys(TrackSource::Remote).await?;
        let mut summary = ImportSummary::default();
        let mut offset = 0u32;

        loop {
            let page = catalog.saved_page(offset, self.page_size).await?;
            let page_len = page.items.len();

            for item in page.items {
                if !known.insert(item.uri.clone()) {
                    summary.skipped += 1;
                    continue;
                }

                let track = remote_track(item, self.clock.now());
                self.tracks.save(&track).await?;
                summary.added += 1;
                self.emit_track_added(&track);
            }

            summary.processed += page_len;
            progress(summary.processed);
            self.emit(LibraryEvent::ImportProgress {
                origin: ImportOrigin::RemoteCatalog,
                processed: summary.processed,
            });
            debug!(offset, page_len, "Catalog page imported");

            if page_len < self.page_size as usize {
                break;
            }
            offset += page_len as u32;
        }

        self.finish_import(ImportOrigin::RemoteCatalog, summary);
        Ok(summary)
    }

    async fn known_keys(&self, source: TrackSource) -> Result<HashSet<String>> {
        Ok(self
            .tracks
            .find_all()
            .await?
            .into_iter()
            .filter(|track| track.source() == source)
            .map(|track| track.resource.key().to_string())
            .collect())
    }

    fn emit_track_added(&self, track: &Track) {
        self.emit(LibraryEvent::TrackAdded {
            track_id: track.id.to_string(),
            title: track.title.clone(),
            artist: track.artist.clone(),
            source: track.source().to_string(),
        });
    }

    fn finish_import(&self, origin: ImportOrigin, summary: ImportSummary) {
        info!(
            origin = ?origin,
            added = summary.added,
            skipped = summary.skipped,
            failed = summary.failed,
            "Import completed"
        );
        self.emit(LibraryEvent::ImportCompleted {
            origin,
            added: summary.added,
            skipped: summary.skipped,
            failed: summary.failed,
        });
    }

    // ========================================================================
    // Tracks
    // ========================================================================

    /// All tracks, newest first.
    pub async fn tracks(&self) -> Result<Vec<Track>> {
        let mut tracks = self.tracks.find_all().await?;
        tracks.sort_by(|a, b| {
            b.date_added
                .cmp(&a.date_added)
                .then_with(|| a.title.cmp(&b.title))
        });
        Ok(tracks)
    }

    pub async fn track(&self, id: &TrackId) -> Result<Option<Track>> {
        self.tracks.find_by_id(id).await
    }

    /// Tracks whose title, artist or album contains `query`, ignoring case.
    /// A blank query matches everything.
    pub async fn search(&self, query: &str) -> Result<Vec<Track>> {
        let needle = query.trim().to_lowercase();
        let tracks = self.tracks().await?;
        if needle.is_empty() {
            return Ok(tracks);
        }
        Ok(tracks.into_iter().filter(|t| t.matches(&needle)).collect())
    }

    /// Apply enrichment or user edits to a track's metadata.
    #[instrument(skip(self, update), fields(track_id = %id))]
    pub async fn update_track_metadata(
        &self,
        id: &TrackId,
        update: TrackMetadataUpdate,
    ) -> Result<Track> {
        let mut track = self
            .tracks
            .find_by_id(id)
            .await?
            .ok_or_else(|| LibraryError::track_not_found(id))?;
        let mut updated_fields = Vec::new();

        if let Some(title) = update.title {
            let title = require_non_blank("title", title)?;
            if track.title != title {
                track.title = title;
                updated_fields.push("title".to_string());
            }
        }
        if let Some(artist) = update.artist {
            let artist = require_non_blank("artist", artist)?;
            if track.artist != artist {
                track.artist = artist;
                updated_fields.push("artist".to_string());
            }
        }
        if update.album.is_some() && track.album != update.album {
            track.album = update.album;
            updated_fields.push("album".to_string());
        }
        if update.genre.is_some() && track.genre != update.genre {
            track.genre = update.genre;
            updated_fields.push("genre".to_string());
        }
        if update.year.is_some() && track.year != update.year {
            track.year = update.year;
            updated_fields.push("year".to_string());
        }
        if let Some(duration) = update.duration_secs {
            let before = track.duration_secs;
            track = track.with_corrected_duration(duration);
            if track.duration_secs != before {
                updated_fields.push("duration".to_string());
            }
        }

        if !updated_fields.is_empty() {
            self.tracks.save(&track).await?;
            self.emit(LibraryEvent::TrackUpdated {
                track_id: track.id.to_string(),
                updated_fields,
            });
        }
        Ok(track)
    }

    /// Delete a track and remove it from every playlist that references it.
    #[instrument(skip(self), fields(track_id = %id))]
    pub async fn delete_track(&self, id: &TrackId) -> Result<()> {
        if !self.tracks.delete(id).await? {
            return Err(LibraryError::track_not_found(id));
        }

        let now = self.clock.now();
        let mut touched = 0;
        for mut playlist in self.playlists.find_all().await? {
            if playlist.remove_all(id) {
                playlist.touch(now);
                self.playlists.save(&playlist).await?;
                touched += 1;
            }
        }

        info!(playlists_touched = touched, "Track deleted");
        self.emit(LibraryEvent::TrackDeleted {
            track_id: id.to_string(),
            playlists_touched: touched,
        });
        Ok(())
    }

    // ========================================================================
    // Playlists
    // ========================================================================

    /// All playlists, most recently created first.
    pub async fn playlists(&self) -> Result<Vec<Playlist>> {
        let mut playlists = self.playlists.find_all().await?;
        playlists.sort_by(|a, b| {
            b.date_created
                .cmp(&a.date_created)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(playlists)
    }

    pub async fn playlist(&self, id: &PlaylistId) -> Result<Option<Playlist>> {
        self.playlists.find_by_id(id).await
    }

    #[instrument(skip(self))]
    pub async fn create_playlist(
        &self,
        name: &str,
        description: Option<String>,
    ) -> Result<Playlist> {
        let name = require_non_blank("name", name.to_string())?;
        let mut playlist = Playlist::new(name, self.clock.now());
        playlist.description = description.filter(|d| !d.trim().is_empty());

        self.playlists.save(&playlist).await?;
        self.emit(LibraryEvent::PlaylistCreated {
            playlist_id: playlist.id.to_string(),
            name: playlist.name.clone(),
        });
        Ok(playlist)
    }

    pub async fn rename_playlist(&self, id: &PlaylistId, name: &str) -> Result<Playlist> {
        let name = require_non_blank("name", name.to_string())?;
        self.modify_playlist(id, "renamed", |playlist| {
            playlist.name = name;
            Ok(())
        })
        .await
    }

    pub async fn set_playlist_description(
        &self,
        id: &PlaylistId,
        description: Option<String>,
    ) -> Result<Playlist> {
        self.modify_playlist(id, "description_changed", |playlist| {
            playlist.description = description.filter(|d| !d.trim().is_empty());
            Ok(())
        })
        .await
    }

    pub async fn delete_playlist(&self, id: &PlaylistId) -> Result<()> {
        if !self.playlists.delete(id).await? {
            return Err(LibraryError::playlist_not_found(id));
        }
        self.emit(LibraryEvent::PlaylistDeleted {
            playlist_id: id.to_string(),
        });
        Ok(())
    }

    /// Append tracks to a playlist. Every id must exist in the library.
    pub async fn add_to_playlist(&self, id: &PlaylistId, track_ids: &[TrackId]) -> Result<Playlist> {
        for track_id in track_ids {
            if self.tracks.find_by_id(track_id).await?.is_none() {
                return Err(LibraryError::track_not_found(track_id));
            }
        }
        self.modify_playlist(id, "tracks_added", |playlist| {
            playlist.track_ids.extend_from_slice(track_ids);
            Ok(())
        })
        .await
    }

    /// Remove the entry at `index`.
    pub async fn remove_from_playlist(&self, id: &PlaylistId, index: usize) -> Result<Playlist> {
        self.modify_playlist(id, "tracks_removed", |playlist| {
            check_index("index", index, playlist.track_ids.len())?;
            playlist.track_ids.remove(index);
            Ok(())
        })
        .await
    }

    /// Move the entry at `from` so that it ends up at `to`.
    pub async fn move_in_playlist(&self, id: &PlaylistId, from: usize, to: usize) -> Result<Playlist> {
        self.modify_playlist(id, "reordered", |playlist| {
            let len = playlist.track_ids.len();
            check_index("from", from, len)?;
            check_index("to", to, len)?;
            let track_id = playlist.track_ids.remove(from);
            playlist.track_ids.insert(to, track_id);
            Ok(())
        })
        .await
    }

    /// The playlist's tracks in order. References to deleted tracks are skipped.
    pub async fn playlist_tracks(&self, id: &PlaylistId) -> Result<Vec<Track>> {
        let playlist = self
            .playlists
            .find_by_id(id)
            .await?
            .ok_or_else(|| LibraryError::playlist_not_found(id))?;

        let mut tracks = Vec::with_capacity(playlist.track_ids.len());
        for track_id in &playlist.track_ids {
            match self.tracks.find_by_id(track_id).await? {
                Some(track) => tracks.push(track),
                None => debug!(track_id = %track_id, "Skipping dangling playlist entry"),
            }
        }
        Ok(tracks)
    }

    async fn modify_playlist<F>(&self, id: &PlaylistId, change_type: &str, change: F) -> Result<Playlist>
    where
        F: FnOnce(&mut Playlist) -> Result<()>,
    {
        let mut playlist = self
            .playlists
            .find_by_id(id)
            .await?
            .ok_or_else(|| LibraryError::playlist_not_found(id))?;

        change(&mut playlist)?;
        playlist.touch(self.clock.now());
        self.playlists.save(&playlist).await?;

        self.emit(LibraryEvent::PlaylistUpdated {
            playlist_id: id.to_string(),
            change_type: change_type.to_string(),
        });
        Ok(playlist)
    }
}

fn remote_track(item: RemoteTrack, now: chrono::DateTime<chrono::Utc>) -> Track {
    Track::new(
        Some(item.title),
        Some(item.artist),
        item.duration_ms as f64 / 1000.0,
        ResourceHandle::Remote(RemoteResourceId::new(item.uri)),
        now,
    )
    .with_album(item.album)
}

fn require_non_blank(field: &str, value: String) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(LibraryError::InvalidInput {
            field: field.to_string(),
            message: "must not be empty".to_string(),
        });
    }
    Ok(trimmed.to_string())
}

fn check_index(field: &str, index: usize, len: usize) -> Result<()> {
    if index >= len {
        return Err(LibraryError::InvalidInput {
            field: field.to_string(),
            message: format!("index {} out of range for {} entries", index, len),
        });
    }
    Ok(())
}
