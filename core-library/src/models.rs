//! Domain models for the music library
//!
//! Tracks carry an immutable identity and source, and mutable metadata.
//! Playlists reference tracks by id only.

use bridge_traits::storage::FileHandle;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Title used when a resource carries no title.
pub const UNKNOWN_TITLE: &str = "Unknown Title";
/// Artist used when a resource carries no artist.
pub const UNKNOWN_ARTIST: &str = "Unknown Artist";

// =============================================================================
// ID Types
// =============================================================================

/// Unique identifier for a track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrackId(pub Uuid);

impl TrackId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for TrackId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a playlist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlaylistId(pub Uuid);

impl PlaylistId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for PlaylistId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PlaylistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Resources
// =============================================================================

/// Handle of a file exposed by the file readiness provider.
pub type LocalResourceHandle = FileHandle;

/// Streaming-service resource identifier (the playable URI).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RemoteResourceId(String);

impl RemoteResourceId {
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RemoteResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which backend plays a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackSource {
    Local,
    Remote,
}

impl TrackSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackSource::Local => "local",
            TrackSource::Remote => "remote",
        }
    }
}

impl fmt::Display for TrackSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where the audio of a track lives. Exactly one kind per track.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResourceHandle {
    Local(LocalResourceHandle),
    Remote(RemoteResourceId),
}

impl ResourceHandle {
    pub fn source(&self) -> TrackSource {
        match self {
            ResourceHandle::Local(_) => TrackSource::Local,
            ResourceHandle::Remote(_) => TrackSource::Remote,
        }
    }

    /// Deduplication key: the file path or the remote URI.
    pub fn key(&self) -> &str {
        match self {
            ResourceHandle::Local(handle) => handle.path(),
            ResourceHandle::Remote(id) => id.as_str(),
        }
    }
}

// =============================================================================
// Domain Models
// =============================================================================

/// Music track
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Unique identifier, never reused
    pub id: TrackId,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub genre: Option<String>,
    pub year: Option<i32>,
    /// Duration estimate in seconds; backends may report a better value
    pub duration_secs: f64,
    /// Immutable after creation
    pub resource: ResourceHandle,
    pub date_added: DateTime<Utc>,
}

impl Track {
    /// Create a track, substituting the unknown title/artist placeholders
    /// for missing or blank values.
    pub fn new(
        title: Option<String>,
        artist: Option<String>,
        duration_secs: f64,
        resource: ResourceHandle,
        date_added: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TrackId::new(),
            title: non_blank(title).unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            artist: non_blank(artist).unwrap_or_else(|| UNKNOWN_ARTIST.to_string()),
            album: None,
            genre: None,
            year: None,
            duration_secs: sanitize_duration(duration_secs),
            resource,
            date_added,
        }
    }

    pub fn with_album(mut self, album: Option<String>) -> Self {
        self.album = non_blank(album);
        self
    }

    pub fn with_genre(mut self, genre: Option<String>) -> Self {
        self.genre = non_blank(genre);
        self
    }

    pub fn with_year(mut self, year: Option<i32>) -> Self {
        self.year = year;
        self
    }

    /// Replace the duration estimate with a value reported by a backend.
    ///
    /// Non-finite or non-positive values leave the estimate unchanged.
    pub fn with_corrected_duration(mut self, duration_secs: f64) -> Self {
        if duration_secs.is_finite() && duration_secs > 0.0 {
            self.duration_secs = duration_secs;
        }
        self
    }

    pub fn source(&self) -> TrackSource {
        self.resource.source()
    }

    pub fn local_handle(&self) -> Option<&LocalResourceHandle> {
        match &self.resource {
            ResourceHandle::Local(handle) => Some(handle),
            ResourceHandle::Remote(_) => None,
        }
    }

    pub fn remote_id(&self) -> Option<&RemoteResourceId> {
        match &self.resource {
            ResourceHandle::Remote(id) => Some(id),
            ResourceHandle::Local(_) => None,
        }
    }

    /// Case-insensitive match against title, artist and album.
    /// `needle` must already be lowercase.
    pub fn matches(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.artist.to_lowercase().contains(needle)
            || self
                .album
                .as_ref()
                .map(|album| album.to_lowercase().contains(needle))
                .unwrap_or(false)
    }

    /// Validate track data
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("Track title cannot be empty".to_string());
        }
        if self.artist.trim().is_empty() {
            return Err("Track artist cannot be empty".to_string());
        }
        if !self.duration_secs.is_finite() || self.duration_secs < 0.0 {
            return Err("Track duration must be a non-negative number".to_string());
        }
        Ok(())
    }
}

/// User playlist. Track references may mix sources and may dangle after a
/// track is deleted; dangling ids are skipped when the playlist is read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: PlaylistId,
    pub name: String,
    pub description: Option<String>,
    pub track_ids: Vec<TrackId>,
    pub date_created: DateTime<Utc>,
    /// Bumped on every change to the name, description or track list
    pub date_modified: DateTime<Utc>,
}

impl Playlist {
    pub fn new(name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: PlaylistId::new(),
            name: name.into(),
            description: None,
            track_ids: Vec::new(),
            date_created: now,
            date_modified: now,
        }
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.date_modified = now;
    }

    pub fn contains(&self, track_id: &TrackId) -> bool {
        self.track_ids.contains(track_id)
    }

    /// Remove every reference to `track_id`. Returns whether anything changed.
    pub fn remove_all(&mut self, track_id: &TrackId) -> bool {
        let before = self.track_ids.len();
        self.track_ids.retain(|id| id != track_id);
        before != self.track_ids.len()
    }

    /// Validate playlist data
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Playlist name cannot be empty".to_string());
        }
        Ok(())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn sanitize_duration(secs: f64) -> f64 {
    if secs.is_finite() && secs > 0.0 {
        secs
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(path: &str) -> ResourceHandle {
        ResourceHandle::Local(FileHandle::new(path))
    }

    #[test]
    fn test_track_defaults_for_missing_metadata() {
        let track = Track::new(None, Some("  ".to_string()), f64::NAN, local("/a.mp3"), Utc::now());
        assert_eq!(track.title, UNKNOWN_TITLE);
        assert_eq!(track.artist, UNKNOWN_ARTIST);
        assert_eq!(track.duration_secs, 0.0);
        assert!(track.validate().is_ok());
    }

    #[test]
    fn test_source_follows_resource() {
        let local_track = Track::new(None, None, 1.0, local("/a.mp3"), Utc::now());
        assert_eq!(local_track.source(), TrackSource::Local);
        assert!(local_track.local_handle().is_some());
        assert!(local_track.remote_id().is_none());

        let remote_track = Track::new(
            None,
            None,
            1.0,
            ResourceHandle::Remote(RemoteResourceId::new("svc:track:1")),
            Utc::now(),
        );
        assert_eq!(remote_track.source(), TrackSource::Remote);
        assert_eq!(remote_track.resource.key(), "svc:track:1");
    }

    #[test]
    fn test_corrected_duration() {
        let track = Track::new(None, None, 180.0, local("/a.mp3"), Utc::now());
        assert_eq!(track.clone().with_corrected_duration(182.5).duration_secs, 182.5);
        assert_eq!(track.clone().with_corrected_duration(0.0).duration_secs, 180.0);
        assert_eq!(track.with_corrected_duration(f64::INFINITY).duration_secs, 180.0);
    }

    #[test]
    fn test_track_matches_case_insensitive() {
        let track = Track::new(
            Some("Blue Monday".to_string()),
            Some("New Order".to_string()),
            1.0,
            local("/a.mp3"),
            Utc::now(),
        )
        .with_album(Some("Substance".to_string()));

        assert!(track.matches("monday"));
        assert!(track.matches("order"));
        assert!(track.matches("subst"));
        assert!(!track.matches("joy division"));
    }

    #[test]
    fn test_playlist_remove_all() {
        let mut playlist = Playlist::new("Mix", Utc::now());
        let a = TrackId::new();
        let b = TrackId::new();
        playlist.track_ids = vec![a, b, a];

        assert!(playlist.remove_all(&a));
        assert_eq!(playlist.track_ids, vec![b]);
        assert!(!playlist.remove_all(&a));
    }

    #[test]
    fn test_playlist_validation() {
        assert!(Playlist::new("  ", Utc::now()).validate().is_err());
        assert!(Playlist::new("Road trip", Utc::now()).validate().is_ok());
    }
}
