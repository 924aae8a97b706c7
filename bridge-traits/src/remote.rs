//! Streaming Service Abstractions
//!
//! Two collaborators control playback on the streaming service:
//!
//! - [`RemoteApiClient`] is stateless and HTTP-shaped. It covers search,
//!   library listing and direct transport commands against whatever device
//!   the service currently considers active.
//! - [`RemoteSession`] is the stateful, connection-oriented handle provided by
//!   the service's SDK. Establishing it can be slow and user-visible, but once
//!   connected it pushes state changes to subscribers.

use async_trait::async_trait;
use core_async::sync::broadcast;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Data types
// ============================================================================

/// A track as listed by the streaming service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteTrack {
    /// Service-wide identifier.
    pub id: String,
    /// Playable URI handed back to transport commands. Unique per track, so
    /// the library deduplicates catalog imports on it.
    pub uri: String,
    pub title: String,
    pub artist: String,
    pub album: Option<String>,
    pub duration_ms: u64,
}

/// One page of a paginated listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemotePage<T> {
    pub items: Vec<T>,
    pub offset: u32,
    pub total: Option<u32>,
}

/// Playback state of the active device as reported by a status query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemotePlaybackStatus {
    pub device_id: String,
    pub is_playing: bool,
    pub track_uri: Option<String>,
    pub progress_ms: u64,
    pub duration_ms: u64,
}

/// State pushed by a connected session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteStateUpdate {
    pub track_uri: Option<String>,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub is_paused: bool,
}

// ============================================================================
// Errors
// ============================================================================

/// Typed failures returned by [`RemoteApiClient`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RemoteApiError {
    #[error("Authorization required")]
    AuthRequired,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    #[error("Server error {status}: {message}")]
    ServerError { status: u16, message: String },

    #[error("No active playback device")]
    NoActiveDevice,

    #[error("Transport failure: {0}")]
    Transport(String),
}

pub type ApiResult<T> = std::result::Result<T, RemoteApiError>;

/// Failures returned by [`RemoteSession`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SessionError {
    #[error("Session is not connected")]
    NotConnected,

    #[error("Session connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Session rejected the access token")]
    AuthRequired,

    #[error("Session command failed: {0}")]
    CommandFailed(String),
}

pub type SessionResult<T> = std::result::Result<T, SessionError>;

// ============================================================================
// Traits
// ============================================================================

/// Stateless client for the streaming service's web API.
///
/// Every call takes the bearer token explicitly; the caller is responsible
/// for never passing a token it knows to be expired.
#[async_trait]
pub trait RemoteApiClient: Send + Sync {
    async fn search(&self, token: &str, query: &str, limit: u32) -> ApiResult<Vec<RemoteTrack>>;

    /// The user's saved tracks, `limit` items starting at `offset`.
    async fn saved_tracks(
        &self,
        token: &str,
        offset: u32,
        limit: u32,
    ) -> ApiResult<RemotePage<RemoteTrack>>;

    /// Status of the currently active device, or `None` when no device is
    /// active for this account.
    async fn playback_status(&self, token: &str) -> ApiResult<Option<RemotePlaybackStatus>>;

    async fn play(&self, token: &str, uri: &str, position_ms: u64) -> ApiResult<()>;

    async fn pause(&self, token: &str) -> ApiResult<()>;

    async fn resume(&self, token: &str) -> ApiResult<()>;

    async fn seek(&self, token: &str, position_ms: u64) -> ApiResult<()>;

    async fn skip_next(&self, token: &str) -> ApiResult<()>;

    async fn skip_previous(&self, token: &str) -> ApiResult<()>;
}

/// Stateful playback session provided by the streaming service's SDK.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Starts establishing the session. This may hand control to the
    /// service's own app; completion is observed through
    /// [`is_connected`](RemoteSession::is_connected).
    async fn connect(&self, access_token: &str) -> SessionResult<()>;

    async fn disconnect(&self) -> SessionResult<()>;

    fn is_connected(&self) -> bool;

    /// Whether a connected session pushes state updates. When it does not,
    /// callers poll [`RemoteApiClient::playback_status`] instead.
    fn is_push_capable(&self) -> bool {
        true
    }

    async fn play(&self, uri: &str) -> SessionResult<()>;

    async fn pause(&self) -> SessionResult<()>;

    async fn resume(&self) -> SessionResult<()>;

    async fn seek(&self, position_ms: u64) -> SessionResult<()>;

    async fn skip_next(&self) -> SessionResult<()>;

    async fn skip_previous(&self) -> SessionResult<()>;

    /// Subscribe to pushed state changes.
    fn subscribe(&self) -> broadcast::Receiver<RemoteStateUpdate>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        assert_eq!(
            RemoteApiError::NoActiveDevice.to_string(),
            "No active playback device"
        );
        assert_eq!(
            RemoteApiError::ServerError {
                status: 502,
                message: "bad gateway".to_string()
            }
            .to_string(),
            "Server error 502: bad gateway"
        );
    }

    #[test]
    fn test_page_serialization() {
        let page = RemotePage {
            items: vec![RemoteTrack {
                id: "t1".to_string(),
                uri: "svc:track:t1".to_string(),
                title: "Song".to_string(),
                artist: "Band".to_string(),
                album: None,
                duration_ms: 1_000,
            }],
            offset: 0,
            total: Some(1),
        };

        let json = serde_json::to_string(&page).unwrap();
        let parsed: RemotePage<RemoteTrack> = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, page);
    }
}
