//! # Playback Error Types
//!
//! Backends translate every collaborator failure (file provider, audio
//! engine, web API, session SDK, authenticator) into [`PlaybackError`] before
//! it reaches the coordinator. The coordinator never sees a raw transport
//! error.

use bridge_traits::error::BridgeError;
use bridge_traits::remote::{RemoteApiError, SessionError};
use core_auth::AuthError;
use std::fmt;
use thiserror::Error;

/// Errors that can occur while dispatching playback commands.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlaybackError {
    // ========================================================================
    // Readiness
    // ========================================================================
    /// Resource not downloaded yet, or session not connected yet.
    #[error("Not ready: {0}")]
    NotReady(String),

    /// Local file deleted or unreachable.
    #[error("Resource missing: {0}")]
    ResourceMissing(String),

    // ========================================================================
    // Remote
    // ========================================================================
    /// The access token was rejected and could not be refreshed right now.
    #[error("Session expired")]
    AuthExpired,

    /// Credentials are gone; the user has to sign in again.
    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    /// No remote playback target, and establishing a session timed out.
    #[error("Playback device unavailable: {0}")]
    DeviceUnavailable(String),

    // ========================================================================
    // Dispatch
    // ========================================================================
    /// A newer command replaced the one this result belongs to.
    #[error("Superseded by a newer command")]
    Superseded,

    /// No backend can play this track.
    #[error("No backend for track: {0}")]
    NoBackend(String),

    /// The audio engine or the remote transport failed.
    #[error("Playback engine error: {0}")]
    Engine(String),
}

impl PlaybackError {
    /// Only readiness failures are retried, once, by the owning backend.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PlaybackError::NotReady(_))
    }

    /// Stale results are dropped without telling the user.
    pub fn is_silent(&self) -> bool {
        matches!(self, PlaybackError::Superseded)
    }

    /// Message suitable for showing to the user.
    pub fn user_message(&self) -> UserMessage {
        let detail = match self {
            PlaybackError::AuthFailed(_) => {
                return UserMessage {
                    title: NOT_SIGNED_IN.to_string(),
                    detail: Some("Sign in to the streaming service to play this track.".into()),
                }
            }
            PlaybackError::NotReady(_) => "The track is still downloading.",
            PlaybackError::ResourceMissing(_) => "The file is no longer available.",
            PlaybackError::AuthExpired => "Your session expired. Try again.",
            PlaybackError::DeviceUnavailable(_) => {
                "Couldn't connect to the streaming service. Open its app and try again."
            }
            PlaybackError::NoBackend(_) => "This kind of track isn't supported.",
            PlaybackError::Engine(_) | PlaybackError::Superseded => "Something went wrong.",
        };

        UserMessage {
            title: CANT_PLAY.to_string(),
            detail: Some(detail.to_string()),
        }
    }
}

const CANT_PLAY: &str = "Can't play this track";
const NOT_SIGNED_IN: &str = "Not signed in";

/// Two-line message for the UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserMessage {
    pub title: String,
    pub detail: Option<String>,
}

impl fmt::Display for UserMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{}: {}", self.title, detail),
            None => f.write_str(&self.title),
        }
    }
}

// ============================================================================
// Boundary translation
// ============================================================================

impl From<BridgeError> for PlaybackError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::NotReady(msg) => PlaybackError::NotReady(msg),
            BridgeError::NotFound(msg) => PlaybackError::ResourceMissing(msg),
            BridgeError::Io(e) if e.kind() == std::io::ErrorKind::NotFound => {
                PlaybackError::ResourceMissing(e.to_string())
            }
            other => PlaybackError::Engine(other.to_string()),
        }
    }
}

impl From<RemoteApiError> for PlaybackError {
    fn from(err: RemoteApiError) -> Self {
        match err {
            RemoteApiError::AuthRequired => PlaybackError::AuthExpired,
            RemoteApiError::NotFound(what) => PlaybackError::ResourceMissing(what),
            RemoteApiError::NoActiveDevice => {
                PlaybackError::DeviceUnavailable("no active device".to_string())
            }
            other => PlaybackError::Engine(other.to_string()),
        }
    }
}

impl From<SessionError> for PlaybackError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotConnected => PlaybackError::NotReady(err.to_string()),
            SessionError::ConnectionFailed(msg) => PlaybackError::DeviceUnavailable(msg),
            SessionError::AuthRequired => PlaybackError::AuthExpired,
            SessionError::CommandFailed(msg) => PlaybackError::Engine(msg),
        }
    }
}

impl From<AuthError> for PlaybackError {
    fn from(err: AuthError) -> Self {
        if err.requires_sign_in() {
            PlaybackError::AuthFailed(err.to_string())
        } else {
            PlaybackError::AuthExpired
        }
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
