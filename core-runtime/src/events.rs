//! # Event Bus System
//!
//! Typed, broadcast-based events shared by the playback core's modules.
//!
//! ## Overview
//!
//! - **Event Types**: one enum per domain (auth, library, playback) wrapped
//!   in [`CoreEvent`]
//! - **EventBus**: a cloneable handle over a broadcast channel
//! - **EventStream**: a receiver wrapper with optional filtering
//!
//! ```text
//! ┌──────────────────┐  emit   ┌───────────┐  subscribe  ┌────────────┐
//! │ Authenticator    ├────────>│           ├────────────>│ UI layer   │
//! ├──────────────────┤         │ EventBus  │             └────────────┘
//! │ Library manager  ├────────>│           │  subscribe  ┌────────────┐
//! ├──────────────────┤         │           ├────────────>│ Telemetry  │
//! │ Coordinator      ├────────>│           │             └────────────┘
//! └──────────────────┘         └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Playback(PlaybackEvent::Stopped {
//!         track_id: "track-1".to_string(),
//!     }))
//!     .ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert_eq!(event.description(), "Playback stopped");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - **`RecvError::Lagged(n)`**: the subscriber missed `n` events; it can keep
//!   receiving.
//! - **`RecvError::Closed`**: every sender was dropped, which means shutdown.
//!
//! Emitting with no subscribers returns an error that publishers ignore.

use serde::{Deserialize, Serialize};
use std::fmt;
use core_async::sync::broadcast;

pub use core_async::sync::broadcast::error::{RecvError, SendError};
pub use core_async::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    Auth(AuthEvent),
    Library(LibraryEvent),
    Playback(PlaybackEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Auth(e) => e.description(),
            CoreEvent::Library(e) => e.description(),
            CoreEvent::Playback(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Auth(AuthEvent::AuthError {
                recoverable: false, ..
            }) => EventSeverity::Error,
            CoreEvent::Auth(AuthEvent::AuthError { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Error,
            CoreEvent::Library(LibraryEvent::ImportCompleted { failed, .. }) if *failed > 0 => {
                EventSeverity::Warning
            }
            CoreEvent::Auth(AuthEvent::SignedIn { .. })
            | CoreEvent::Library(LibraryEvent::ImportCompleted { .. })
            | CoreEvent::Playback(PlaybackEvent::TrackChanged { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Authentication Events
// ============================================================================

/// Events describing the streaming-service session credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum AuthEvent {
    /// Credentials were removed.
    SignedOut,
    /// Interactive authorization started.
    SigningIn,
    /// Credentials were obtained or restored.
    SignedIn {
        /// When the access token expires (Unix epoch seconds).
        expires_at: i64,
    },
    /// Access token is being refreshed.
    TokenRefreshing,
    /// Token refresh completed successfully.
    TokenRefreshed {
        /// When the new access token expires (Unix epoch seconds).
        expires_at: i64,
    },
    /// Authentication error occurred.
    AuthError {
        message: String,
        /// `false` means the user has to sign in again.
        recoverable: bool,
    },
}

impl AuthEvent {
    fn description(&self) -> &str {
        match self {
            AuthEvent::SignedOut => "User signed out",
            AuthEvent::SigningIn => "Authentication in progress",
            AuthEvent::SignedIn { .. } => "User signed in successfully",
            AuthEvent::TokenRefreshing => "Refreshing access token",
            AuthEvent::TokenRefreshed { .. } => "Token refreshed successfully",
            AuthEvent::AuthError { .. } => "Authentication error",
        }
    }
}

// ============================================================================
// Library Events
// ============================================================================

/// Where an import pulled tracks from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ImportOrigin {
    FileProvider,
    RemoteCatalog,
}

/// Events related to library content changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    TrackAdded {
        track_id: String,
        title: String,
        artist: String,
        /// `"local"` or `"remote"`.
        source: String,
    },
    TrackUpdated {
        track_id: String,
        updated_fields: Vec<String>,
    },
    TrackDeleted {
        track_id: String,
        /// Number of playlists the track was removed from.
        playlists_touched: usize,
    },
    PlaylistCreated {
        playlist_id: String,
        name: String,
    },
    /// Playlist modified (e.g. "renamed", "tracks_added", "tracks_removed",
    /// "reordered", "description_changed").
    PlaylistUpdated {
        playlist_id: String,
        change_type: String,
    },
    PlaylistDeleted {
        playlist_id: String,
    },
    /// Cumulative progress of a running import.
    ImportProgress {
        origin: ImportOrigin,
        processed: usize,
    },
    ImportCompleted {
        origin: ImportOrigin,
        added: usize,
        skipped: usize,
        failed: usize,
    },
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::TrackAdded { .. } => "Track added to library",
            LibraryEvent::TrackUpdated { .. } => "Track metadata updated",
            LibraryEvent::TrackDeleted { .. } => "Track removed from library",
            LibraryEvent::PlaylistCreated { .. } => "Playlist created",
            LibraryEvent::PlaylistUpdated { .. } => "Playlist updated",
            LibraryEvent::PlaylistDeleted { .. } => "Playlist deleted",
            LibraryEvent::ImportProgress { .. } => "Import in progress",
            LibraryEvent::ImportCompleted { .. } => "Import completed",
        }
    }
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events related to audio playback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A different track became current.
    TrackChanged {
        track_id: String,
        title: String,
        source: String,
    },
    Started {
        track_id: String,
    },
    Paused {
        track_id: String,
        position_secs: f64,
    },
    Resumed {
        track_id: String,
        position_secs: f64,
    },
    Stopped {
        track_id: String,
    },
    /// Track finished playing naturally.
    Completed {
        track_id: String,
    },
    /// Playback reached the end of the queue with nothing left to play.
    QueueEnded,
    /// Shuffle or repeat changed.
    ModeChanged {
        shuffle_enabled: bool,
        repeat_mode: String,
    },
    Error {
        track_id: Option<String>,
        message: String,
        recoverable: bool,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::TrackChanged { .. } => "Current track changed",
            PlaybackEvent::Started { .. } => "Playback started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Resumed { .. } => "Playback resumed",
            PlaybackEvent::Stopped { .. } => "Playback stopped",
            PlaybackEvent::Completed { .. } => "Track completed",
            PlaybackEvent::QueueEnded => "Queue ended",
            PlaybackEvent::ModeChanged { .. } => "Playback mode changed",
            PlaybackEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus clones the sender, so every clone publishes into the same
/// channel. Each `subscribe()` creates an independent receiver that sees all
/// events emitted after it was created.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per
    /// subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let playback_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Playback(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive a matching event without waiting.
    ///
    /// Returns `None` if no matching events are currently buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) if self.accepts(&event) => return Some(Ok(event)),
                Ok(_) => continue,
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn stopped(track_id: &str) -> CoreEvent {
        CoreEvent::Playback(PlaybackEvent::Stopped {
            track_id: track_id.to_string(),
        })
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(stopped("t1")).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        assert_eq!(bus.emit(stopped("t1")).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), stopped("t1"));
        assert_eq!(sub2.recv().await.unwrap(), stopped("t1"));
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Auth(_)));

        bus.emit(stopped("t1")).unwrap();
        bus.emit(CoreEvent::Auth(AuthEvent::SignedOut)).unwrap();

        let event = stream.recv().await.unwrap();
        assert_eq!(event, CoreEvent::Auth(AuthEvent::SignedOut));
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(stopped(&format!("t{i}"))).unwrap();
        }

        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
        // The subscriber keeps receiving after lagging.
        assert!(sub.recv().await.is_ok());
    }

    #[test]
    fn test_event_severity() {
        let fatal = CoreEvent::Auth(AuthEvent::AuthError {
            message: "refresh rejected".to_string(),
            recoverable: false,
        });
        let transient = CoreEvent::Auth(AuthEvent::AuthError {
            message: "timeout".to_string(),
            recoverable: true,
        });
        let partial_import = CoreEvent::Library(LibraryEvent::ImportCompleted {
            origin: ImportOrigin::FileProvider,
            added: 3,
            skipped: 0,
            failed: 1,
        });

        assert_eq!(fatal.severity(), EventSeverity::Error);
        assert_eq!(transient.severity(), EventSeverity::Warning);
        assert_eq!(partial_import.severity(), EventSeverity::Warning);
        assert_eq!(stopped("t1").severity(), EventSeverity::Debug);
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Playback(PlaybackEvent::ModeChanged {
            shuffle_enabled: true,
            repeat_mode: "all".to_string(),
        });

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Playback");
        assert_eq!(json["payload"]["event"], "ModeChanged");

        let parsed: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, event);
    }
}
