//! # Playback Backend Contract
//!
//! The coordinator drives local files and the streaming service through the
//! same [`PlaybackBackend`] trait and never branches on the source anywhere
//! else.
//!
//! ## Generations
//!
//! Every fresh start gets a new dispatch generation. A backend receives a
//! [`DispatchContext`] carrying that generation and uses it to:
//!
//! - detect staleness after each suspension point (download wait, token
//!   refresh, session connect) and bail out with
//!   [`PlaybackError::Superseded`](crate::error::PlaybackError::Superseded)
//! - tag the [`BackendEvent`]s it reports, so the coordinator can discard
//!   events that belong to an older track

use crate::error::{PlaybackError, Result};
use async_trait::async_trait;
use core_async::sync::mpsc;
use core_library::{Track, TrackSource};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// A track whose remaining time drops below this many seconds is treated as
/// finished. Positions are rounded by both backends, so exact equality with
/// the duration is unreliable.
pub const NEAR_END_THRESHOLD: f64 = 0.5;

/// Time and completion reports from a backend.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    TimeUpdate { position: f64, duration: f64 },
    Finished,
    Failed(PlaybackError),
}

/// A [`BackendEvent`] with the generation of the dispatch that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedEvent {
    pub generation: u64,
    pub event: BackendEvent,
}

/// Shared generation counter. The coordinator bumps it before every fresh
/// start; backends only read it.
#[derive(Debug, Clone, Default)]
pub struct Generation(Arc<AtomicU64>);

impl Generation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    /// Advance and return the new generation.
    pub fn advance(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// Handed to a backend together with the track it should start.
#[derive(Debug, Clone)]
pub struct DispatchContext {
    generation: u64,
    current: Generation,
    events: mpsc::UnboundedSender<TaggedEvent>,
}

impl DispatchContext {
    pub fn new(
        generation: u64,
        current: Generation,
        events: mpsc::UnboundedSender<TaggedEvent>,
    ) -> Self {
        Self {
            generation,
            current,
            events,
        }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// `false` once a newer dispatch has started.
    pub fn is_current(&self) -> bool {
        self.current.current() == self.generation
    }

    pub fn ensure_current(&self) -> Result<()> {
        if self.is_current() {
            Ok(())
        } else {
            Err(PlaybackError::Superseded)
        }
    }

    /// Report an event. Returns `false` when the dispatch is stale or the
    /// coordinator is gone, which tells feed tasks to stop.
    pub fn emit(&self, event: BackendEvent) -> bool {
        if !self.is_current() {
            return false;
        }
        self.events
            .send(TaggedEvent {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

/// Transport contract shared by the local and remote backends.
///
/// `start` always begins the track from zero. Pause/resume are only used for
/// toggles on the track that is already loaded; a different track always
/// goes through `stop` on the previous backend followed by `start`.
#[async_trait]
pub trait PlaybackBackend: Send + Sync {
    /// Source of the tracks this backend owns.
    fn source(&self) -> TrackSource;

    async fn start(&self, track: &Track, context: DispatchContext) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn resume(&self) -> Result<()>;

    /// Tear the current item down completely and stop reporting events.
    async fn stop(&self) -> Result<()>;

    async fn seek(&self, position_secs: f64) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_staleness() {
        let generation = Generation::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let first = DispatchContext::new(generation.advance(), generation.clone(), tx.clone());
        assert!(first.is_current());
        assert!(first.emit(BackendEvent::Finished));

        let second = DispatchContext::new(generation.advance(), generation.clone(), tx);
        assert!(!first.is_current());
        assert_eq!(first.ensure_current(), Err(PlaybackError::Superseded));
        assert!(!first.emit(BackendEvent::Finished));
        assert!(second.emit(BackendEvent::Finished));

        assert_eq!(rx.try_recv().unwrap().generation, 1);
        assert_eq!(rx.try_recv().unwrap().generation, 2);
        assert!(rx.try_recv().is_err());
    }
}
