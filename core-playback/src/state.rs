//! Observable player state published by the coordinator.

use crate::error::{PlaybackError, UserMessage};
use crate::queue::RepeatMode;
use core_library::{Track, TrackId};

/// Phase of the coordinator's completion state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackPhase {
    /// No current track.
    #[default]
    Idle,
    LoadedPaused,
    LoadedPlaying,
    /// The last item completed with repeat off. The track stays current.
    StoppedAtEnd,
}

impl PlaybackPhase {
    pub(crate) fn derive(has_track: bool, is_playing: bool, at_end: bool) -> Self {
        match (has_track, is_playing, at_end) {
            (false, _, _) => PlaybackPhase::Idle,
            (true, true, _) => PlaybackPhase::LoadedPlaying,
            (true, false, true) => PlaybackPhase::StoppedAtEnd,
            (true, false, false) => PlaybackPhase::LoadedPaused,
        }
    }
}

/// Snapshot of everything the UI renders.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlayerSnapshot {
    pub current_track: Option<Track>,
    pub is_playing: bool,
    /// Seconds into the current track.
    pub current_time: f64,
    /// Seconds; the track's estimate until a backend reports the real value.
    pub duration: f64,
    pub queue: Vec<Track>,
    pub cursor: Option<usize>,
    pub shuffle_enabled: bool,
    pub repeat_mode: RepeatMode,
    pub phase: PlaybackPhase,
}

/// A dispatch failure reported on the coordinator's error channel.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackFailure {
    pub track_id: Option<TrackId>,
    pub error: PlaybackError,
    pub user_message: UserMessage,
}

impl PlaybackFailure {
    pub fn new(track_id: Option<TrackId>, error: PlaybackError) -> Self {
        let user_message = error.user_message();
        Self {
            track_id,
            error,
            user_message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_derivation() {
        assert_eq!(PlaybackPhase::derive(false, true, true), PlaybackPhase::Idle);
        assert_eq!(
            PlaybackPhase::derive(true, true, false),
            PlaybackPhase::LoadedPlaying
        );
        assert_eq!(
            PlaybackPhase::derive(true, false, false),
            PlaybackPhase::LoadedPaused
        );
        assert_eq!(
            PlaybackPhase::derive(true, false, true),
            PlaybackPhase::StoppedAtEnd
        );
    }
}
