//! # Playback Orchestration
//!
//! Queue, playback backends and the coordinator that ties them together.
//!
//! ## Overview
//!
//! This crate handles:
//! - The playback [`Queue`] with shuffle and repeat modes
//! - [`LocalBackend`]: synced files played through the host audio engine once
//!   the file provider has them fully downloaded
//! - [`RemoteBackend`]: streaming-service tracks, dispatched through the web
//!   API first and the SDK session as a fallback
//! - [`PlaybackCoordinator`]: one command surface and one observable state
//!   for both sources
//!
//! Audio decoding is not done here; both backends drive players owned by the
//! host or the streaming service.

pub mod coordinator;
pub mod error;
pub mod local;
pub mod queue;
pub mod remote;
pub mod state;
pub mod traits;

pub use coordinator::PlaybackCoordinator;
pub use error::{PlaybackError, Result, UserMessage};
pub use local::LocalBackend;
pub use queue::{Queue, RepeatMode};
pub use remote::{DispatchRoute, RemoteBackend};
pub use state::{PlaybackFailure, PlaybackPhase, PlayerSnapshot};
pub use traits::{
    BackendEvent, DispatchContext, Generation, PlaybackBackend, TaggedEvent, NEAR_END_THRESHOLD,
};
