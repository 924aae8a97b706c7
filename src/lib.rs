//! Workspace umbrella crate.
//!
//! Re-exports the service façade and the playback types hosts interact with
//! most, so a host can depend on `tandem-workspace` alone.

#[cfg(feature = "desktop-shims")]
pub use core_service::{CoreDependencies, CoreError, CoreService, ServiceConfig};

#[cfg(feature = "desktop-shims")]
pub use core_playback::{PlaybackPhase, PlayerSnapshot, RepeatMode};
