//! Native audio engine abstraction.
//!
//! The host supplies a [`LocalAudioEngine`] that turns a fully-downloaded
//! local file into an [`AudioPlayer`]. A player is a single native player
//! object: it is created per track and must be closed when the track is
//! switched so decoder resources do not leak.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;

/// Creates native player objects for local files.
#[async_trait]
pub trait LocalAudioEngine: Send + Sync {
    /// Opens `path` and returns a paused player positioned at zero.
    ///
    /// # Errors
    ///
    /// - `BridgeError::NotFound` if the file is missing
    /// - `BridgeError::OperationFailed` if the file cannot be decoded
    async fn open(&self, path: &Path) -> Result<Arc<dyn AudioPlayer>>;
}

/// A single native player object.
#[async_trait]
pub trait AudioPlayer: Send + Sync {
    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn seek(&self, position: Duration) -> Result<()>;

    /// Current playback position.
    fn position(&self) -> Duration;

    /// Total duration, when the decoder knows it.
    fn duration(&self) -> Option<Duration>;

    /// Whether the player reached the natural end of the stream.
    fn is_finished(&self) -> bool;

    /// Tears the player down and releases decoder resources.
    async fn close(&self) -> Result<()>;
}
