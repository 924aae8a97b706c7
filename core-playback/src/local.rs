//! # Local Playback Backend
//!
//! Plays files from the cloud file store through the host's native audio
//! engine.
//!
//! ## Overview
//!
//! Before a player is constructed the file must be fully materialized:
//!
//! 1. If the [`FileReadinessProvider`] reports the file unavailable, request a
//!    download and wait for it (a `NotReady` answer is retried once)
//! 2. Check the dispatch is still current, otherwise return `Superseded`
//! 3. Open a player on the local path and start it
//! 4. Poll position and duration every `poll_interval` and report them as
//!    [`BackendEvent::TimeUpdate`], then [`BackendEvent::Finished`]
//!
//! `stop()` closes the player and aborts the polling task, so no decoder
//! outlives a track switch.

use crate::error::{PlaybackError, Result};
use crate::traits::{BackendEvent, DispatchContext, PlaybackBackend};
use async_trait::async_trait;
use bridge_traits::playback::{AudioPlayer, LocalAudioEngine};
use bridge_traits::storage::{FileHandle, FileReadinessProvider};
use core_async::sync::Mutex;
use core_async::task::{spawn, JoinHandle};
use core_async::time::{steady_interval, Duration};
use core_library::{Track, TrackSource};
use core_runtime::config::{CoreConfig, DEFAULT_POLL_INTERVAL};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Backend for [`TrackSource::Local`] tracks.
pub struct LocalBackend {
    files: Arc<dyn FileReadinessProvider>,
    engine: Arc<dyn LocalAudioEngine>,
    poll_interval: Duration,
    active: Mutex<Option<ActivePlayer>>,
}

struct ActivePlayer {
    handle: FileHandle,
    player: Arc<dyn AudioPlayer>,
    feed: JoinHandle<()>,
}

impl ActivePlayer {
    async fn shutdown(self) -> Result<()> {
        self.feed.abort();
        debug!(file = %self.handle, "Closing player");
        self.player.close().await.map_err(PlaybackError::from)
    }
}

impl LocalBackend {
    pub fn new(files: Arc<dyn FileReadinessProvider>, engine: Arc<dyn LocalAudioEngine>) -> Self {
        Self {
            files,
            engine,
            poll_interval: DEFAULT_POLL_INTERVAL,
            active: Mutex::new(None),
        }
    }

    pub fn with_config(mut self, config: &CoreConfig) -> Self {
        self.poll_interval = config.poll_interval;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Whether a player is currently loaded.
    pub async fn is_loaded(&self) -> bool {
        self.active.lock().await.is_some()
    }

    /// Wait until `handle` is fully local. A `NotReady` answer from the
    /// provider gets one more attempt before it is surfaced.
    async fn ensure_ready(&self, handle: &FileHandle, context: &DispatchContext) -> Result<()> {
        if self.files.is_available(handle) {
            return Ok(());
        }

        let mut attempt = 0;
        loop {
            attempt += 1;
            debug!(file = %handle, attempt, "Waiting for file download");

            let outcome = match self.files.ensure_available(handle).await {
                Ok(()) if self.files.is_available(handle) => Ok(()),
                Ok(()) => Err(PlaybackError::NotReady(format!(
                    "{} is only {:.0}% downloaded",
                    handle,
                    self.files.progress(handle) * 100.0
                ))),
                Err(err) => Err(PlaybackError::from(err)),
            };

            match outcome {
                Ok(()) => return context.ensure_current(),
                Err(err) if err.is_retryable() && attempt == 1 => {
                    context.ensure_current()?;
                    warn!(file = %handle, error = %err, "File not ready, retrying");
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[async_trait]
impl PlaybackBackend for LocalBackend {
    fn source(&self) -> TrackSource {
        TrackSource::Local
    }

    #[instrument(skip(self, track, context), fields(track_id = %track.id, generation = context.generation()))]
    async fn start(&self, track: &Track, context: DispatchContext) -> Result<()> {
        let handle = track
            .local_handle()
            .ok_or_else(|| PlaybackError::NoBackend(format!("{} is not a local track", track.id)))?
            .clone();

        context.ensure_current()?;
        self.ensure_ready(&handle, &context).await?;

        let path = self.files.local_path(&handle);
        let player = self.engine.open(&path).await?;

        let mut active = self.active.lock().await;
        if !context.is_current() {
            debug!("Dispatch superseded while opening player");
            let _ = player.close().await;
            return Err(PlaybackError::Superseded);
        }
        if let Some(previous) = active.take() {
            if let Err(err) = previous.shutdown().await {
                warn!(error = %err, "Failed to close previous player");
            }
        }

        if let Err(err) = player.play().await {
            let _ = player.close().await;
            return Err(err.into());
        }

        let feed = spawn(time_feed(player.clone(), context, self.poll_interval));
        *active = Some(ActivePlayer {
            handle: handle.clone(),
            player,
            feed,
        });

        info!(file = %handle, "Local playback started");
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        match &*self.active.lock().await {
            Some(active) => active.player.pause().await.map_err(Into::into),
            None => {
                debug!("Pause ignored, no player loaded");
                Ok(())
            }
        }
    }

    async fn resume(&self) -> Result<()> {
        match &*self.active.lock().await {
            Some(active) => active.player.play().await.map_err(Into::into),
            None => Err(PlaybackError::NotReady("no player loaded".to_string())),
        }
    }

    async fn stop(&self) -> Result<()> {
        let active = self.active.lock().await.take();
        match active {
            Some(active) => active.shutdown().await,
            None => Ok(()),
        }
    }

    async fn seek(&self, position_secs: f64) -> Result<()> {
        match &*self.active.lock().await {
            Some(active) => active
                .player
                .seek(Duration::from_secs_f64(position_secs.max(0.0)))
                .await
                .map_err(Into::into),
            None => Err(PlaybackError::NotReady("no player loaded".to_string())),
        }
    }
}

async fn time_feed(player: Arc<dyn AudioPlayer>, context: DispatchContext, interval: Duration) {
    let mut ticker = steady_interval(interval);
    loop {
        ticker.tick().await;

        let position = player.position().as_secs_f64();
        let duration = player
            .duration()
            .map(|d| d.as_secs_f64())
            .unwrap_or_default();
        if !context.emit(BackendEvent::TimeUpdate { position, duration }) {
            break;
        }

        if player.is_finished() {
            context.emit(BackendEvent::Finished);
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{Generation, TaggedEvent};
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use chrono::Utc;
    use core_async::sync::mpsc;
    use core_library::{LocalResourceHandle, ResourceHandle};
    use std::collections::{HashSet, VecDeque};
    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    // ========================================================================
    // Fakes
    // ========================================================================

    #[derive(Default)]
    struct FakeFiles {
        available: std::sync::Mutex<HashSet<String>>,
        ensure_results: std::sync::Mutex<VecDeque<BridgeResult<()>>>,
        ensure_calls: AtomicUsize,
        on_ensure: std::sync::Mutex<Option<Generation>>,
    }

    impl FakeFiles {
        fn with_available(path: &str) -> Self {
            let files = Self::default();
            files.available.lock().unwrap().insert(path.to_string());
            files
        }

        fn queue_ensure(&self, result: BridgeResult<()>) {
            self.ensure_results.lock().unwrap().push_back(result);
        }
    }

    #[async_trait]
    impl FileReadinessProvider for FakeFiles {
        async fn list_available_resources(&self) -> BridgeResult<Vec<FileHandle>> {
            Ok(Vec::new())
        }

        async fn ensure_available(&self, handle: &FileHandle) -> BridgeResult<()> {
            self.ensure_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(generation) = self.on_ensure.lock().unwrap().as_ref() {
                generation.advance();
            }
            let result = self
                .ensure_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(()));
            if result.is_ok() {
                self.available
                    .lock()
                    .unwrap()
                    .insert(handle.path().to_string());
            }
            result
        }

        fn is_available(&self, handle: &FileHandle) -> bool {
            self.available.lock().unwrap().contains(handle.path())
        }

        fn progress(&self, handle: &FileHandle) -> f32 {
            if self.is_available(handle) {
                1.0
            } else {
                0.0
            }
        }

        fn local_path(&self, handle: &FileHandle) -> PathBuf {
            PathBuf::from(handle.path())
        }
    }

    #[derive(Default)]
    struct FakePlayer {
        position: std::sync::Mutex<Duration>,
        finished: AtomicBool,
        closed: AtomicBool,
        plays: AtomicUsize,
        pauses: AtomicUsize,
        seeks: std::sync::Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl AudioPlayer for FakePlayer {
        async fn play(&self) -> BridgeResult<()> {
            self.plays.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn pause(&self) -> BridgeResult<()> {
            self.pauses.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn seek(&self, position: Duration) -> BridgeResult<()> {
            self.seeks.lock().unwrap().push(position);
            *self.position.lock().unwrap() = position;
            Ok(())
        }

        fn position(&self) -> Duration {
            *self.position.lock().unwrap()
        }

        fn duration(&self) -> Option<Duration> {
            Some(Duration::from_secs(120))
        }

        fn is_finished(&self) -> bool {
            self.finished.load(Ordering::SeqCst)
        }

        async fn close(&self) -> BridgeResult<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeEngine {
        player: Arc<FakePlayer>,
        opened: std::sync::Mutex<Vec<PathBuf>>,
        missing: AtomicBool,
    }

    #[async_trait]
    impl LocalAudioEngine for FakeEngine {
        async fn open(&self, path: &Path) -> BridgeResult<Arc<dyn AudioPlayer>> {
            if self.missing.load(Ordering::SeqCst) {
                return Err(BridgeError::NotFound(path.display().to_string()));
            }
            self.opened.lock().unwrap().push(path.to_path_buf());
            Ok(self.player.clone())
        }
    }

    fn local_track(path: &str) -> Track {
        Track::new(
            Some("Song".to_string()),
            None,
            120.0,
            ResourceHandle::Local(LocalResourceHandle::new(path)),
            Utc::now(),
        )
    }

    fn context(generation: &Generation) -> (DispatchContext, mpsc::UnboundedReceiver<TaggedEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            DispatchContext::new(generation.advance(), generation.clone(), tx),
            rx,
        )
    }

    // ========================================================================
    // Tests
    // ========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_start_available_file_reports_time_then_finished() {
        let files = Arc::new(FakeFiles::with_available("/music/a.mp3"));
        let engine = Arc::new(FakeEngine::default());
        let backend = LocalBackend::new(files.clone(), engine.clone());
        let generation = Generation::new();
        let (ctx, mut rx) = context(&generation);

        backend.start(&local_track("/music/a.mp3"), ctx).await.unwrap();

        assert_eq!(files.ensure_calls.load(Ordering::SeqCst), 0);
        assert_eq!(engine.player.plays.load(Ordering::SeqCst), 1);
        assert!(backend.is_loaded().await);

        let first = rx.recv().await.unwrap();
        assert_eq!(
            first.event,
            BackendEvent::TimeUpdate {
                position: 0.0,
                duration: 120.0
            }
        );

        engine.player.finished.store(true, Ordering::SeqCst);
        loop {
            let tagged = rx.recv().await.unwrap();
            assert_eq!(tagged.generation, 1);
            if tagged.event == BackendEvent::Finished {
                break;
            }
        }
    }

    #[tokio::test]
    async fn test_unavailable_file_is_downloaded_first() {
        let files = Arc::new(FakeFiles::default());
        let engine = Arc::new(FakeEngine::default());
        let backend = LocalBackend::new(files.clone(), engine.clone());
        let generation = Generation::new();
        let (ctx, _rx) = context(&generation);

        backend.start(&local_track("/music/b.mp3"), ctx).await.unwrap();

        assert_eq!(files.ensure_calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            engine.opened.lock().unwrap().as_slice(),
            &[PathBuf::from("/music/b.mp3")]
        );
    }

    #[tokio::test]
    async fn test_not_ready_retried_once() {
        let files = Arc::new(FakeFiles::default());
        files.queue_ensure(Err(BridgeError::NotReady("40%".into())));
        let engine = Arc::new(FakeEngine::default());
        let backend = LocalBackend::new(files.clone(), engine.clone());
        let generation = Generation::new();
        let (ctx, _rx) = context(&generation);

        backend.start(&local_track("/music/c.mp3"), ctx).await.unwrap();
        assert_eq!(files.ensure_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_not_ready_twice_surfaces() {
        let files = Arc::new(FakeFiles::default());
        files.queue_ensure(Err(BridgeError::NotReady("40%".into())));
        files.queue_ensure(Err(BridgeError::NotReady("60%".into())));
        let engine = Arc::new(FakeEngine::default());
        let backend = LocalBackend::new(files.clone(), engine.clone());
        let generation = Generation::new();
        let (ctx, _rx) = context(&generation);

        let err = backend
            .start(&local_track("/music/c.mp3"), ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, PlaybackError::NotReady(_)));
        assert_eq!(files.ensure_calls.load(Ordering::SeqCst), 2);
        assert!(engine.opened.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_file_is_terminal() {
        let files = Arc::new(FakeFiles::default());
        files.queue_ensure(Err(BridgeError::NotFound("/music/gone.mp3".into())));
        let engine = Arc::new(FakeEngine::default());
        let backend = LocalBackend::new(files.clone(), engine.clone());
        let generation = Generation::new();
        let (ctx, _rx) = context(&generation);

        let err = backend
            .start(&local_track("/music/gone.mp3"), ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, PlaybackError::ResourceMissing(_)));
        assert_eq!(files.ensure_calls.load(Ordering::SeqCst), 1);
        assert!(engine.opened.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_engine_not_found_maps_to_missing() {
        let files = Arc::new(FakeFiles::with_available("/music/a.mp3"));
        let engine = Arc::new(FakeEngine::default());
        engine.missing.store(true, Ordering::SeqCst);
        let backend = LocalBackend::new(files, engine);
        let generation = Generation::new();
        let (ctx, _rx) = context(&generation);

        let err = backend
            .start(&local_track("/music/a.mp3"), ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, PlaybackError::ResourceMissing(_)));
    }

    #[tokio::test]
    async fn test_superseded_during_download() {
        let files = Arc::new(FakeFiles::default());
        let generation = Generation::new();
        *files.on_ensure.lock().unwrap() = Some(generation.clone());
        let engine = Arc::new(FakeEngine::default());
        let backend = LocalBackend::new(files, engine.clone());
        let (ctx, _rx) = context(&generation);

        let err = backend
            .start(&local_track("/music/slow.mp3"), ctx)
            .await
            .unwrap_err();
        assert!(err.is_silent());
        assert!(engine.opened.lock().unwrap().is_empty());
        assert!(!backend.is_loaded().await);
    }

    #[tokio::test]
    async fn test_stop_closes_player() {
        let files = Arc::new(FakeFiles::with_available("/music/a.mp3"));
        let engine = Arc::new(FakeEngine::default());
        let backend = LocalBackend::new(files, engine.clone());
        let generation = Generation::new();
        let (ctx, _rx) = context(&generation);

        backend.start(&local_track("/music/a.mp3"), ctx).await.unwrap();
        backend.stop().await.unwrap();

        assert!(engine.player.closed.load(Ordering::SeqCst));
        assert!(!backend.is_loaded().await);
        assert!(backend.stop().await.is_ok());
    }

    #[tokio::test]
    async fn test_transport_commands() {
        let files = Arc::new(FakeFiles::with_available("/music/a.mp3"));
        let engine = Arc::new(FakeEngine::default());
        let backend = LocalBackend::new(files, engine.clone());

        assert!(backend.pause().await.is_ok());
        assert!(matches!(
            backend.resume().await,
            Err(PlaybackError::NotReady(_))
        ));

        let generation = Generation::new();
        let (ctx, _rx) = context(&generation);
        backend.start(&local_track("/music/a.mp3"), ctx).await.unwrap();

        backend.pause().await.unwrap();
        backend.resume().await.unwrap();
        backend.seek(42.5).await.unwrap();

        assert_eq!(engine.player.pauses.load(Ordering::SeqCst), 1);
        assert_eq!(engine.player.plays.load(Ordering::SeqCst), 2);
        assert_eq!(
            engine.player.seeks.lock().unwrap().as_slice(),
            &[Duration::from_secs_f64(42.5)]
        );
    }

    #[tokio::test]
    async fn test_remote_track_rejected() {
        let backend = LocalBackend::new(
            Arc::new(FakeFiles::default()),
            Arc::new(FakeEngine::default()),
        );
        let track = Track::new(
            None,
            None,
            90.0,
            ResourceHandle::Remote(core_library::RemoteResourceId::new("svc:track:1")),
            Utc::now(),
        );
        let generation = Generation::new();
        let (ctx, _rx) = context(&generation);

        assert!(matches!(
            backend.start(&track, ctx).await,
            Err(PlaybackError::NoBackend(_))
        ));
    }
}
