//! # Playback Coordinator
//!
//! Single control surface over the queue and both playback backends.
//!
//! ## Overview
//!
//! Every command resolves what should happen to the [`Queue`] under the state
//! lock, releases the lock, and then makes at most one call into a backend.
//! The backend is chosen in exactly one place, `backend_for`, from
//! the current track's source.
//!
//! ```text
//!            ┌──────────── commands ────────────┐
//!            v                                  │
//!   ┌──────────────────┐   start/pause/seek  ┌──┴───────────┐
//!   │ Queue + state    │ ──────────────────> │ LocalBackend │──┐
//!   │ (Mutex)          │ ──────────────────> │ RemoteBackend│──┤ TaggedEvent
//!   └────────┬─────────┘                     └──────────────┘  │
//!            │ watch<PlayerSnapshot>             event pump <───┘
//!            v
//!           UI
//! ```
//!
//! ## Staleness
//!
//! The dispatch generation is advanced before every fresh start (and on stop
//! or unload). Backend events with an older generation are dropped by the
//! event pump, and a backend that finishes a slow start for an old
//! generation returns `Superseded`, which is never shown to the user. The
//! pump never awaits a backend itself, so events for the live track keep
//! flowing while a superseded start is still winding down.
//!
//! ## Completion
//!
//! A `Finished` event, or a time update with less than
//! [`NEAR_END_THRESHOLD`] seconds remaining, completes the track once per
//! generation:
//!
//! - repeat one: fresh start of the same track on the same backend
//! - next item available: advance and start it
//! - repeat all: jump to the first item and start it
//! - otherwise: stop at the end, keeping the last track current

use crate::error::PlaybackError;
use crate::queue::{Queue, RepeatMode};
use crate::state::{PlaybackFailure, PlaybackPhase, PlayerSnapshot};
use crate::traits::{
    BackendEvent, DispatchContext, Generation, PlaybackBackend, TaggedEvent, NEAR_END_THRESHOLD,
};
use core_async::sync::{broadcast, mpsc, watch, Mutex};
use core_async::task::{spawn, AbortHandle};
use core_library::{Track, TrackId, TrackSource};
use core_runtime::config::{CoreConfig, DEFAULT_PREVIOUS_RESTART_THRESHOLD_SECS};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent};
use std::sync::{Arc, Weak};
use tracing::{debug, info, instrument, warn};

const ERROR_CHANNEL_CAPACITY: usize = 32;

/// Orchestrates the queue, both backends and the observable player state.
///
/// Commands never return errors: dispatch failures are published on
/// [`subscribe_errors`](Self::subscribe_errors) and the event bus.
///
/// Must be created inside a Tokio runtime; it spawns its event pump.
pub struct PlaybackCoordinator {
    inner: Arc<Inner>,
    previous_restart_threshold: f64,
    pump: AbortHandle,
}

struct Inner {
    local: Arc<dyn PlaybackBackend>,
    remote: Arc<dyn PlaybackBackend>,
    state: Mutex<CoordinatorState>,
    generation: Generation,
    events: mpsc::UnboundedSender<TaggedEvent>,
    snapshot: watch::Sender<PlayerSnapshot>,
    errors: broadcast::Sender<PlaybackFailure>,
    event_bus: EventBus,
}

#[derive(Default)]
struct CoordinatorState {
    queue: Queue,
    is_playing: bool,
    current_time: f64,
    duration: f64,
    /// Track handed to a backend by the last fresh start.
    loaded: Option<Loaded>,
    at_end: bool,
    completed_generation: Option<u64>,
}

impl CoordinatorState {
    /// The loaded track, if it is still the queue's current item.
    fn loaded_current(&self) -> Option<Loaded> {
        let current = self.queue.current()?;
        self.loaded.filter(|loaded| loaded.track_id == current.id)
    }
}

#[derive(Debug, Clone, Copy)]
struct Loaded {
    track_id: TrackId,
    source: TrackSource,
}

struct FreshStart {
    track: Track,
    context: DispatchContext,
    previous: Option<TrackSource>,
    track_changed: bool,
}

/// Backend work decided under the state lock and carried out after it is
/// released.
enum Plan {
    Nothing,
    Start(FreshStart),
    Resume {
        loaded: Loaded,
    },
    Pause {
        loaded: Loaded,
        position: f64,
    },
    Seek {
        loaded: Loaded,
        position: f64,
    },
    Unload {
        source: Option<TrackSource>,
    },
}

impl PlaybackCoordinator {
    pub fn new(
        local: Arc<dyn PlaybackBackend>,
        remote: Arc<dyn PlaybackBackend>,
        event_bus: EventBus,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (snapshot, _) = watch::channel(PlayerSnapshot::default());
        let (errors, _) = broadcast::channel(ERROR_CHANNEL_CAPACITY);

        let inner = Arc::new(Inner {
            local,
            remote,
            state: Mutex::new(CoordinatorState::default()),
            generation: Generation::new(),
            events: events_tx,
            snapshot,
            errors,
            event_bus,
        });

        let pump = spawn(run_event_pump(Arc::downgrade(&inner), events_rx)).abort_handle();

        Self {
            inner,
            previous_restart_threshold: DEFAULT_PREVIOUS_RESTART_THRESHOLD_SECS,
            pump,
        }
    }

    pub fn with_config(mut self, config: &CoreConfig) -> Self {
        self.previous_restart_threshold = config.previous_restart_threshold_secs;
        self
    }

    // ========================================================================
    // Observation
    // ========================================================================

    pub fn subscribe(&self) -> watch::Receiver<PlayerSnapshot> {
        self.inner.snapshot.subscribe()
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    pub fn subscribe_errors(&self) -> broadcast::Receiver<PlaybackFailure> {
        self.inner.errors.subscribe()
    }

    // ========================================================================
    // Transport
    // ========================================================================

    /// Replace the queue and start `tracks[start_index]`, whatever was
    /// playing before.
    #[instrument(skip(self, tracks), fields(count = tracks.len()))]
    pub async fn play_tracks(&self, tracks: Vec<Track>, start_index: usize) {
        let plan = {
            let mut state = self.inner.state.lock().await;
            state.queue.set_queue(tracks, start_index);
            match self.inner.prepare_start(&mut state) {
                Some(start) => Plan::Start(start),
                None => self.inner.prepare_unload(&mut state),
            }
        };
        self.inner.execute(plan).await;
    }

    /// Start the current track, or resume it if it is the one already
    /// loaded and paused.
    pub async fn play(&self) {
        let plan = {
            let mut state = self.inner.state.lock().await;
            if state.queue.current().is_none() {
                debug!("Play ignored, queue has no current track");
                return;
            }

            match state.loaded_current() {
                Some(_) if state.is_playing => Plan::Nothing,
                Some(loaded) if !state.at_end => {
                    state.is_playing = true;
                    self.inner.publish(&state);
                    Plan::Resume { loaded }
                }
                _ => self.inner.start_plan(&mut state),
            }
        };
        self.inner.execute(plan).await;
    }

    /// Pause the current track. The state flips immediately; a backend
    /// failure is reported on the error channel without flipping it back.
    pub async fn pause(&self) {
        let plan = {
            let mut state = self.inner.state.lock().await;
            if state.queue.current().is_none() {
                return;
            }
            state.is_playing = false;
            self.inner.publish(&state);
            match state.loaded_current() {
                Some(loaded) => Plan::Pause {
                    loaded,
                    position: state.current_time,
                },
                None => Plan::Nothing,
            }
        };
        self.inner.execute(plan).await;
    }

    pub async fn play_pause(&self) {
        let is_playing = self.inner.state.lock().await.is_playing;
        if is_playing {
            self.pause().await;
        } else {
            self.play().await;
        }
    }

    /// Advance the queue. At the end, repeat all wraps to the first item;
    /// otherwise playback stops with the last track kept current.
    pub async fn next(&self) {
        let plan = {
            let mut state = self.inner.state.lock().await;
            if state.queue.current().is_none() {
                return;
            }
            if state.queue.next().is_some() {
                self.inner.start_plan(&mut state)
            } else if state.queue.repeat_mode() == RepeatMode::All {
                state.queue.jump_to(0);
                self.inner.start_plan(&mut state)
            } else {
                self.inner.prepare_end_of_queue(&mut state)
            }
        };
        self.inner.execute(plan).await;
    }

    /// Restart the current track when more than the restart threshold has
    /// played, otherwise go to the previous item. At the head of the queue
    /// the current track restarts.
    pub async fn previous(&self) {
        let plan = {
            let mut state = self.inner.state.lock().await;
            if state.queue.current().is_none() {
                return;
            }

            if state.current_time > self.previous_restart_threshold {
                self.inner.restart_plan(&mut state)
            } else if state.queue.previous().is_some() {
                self.inner.start_plan(&mut state)
            } else {
                self.inner.restart_plan(&mut state)
            }
        };
        self.inner.execute(plan).await;
    }

    /// Seek within the current track, clamped to `[0, duration]`.
    pub async fn seek(&self, position_secs: f64) {
        if !position_secs.is_finite() {
            return;
        }
        let plan = {
            let mut state = self.inner.state.lock().await;
            if state.queue.current().is_none() {
                return;
            }
            let upper = if state.duration > 0.0 {
                state.duration
            } else {
                f64::MAX
            };
            let position = position_secs.clamp(0.0, upper);
            state.current_time = position;
            self.inner.publish(&state);
            match state.loaded_current() {
                Some(loaded) => Plan::Seek { loaded, position },
                None => Plan::Nothing,
            }
        };
        self.inner.execute(plan).await;
    }

    /// Stop and unload the active backend. The current track stays selected.
    pub async fn stop(&self) {
        let plan = {
            let mut state = self.inner.state.lock().await;
            let Some(track_id) = state.queue.current().map(|t| t.id) else {
                return;
            };
            let plan = self.inner.prepare_unload(&mut state);
            self.inner.emit(PlaybackEvent::Stopped {
                track_id: track_id.to_string(),
            });
            plan
        };
        self.inner.execute(plan).await;
    }

    // ========================================================================
    // Modes
    // ========================================================================

    /// Turning shuffle on reorders the queue around the current track.
    /// Turning it off keeps the shuffled order.
    pub async fn toggle_shuffle(&self) {
        let mut state = self.inner.state.lock().await;
        let enabled = !state.queue.shuffle_enabled();
        state.queue.set_shuffle_enabled(enabled);
        if enabled {
            state.queue.shuffle();
        }
        self.inner.publish(&state);
        self.inner.emit_mode(&state);
    }

    pub async fn cycle_repeat_mode(&self) {
        let mut state = self.inner.state.lock().await;
        let mode = state.queue.repeat_mode().cycled();
        state.queue.set_repeat_mode(mode);
        self.inner.publish(&state);
        self.inner.emit_mode(&state);
    }

    // ========================================================================
    // Queue editing
    // ========================================================================

    pub async fn add_to_queue(&self, tracks: Vec<Track>) {
        let mut state = self.inner.state.lock().await;
        state.queue.add_all_to_end(tracks);
        self.inner.publish(&state);
    }

    pub async fn insert_next(&self, track: Track) {
        let mut state = self.inner.state.lock().await;
        state.queue.insert_next(track);
        if !state.is_playing && state.loaded.is_none() {
            state.duration = state.queue.current().map_or(0.0, |t| t.duration_secs);
        }
        self.inner.publish(&state);
    }

    /// Remove a queue item. Removing the playing item stops it and selects
    /// the item now at the cursor without starting it.
    pub async fn remove_from_queue(&self, index: usize) {
        let plan = {
            let mut state = self.inner.state.lock().await;
            let was_current = state.queue.cursor() == Some(index);
            if state.queue.remove_at(index).is_none() {
                return;
            }
            if was_current {
                let plan = self.inner.prepare_unload(&mut state);
                state.duration = state.queue.current().map_or(0.0, |t| t.duration_secs);
                self.inner.publish(&state);
                plan
            } else {
                self.inner.publish(&state);
                Plan::Nothing
            }
        };
        self.inner.execute(plan).await;
    }

    pub async fn jump_to(&self, index: usize) {
        let plan = {
            let mut state = self.inner.state.lock().await;
            if state.queue.jump_to(index).is_none() {
                debug!(index, "Jump ignored, index out of range");
                return;
            }
            self.inner.start_plan(&mut state)
        };
        self.inner.execute(plan).await;
    }
}

impl Drop for PlaybackCoordinator {
    fn drop(&mut self) {
        self.pump.abort();
    }
}

// ============================================================================
// Shared internals
// ============================================================================

impl Inner {
    /// The only place a backend is selected.
    fn backend_for(&self, source: TrackSource) -> &Arc<dyn PlaybackBackend> {
        match source {
            TrackSource::Local => &self.local,
            TrackSource::Remote => &self.remote,
        }
    }

    fn publish(&self, state: &CoordinatorState) {
        let current_track = state.queue.current().cloned();
        let phase = PlaybackPhase::derive(current_track.is_some(), state.is_playing, state.at_end);
        self.snapshot.send_replace(PlayerSnapshot {
            current_track,
            is_playing: state.is_playing,
            current_time: state.current_time,
            duration: state.duration,
            queue: state.queue.items().to_vec(),
            cursor: state.queue.cursor(),
            shuffle_enabled: state.queue.shuffle_enabled(),
            repeat_mode: state.queue.repeat_mode(),
            phase,
        });
    }

    fn emit(&self, event: PlaybackEvent) {
        let _ = self.event_bus.emit(CoreEvent::Playback(event));
    }

    fn emit_mode(&self, state: &CoordinatorState) {
        self.emit(PlaybackEvent::ModeChanged {
            shuffle_enabled: state.queue.shuffle_enabled(),
            repeat_mode: state.queue.repeat_mode().to_string(),
        });
    }

    fn report(&self, track_id: Option<TrackId>, error: PlaybackError) {
        if error.is_silent() {
            debug!(error = %error, "Dropping stale dispatch result");
            return;
        }

        warn!(track_id = ?track_id, error = %error, "Playback failed");
        self.emit(PlaybackEvent::Error {
            track_id: track_id.map(|id| id.to_string()),
            message: error.to_string(),
            recoverable: !matches!(error, PlaybackError::AuthFailed(_)),
        });
        let _ = self.errors.send(PlaybackFailure::new(track_id, error));
    }

    // ========================================================================
    // Planning (state lock held)
    // ========================================================================

    fn prepare_start(&self, state: &mut CoordinatorState) -> Option<FreshStart> {
        let track = state.queue.current()?.clone();
        let generation = self.generation.advance();

        let previous = state.loaded.map(|loaded| loaded.source);
        let track_changed = state
            .loaded
            .map_or(true, |loaded| loaded.track_id != track.id);
        state.loaded = Some(Loaded {
            track_id: track.id,
            source: track.source(),
        });
        state.is_playing = true;
        state.current_time = 0.0;
        state.duration = track.duration_secs;
        state.at_end = false;
        self.publish(state);

        Some(FreshStart {
            track,
            context: DispatchContext::new(generation, self.generation.clone(), self.events.clone()),
            previous,
            track_changed,
        })
    }

    fn start_plan(&self, state: &mut CoordinatorState) -> Plan {
        self.prepare_start(state)
            .map_or(Plan::Nothing, Plan::Start)
    }

    /// Seek the loaded track back to zero, or start it if nothing is loaded.
    fn restart_plan(&self, state: &mut CoordinatorState) -> Plan {
        match state.loaded_current() {
            Some(loaded) if !state.at_end => {
                state.current_time = 0.0;
                self.publish(state);
                Plan::Seek {
                    loaded,
                    position: 0.0,
                }
            }
            _ => self.start_plan(state),
        }
    }

    /// Invalidate in-flight dispatches and release the loaded backend.
    fn prepare_unload(&self, state: &mut CoordinatorState) -> Plan {
        self.generation.advance();
        let source = state.loaded.take().map(|loaded| loaded.source);
        state.is_playing = false;
        state.current_time = 0.0;
        state.at_end = false;
        self.publish(state);
        Plan::Unload { source }
    }

    fn prepare_end_of_queue(&self, state: &mut CoordinatorState) -> Plan {
        self.generation.advance();
        let source = state.loaded.take().map(|loaded| loaded.source);
        state.is_playing = false;
        state.at_end = true;
        self.publish(state);
        info!("Reached end of queue");
        self.emit(PlaybackEvent::QueueEnded);
        Plan::Unload { source }
    }

    fn complete(&self, state: &mut CoordinatorState, generation: u64) -> Plan {
        if state.completed_generation == Some(generation) {
            return Plan::Nothing;
        }
        state.completed_generation = Some(generation);

        if let Some(track) = state.queue.current() {
            debug!(track_id = %track.id, "Track completed");
            self.emit(PlaybackEvent::Completed {
                track_id: track.id.to_string(),
            });
        }

        if state.queue.repeat_mode() == RepeatMode::One {
            return self.start_plan(state);
        }
        if state.queue.has_next() {
            state.queue.next();
            return self.start_plan(state);
        }
        if state.queue.repeat_mode() == RepeatMode::All {
            state.queue.jump_to(0);
            return self.start_plan(state);
        }
        self.prepare_end_of_queue(state)
    }

    // ========================================================================
    // Execution (state lock released)
    // ========================================================================

    async fn execute(&self, plan: Plan) {
        match plan {
            Plan::Nothing => {}
            Plan::Start(start) => self.execute_start(start).await,
            Plan::Resume { loaded } => self.execute_resume(loaded).await,
            Plan::Pause { loaded, position } => {
                match self.backend_for(loaded.source).pause().await {
                    Ok(()) => self.emit(PlaybackEvent::Paused {
                        track_id: loaded.track_id.to_string(),
                        position_secs: position,
                    }),
                    Err(err) => self.report(Some(loaded.track_id), err),
                }
            }
            Plan::Seek { loaded, position } => {
                debug!(position, source = %loaded.source, "Seeking");
                if let Err(err) = self.backend_for(loaded.source).seek(position).await {
                    self.report(Some(loaded.track_id), err);
                }
            }
            Plan::Unload { source } => {
                if let Some(source) = source {
                    if let Err(err) = self.backend_for(source).stop().await {
                        warn!(source = %source, error = %err, "Failed to stop backend");
                    }
                }
            }
        }
    }

    async fn execute_start(&self, start: FreshStart) {
        let FreshStart {
            track,
            context,
            previous,
            track_changed,
        } = start;
        let generation = context.generation();
        let source = track.source();

        if !context.is_current() {
            debug!(track_id = %track.id, generation, "Start superseded before dispatch");
            return;
        }

        if track_changed {
            self.emit(PlaybackEvent::TrackChanged {
                track_id: track.id.to_string(),
                title: track.title.clone(),
                source: source.to_string(),
            });
        }

        if let Some(previous) = previous {
            if let Err(err) = self.backend_for(previous).stop().await {
                warn!(source = %previous, error = %err, "Failed to stop previous backend");
            }
        }

        info!(track_id = %track.id, source = %source, generation, "Starting track");
        let backend = self.backend_for(source);
        match backend.start(&track, context).await {
            Ok(()) => {
                self.emit(PlaybackEvent::Started {
                    track_id: track.id.to_string(),
                });

                let paused_meanwhile = {
                    let state = self.state.lock().await;
                    self.generation.current() == generation && !state.is_playing
                };
                if paused_meanwhile {
                    debug!(track_id = %track.id, "Paused while starting");
                    if let Err(err) = backend.pause().await {
                        self.report(Some(track.id), err);
                    }
                }
            }
            Err(err) => {
                {
                    let mut state = self.state.lock().await;
                    if self.generation.current() == generation {
                        state.is_playing = false;
                        state.loaded = None;
                        self.publish(&state);
                    }
                }
                self.report(Some(track.id), err);
            }
        }
    }

    async fn execute_resume(&self, loaded: Loaded) {
        let backend = self.backend_for(loaded.source);
        match backend.resume().await {
            Ok(()) => {
                let position = self.state.lock().await.current_time;
                self.emit(PlaybackEvent::Resumed {
                    track_id: loaded.track_id.to_string(),
                    position_secs: position,
                });
            }
            Err(err) => {
                let unload = {
                    let mut state = self.state.lock().await;
                    let still_loaded = state
                        .loaded
                        .is_some_and(|current| current.track_id == loaded.track_id);
                    if still_loaded {
                        state.is_playing = false;
                        state.loaded = None;
                        self.publish(&state);
                    }
                    still_loaded
                };
                if unload {
                    if let Err(stop_err) = backend.stop().await {
                        warn!(source = %loaded.source, error = %stop_err, "Failed to stop backend");
                    }
                }
                self.report(Some(loaded.track_id), err);
            }
        }
    }

    // ========================================================================
    // Backend events
    // ========================================================================

    /// Fold a backend event into the state and decide the follow-up work.
    async fn plan_backend_event(&self, tagged: TaggedEvent) -> Plan {
        let mut state = self.state.lock().await;
        if tagged.generation != self.generation.current() {
            debug!(generation = tagged.generation, "Dropping stale backend event");
            return Plan::Nothing;
        }

        match tagged.event {
            BackendEvent::TimeUpdate { position, duration } => {
                state.current_time = position;
                if duration > 0.0 {
                    state.duration = duration;
                }
                let near_end = duration > 0.0 && duration - position < NEAR_END_THRESHOLD;
                if near_end && state.is_playing {
                    self.complete(&mut state, tagged.generation)
                } else {
                    self.publish(&state);
                    Plan::Nothing
                }
            }
            BackendEvent::Finished => self.complete(&mut state, tagged.generation),
            BackendEvent::Failed(err) => {
                state.is_playing = false;
                self.publish(&state);
                let track_id = state.queue.current().map(|t| t.id);
                drop(state);
                self.report(track_id, err);
                Plan::Nothing
            }
        }
    }
}

/// Consumes backend events. Only planning happens here; the resulting backend
/// calls run on their own task so a slow start never holds up later events.
async fn run_event_pump(inner: Weak<Inner>, mut events: mpsc::UnboundedReceiver<TaggedEvent>) {
    while let Some(tagged) = events.recv().await {
        let Some(inner) = inner.upgrade() else {
            break;
        };
        let plan = inner.plan_backend_event(tagged).await;
        if matches!(plan, Plan::Nothing) {
            continue;
        }
        spawn(async move { inner.execute(plan).await });
    }
}
