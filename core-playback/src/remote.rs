//! # Remote Playback Backend
//!
//! Plays streaming-service tracks on whatever device the service considers
//! active.
//!
//! ## Two-tier dispatch
//!
//! Establishing the SDK session is slow and may switch the user to the
//! service's own app, so every command first goes through the stateless web
//! API:
//!
//! ```text
//! valid_token ──> RemoteApiClient ──ok──────────────────────────────> done
//!                      │  AuthRequired ──> force_refresh ──> retry once
//!                      │  NoActiveDevice
//!                      v
//!                RemoteSession::connect ──> poll is_connected (250ms, up to 15s)
//!                      │                         │ timeout ──> DeviceUnavailable
//!                      v                         v
//!                 session command <──────── connected
//! ```
//!
//! The dispatch generation is checked after the token refresh and after the
//! connect wait. A stale start returns `Superseded`.
//!
//! ## Time reporting
//!
//! A connected, push-capable session forwards its [`RemoteStateUpdate`]s.
//! Otherwise a task polls [`RemoteApiClient::playback_status`] every
//! `poll_interval`. When the service reports a different track after ours
//! has been seen, the track is treated as finished.

use crate::error::{PlaybackError, Result};
use crate::traits::{BackendEvent, DispatchContext, PlaybackBackend};
use async_trait::async_trait;
use bridge_traits::remote::{
    ApiResult, RemoteApiClient, RemoteApiError, RemoteSession, RemoteStateUpdate, SessionError,
    SessionResult,
};
use core_async::sync::broadcast::{self, error::RecvError};
use core_async::sync::Mutex;
use core_async::task::{spawn, JoinHandle};
use core_async::time::{sleep, steady_interval, timeout, Duration};
use core_auth::AccessTokenProvider;
use core_library::{Track, TrackSource};
use core_runtime::config::{
    CoreConfig, DEFAULT_CONNECT_POLL_INTERVAL, DEFAULT_CONNECT_TIMEOUT, DEFAULT_POLL_INTERVAL,
};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Path a command took to reach the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchRoute {
    /// Web API against the already active device.
    Direct,
    /// SDK session, after the web API reported no active device.
    Session,
}

#[derive(Debug, Clone, Copy)]
enum RemoteCommand<'a> {
    Play { uri: &'a str },
    Pause,
    Resume,
    Seek { position_ms: u64 },
    SkipNext,
    SkipPrevious,
}

/// Backend for [`TrackSource::Remote`] tracks.
pub struct RemoteBackend {
    api: Arc<dyn RemoteApiClient>,
    session: Arc<dyn RemoteSession>,
    tokens: Arc<dyn AccessTokenProvider>,
    poll_interval: Duration,
    connect_timeout: Duration,
    connect_poll_interval: Duration,
    active: Mutex<Option<ActiveStream>>,
}

struct ActiveStream {
    uri: String,
    feed: JoinHandle<()>,
}

impl RemoteBackend {
    pub fn new(
        api: Arc<dyn RemoteApiClient>,
        session: Arc<dyn RemoteSession>,
        tokens: Arc<dyn AccessTokenProvider>,
    ) -> Self {
        Self {
            api,
            session,
            tokens,
            poll_interval: DEFAULT_POLL_INTERVAL,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            connect_poll_interval: DEFAULT_CONNECT_POLL_INTERVAL,
            active: Mutex::new(None),
        }
    }

    pub fn with_config(mut self, config: &CoreConfig) -> Self {
        self.poll_interval = config.poll_interval;
        self.connect_timeout = config.connect_timeout;
        self.connect_poll_interval = config.connect_poll_interval;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration, poll_interval: Duration) -> Self {
        self.connect_timeout = timeout;
        self.connect_poll_interval = poll_interval;
        self
    }

    /// URI of the track started last, until `stop()`.
    pub async fn active_uri(&self) -> Option<String> {
        self.active.lock().await.as_ref().map(|a| a.uri.clone())
    }

    pub async fn skip_next(&self) -> Result<()> {
        self.dispatch(RemoteCommand::SkipNext, None).await.map(drop)
    }

    pub async fn skip_previous(&self) -> Result<()> {
        self.dispatch(RemoteCommand::SkipPrevious, None).await.map(drop)
    }

    // ========================================================================
    // Dispatch
    // ========================================================================

    #[instrument(skip(self, context), fields(generation = context.map(|c| c.generation())))]
    async fn dispatch(
        &self,
        command: RemoteCommand<'_>,
        context: Option<&DispatchContext>,
    ) -> Result<DispatchRoute> {
        let mut token = self.tokens.valid_token().await?;
        ensure_current(context)?;

        let mut refreshed = false;
        loop {
            match self.direct(command, &token).await {
                Ok(()) => return Ok(DispatchRoute::Direct),
                Err(RemoteApiError::AuthRequired) if !refreshed => {
                    warn!("Access token rejected, refreshing");
                    refreshed = true;
                    token = self.tokens.force_refresh(&token).await?;
                    ensure_current(context)?;
                }
                Err(RemoteApiError::AuthRequired) => {
                    return Err(PlaybackError::AuthFailed(
                        "access token rejected after refresh".to_string(),
                    ))
                }
                Err(RemoteApiError::NoActiveDevice) => break,
                Err(err) => return Err(err.into()),
            }
        }

        info!("No active device, falling back to session");
        self.via_session(command, &token, context).await?;
        Ok(DispatchRoute::Session)
    }

    async fn direct(&self, command: RemoteCommand<'_>, token: &str) -> ApiResult<()> {
        match command {
            RemoteCommand::Play { uri } => self.api.play(token, uri, 0).await,
            RemoteCommand::Pause => self.api.pause(token).await,
            RemoteCommand::Resume => self.api.resume(token).await,
            RemoteCommand::Seek { position_ms } => self.api.seek(token, position_ms).await,
            RemoteCommand::SkipNext => self.api.skip_next(token).await,
            RemoteCommand::SkipPrevious => self.api.skip_previous(token).await,
        }
    }

    async fn on_session(&self, command: RemoteCommand<'_>) -> SessionResult<()> {
        match command {
            RemoteCommand::Play { uri } => self.session.play(uri).await,
            RemoteCommand::Pause => self.session.pause().await,
            RemoteCommand::Resume => self.session.resume().await,
            RemoteCommand::Seek { position_ms } => self.session.seek(position_ms).await,
            RemoteCommand::SkipNext => self.session.skip_next().await,
            RemoteCommand::SkipPrevious => self.session.skip_previous().await,
        }
    }

    async fn via_session(
        &self,
        command: RemoteCommand<'_>,
        token: &str,
        context: Option<&DispatchContext>,
    ) -> Result<()> {
        if !self.session.is_connected() {
            self.connect(token).await?;
            ensure_current(context)?;
        }

        match self.on_session(command).await {
            Err(SessionError::NotConnected) => {
                warn!("Session dropped, reconnecting once");
                self.connect(token).await?;
                ensure_current(context)?;
                self.on_session(command).await.map_err(Into::into)
            }
            other => other.map_err(Into::into),
        }
    }

    async fn connect(&self, token: &str) -> Result<()> {
        self.session.connect(token).await?;

        let poll = self.connect_poll_interval;
        let connected = timeout(self.connect_timeout, async {
            while !self.session.is_connected() {
                sleep(poll).await;
            }
        })
        .await;

        match connected {
            Ok(()) => {
                info!("Session connected");
                Ok(())
            }
            Err(_) => Err(PlaybackError::DeviceUnavailable(format!(
                "session did not connect within {}s",
                self.connect_timeout.as_secs()
            ))),
        }
    }

    // ========================================================================
    // Time feed
    // ========================================================================

    fn spawn_feed(&self, uri: String, context: DispatchContext) -> JoinHandle<()> {
        if self.session.is_connected() && self.session.is_push_capable() {
            debug!("Using pushed session state");
            spawn(push_feed(self.session.subscribe(), uri, context))
        } else {
            debug!(interval_ms = self.poll_interval.as_millis() as u64, "Polling playback status");
            spawn(poll_feed(
                self.api.clone(),
                self.tokens.clone(),
                uri,
                context,
                self.poll_interval,
            ))
        }
    }

    async fn stop_feed(&self) -> Option<String> {
        let active = self.active.lock().await.take()?;
        active.feed.abort();
        Some(active.uri)
    }
}

fn ensure_current(context: Option<&DispatchContext>) -> Result<()> {
    context.map_or(Ok(()), DispatchContext::ensure_current)
}

#[async_trait]
impl PlaybackBackend for RemoteBackend {
    fn source(&self) -> TrackSource {
        TrackSource::Remote
    }

    #[instrument(skip(self, track, context), fields(track_id = %track.id, generation = context.generation()))]
    async fn start(&self, track: &Track, context: DispatchContext) -> Result<()> {
        let uri = track
            .remote_id()
            .ok_or_else(|| PlaybackError::NoBackend(format!("{} is not a remote track", track.id)))?
            .as_str()
            .to_string();

        context.ensure_current()?;
        self.stop_feed().await;

        let route = self
            .dispatch(RemoteCommand::Play { uri: &uri }, Some(&context))
            .await?;

        let mut active = self.active.lock().await;
        context.ensure_current()?;
        if let Some(previous) = active.take() {
            previous.feed.abort();
        }
        let feed = self.spawn_feed(uri.clone(), context);
        *active = Some(ActiveStream {
            uri: uri.clone(),
            feed,
        });

        info!(uri = %uri, ?route, "Remote playback started");
        Ok(())
    }

    async fn pause(&self) -> Result<()> {
        self.dispatch(RemoteCommand::Pause, None).await.map(drop)
    }

    async fn resume(&self) -> Result<()> {
        self.dispatch(RemoteCommand::Resume, None).await.map(drop)
    }

    /// Stops reporting and pauses the device. Never waits for a session to
    /// connect: with no active device there is nothing to silence.
    async fn stop(&self) -> Result<()> {
        let Some(uri) = self.stop_feed().await else {
            return Ok(());
        };
        debug!(uri = %uri, "Stopping remote playback");

        let token = self.tokens.valid_token().await?;
        match self.api.pause(&token).await {
            Ok(()) => Ok(()),
            Err(RemoteApiError::NoActiveDevice) if self.session.is_connected() => {
                self.session.pause().await.map_err(Into::into)
            }
            Err(RemoteApiError::NoActiveDevice) => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn seek(&self, position_secs: f64) -> Result<()> {
        let position_ms = (position_secs.max(0.0) * 1000.0).round() as u64;
        self.dispatch(RemoteCommand::Seek { position_ms }, None)
            .await
            .map(drop)
    }
}

// ============================================================================
// Feed tasks
// ============================================================================

/// Tracks whether the service has started reporting our track yet, so a
/// status that still names the previous track is not read as completion.
struct FeedState {
    uri: String,
    seen: bool,
}

impl FeedState {
    fn new(uri: String) -> Self {
        Self { uri, seen: false }
    }

    /// Returns `false` when the feed should end.
    fn report(
        &mut self,
        context: &DispatchContext,
        reported_uri: Option<&str>,
        position_ms: u64,
        duration_ms: u64,
    ) -> bool {
        match reported_uri {
            Some(reported) if reported == self.uri => {
                self.seen = true;
                context.emit(BackendEvent::TimeUpdate {
                    position: position_ms as f64 / 1000.0,
                    duration: duration_ms as f64 / 1000.0,
                })
            }
            Some(_) | None if self.seen => {
                debug!(uri = %self.uri, "Service moved past the track");
                context.emit(BackendEvent::Finished);
                false
            }
            _ => context.is_current(),
        }
    }
}

async fn push_feed(
    mut updates: broadcast::Receiver<RemoteStateUpdate>,
    uri: String,
    context: DispatchContext,
) {
    let mut state = FeedState::new(uri);
    loop {
        match updates.recv().await {
            Ok(update) => {
                if !state.report(
                    &context,
                    update.track_uri.as_deref(),
                    update.position_ms,
                    update.duration_ms,
                ) {
                    break;
                }
            }
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "Session state updates lagged");
            }
            Err(RecvError::Closed) => break,
        }
    }
}

async fn poll_feed(
    api: Arc<dyn RemoteApiClient>,
    tokens: Arc<dyn AccessTokenProvider>,
    uri: String,
    context: DispatchContext,
    interval: Duration,
) {
    let mut state = FeedState::new(uri);
    let mut ticker = steady_interval(interval);
    loop {
        ticker.tick().await;
        if !context.is_current() {
            break;
        }

        let token = match tokens.valid_token().await {
            Ok(token) => token,
            Err(err) => {
                warn!(error = %err, "Stopping status polling");
                context.emit(BackendEvent::Failed(err.into()));
                break;
            }
        };

        match api.playback_status(&token).await {
            Ok(Some(status)) => {
                if !state.report(
                    &context,
                    status.track_uri.as_deref(),
                    status.progress_ms,
                    status.duration_ms,
                ) {
                    break;
                }
            }
            Ok(None) => debug!("No active device reported"),
            Err(err) => debug!(error = %err, "Status poll failed"),
        }
    }
}
