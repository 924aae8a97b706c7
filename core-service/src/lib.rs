//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP, secure
//! storage, the file readiness provider, the native audio engine and the
//! streaming SDK session) into the shared Rust core. Desktop builds enable the
//! `desktop-shims` feature (which depends on `bridge-desktop`) for the HTTP,
//! keychain and directory-backed file implementations.
//!
//! ```text
//! CoreDependencies ──> CoreService::bootstrap
//!                         ├─ SessionAuthenticator (OAuthTokenClient, TokenStore)
//!                         ├─ StreamingApiClient (unless the host injects one)
//!                         ├─ LibraryManager (+ RemoteCatalog)
//!                         └─ PlaybackCoordinator (LocalBackend, RemoteBackend)
//! ```

pub mod error;

pub use error::{CoreError, Result};

use std::sync::Arc;

use bridge_traits::{
    http::HttpClient,
    playback::LocalAudioEngine,
    remote::{RemoteApiClient, RemoteSession},
    storage::{FileReadinessProvider, SecureStore},
    time::{Clock, SystemClock},
};
use core_auth::{
    AccessTokenProvider, AuthState, OAuthConfig, OAuthTokenClient, SessionAuthenticator,
};
use core_library::{
    ImportSummary, InMemoryLibraryStore, LibraryManager, MetadataExtractor, PlaylistId,
    PlaylistRepository, RemoteCatalog, TrackRepository,
};
use core_metadata::LoftyMetadataExtractor;
use core_playback::{LocalBackend, PlaybackCoordinator, RemoteBackend};
use core_runtime::events::{CoreEvent, EventBus};
use core_runtime::logging::init_logging;
use core_runtime::CoreConfig;
use provider_streaming::StreamingApiClient;
use tracing::{debug, info, instrument, warn};

#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
use bridge_desktop::{DirectoryFileProvider, KeyringSecureStore, ReqwestHttpClient};

/// Aggregated handle to all bridge dependencies the core requires.
pub struct CoreDependencies {
    pub http_client: Arc<dyn HttpClient>,
    pub secure_store: Arc<dyn SecureStore>,
    pub files: Arc<dyn FileReadinessProvider>,
    pub audio_engine: Arc<dyn LocalAudioEngine>,
    pub remote_session: Arc<dyn RemoteSession>,
    /// Replaces the HTTP streaming client built from `http_client`.
    pub remote_api: Option<Arc<dyn RemoteApiClient>>,
    pub clock: Arc<dyn Clock>,
    pub tracks: Arc<dyn TrackRepository>,
    pub playlists: Arc<dyn PlaylistRepository>,
    pub metadata_extractor: Arc<dyn MetadataExtractor>,
}

impl CoreDependencies {
    /// Construct a dependency bundle from explicit bridge handles.
    ///
    /// The library starts on the in-memory repository, tags are read with
    /// lofty and time comes from the system clock.
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        secure_store: Arc<dyn SecureStore>,
        files: Arc<dyn FileReadinessProvider>,
        audio_engine: Arc<dyn LocalAudioEngine>,
        remote_session: Arc<dyn RemoteSession>,
    ) -> Self {
        let store = Arc::new(InMemoryLibraryStore::new());
        Self {
            http_client,
            secure_store,
            files,
            audio_engine,
            remote_session,
            remote_api: None,
            clock: Arc::new(SystemClock),
            tracks: store.clone(),
            playlists: store,
            metadata_extractor: Arc::new(LoftyMetadataExtractor::new()),
        }
    }

    /// Desktop bundle: reqwest, the OS keychain and the user's music folder.
    #[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
    pub fn desktop(
        audio_engine: Arc<dyn LocalAudioEngine>,
        remote_session: Arc<dyn RemoteSession>,
    ) -> Result<Self> {
        Ok(Self::new(
            Arc::new(ReqwestHttpClient::new()?),
            Arc::new(KeyringSecureStore::new()),
            Arc::new(DirectoryFileProvider::in_music_dir()?),
            audio_engine,
            remote_session,
        ))
    }

    pub fn with_remote_api(mut self, api: Arc<dyn RemoteApiClient>) -> Self {
        self.remote_api = Some(api);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_repositories(
        mut self,
        tracks: Arc<dyn TrackRepository>,
        playlists: Arc<dyn PlaylistRepository>,
    ) -> Self {
        self.tracks = tracks;
        self.playlists = playlists;
        self
    }

    pub fn with_metadata_extractor(mut self, extractor: Arc<dyn MetadataExtractor>) -> Self {
        self.metadata_extractor = extractor;
        self
    }
}

/// Settings the façade needs beyond [`CoreConfig`].
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub core: CoreConfig,
    pub oauth: OAuthConfig,
    /// Base URL of the streaming service's web API.
    pub api_base_url: String,
}

/// Primary façade exposed to host applications.
#[derive(Clone)]
pub struct CoreService {
    inner: Arc<ServiceInner>,
}

struct ServiceInner {
    config: CoreConfig,
    event_bus: EventBus,
    auth: Arc<SessionAuthenticator>,
    library: Arc<LibraryManager>,
    playback: Arc<PlaybackCoordinator>,
}

impl CoreService {
    /// Install logging from `config.core.logging`, wire every component and
    /// restore persisted credentials. A tracing subscriber the host already
    /// installed is kept.
    ///
    /// Must be called from within a Tokio runtime; the playback coordinator
    /// spawns its event pump here.
    #[instrument(skip_all)]
    pub async fn bootstrap(deps: CoreDependencies, config: ServiceConfig) -> Result<Self> {
        config.core.validate()?;
        let core = config.core;
        match init_logging(core.logging.clone()) {
            Ok(()) => {}
            Err(core_runtime::Error::LoggingAlreadyInitialized(_)) => {
                debug!("Keeping the installed tracing subscriber");
            }
            Err(e) => return Err(e.into()),
        }
        let event_bus = EventBus::new(core.event_buffer_size);

        let token_client = Arc::new(OAuthTokenClient::new(
            config.oauth.clone(),
            deps.http_client.clone(),
        ));
        let auth = Arc::new(
            SessionAuthenticator::new(
                config.oauth,
                token_client,
                deps.secure_store,
                deps.clock.clone(),
                event_bus.clone(),
            )
            .with_config(&core),
        );
        let tokens: Arc<dyn AccessTokenProvider> = auth.clone();

        let api: Arc<dyn RemoteApiClient> = match deps.remote_api {
            Some(api) => api,
            None => Arc::new(StreamingApiClient::new(
                deps.http_client,
                config.api_base_url,
            )),
        };

        let library = Arc::new(
            LibraryManager::new(
                deps.tracks,
                deps.playlists,
                deps.files.clone(),
                deps.metadata_extractor,
                deps.clock,
                event_bus.clone(),
            )
            .with_remote_catalog(RemoteCatalog::new(api.clone(), tokens.clone()))
            .with_config(&core),
        );

        let local = Arc::new(LocalBackend::new(deps.files, deps.audio_engine).with_config(&core));
        let remote = Arc::new(
            RemoteBackend::new(api, deps.remote_session, tokens).with_config(&core),
        );
        let playback = Arc::new(
            PlaybackCoordinator::new(local, remote, event_bus.clone()).with_config(&core),
        );

        let state = auth.restore().await?;
        info!(?state, "Core service ready");

        Ok(Self {
            inner: Arc::new(ServiceInner {
                config: core,
                event_bus,
                auth,
                library,
                playback,
            }),
        })
    }

    pub fn config(&self) -> &CoreConfig {
        &self.inner.config
    }

    pub fn auth(&self) -> Arc<SessionAuthenticator> {
        Arc::clone(&self.inner.auth)
    }

    pub fn library(&self) -> Arc<LibraryManager> {
        Arc::clone(&self.inner.library)
    }

    pub fn playback(&self) -> Arc<PlaybackCoordinator> {
        Arc::clone(&self.inner.playback)
    }

    /// Domain events from every component.
    pub fn subscribe_events(&self) -> core_async::sync::broadcast::Receiver<CoreEvent> {
        self.inner.event_bus.subscribe()
    }

    // ========================================================================
    // Cross-component flows
    // ========================================================================

    /// Run the file-provider import, then the catalog import when signed in.
    ///
    /// A failed catalog import is logged; the file-provider summary is still
    /// returned.
    #[instrument(skip(self))]
    pub async fn refresh_library(&self) -> Result<ImportSummary> {
        let mut summary = self.inner.library.import_from_file_provider().await?;

        if matches!(self.inner.auth.state(), AuthState::Unauthenticated) {
            return Ok(summary);
        }

        match self.inner.library.import_from_remote_catalog(|_| {}).await {
            Ok(remote) => {
                summary.processed += remote.processed;
                summary.added += remote.added;
                summary.skipped += remote.skipped;
                summary.failed += remote.failed;
            }
            Err(e) => warn!(error = %e, "Catalog import failed"),
        }
        Ok(summary)
    }

    /// Replace the queue with the whole library (newest first) and start at
    /// `start_index`.
    pub async fn play_library(&self, start_index: usize) -> Result<()> {
        let tracks = self.inner.library.tracks().await?;
        self.inner.playback.play_tracks(tracks, start_index).await;
        Ok(())
    }

    /// Replace the queue with a playlist's tracks and start at `start_index`.
    pub async fn play_playlist(&self, id: &PlaylistId, start_index: usize) -> Result<()> {
        let tracks = self.inner.library.playlist_tracks(id).await?;
        self.inner.playback.play_tracks(tracks, start_index).await;
        Ok(())
    }

    /// Stop playback and drop the streaming credentials.
    pub async fn sign_out(&self) -> Result<()> {
        self.inner.playback.stop().await;
        self.inner.auth.sign_out().await?;
        Ok(())
    }
}
