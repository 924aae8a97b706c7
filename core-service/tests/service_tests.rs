//! Bootstrap and cross-component flows of the core service façade

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::playback::{AudioPlayer, LocalAudioEngine};
use bridge_traits::remote::{RemoteSession, RemoteStateUpdate, SessionError, SessionResult};
use bridge_traits::storage::{FileHandle, FileReadinessProvider, SecureStore};
use core_auth::{AuthState, OAuthConfig};
use core_library::{ExtractedTags, MetadataExtractor};
use core_playback::PlaybackPhase;
use bridge_traits::time::LogLevel;
use core_runtime::logging::LoggingConfig;
use core_runtime::CoreConfig;
use core_service::{CoreDependencies, CoreError, CoreService, ServiceConfig};
use mockall::mock;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Fakes
// ============================================================================

mock! {
    pub Http {}

    #[async_trait]
    impl HttpClient for Http {
        async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
    }
}

#[derive(Default)]
struct MemorySecureStore {
    secrets: Mutex<HashMap<String, Vec<u8>>>,
}

#[async_trait]
impl SecureStore for MemorySecureStore {
    async fn set_secret(&self, key: &str, value: &[u8]) -> BridgeResult<()> {
        self.secrets
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn get_secret(&self, key: &str) -> BridgeResult<Option<Vec<u8>>> {
        Ok(self.secrets.lock().unwrap().get(key).cloned())
    }

    async fn delete_secret(&self, key: &str) -> BridgeResult<()> {
        self.secrets.lock().unwrap().remove(key);
        Ok(())
    }
}

struct SyncedFiles(Vec<&'static str>);

#[async_trait]
impl FileReadinessProvider for SyncedFiles {
    async fn list_available_resources(&self) -> BridgeResult<Vec<FileHandle>> {
        Ok(self.0.iter().map(|p| FileHandle::new(*p)).collect())
    }

    async fn ensure_available(&self, _handle: &FileHandle) -> BridgeResult<()> {
        Ok(())
    }

    fn is_available(&self, _handle: &FileHandle) -> bool {
        true
    }

    fn progress(&self, _handle: &FileHandle) -> f32 {
        1.0
    }

    fn local_path(&self, handle: &FileHandle) -> PathBuf {
        Path::new("/music").join(handle.path())
    }
}

struct StemTags;

#[async_trait]
impl MetadataExtractor for StemTags {
    async fn extract(&self, path: &Path) -> core_library::Result<ExtractedTags> {
        Ok(ExtractedTags {
            title: path.file_stem().map(|s| s.to_string_lossy().into_owned()),
            duration_secs: Some(120.0),
            ..Default::default()
        })
    }
}

struct SilentPlayer;

#[async_trait]
impl AudioPlayer for SilentPlayer {
    async fn play(&self) -> BridgeResult<()> {
        Ok(())
    }

    async fn pause(&self) -> BridgeResult<()> {
        Ok(())
    }

    async fn seek(&self, _position: Duration) -> BridgeResult<()> {
        Ok(())
    }

    fn position(&self) -> Duration {
        Duration::ZERO
    }

    fn duration(&self) -> Option<Duration> {
        Some(Duration::from_secs(120))
    }

    fn is_finished(&self) -> bool {
        false
    }

    async fn close(&self) -> BridgeResult<()> {
        Ok(())
    }
}

#[derive(Default)]
struct SilentEngine {
    opened: Mutex<Vec<PathBuf>>,
}

#[async_trait]
impl LocalAudioEngine for SilentEngine {
    async fn open(&self, path: &Path) -> BridgeResult<Arc<dyn AudioPlayer>> {
        self.opened.lock().unwrap().push(path.to_path_buf());
        Ok(Arc::new(SilentPlayer))
    }
}

struct OfflineSession {
    updates: core_async::sync::broadcast::Sender<RemoteStateUpdate>,
}

impl OfflineSession {
    fn new() -> Self {
        let (updates, _) = core_async::sync::broadcast::channel(4);
        Self { updates }
    }
}

#[async_trait]
impl RemoteSession for OfflineSession {
    async fn connect(&self, _access_token: &str) -> SessionResult<()> {
        Err(SessionError::ConnectionFailed("offline".to_string()))
    }

    async fn disconnect(&self) -> SessionResult<()> {
        Ok(())
    }

    fn is_connected(&self) -> bool {
        false
    }

    async fn play(&self, _uri: &str) -> SessionResult<()> {
        Err(SessionError::NotConnected)
    }

    async fn pause(&self) -> SessionResult<()> {
        Err(SessionError::NotConnected)
    }

    async fn resume(&self) -> SessionResult<()> {
        Err(SessionError::NotConnected)
    }

    async fn seek(&self, _position_ms: u64) -> SessionResult<()> {
        Err(SessionError::NotConnected)
    }

    async fn skip_next(&self) -> SessionResult<()> {
        Err(SessionError::NotConnected)
    }

    async fn skip_previous(&self) -> SessionResult<()> {
        Err(SessionError::NotConnected)
    }

    fn subscribe(&self) -> core_async::sync::broadcast::Receiver<RemoteStateUpdate> {
        self.updates.subscribe()
    }
}

fn service_config() -> ServiceConfig {
    ServiceConfig {
        core: CoreConfig::default(),
        oauth: OAuthConfig {
            client_id: "client-id".to_string(),
            client_secret: None,
            redirect_uri: "tandem://callback".to_string(),
            scopes: vec!["streaming".to_string()],
            auth_url: "https://accounts.example.com/authorize".to_string(),
            token_url: "https://accounts.example.com/api/token".to_string(),
        },
        api_base_url: "https://api.example.com/v1".to_string(),
    }
}

fn dependencies(files: Vec<&'static str>, engine: Arc<SilentEngine>) -> CoreDependencies {
    // No expectations: nothing may reach the network while signed out.
    let http = MockHttp::new();
    CoreDependencies::new(
        Arc::new(http),
        Arc::new(MemorySecureStore::default()),
        Arc::new(SyncedFiles(files)),
        engine,
        Arc::new(OfflineSession::new()),
    )
    .with_metadata_extractor(Arc::new(StemTags))
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_bootstrap_without_credentials() {
    let service = CoreService::bootstrap(
        dependencies(vec![], Arc::new(SilentEngine::default())),
        service_config(),
    )
    .await
    .unwrap();

    assert_eq!(service.auth().state(), AuthState::Unauthenticated);
    assert!(service.library().tracks().await.unwrap().is_empty());
    assert_eq!(service.playback().snapshot().phase, PlaybackPhase::Idle);
}

#[tokio::test]
async fn test_bootstrap_rejects_invalid_config() {
    let mut config = service_config();
    config.core.poll_interval = Duration::ZERO;

    let result = CoreService::bootstrap(
        dependencies(vec![], Arc::new(SilentEngine::default())),
        config,
    )
    .await;

    assert!(matches!(result, Err(CoreError::Runtime(_))));
}

#[tokio::test]
async fn test_bootstrap_rejects_invalid_log_filter() {
    let mut config = service_config();
    config.core.logging = LoggingConfig::default().with_filter("core_playback=loudest");

    let result = CoreService::bootstrap(
        dependencies(vec![], Arc::new(SilentEngine::default())),
        config,
    )
    .await;

    assert!(matches!(
        result,
        Err(CoreError::Runtime(core_runtime::Error::Config(_)))
    ));
}

#[tokio::test]
async fn test_second_bootstrap_keeps_installed_logging() {
    let mut config = service_config();
    config.core.logging = LoggingConfig::default().with_level(LogLevel::Warn);

    for _ in 0..2 {
        let service = CoreService::bootstrap(
            dependencies(vec![], Arc::new(SilentEngine::default())),
            config.clone(),
        )
        .await;
        assert!(service.is_ok());
    }
}

#[tokio::test]
async fn test_refresh_library_skips_catalog_when_signed_out() {
    let service = CoreService::bootstrap(
        dependencies(
            vec!["Albums/Blue/01 Intro.flac", "Singles/Hit.mp3"],
            Arc::new(SilentEngine::default()),
        ),
        service_config(),
    )
    .await
    .unwrap();

    let summary = service.refresh_library().await.unwrap();
    assert_eq!(summary.added, 2);

    let again = service.refresh_library().await.unwrap();
    assert_eq!(again.added, 0);
    assert_eq!(again.skipped, 2);
}

#[tokio::test]
async fn test_play_library_starts_local_track() {
    let engine = Arc::new(SilentEngine::default());
    let service = CoreService::bootstrap(
        dependencies(vec!["Singles/Hit.mp3"], engine.clone()),
        service_config(),
    )
    .await
    .unwrap();
    service.refresh_library().await.unwrap();

    let mut snapshots = service.playback().subscribe();
    service.play_library(0).await.unwrap();

    let snapshot = snapshots
        .wait_for(|s| s.phase == PlaybackPhase::LoadedPlaying)
        .await
        .unwrap()
        .clone();
    assert_eq!(
        snapshot.current_track.map(|t| t.title),
        Some("Hit".to_string())
    );

    tokio::time::timeout(Duration::from_secs(1), async {
        while engine.opened.lock().unwrap().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(
        engine.opened.lock().unwrap().clone(),
        vec![PathBuf::from("/music/Singles/Hit.mp3")]
    );
}

#[tokio::test]
async fn test_play_unknown_playlist_fails() {
    let service = CoreService::bootstrap(
        dependencies(vec![], Arc::new(SilentEngine::default())),
        service_config(),
    )
    .await
    .unwrap();

    let result = service
        .play_playlist(&core_library::PlaylistId::new(), 0)
        .await;
    assert!(matches!(result, Err(CoreError::Library(_))));
}

#[tokio::test]
async fn test_sign_out_while_idle() {
    let service = CoreService::bootstrap(
        dependencies(vec![], Arc::new(SilentEngine::default())),
        service_config(),
    )
    .await
    .unwrap();

    service.sign_out().await.unwrap();
    assert_eq!(service.auth().state(), AuthState::Unauthenticated);
}
