//! # Host Bridge Traits
//!
//! Contracts between the playback core and the collaborators it does not own.
//!
//! ## Overview
//!
//! Each trait represents a capability the core requires but that a host
//! provides: networking, secure storage, the cloud file store, the streaming
//! service's SDK and web API, and the native audio engine.
//!
//! ## Traits
//!
//! ### Networking & Storage
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations
//! - [`SecureStore`](storage::SecureStore) - Credential persistence (Keychain/Keystore)
//! - [`FileReadinessProvider`](storage::FileReadinessProvider) - Makes synced files locally available
//!
//! ### Playback
//! - [`LocalAudioEngine`](playback::LocalAudioEngine) - Native player objects for local files
//! - [`RemoteSession`](remote::RemoteSession) - Stateful streaming-service session
//! - [`RemoteApiClient`](remote::RemoteApiClient) - Stateless streaming-service web API
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! Host-facing traits use [`BridgeError`](error::BridgeError). The streaming
//! service traits carry their own typed failures
//! ([`RemoteApiError`](remote::RemoteApiError), [`SessionError`](remote::SessionError))
//! because the playback core reacts differently to each of them.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! across async tasks behind an `Arc`.

pub mod error;
pub mod http;
pub mod playback;
pub mod remote;
pub mod storage;
pub mod time;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use playback::{AudioPlayer, LocalAudioEngine};
pub use remote::{
    ApiResult, RemoteApiClient, RemoteApiError, RemotePage, RemotePlaybackStatus, RemoteSession,
    RemoteStateUpdate, RemoteTrack, SessionError, SessionResult,
};
pub use storage::{FileHandle, FileReadinessProvider, SecureStore};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, ManualClock, SystemClock};
