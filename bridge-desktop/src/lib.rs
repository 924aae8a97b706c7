//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux), used by the desktop shell and integration runs.
//!
//! ## Overview
//!
//! - `HttpClient` using `reqwest`
//! - `SecureStore` using the `keyring` crate
//! - `FileReadinessProvider` over a local directory, optionally fed from a
//!   second directory standing in for the cloud store
//!
//! The streaming SDK session and the native audio engine have no desktop
//! counterpart here; hosts supply them.
//!
//! ## Feature Flags
//!
//! - `secure-store`: Enable OS keychain integration (default)
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{DirectoryFileProvider, ReqwestHttpClient};
//!
//! let http_client = ReqwestHttpClient::new()?;
//! let files = DirectoryFileProvider::in_music_dir()?;
//! ```

mod http;
mod readiness;

#[cfg(feature = "secure-store")]
mod secure_store;

pub use http::ReqwestHttpClient;
pub use readiness::{DirectoryFileProvider, AUDIO_EXTENSIONS};

#[cfg(feature = "secure-store")]
pub use secure_store::KeyringSecureStore;
