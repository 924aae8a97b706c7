//! Storage Abstractions
//!
//! Secure credential storage and the file readiness provider that stands in
//! for the cloud file store syncing local audio files onto the device.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::error::Result;

/// Opaque identifier of a file known to the file readiness provider.
///
/// The identifier is a provider-relative path (for example
/// `"Albums/Blue/01 Intro.flac"`). It is stable across app launches and is
/// what the library uses to deduplicate file imports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileHandle(String);

impl FileHandle {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &str {
        &self.0
    }

    /// Final path component, e.g. `"01 Intro.flac"`.
    pub fn file_name(&self) -> &str {
        self.0.rsplit(&['/', '\\'][..]).next().unwrap_or(&self.0)
    }

    /// File name without its extension.
    pub fn file_stem(&self) -> &str {
        let name = self.file_name();
        match name.rfind('.') {
            Some(idx) if idx > 0 => &name[..idx],
            _ => name,
        }
    }

    /// Lower-cased extension, if any.
    pub fn extension(&self) -> Option<String> {
        let name = self.file_name();
        match name.rfind('.') {
            Some(idx) if idx > 0 && idx + 1 < name.len() => {
                Some(name[idx + 1..].to_ascii_lowercase())
            }
            _ => None,
        }
    }
}

impl fmt::Display for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ensures a file's bytes are present on the device before playback.
///
/// Implementations wrap whatever syncs files down (a cloud drive client, a
/// document provider). Playback must never be attempted against a file that
/// is only partially materialized, so callers check [`is_available`] and wait
/// on [`ensure_available`] first.
///
/// [`is_available`]: FileReadinessProvider::is_available
/// [`ensure_available`]: FileReadinessProvider::ensure_available
#[async_trait]
pub trait FileReadinessProvider: Send + Sync {
    /// Every audio file the provider knows about, whether or not its bytes are
    /// already local.
    async fn list_available_resources(&self) -> Result<Vec<FileHandle>>;

    /// Requests the file and resolves once it is fully available locally.
    ///
    /// # Errors
    ///
    /// - `BridgeError::NotFound` if the provider no longer knows the file
    /// - `BridgeError::NotReady` if the download stalled and may be retried
    async fn ensure_available(&self, handle: &FileHandle) -> Result<()>;

    /// Whether the file is fully materialized on the device.
    fn is_available(&self, handle: &FileHandle) -> bool;

    /// Download progress in `0.0..=1.0`; `1.0` once available.
    fn progress(&self, handle: &FileHandle) -> f32;

    /// Local filesystem location of the file. Only meaningful once
    /// [`is_available`](FileReadinessProvider::is_available) returns true.
    fn local_path(&self, handle: &FileHandle) -> PathBuf;
}

/// Secure credential storage trait
///
/// Abstracts secure storage mechanisms (Keychain, Keystore, Secret Service).
///
/// # Security Requirements
///
/// Implementations MUST:
/// - Encrypt data at rest
/// - Never log or expose sensitive data
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SecureStore;
///
/// async fn store_token(store: &dyn SecureStore, token: &str) -> Result<()> {
///     store.set_secret("streaming_credentials", token.as_bytes()).await?;
///     Ok(())
/// }
/// ```
#[async_trait]
pub trait SecureStore: Send + Sync {
    /// Store a secret value, replacing any previous value.
    async fn set_secret(&self, key: &str, value: &[u8]) -> Result<()>;

    /// Retrieve a secret value
    ///
    /// Returns `Ok(None)` if the key doesn't exist.
    async fn get_secret(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Delete a secret. Deleting a missing key is not an error.
    async fn delete_secret(&self, key: &str) -> Result<()>;

    /// Check if a secret exists without retrieving it
    async fn has_secret(&self, key: &str) -> Result<bool> {
        Ok(self.get_secret(key).await?.is_some())
    }
}
