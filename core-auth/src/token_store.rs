//! Credential persistence
//!
//! Stores the session [`Credentials`] as a JSON record under a single key of
//! the platform [`SecureStore`] (Keychain, Keystore, keyring...).
//!
//! Token values never reach the logs. A record that no longer parses is
//! deleted and reported as [`AuthError::TokenCorrupted`].

use crate::error::{AuthError, Result};
use crate::types::Credentials;
use bridge_traits::storage::SecureStore;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Secure-store key holding the streaming credentials record.
pub const CREDENTIALS_KEY: &str = "streaming_credentials";

/// Persistence for the single session credential record.
#[derive(Clone)]
pub struct TokenStore {
    secure_store: Arc<dyn SecureStore>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredCredentials {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: i64,
}

impl TokenStore {
    pub fn new(secure_store: Arc<dyn SecureStore>) -> Self {
        debug!("Initializing TokenStore");
        Self { secure_store }
    }

    /// Persist credentials, overwriting any previous record.
    pub async fn store(&self, credentials: &Credentials) -> Result<()> {
        let stored = StoredCredentials {
            access_token: credentials.access_token().to_string(),
            refresh_token: credentials.refresh_token().map(str::to_string),
            expires_at: credentials.expires_at(),
        };

        let json = serde_json::to_vec(&stored).map_err(|e| {
            warn!(error = %e, "Failed to serialize credentials");
            AuthError::Serialization(e.to_string())
        })?;

        self.secure_store
            .set_secret(CREDENTIALS_KEY, &json)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to store credentials in secure storage");
                AuthError::SecureStorageUnavailable(e.to_string())
            })?;

        info!(
            has_refresh_token = stored.refresh_token.is_some(),
            expires_at = stored.expires_at,
            "Credentials stored securely"
        );

        Ok(())
    }

    /// Load the persisted credentials, if any.
    pub async fn load(&self) -> Result<Option<Credentials>> {
        let data = self
            .secure_store
            .get_secret(CREDENTIALS_KEY)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to read credentials from secure storage");
                AuthError::SecureStorageUnavailable(e.to_string())
            })?;

        let Some(data) = data else {
            debug!("No credentials found in storage");
            return Ok(None);
        };

        let stored: StoredCredentials = match serde_json::from_slice(&data) {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Stored credentials could not be decoded");
                if let Err(delete_err) = self.secure_store.delete_secret(CREDENTIALS_KEY).await {
                    warn!(error = %delete_err, "Failed to delete corrupted credentials");
                }
                return Err(AuthError::TokenCorrupted);
            }
        };

        debug!(
            has_refresh_token = stored.refresh_token.is_some(),
            expires_at = stored.expires_at,
            "Credentials loaded"
        );

        Ok(Some(Credentials::from_parts(
            stored.access_token,
            stored.refresh_token,
            stored.expires_at,
        )))
    }

    /// Remove the persisted credentials. Deleting a missing record succeeds.
    pub async fn delete(&self) -> Result<()> {
        self.secure_store
            .delete_secret(CREDENTIALS_KEY)
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to delete credentials from secure storage");
                AuthError::SecureStorageUnavailable(e.to_string())
            })?;

        info!("Credentials deleted");
        Ok(())
    }

    pub async fn exists(&self) -> Result<bool> {
        self.secure_store
            .has_secret(CREDENTIALS_KEY)
            .await
            .map_err(|e| AuthError::SecureStorageUnavailable(e.to_string()))
    }
}
