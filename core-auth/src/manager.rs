//! Session authenticator
//!
//! # Overview
//!
//! [`SessionAuthenticator`] owns the streaming-service credentials:
//!
//! ```text
//! Unauthenticated ──authorize──> Authenticated ──(margin reached)──> Refreshing
//!        ^                            ^                                 │
//!        │                            └────────────── ok ───────────────┤
//!        └──────────────────────────────────────── failure ─────────────┘
//! ```
//!
//! Every caller that needs a token goes through [`SessionAuthenticator::valid_token`].
//! When the access token is within the refresh margin of expiry the call
//! refreshes first, so a token known to be expired is never handed out.
//! Concurrent refreshes are collapsed into one network call: callers arriving
//! while a refresh is running await that refresh instead of starting their own.
//!
//! A failed refresh deletes the credentials, moves the state to
//! `Unauthenticated` and emits an [`AuthEvent::AuthError`].

use crate::error::{AuthError, Result};
use crate::oauth::{build_auth_url, OAuthConfig, PkceVerifier, TokenClient, TokenResponse};
use crate::token_store::TokenStore;
use crate::types::{AuthState, AuthorizationRequest, Credentials};
use async_trait::async_trait;
use bridge_traits::storage::SecureStore;
use bridge_traits::time::Clock;
use core_async::sync::{watch, Mutex, RwLock};
use core_async::time::{timeout, Duration};
use core_async::SingleFlight;
use core_runtime::config::{CoreConfig, DEFAULT_AUTH_REQUEST_TIMEOUT, DEFAULT_REFRESH_MARGIN};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// Manages authorization, persistence and refresh of session credentials.
pub struct SessionAuthenticator {
    inner: Arc<AuthInner>,
    oauth_config: OAuthConfig,
    pending: Mutex<Option<PkceVerifier>>,
    refresh_flight: SingleFlight<Result<Credentials>>,
    refresh_margin: Duration,
    request_timeout: Duration,
}

struct AuthInner {
    token_client: Arc<dyn TokenClient>,
    token_store: TokenStore,
    clock: Arc<dyn Clock>,
    event_bus: EventBus,
    credentials: RwLock<Option<Credentials>>,
    state: watch::Sender<AuthState>,
}

impl SessionAuthenticator {
    pub fn new(
        oauth_config: OAuthConfig,
        token_client: Arc<dyn TokenClient>,
        secure_store: Arc<dyn SecureStore>,
        clock: Arc<dyn Clock>,
        event_bus: EventBus,
    ) -> Self {
        let (state, _) = watch::channel(AuthState::Unauthenticated);
        Self {
            inner: Arc::new(AuthInner {
                token_client,
                token_store: TokenStore::new(secure_store),
                clock,
                event_bus,
                credentials: RwLock::new(None),
                state,
            }),
            oauth_config,
            pending: Mutex::new(None),
            refresh_flight: SingleFlight::new(),
            refresh_margin: DEFAULT_REFRESH_MARGIN,
            request_timeout: DEFAULT_AUTH_REQUEST_TIMEOUT,
        }
    }

    /// Apply the refresh margin and request timeout from `config`.
    pub fn with_config(self, config: &CoreConfig) -> Self {
        self.with_refresh_margin(config.refresh_margin)
            .with_request_timeout(config.auth_request_timeout)
    }

    pub fn with_refresh_margin(mut self, margin: Duration) -> Self {
        self.refresh_margin = margin;
        self
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    // ========================================================================
    // Observers
    // ========================================================================

    pub fn state(&self) -> AuthState {
        *self.inner.state.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<AuthState> {
        self.inner.state.subscribe()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.inner.credentials.read().await.is_some()
    }

    /// Whether the held access token is inside the refresh margin.
    pub async fn is_expiring(&self) -> bool {
        let now = self.inner.clock.unix_timestamp();
        self.inner
            .credentials
            .read()
            .await
            .as_ref()
            .map(|c| c.expires_within(self.refresh_margin, now))
            .unwrap_or(false)
    }

    // ========================================================================
    // Authorization
    // ========================================================================

    /// Start interactive authorization.
    ///
    /// Returns the URL the user must visit. Starting again discards the
    /// previous pending authorization.
    #[instrument(skip(self))]
    pub async fn begin_authorization(&self) -> Result<AuthorizationRequest> {
        let verifier = PkceVerifier::new();
        let url = build_auth_url(&self.oauth_config, &verifier)?;
        let state = verifier.state().to_string();

        *self.pending.lock().await = Some(verifier);
        let _ = self
            .inner
            .event_bus
            .emit(CoreEvent::Auth(AuthEvent::SigningIn));

        info!("Authorization started");
        Ok(AuthorizationRequest { url, state })
    }

    /// Finish authorization with the code and state delivered to the redirect URI.
    #[instrument(skip(self, code, state))]
    pub async fn complete_authorization(&self, code: &str, state: &str) -> Result<()> {
        let verifier = self
            .pending
            .lock()
            .await
            .take()
            .ok_or(AuthError::NoAuthorizationInProgress)?;

        if verifier.state() != state {
            warn!("Authorization state mismatch");
            self.inner.emit_error(&AuthError::InvalidState, true);
            return Err(AuthError::InvalidState);
        }

        let inner = &self.inner;
        let token = match timeout(
            self.request_timeout,
            inner.token_client.exchange_code(code, &verifier),
        )
        .await
        {
            Ok(Ok(token)) => token,
            Ok(Err(e)) => {
                inner.emit_error(&e, true);
                return Err(e);
            }
            Err(_) => {
                let e = AuthError::OperationTimeout(self.request_timeout.as_secs());
                inner.emit_error(&e, true);
                return Err(e);
            }
        };

        let credentials = inner.credentials_from(token, None);
        inner.token_store.store(&credentials).await?;
        let expires_at = credentials.expires_at();
        *inner.credentials.write().await = Some(credentials);
        inner
            .state
            .send_replace(AuthState::Authenticated { expires_at });
        let _ = inner
            .event_bus
            .emit(CoreEvent::Auth(AuthEvent::SignedIn { expires_at }));

        info!(expires_at, "Authorization completed");
        Ok(())
    }

    /// Load persisted credentials into memory.
    ///
    /// Corrupted records are removed and reported as unauthenticated.
    #[instrument(skip(self))]
    pub async fn restore(&self) -> Result<AuthState> {
        let inner = &self.inner;
        let loaded = match inner.token_store.load().await {
            Ok(loaded) => loaded,
            Err(AuthError::TokenCorrupted) => None,
            Err(e) => return Err(e),
        };

        let state = match &loaded {
            Some(creds) => AuthState::Authenticated {
                expires_at: creds.expires_at(),
            },
            None => AuthState::Unauthenticated,
        };
        *inner.credentials.write().await = loaded;
        inner.state.send_replace(state);

        debug!(state = %state, "Credentials restored");
        Ok(state)
    }

    /// Forget the credentials locally and in the secure store.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> Result<()> {
        *self.pending.lock().await = None;
        self.inner.clear().await?;
        let _ = self
            .inner
            .event_bus
            .emit(CoreEvent::Auth(AuthEvent::SignedOut));
        info!("Signed out");
        Ok(())
    }

    // ========================================================================
    // Tokens
    // ========================================================================

    /// Access token that is valid for at least the refresh margin.
    ///
    /// Refreshes first when the held token is inside the margin.
    pub async fn valid_token(&self) -> Result<String> {
        let now = self.inner.clock.unix_timestamp();
        let current = self
            .inner
            .credentials
            .read()
            .await
            .clone()
            .ok_or(AuthError::NotAuthenticated)?;

        if !current.expires_within(self.refresh_margin, now) {
            return Ok(current.access_token().to_string());
        }

        debug!(
            seconds_left = current.seconds_until_expiry(now),
            "Access token inside refresh margin"
        );
        let refreshed = self.refresh(current.access_token().to_string()).await?;
        Ok(refreshed.access_token().to_string())
    }

    /// Refresh after the server rejected `stale_token`.
    ///
    /// When another caller already replaced `stale_token` the replacement is
    /// returned without a network call.
    pub async fn force_refresh(&self, stale_token: &str) -> Result<String> {
        let refreshed = self.refresh(stale_token.to_string()).await?;
        Ok(refreshed.access_token().to_string())
    }

    async fn refresh(&self, stale_token: String) -> Result<Credentials> {
        let inner = self.inner.clone();
        let request_timeout = self.request_timeout;
        self.refresh_flight
            .run(move || async move {
                inner
                    .refresh_credentials(stale_token, request_timeout)
                    .await
            })
            .await
    }
}

/// Source of bearer tokens for components that call the streaming service.
#[async_trait]
pub trait AccessTokenProvider: Send + Sync {
    /// A token that is not inside the refresh margin.
    async fn valid_token(&self) -> Result<String>;

    /// A replacement for a token the server rejected.
    async fn force_refresh(&self, stale_token: &str) -> Result<String>;
}

#[async_trait]
impl AccessTokenProvider for SessionAuthenticator {
    async fn valid_token(&self) -> Result<String> {
        SessionAuthenticator::valid_token(self).await
    }

    async fn force_refresh(&self, stale_token: &str) -> Result<String> {
        SessionAuthenticator::force_refresh(self, stale_token).await
    }
}

impl AuthInner {
    fn credentials_from(&self, token: TokenResponse, previous_refresh: Option<&str>) -> Credentials {
        let refresh_token = token
            .refresh_token
            .or_else(|| previous_refresh.map(str::to_string));
        Credentials::issued(
            token.access_token,
            refresh_token,
            token.expires_in,
            self.clock.unix_timestamp(),
        )
    }

    fn emit_error(&self, error: &AuthError, recoverable: bool) {
        let _ = self.event_bus.emit(CoreEvent::Auth(AuthEvent::AuthError {
            message: error.to_string(),
            recoverable,
        }));
    }

    async fn clear(&self) -> Result<()> {
        *self.credentials.write().await = None;
        self.state.send_replace(AuthState::Unauthenticated);
        self.token_store.delete().await
    }

    #[instrument(skip(self, stale_token))]
    async fn refresh_credentials(
        &self,
        stale_token: String,
        request_timeout: Duration,
    ) -> Result<Credentials> {
        let current = self
            .credentials
            .read()
            .await
            .clone()
            .ok_or(AuthError::NotAuthenticated)?;

        if current.access_token() != stale_token {
            debug!("Credentials already replaced by another caller");
            return Ok(current);
        }

        let Some(refresh_token) = current.refresh_token().map(str::to_string) else {
            return Err(self.fail_refresh(AuthError::NoRefreshToken).await);
        };

        self.state.send_replace(AuthState::Refreshing);
        let _ = self
            .event_bus
            .emit(CoreEvent::Auth(AuthEvent::TokenRefreshing));

        let outcome = match timeout(request_timeout, self.token_client.refresh(&refresh_token)).await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(AuthError::OperationTimeout(request_timeout.as_secs())),
        };

        let token = match outcome {
            Ok(token) => token,
            Err(e) => return Err(self.fail_refresh(e).await),
        };

        let refreshed = self.credentials_from(token, Some(&refresh_token));
        if let Err(e) = self.token_store.store(&refreshed).await {
            warn!(error = %e, "Refreshed credentials kept in memory only");
        }

        let expires_at = refreshed.expires_at();
        *self.credentials.write().await = Some(refreshed.clone());
        self.state
            .send_replace(AuthState::Authenticated { expires_at });
        let _ = self
            .event_bus
            .emit(CoreEvent::Auth(AuthEvent::TokenRefreshed { expires_at }));

        info!(expires_at, "Access token refreshed");
        Ok(refreshed)
    }

    async fn fail_refresh(&self, error: AuthError) -> AuthError {
        error!(error = %error, "Token refresh failed; signing out");
        if let Err(e) = self.clear().await {
            warn!(error = %e, "Failed to delete credentials after refresh failure");
        }
        self.emit_error(&error, false);
        error
    }
}
