//! OAuth 2.0 authorization code flow with PKCE
//!
//! # Overview
//!
//! - [`PkceVerifier`] generates the code verifier and CSRF state (RFC 7636, S256).
//! - [`build_auth_url`] renders the authorization URL the user opens.
//! - [`TokenClient`] is the seam for the token endpoint; [`OAuthTokenClient`]
//!   implements it over the platform [`HttpClient`].
//!
//! Token values, codes and verifiers are never logged.

use crate::error::{AuthError, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, RetryPolicy};
use bytes::Bytes;
use core_async::time::sleep;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// OAuth client registration for the streaming service.
#[derive(Debug, Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    /// Absent for public clients.
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    /// Authorization endpoint URL
    pub auth_url: String,
    /// Token endpoint URL
    pub token_url: String,
}

/// PKCE code verifier plus the CSRF state sent alongside it.
///
/// Only the challenge leaves the device during authorization; the verifier
/// is sent when the code is exchanged.
#[derive(Clone)]
pub struct PkceVerifier {
    verifier: String,
    state: String,
}

impl PkceVerifier {
    /// Generate a 32-byte verifier and a 16-byte state, both base64url
    /// encoded without padding.
    pub fn new() -> Self {
        let mut rng = rand::thread_rng();

        let mut verifier_bytes = [0u8; 32];
        rng.fill(&mut verifier_bytes);
        let verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);

        let mut state_bytes = [0u8; 16];
        rng.fill(&mut state_bytes);
        let state = URL_SAFE_NO_PAD.encode(state_bytes);

        Self { verifier, state }
    }

    pub fn verifier(&self) -> &str {
        &self.verifier
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    /// BASE64URL(SHA256(verifier))
    pub fn challenge(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.verifier.as_bytes());
        URL_SAFE_NO_PAD.encode(hasher.finalize())
    }
}

impl Default for PkceVerifier {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PkceVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceVerifier")
            .field("verifier", &"[REDACTED]")
            .field("state", &self.state)
            .finish()
    }
}

/// Build the authorization URL carrying the PKCE challenge and state.
pub fn build_auth_url(config: &OAuthConfig, verifier: &PkceVerifier) -> Result<String> {
    let mut url = Url::parse(&config.auth_url)
        .map_err(|e| AuthError::InvalidConfig(format!("Invalid auth URL: {}", e)))?;

    {
        let mut query = url.query_pairs_mut();
        query.append_pair("client_id", &config.client_id);
        query.append_pair("redirect_uri", &config.redirect_uri);
        query.append_pair("response_type", "code");
        query.append_pair("scope", &config.scopes.join(" "));
        query.append_pair("state", verifier.state());
        query.append_pair("code_challenge", &verifier.challenge());
        query.append_pair("code_challenge_method", "S256");
    }

    debug!("Built authorization URL");
    Ok(url.to_string())
}

/// JSON body returned by the token endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

fn default_expires_in() -> i64 {
    3600
}

/// Token endpoint operations.
#[async_trait]
pub trait TokenClient: Send + Sync {
    /// Exchange an authorization code for tokens.
    async fn exchange_code(&self, code: &str, verifier: &PkceVerifier) -> Result<TokenResponse>;

    /// Obtain a new access token from a refresh token.
    ///
    /// Returns [`AuthError::RefreshRejected`] when the server refuses the
    /// refresh token and [`AuthError::TokenRefreshFailed`] for transport or
    /// server failures.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse>;
}

/// [`TokenClient`] speaking form-encoded OAuth to the token endpoint.
pub struct OAuthTokenClient {
    config: OAuthConfig,
    http_client: Arc<dyn HttpClient>,
    retry: RetryPolicy,
}

impl OAuthTokenClient {
    pub fn new(config: OAuthConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            config,
            http_client,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn form_request(&self, params: &HashMap<&str, &str>) -> Result<HttpRequest> {
        let encoded = serde_urlencoded::to_string(params)
            .map_err(|e| AuthError::Serialization(format!("token request: {}", e)))?;

        Ok(
            HttpRequest::new(HttpMethod::Post, self.config.token_url.clone())
                .header("Content-Type", "application/x-www-form-urlencoded")
                .body(Bytes::from(encoded)),
        )
    }
}

#[async_trait]
impl TokenClient for OAuthTokenClient {
    #[instrument(skip(self, code, verifier))]
    async fn exchange_code(&self, code: &str, verifier: &PkceVerifier) -> Result<TokenResponse> {
        let mut params = HashMap::new();
        params.insert("grant_type", "authorization_code");
        params.insert("code", code);
        params.insert("redirect_uri", self.config.redirect_uri.as_str());
        params.insert("client_id", self.config.client_id.as_str());
        params.insert("code_verifier", verifier.verifier());
        if let Some(ref secret) = self.config.client_secret {
            params.insert("client_secret", secret.as_str());
        }

        let response = self
            .http_client
            .execute(self.form_request(&params)?)
            .await
            .map_err(|e| AuthError::TokenExchangeFailed(e.to_string()))?;

        if !response.is_success() {
            let status = response.status;
            let body = response
                .text()
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            warn!(status = status, error = %body, "Authorization code exchange failed");
            return Err(AuthError::TokenExchangeFailed(format!(
                "Token endpoint returned {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .map_err(|e| AuthError::TokenExchangeFailed(format!("Invalid token response: {}", e)))?;

        info!(expires_in = token.expires_in, "Exchanged authorization code for tokens");
        Ok(token)
    }

    #[instrument(skip(self, refresh_token))]
    async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        let mut params = HashMap::new();
        params.insert("grant_type", "refresh_token");
        params.insert("refresh_token", refresh_token);
        params.insert("client_id", self.config.client_id.as_str());
        if let Some(ref secret) = self.config.client_secret {
            params.insert("client_secret", secret.as_str());
        }
        let request = self.form_request(&params)?;

        let mut attempt = 0;
        loop {
            attempt += 1;

            let response = self
                .http_client
                .execute(request.clone())
                .await
                .map_err(|e| AuthError::TokenRefreshFailed(e.to_string()))?;

            if response.is_success() {
                let mut token: TokenResponse = response.json().map_err(|e| {
                    AuthError::TokenRefreshFailed(format!("Invalid token response: {}", e))
                })?;
                if token.refresh_token.is_none() {
                    token.refresh_token = Some(refresh_token.to_string());
                }
                info!(expires_in = token.expires_in, "Refreshed access token");
                return Ok(token);
            }

            let status = response.status;
            let body = response
                .text()
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            if response.is_client_error() && status != 429 {
                warn!(status = status, error = %body, "Refresh token rejected");
                return Err(AuthError::RefreshRejected(format!(
                    "Token endpoint returned {}: {}",
                    status, body
                )));
            }

            if attempt >= self.retry.max_attempts {
                return Err(AuthError::TokenRefreshFailed(format!(
                    "Token refresh failed after {} attempts. Last error: {} - {}",
                    attempt, status, body
                )));
            }

            let delay = self.retry.delay_for(attempt - 1);
            warn!(
                status = status,
                attempt = attempt,
                delay_ms = delay.as_millis() as u64,
                "Token refresh failed, retrying"
            );
            sleep(delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::http::HttpResponse;
    use mockall::mock;
    use mockall::predicate::*;
    use std::time::Duration;

    mock! {
        pub Http {}

        #[async_trait]
        impl HttpClient for Http {
            async fn execute(&self, request: HttpRequest) -> BridgeResult<HttpResponse>;
        }
    }

    fn config() -> OAuthConfig {
        OAuthConfig {
            client_id: "client-id".to_string(),
            client_secret: None,
            redirect_uri: "tandem://callback".to_string(),
            scopes: vec!["streaming".to_string(), "user-library-read".to_string()],
            auth_url: "https://accounts.example.com/authorize".to_string(),
            token_url: "https://accounts.example.com/api/token".to_string(),
        }
    }

    fn fast_retry() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_pkce_verifier_generation() {
        let verifier = PkceVerifier::new();
        assert!(verifier.verifier().len() >= 43);
        assert!(!verifier.state().is_empty());
        assert_eq!(verifier.challenge(), verifier.challenge());

        let other = PkceVerifier::new();
        assert_ne!(verifier.verifier(), other.verifier());
        assert_ne!(verifier.state(), other.state());
    }

    #[test]
    fn test_pkce_debug_hides_verifier() {
        let verifier = PkceVerifier::new();
        let debug = format!("{:?}", verifier);
        assert!(!debug.contains(verifier.verifier()));
    }

    #[test]
    fn test_build_auth_url() {
        let verifier = PkceVerifier::new();
        let url = build_auth_url(&config(), &verifier).unwrap();
        let parsed = Url::parse(&url).unwrap();
        let pairs: HashMap<_, _> = parsed.query_pairs().into_owned().collect();

        assert_eq!(pairs["client_id"], "client-id");
        assert_eq!(pairs["response_type"], "code");
        assert_eq!(pairs["scope"], "streaming user-library-read");
        assert_eq!(pairs["state"], verifier.state());
        assert_eq!(pairs["code_challenge"], verifier.challenge());
        assert_eq!(pairs["code_challenge_method"], "S256");
    }

    #[test]
    fn test_build_auth_url_rejects_invalid_endpoint() {
        let mut cfg = config();
        cfg.auth_url = "not a url".to_string();
        let result = build_auth_url(&cfg, &PkceVerifier::new());
        assert!(matches!(result, Err(AuthError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn test_exchange_code_posts_form() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .withf(|req| {
                let body = req
                    .body
                    .as_ref()
                    .map(|b| String::from_utf8_lossy(b).to_string())
                    .unwrap_or_default();
                req.method == HttpMethod::Post
                    && req.url.ends_with("/api/token")
                    && body.contains("grant_type=authorization_code")
                    && body.contains("code=the-code")
            })
            .times(1)
            .returning(|_| {
                Ok(HttpResponse::new(
                    200,
                    r#"{"access_token":"at","refresh_token":"rt","expires_in":3600}"#,
                ))
            });

        let client = OAuthTokenClient::new(config(), Arc::new(http));
        let token = client
            .exchange_code("the-code", &PkceVerifier::new())
            .await
            .unwrap();

        assert_eq!(token.access_token, "at");
        assert_eq!(token.refresh_token.as_deref(), Some("rt"));
        assert_eq!(token.expires_in, 3600);
    }

    #[tokio::test]
    async fn test_exchange_code_failure() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .returning(|_| Ok(HttpResponse::new(400, r#"{"error":"invalid_grant"}"#)));

        let client = OAuthTokenClient::new(config(), Arc::new(http));
        let result = client.exchange_code("bad", &PkceVerifier::new()).await;
        assert!(matches!(result, Err(AuthError::TokenExchangeFailed(_))));
    }

    #[tokio::test]
    async fn test_refresh_keeps_refresh_token_when_omitted() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(200, r#"{"access_token":"new"}"#)));

        let client = OAuthTokenClient::new(config(), Arc::new(http));
        let token = client.refresh("old-refresh").await.unwrap();

        assert_eq!(token.access_token, "new");
        assert_eq!(token.refresh_token.as_deref(), Some("old-refresh"));
        assert_eq!(token.expires_in, 3600);
    }

    #[tokio::test]
    async fn test_refresh_rejected_is_not_retried() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(1)
            .returning(|_| Ok(HttpResponse::new(400, r#"{"error":"invalid_grant"}"#)));

        let client = OAuthTokenClient::new(config(), Arc::new(http)).with_retry_policy(fast_retry());
        let result = client.refresh("revoked").await;
        assert!(matches!(result, Err(AuthError::RefreshRejected(_))));
    }

    #[tokio::test]
    async fn test_refresh_retries_server_errors() {
        let mut http = MockHttp::new();
        let mut seq = mockall::Sequence::new();
        http.expect_execute()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|_| Ok(HttpResponse::new(503, "unavailable")));
        http.expect_execute()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(HttpResponse::new(200, r#"{"access_token":"fresh"}"#)));

        let client = OAuthTokenClient::new(config(), Arc::new(http)).with_retry_policy(fast_retry());
        let token = client.refresh("rt").await.unwrap();
        assert_eq!(token.access_token, "fresh");
    }

    #[tokio::test]
    async fn test_refresh_gives_up_after_max_attempts() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .times(3)
            .returning(|_| Ok(HttpResponse::new(500, "boom")));

        let client = OAuthTokenClient::new(config(), Arc::new(http)).with_retry_policy(fast_retry());
        let result = client.refresh("rt").await;
        assert!(matches!(result, Err(AuthError::TokenRefreshFailed(_))));
    }

    #[tokio::test]
    async fn test_refresh_transport_error() {
        let mut http = MockHttp::new();
        http.expect_execute()
            .with(always())
            .returning(|_| Err(BridgeError::OperationFailed("offline".to_string())));

        let client = OAuthTokenClient::new(config(), Arc::new(http));
        let result = client.refresh("rt").await;
        assert!(matches!(result, Err(AuthError::TokenRefreshFailed(_))));
    }
}
