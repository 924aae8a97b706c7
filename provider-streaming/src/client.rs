//! Streaming web API client
//!
//! Implements [`RemoteApiClient`] over the host [`HttpClient`].

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use bridge_traits::remote::{
    ApiResult, RemoteApiClient, RemotePage, RemotePlaybackStatus, RemoteTrack,
};
use core_async::time::sleep;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, StreamingError};
use crate::types::{
    ErrorEnvelope, PlayRequest, PlayerStateResponse, SavedTracksResponse, SearchResponse,
};

/// Default per-request timeout
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Streaming web API client
///
/// Every call carries the caller's bearer token; this type holds no
/// credentials of its own.
///
/// # Retries
///
/// 429 responses are retried after `Retry-After` (capped by the policy's
/// `max_delay`). Server errors and transport failures are retried with
/// exponential backoff, except for `POST` commands, which are not idempotent
/// (a repeated skip would skip twice).
///
/// # Example
///
/// ```ignore
/// use provider_streaming::StreamingApiClient;
/// use bridge_traits::remote::RemoteApiClient;
///
/// let client = StreamingApiClient::new(http_client, "https://api.example.com/v1");
/// let page = client.saved_tracks(&token, 0, 50).await?;
/// ```
pub struct StreamingApiClient {
    http_client: Arc<dyn HttpClient>,
    base_url: String,
    retry: RetryPolicy,
    request_timeout: Duration,
}

impl StreamingApiClient {
    pub fn new(http_client: Arc<dyn HttpClient>, base_url: impl Into<String>) -> Self {
        Self {
            http_client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry: RetryPolicy::default(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    fn request(&self, method: HttpMethod, path: &str, token: &str) -> HttpRequest {
        HttpRequest::new(method, format!("{}{}", self.base_url, path))
            .bearer_token(token)
            .header("Accept", "application/json")
            .timeout(self.request_timeout)
    }

    /// Execute API request with retry logic
    #[instrument(skip(self, request), fields(method = ?request.method, url = %request.url))]
    async fn execute_with_retry(&self, request: HttpRequest) -> Result<HttpResponse> {
        let idempotent = request.method != HttpMethod::Post;
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self.http_client.execute(request.clone()).await {
                Ok(response) if response.is_success() => {
                    debug!(status = response.status, "API request succeeded");
                    return Ok(response);
                }
                Ok(response) => {
                    let error = api_error(&response);
                    let retryable = response.status == 429
                        || (idempotent && response.is_server_error());
                    if !retryable || attempt >= self.retry.max_attempts {
                        warn!(status = response.status, attempt, "API request failed");
                        return Err(error);
                    }

                    let delay = match &error {
                        StreamingError::ApiError {
                            retry_after: Some(after),
                            ..
                        } => (*after).min(self.retry.max_delay),
                        _ => self.retry.delay_for(attempt - 1),
                    };
                    warn!(
                        status = response.status,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "API request failed, retrying"
                    );
                    sleep(delay).await;
                }
                Err(e) => {
                    if !idempotent || attempt >= self.retry.max_attempts {
                        warn!(error = %e, attempt, "API request failed");
                        return Err(e.into());
                    }

                    let delay = self.retry.delay_for(attempt - 1);
                    warn!(
                        error = %e,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        "API request failed, retrying"
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    async fn command(&self, request: HttpRequest) -> ApiResult<()> {
        self.execute_with_retry(request).await?;
        Ok(())
    }
}

/// Builds the typed error for a non-success response.
fn api_error(response: &HttpResponse) -> StreamingError {
    let body = response.text().unwrap_or_default();
    let (message, reason) = match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(envelope) => (envelope.error.message, envelope.error.reason),
        Err(_) => (body, None),
    };
    let retry_after = response
        .header("Retry-After")
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs);

    StreamingError::ApiError {
        status_code: response.status,
        message,
        reason,
        retry_after,
    }
}

fn parse<T: serde::de::DeserializeOwned>(response: &HttpResponse, what: &str) -> Result<T> {
    serde_json::from_slice(&response.body)
        .map_err(|e| StreamingError::ParseError(format!("Failed to parse {}: {}", what, e)))
}

#[async_trait]
impl RemoteApiClient for StreamingApiClient {
    #[instrument(skip(self, token))]
    async fn search(&self, token: &str, query: &str, limit: u32) -> ApiResult<Vec<RemoteTrack>> {
        let path = format!(
            "/search?q={}&type=track&limit={}",
            urlencoding::encode(query),
            limit
        );
        let response = self
            .execute_with_retry(self.request(HttpMethod::Get, &path, token))
            .await?;

        let search: SearchResponse = parse(&response, "search response")?;
        let tracks: Vec<RemoteTrack> = search.tracks.items.into_iter().map(Into::into).collect();

        debug!(results = tracks.len(), "Search completed");
        Ok(tracks)
    }

    #[instrument(skip(self, token))]
    async fn saved_tracks(
        &self,
        token: &str,
        offset: u32,
        limit: u32,
    ) -> ApiResult<RemotePage<RemoteTrack>> {
        let path = format!("/me/tracks?offset={}&limit={}", offset, limit);
        let response = self
            .execute_with_retry(self.request(HttpMethod::Get, &path, token))
            .await?;

        let page: SavedTracksResponse = parse(&response, "saved tracks")?;
        let items: Vec<RemoteTrack> = page.items.into_iter().map(|i| i.track.into()).collect();

        info!(count = items.len(), offset, total = ?page.total, "Listed saved tracks");
        Ok(RemotePage {
            items,
            offset: page.offset,
            total: page.total,
        })
    }

    #[instrument(skip(self, token))]
    async fn playback_status(&self, token: &str) -> ApiResult<Option<RemotePlaybackStatus>> {
        let response = self
            .execute_with_retry(self.request(HttpMethod::Get, "/me/player", token))
            .await?;

        // 204: no device is active for this account
        if response.status == 204 || response.body.is_empty() {
            return Ok(None);
        }

        let state: PlayerStateResponse = parse(&response, "player state")?;
        Ok(Some(state.into()))
    }

    #[instrument(skip(self, token))]
    async fn play(&self, token: &str, uri: &str, position_ms: u64) -> ApiResult<()> {
        let body = PlayRequest {
            uris: [uri],
            position_ms,
        };
        let request = self
            .request(HttpMethod::Put, "/me/player/play", token)
            .json(&body)
            .map_err(StreamingError::from)?;
        self.command(request).await
    }

    #[instrument(skip(self, token))]
    async fn pause(&self, token: &str) -> ApiResult<()> {
        self.command(self.request(HttpMethod::Put, "/me/player/pause", token))
            .await
    }

    #[instrument(skip(self, token))]
    async fn resume(&self, token: &str) -> ApiResult<()> {
        self.command(self.request(HttpMethod::Put, "/me/player/play", token))
            .await
    }

    #[instrument(skip(self, token))]
    async fn seek(&self, token: &str, position_ms: u64) -> ApiResult<()> {
        let path = format!("/me/player/seek?position_ms={}", position_ms);
        self.command(self.request(HttpMethod::Put, &path, token))
            .await
    }

    #[instrument(skip(self, token))]
    async fn skip_next(&self, token: &str) -> ApiResult<()> {
        self.command(self.request(HttpMethod::Post, "/me/player/next", token))
            .await
    }

    #[instrument(skip(self, token))]
    async fn skip_previous(&self, token: &str) -> ApiResult<()> {
        self.command(self.request(HttpMethod::Post, "/me/player/previous", token))
            .await
    }
}
