use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Credentials for the streaming-service session.
///
/// `expires_at` is a Unix timestamp in seconds. Token values are redacted in
/// the `Debug` output.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: i64,
}

impl Credentials {
    /// Build credentials from a token response received at `now`.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_auth::Credentials;
    ///
    /// let creds = Credentials::issued("access".into(), Some("refresh".into()), 3600, 1_000);
    /// assert_eq!(creds.expires_at(), 4_600);
    /// ```
    pub fn issued(
        access_token: String,
        refresh_token: Option<String>,
        expires_in_secs: i64,
        now: i64,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: now + expires_in_secs,
        }
    }

    pub fn from_parts(access_token: String, refresh_token: Option<String>, expires_at: i64) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }

    pub fn expires_at(&self) -> i64 {
        self.expires_at
    }

    /// Whether the access token has already expired at `now`.
    pub fn is_expired(&self, now: i64) -> bool {
        now >= self.expires_at
    }

    /// Whether the access token expires within `margin` of `now`.
    ///
    /// A token inside the margin must be refreshed before it is sent.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_auth::Credentials;
    /// use std::time::Duration;
    ///
    /// let creds = Credentials::from_parts("a".into(), None, 1_100);
    /// assert!(creds.expires_within(Duration::from_secs(60), 1_050));
    /// assert!(!creds.expires_within(Duration::from_secs(60), 1_000));
    /// ```
    pub fn expires_within(&self, margin: Duration, now: i64) -> bool {
        now + margin.as_secs() as i64 >= self.expires_at
    }

    /// Seconds remaining until expiry, or zero once expired.
    pub fn seconds_until_expiry(&self, now: i64) -> i64 {
        (self.expires_at - now).max(0)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Observable state of the session authenticator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthState {
    Unauthenticated,
    /// Credentials are held; `expires_at` is the access token expiry.
    Authenticated { expires_at: i64 },
    /// A refresh request is in flight.
    Refreshing,
}

impl AuthState {
    pub fn is_authenticated(&self) -> bool {
        matches!(
            self,
            AuthState::Authenticated { .. } | AuthState::Refreshing
        )
    }
}

impl fmt::Display for AuthState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthState::Unauthenticated => write!(f, "Unauthenticated"),
            AuthState::Authenticated { expires_at } => {
                write!(f, "Authenticated (expires at {})", expires_at)
            }
            AuthState::Refreshing => write!(f, "Refreshing"),
        }
    }
}

/// Data the UI needs to start interactive authorization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    /// URL the user must open.
    pub url: String,
    /// Opaque value that must come back with the authorization code.
    pub state: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_tokens() {
        let creds = Credentials::from_parts("secret-access".into(), Some("secret-refresh".into()), 10);
        let debug = format!("{:?}", creds);
        assert!(!debug.contains("secret-access"));
        assert!(!debug.contains("secret-refresh"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_expiry_checks() {
        let creds = Credentials::from_parts("a".into(), None, 1_000);
        assert!(!creds.is_expired(999));
        assert!(creds.is_expired(1_000));
        assert!(creds.expires_within(Duration::from_secs(60), 940));
        assert!(!creds.expires_within(Duration::from_secs(60), 939));
        assert_eq!(creds.seconds_until_expiry(900), 100);
        assert_eq!(creds.seconds_until_expiry(2_000), 0);
    }

    #[test]
    fn test_auth_state_display() {
        assert!(!AuthState::Unauthenticated.is_authenticated());
        assert!(AuthState::Refreshing.is_authenticated());
        assert_eq!(
            AuthState::Authenticated { expires_at: 5 }.to_string(),
            "Authenticated (expires at 5)"
        );
    }
}
