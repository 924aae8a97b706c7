//! # Authentication Module
//!
//! Credential manager for the streaming-service session.
//!
//! ## Overview
//!
//! This module acquires credentials through an OAuth 2.0 authorization code
//! flow with PKCE, persists them in the platform secure store and refreshes
//! the access token before it expires.
//!
//! ## Features
//!
//! - Authorization URL and code exchange with PKCE (S256)
//! - Refresh ahead of expiry, shared between concurrent callers
//! - Secure credential storage via [`bridge_traits::storage::SecureStore`]
//! - Auth state observation and event emission

pub mod error;
pub mod manager;
pub mod oauth;
pub mod token_store;
pub mod types;

pub use error::{AuthError, Result};
pub use manager::{AccessTokenProvider, SessionAuthenticator};
pub use oauth::{OAuthConfig, OAuthTokenClient, PkceVerifier, TokenClient, TokenResponse};
pub use token_store::TokenStore;
pub use types::{AuthState, AuthorizationRequest, Credentials};
