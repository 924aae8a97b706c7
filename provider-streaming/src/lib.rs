//! # Streaming Service Provider
//!
//! Implements [`RemoteApiClient`](bridge_traits::remote::RemoteApiClient)
//! for the streaming service's web API.
//!
//! ## Overview
//!
//! This module provides:
//! - Saved-track listing and track search
//! - Playback status of the active device
//! - Direct transport commands (play, pause, resume, seek, skip)
//! - Rate limiting and exponential backoff for transient failures
//! - Typed failure mapping, including the service's "no active device" reply

pub mod client;
pub mod error;
pub mod types;

pub use client::StreamingApiClient;
pub use error::{Result, StreamingError};
