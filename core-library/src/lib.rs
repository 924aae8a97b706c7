//! # Library Management Module
//!
//! Owns the track and playlist collections and the pipelines that fill them.
//!
//! ## Overview
//!
//! This module manages:
//! - Track and playlist domain models, with tracks from local files and from
//!   the streaming service side by side
//! - Repository traits for persistence and an in-memory implementation
//! - Idempotent imports from the file readiness provider and the remote catalog
//! - Playlist editing and track search

pub mod error;
pub mod import;
pub mod manager;
pub mod models;
pub mod repositories;

pub use error::{LibraryError, Result};
pub use import::{ExtractedTags, ImportSummary, MetadataExtractor};
pub use manager::{LibraryManager, RemoteCatalog, TrackMetadataUpdate};
pub use models::{
    LocalResourceHandle, Playlist, PlaylistId, RemoteResourceId, ResourceHandle, Track, TrackId,
    TrackSource,
};
pub use repositories::{InMemoryLibraryStore, PlaylistRepository, TrackRepository};
