//! # Repository Pattern Implementation
//!
//! Repository traits for library data access plus an in-memory store.
//!
//! ## Architecture
//!
//! - Traits define the interface for each repository
//! - The host may persist through any key-value store by implementing them
//! - [`InMemoryLibraryStore`] implements both traits and is the default
//! - All operations return `Result<T>` for error handling
//!
//! ## Available Repositories
//!
//! - `TrackRepository` - Tracks from both sources
//! - `PlaylistRepository` - User playlists referencing tracks by id

pub mod memory;
pub mod playlist;
pub mod track;

pub use memory::InMemoryLibraryStore;
pub use playlist::PlaylistRepository;
pub use track::TrackRepository;
