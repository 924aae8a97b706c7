//! # Metadata Module
//!
//! Reads tags from local audio files for the library's file import.
//!
//! ## Overview
//!
//! This module handles:
//! - Audio tag extraction (ID3, Vorbis, MP4, FLAC) via `lofty`
//! - Duration from the audio stream properties
//! - Title/artist guessed from the file name when a file carries no tags

pub mod error;
pub mod extractor;
pub mod filename;

pub use error::{MetadataError, Result};
pub use extractor::{ExtractedMetadata, LoftyMetadataExtractor};
pub use filename::tags_from_file_name;
