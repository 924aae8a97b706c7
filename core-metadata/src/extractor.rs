//! Audio Tag Extraction
//!
//! This module extracts metadata from audio files using the `lofty` crate.
//! It supports ID3v2, Vorbis Comments, MP4 tags, and FLAC.
//!
//! ## Overview
//!
//! - Extracts title, artist, album, genre, year and track number
//! - Reads the duration from the audio stream properties
//! - Normalizes text (trims and collapses whitespace, drops control characters)
//! - Falls back to the file name when a file carries no tags
//!
//! ## Usage
//!
//! ```ignore
//! use core_metadata::LoftyMetadataExtractor;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let extractor = LoftyMetadataExtractor::new();
//! let metadata = extractor.extract_from_file(Path::new("song.mp3")).await?;
//!
//! println!("Title: {}", metadata.title.unwrap_or_default());
//! println!("Duration: {:.1}s", metadata.duration_secs);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use core_async::fs;
use core_library::{ExtractedTags, MetadataExtractor};
use lofty::config::ParseOptions;
use lofty::file::{AudioFile, TaggedFileExt};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{MetadataError, Result};
use crate::filename::tags_from_file_name;

/// Extracted metadata from an audio file
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractedMetadata {
    /// Track title (normalized)
    pub title: Option<String>,
    /// Primary artist (normalized)
    pub artist: Option<String>,
    /// Album name (normalized)
    pub album: Option<String>,
    /// Album artist (for compilations, normalized)
    pub album_artist: Option<String>,
    /// Release year
    pub year: Option<i32>,
    /// Track number on album
    pub track_number: Option<u32>,
    /// Genre classification
    pub genre: Option<String>,

    /// Duration in seconds
    pub duration_secs: f64,
    /// Audio format/codec (e.g., "Mpeg", "Flac")
    pub format: String,
    /// MIME type
    pub mime_type: String,
    /// File size in bytes
    pub file_size: u64,

    /// The file had no readable tag; text fields come from the file name
    pub from_file_name: bool,
}

impl From<ExtractedMetadata> for ExtractedTags {
    fn from(metadata: ExtractedMetadata) -> Self {
        ExtractedTags {
            title: metadata.title,
            artist: metadata.artist.or(metadata.album_artist),
            album: metadata.album,
            genre: metadata.genre,
            year: metadata.year,
            duration_secs: (metadata.duration_secs > 0.0).then_some(metadata.duration_secs),
        }
    }
}

/// Audio metadata extractor backed by `lofty`.
pub struct LoftyMetadataExtractor {
    parse_options: ParseOptions,
}

impl LoftyMetadataExtractor {
    /// Create a new metadata extractor with default settings
    pub fn new() -> Self {
        Self {
            parse_options: ParseOptions::new(),
        }
    }

    /// Create extractor with custom parse options
    pub fn with_options(parse_options: ParseOptions) -> Self {
        Self { parse_options }
    }

    /// Extract metadata from an audio file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - File cannot be opened or read
    /// - File format is unsupported or the stream cannot be parsed
    pub async fn extract_from_file(&self, path: &Path) -> Result<ExtractedMetadata> {
        debug!(path = %path.display(), "Extracting metadata");

        let file_data = fs::read(path)
            .await
            .map_err(|e| MetadataError::ExtractionFailed(format!("Failed to read file: {}", e)))?;
        let file_size = file_data.len() as u64;

        let tagged_file = Probe::new(std::io::Cursor::new(&file_data))
            .options(self.parse_options)
            .guess_file_type()
            .map_err(|e| MetadataError::ExtractionFailed(format!("Failed to probe file: {}", e)))?
            .read()
            .map_err(|e| MetadataError::UnsupportedFormat(format!("Failed to parse file: {}", e)))?;

        let file_type = tagged_file.file_type();
        let duration_secs = tagged_file.properties().duration().as_secs_f64();

        let tag = tagged_file
            .primary_tag()
            .or_else(|| tagged_file.first_tag());

        let metadata = match tag {
            Some(tag) => ExtractedMetadata {
                title: tag.title().map(|s| normalize_text(s.as_ref())),
                artist: tag.artist().map(|s| normalize_text(s.as_ref())),
                album: tag.album().map(|s| normalize_text(s.as_ref())),
                album_artist: tag.get_string(&ItemKey::AlbumArtist).map(normalize_text),
                year: tag.year().map(|y| y as i32),
                track_number: tag.track(),
                genre: tag.genre().map(|s| normalize_text(s.as_ref())),
                duration_secs,
                format: format!("{:?}", file_type),
                mime_type: file_type_to_mime_type(file_type),
                file_size,
                from_file_name: false,
            },
            None => {
                warn!(path = %path.display(), "No tags found, using file name");
                let guessed = tags_from_file_name(path);
                ExtractedMetadata {
                    title: guessed.title,
                    artist: guessed.artist,
                    album: None,
                    album_artist: None,
                    year: None,
                    track_number: None,
                    genre: None,
                    duration_secs,
                    format: format!("{:?}", file_type),
                    mime_type: file_type_to_mime_type(file_type),
                    file_size,
                    from_file_name: true,
                }
            }
        };

        Ok(metadata)
    }
}

impl Default for LoftyMetadataExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataExtractor for LoftyMetadataExtractor {
    async fn extract(&self, path: &Path) -> core_library::Result<ExtractedTags> {
        let metadata = self.extract_from_file(path).await?;
        Ok(metadata.into())
    }
}

/// Normalize text metadata
///
/// - Trims leading/trailing whitespace
/// - Normalizes consecutive whitespace to single space
/// - Removes control characters
fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .filter(|c| !c.is_control())
        .collect()
}

fn file_type_to_mime_type(file_type: lofty::file::FileType) -> String {
    use lofty::file::FileType;
    match file_type {
        FileType::Aac => "audio/aac",
        FileType::Aiff => "audio/aiff",
        FileType::Ape => "audio/ape",
        FileType::Flac => "audio/flac",
        FileType::Mpeg => "audio/mpeg",
        FileType::Mp4 => "audio/mp4",
        FileType::Mpc => "audio/musepack",
        FileType::Opus => "audio/opus",
        FileType::Vorbis => "audio/vorbis",
        FileType::Speex => "audio/speex",
        FileType::Wav => "audio/wav",
        FileType::WavPack => "audio/wavpack",
        _ => "application/octet-stream",
    }
    .to_string()
}
