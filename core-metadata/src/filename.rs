//! File-name based tag guessing
//!
//! Untagged files are commonly named `"Artist - Title.ext"`, optionally with
//! a leading track number (`"03 - Artist - Title"`, `"03. Title"`).

use core_library::ExtractedTags;
use std::path::Path;

/// Guess title and artist from a file name.
///
/// # Examples
///
/// ```
/// use core_metadata::tags_from_file_name;
/// use std::path::Path;
///
/// let tags = tags_from_file_name(Path::new("/music/Nina Simone - Sinnerman.flac"));
/// assert_eq!(tags.artist.as_deref(), Some("Nina Simone"));
/// assert_eq!(tags.title.as_deref(), Some("Sinnerman"));
/// ```
pub fn tags_from_file_name(path: &Path) -> ExtractedTags {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let stem = strip_track_number(stem.trim());

    let mut parts: Vec<&str> = stem
        .split(" - ")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let title = parts.pop().map(str::to_string);
    let artist = if parts.is_empty() {
        None
    } else {
        Some(parts.join(" - "))
    };

    ExtractedTags {
        title,
        artist,
        ..Default::default()
    }
}

fn strip_track_number(stem: &str) -> &str {
    let digits = stem.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 || digits > 3 {
        return stem;
    }
    let rest = &stem[digits..];
    let trimmed = rest.trim_start_matches(['.', '-', '_', ' '].as_slice());
    if trimmed.len() == rest.len() || trimmed.is_empty() {
        // "1999.mp3" or "45rpm" are titles, not numbered files.
        return stem;
    }
    trimmed
}
