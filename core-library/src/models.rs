//! Domain models for the music library
//!
//! Tracks and playlists as exported by the desktop library. Both are created
//! once at load time and treated as read-only for the rest of a sync run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// =============================================================================
// Domain Models
// =============================================================================

/// Music track with library metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Absolute source path; identity key within the catalog
    pub file_path: PathBuf,

    // Metadata
    /// Track title
    pub title: String,
    /// Track artist
    pub artist: String,
    /// Album name
    pub album: String,
    /// Album artist (for compilations)
    pub album_artist: String,
    /// Music genre
    pub genre: String,
    /// Release year
    pub year: Option<u32>,
    /// Track position on album
    pub track_number: Option<u32>,
    /// Disc number for multi-disc albums
    pub disc_number: Option<u32>,

    // Usage
    /// User rating as stored by the library
    pub rating: u32,
    /// Number of plays
    pub play_count: u32,

    // Timestamps
    pub date_added: Option<DateTime<Utc>>,
    pub date_modified: Option<DateTime<Utc>>,
    pub last_played: Option<DateTime<Utc>>,

    // Audio properties
    /// Duration in seconds
    pub duration_seconds: f64,
    /// Bitrate in kbps
    pub bitrate: Option<u32>,
    /// Sample rate in Hz
    pub sample_rate: Option<u32>,
}

impl Track {
    /// Create a track with only its path set.
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            title: String::new(),
            artist: String::new(),
            album: String::new(),
            album_artist: String::new(),
            genre: String::new(),
            year: None,
            track_number: None,
            disc_number: None,
            rating: 0,
            play_count: 0,
            date_added: None,
            date_modified: None,
            last_played: None,
            duration_seconds: 0.0,
            bitrate: None,
            sample_rate: None,
        }
    }

    /// File name component of the source path, lossily decoded.
    pub fn file_name(&self) -> String {
        file_name_of(&self.file_path)
    }

    /// Title for display, falling back to the file name.
    pub fn display_title(&self) -> String {
        if self.title.trim().is_empty() {
            self.file_name()
        } else {
            self.title.clone()
        }
    }

    /// Artist for display, falling back to `"Unknown Artist"`.
    pub fn display_artist(&self) -> &str {
        if self.artist.trim().is_empty() {
            "Unknown Artist"
        } else {
            &self.artist
        }
    }

    /// Validate track data
    pub fn validate(&self) -> Result<(), String> {
        if self.file_path.as_os_str().is_empty() {
            return Err("Track file path cannot be empty".to_string());
        }

        if !self.duration_seconds.is_finite() || self.duration_seconds < 0.0 {
            return Err(format!(
                "Track duration {} must be a non-negative number",
                self.duration_seconds
            ));
        }

        Ok(())
    }
}

/// Named, ordered list of track paths
///
/// Entries may repeat; order is significant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Playlist {
    /// Playlist name (source file stem)
    pub name: String,
    /// Member paths in playlist order
    pub entries: Vec<PathBuf>,
}

impl Playlist {
    pub fn new(name: impl Into<String>, entries: Vec<PathBuf>) -> Self {
        Self {
            name: name.into(),
            entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub(crate) fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_fallbacks() {
        let mut track = Track::new("/lib/Rock/Song.flac");
        assert_eq!(track.display_title(), "Song.flac");
        assert_eq!(track.display_artist(), "Unknown Artist");

        track.title = "Song".to_string();
        track.artist = "Band".to_string();
        assert_eq!(track.display_title(), "Song");
        assert_eq!(track.display_artist(), "Band");
    }

    #[test]
    fn test_track_validate() {
        assert!(Track::new("/lib/a.flac").validate().is_ok());
        assert!(Track::new("").validate().is_err());

        let mut negative = Track::new("/lib/a.flac");
        negative.duration_seconds = -1.0;
        assert!(negative.validate().is_err());
    }
}
