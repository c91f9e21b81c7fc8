//! Audio Tag Access
//!
//! [`TagAccess`] implementation backed by the `lofty` crate. Supports ID3v2,
//! Vorbis Comments, MP4 and FLAC tags.
//!
//! ## Overview
//!
//! - Reads tag fields into a flat attribute map
//! - Extracts embedded artwork, preferring the front cover
//! - Embeds resized JPEG artwork as the front cover
//! - Computes size+mtime fingerprints for change detection
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_traits::TagAccess;
//! use core_metadata::extractor::LoftyTagAccess;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let tags = LoftyTagAccess::new(1000);
//! let metadata = tags.read_metadata(Path::new("song.flac")).await?;
//! println!("Title: {}", metadata.get("title").cloned().unwrap_or_default());
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::TagAccess;
use bytes::Bytes;
use lofty::config::{ParseOptions, WriteOptions};
use lofty::file::{AudioFile, TaggedFile, TaggedFileExt};
use lofty::picture::{MimeType, Picture, PictureType};
use lofty::probe::Probe;
use lofty::tag::{Accessor, ItemKey, Tag};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::artwork::{resize_artwork, DEFAULT_ARTWORK_SIZE};
use crate::error::{MetadataError, Result};
use crate::fingerprint::fingerprint_file;

/// File extensions the tag layer handles.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["mp3", "flac", "m4a", "aac", "ogg", "opus", "wma"];

/// Whether `path` has a supported audio extension (case-insensitive).
pub fn is_supported_audio(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| SUPPORTED_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Lofty-backed tag reader/writer
#[derive(Debug, Clone)]
pub struct LoftyTagAccess {
    /// Longest edge for embedded artwork
    artwork_size: u32,
    /// Parse options for lofty
    parse_options: ParseOptions,
}

impl LoftyTagAccess {
    pub fn new(artwork_size: u32) -> Self {
        Self {
            artwork_size,
            parse_options: ParseOptions::new(),
        }
    }

    pub fn artwork_size(&self) -> u32 {
        self.artwork_size
    }

    async fn probe(&self, path: &Path) -> Result<TaggedFile> {
        if !is_supported_audio(path) {
            return Err(MetadataError::UnsupportedFormat(path.display().to_string()));
        }

        let file_data = tokio::fs::read(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MetadataError::FileNotFound(path.display().to_string())
            } else {
                MetadataError::ExtractionFailed(format!("Failed to read file: {}", e))
            }
        })?;

        Probe::new(std::io::Cursor::new(file_data))
            .options(self.parse_options)
            .guess_file_type()
            .map_err(|e| MetadataError::ExtractionFailed(format!("Failed to probe file: {}", e)))?
            .read()
            .map_err(|e| MetadataError::ExtractionFailed(format!("Failed to parse file: {}", e)))
    }

    /// Collect tag fields and stream properties into a flat map.
    pub async fn extract_fields(&self, path: &Path) -> Result<HashMap<String, String>> {
        debug!("Reading tags from: {}", path.display());
        let tagged_file = self.probe(path).await?;
        let mut fields = HashMap::new();

        let properties = tagged_file.properties();
        fields.insert(
            "duration".to_string(),
            properties.duration().as_secs_f64().to_string(),
        );
        if let Some(bitrate) = properties.audio_bitrate() {
            fields.insert("bitrate".to_string(), bitrate.to_string());
        }
        if let Some(sample_rate) = properties.sample_rate() {
            fields.insert("sample_rate".to_string(), sample_rate.to_string());
        }

        let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) else {
            return Ok(fields);
        };

        let mut put = |key: &str, value: Option<String>| {
            if let Some(value) = value.map(|v| normalize_text(&v)).filter(|v| !v.is_empty()) {
                fields.insert(key.to_string(), value);
            }
        };
        put("title", tag.title().map(|s| s.to_string()));
        put("artist", tag.artist().map(|s| s.to_string()));
        put("album", tag.album().map(|s| s.to_string()));
        put(
            "album_artist",
            tag.get_string(&ItemKey::AlbumArtist).map(str::to_string),
        );
        put("genre", tag.genre().map(|s| s.to_string()));
        put("year", tag.year().map(|y| y.to_string()));
        put("track_number", tag.track().map(|n| n.to_string()));
        put("disc_number", tag.disk().map(|n| n.to_string()));

        Ok(fields)
    }

    /// Front cover if present, otherwise the first picture of any type.
    pub async fn front_cover(&self, path: &Path) -> Result<Option<Bytes>> {
        let tagged_file = self.probe(path).await?;
        let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) else {
            return Ok(None);
        };

        let pictures = tag.pictures();
        let picture = pictures
            .iter()
            .find(|pic| pic.pic_type() == PictureType::CoverFront)
            .or_else(|| pictures.first());

        Ok(picture
            .filter(|pic| !pic.data().is_empty())
            .map(|pic| Bytes::copy_from_slice(pic.data())))
    }

    /// Resize `image` and store it as the file's only front cover.
    pub async fn replace_front_cover(&self, path: &Path, image: &[u8]) -> Result<()> {
        if !is_supported_audio(path) {
            return Err(MetadataError::UnsupportedFormat(path.display().to_string()));
        }

        let jpeg = resize_artwork(image, self.artwork_size)?;
        let path: PathBuf = path.to_path_buf();

        tokio::task::spawn_blocking(move || write_front_cover(&path, jpeg))
            .await
            .map_err(|e| MetadataError::WriteFailed(format!("Tag writer task failed: {}", e)))?
    }
}

impl Default for LoftyTagAccess {
    fn default() -> Self {
        Self::new(DEFAULT_ARTWORK_SIZE)
    }
}

fn write_front_cover(path: &Path, jpeg: Vec<u8>) -> Result<()> {
    let mut tagged_file = lofty::read_from_path(path)
        .map_err(|e| MetadataError::ExtractionFailed(format!("Failed to parse file: {}", e)))?;

    if tagged_file.primary_tag().is_none() {
        let tag_type = tagged_file.primary_tag_type();
        tagged_file.insert_tag(Tag::new(tag_type));
    }
    let tag = tagged_file
        .primary_tag_mut()
        .ok_or_else(|| MetadataError::WriteFailed("No writable tag".to_string()))?;

    tag.remove_picture_type(PictureType::CoverFront);
    tag.push_picture(Picture::new_unchecked(
        PictureType::CoverFront,
        Some(MimeType::Jpeg),
        None,
        jpeg,
    ));

    tagged_file
        .save_to_path(path, WriteOptions::default())
        .map_err(|e| MetadataError::WriteFailed(e.to_string()))
}

/// Normalize text metadata
///
/// - Trims leading/trailing whitespace
/// - Normalizes consecutive whitespace to single space
/// - Removes null bytes and control characters
fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .filter(|c| !c.is_control())
        .collect()
}

#[async_trait]
impl TagAccess for LoftyTagAccess {
    async fn read_metadata(&self, path: &Path) -> BridgeResult<HashMap<String, String>> {
        match self.extract_fields(path).await {
            Ok(fields) => Ok(fields),
            Err(MetadataError::ExtractionFailed(reason)) => {
                warn!("No readable tags in {}: {}", path.display(), reason);
                Ok(HashMap::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn extract_artwork(&self, path: &Path) -> BridgeResult<Option<Bytes>> {
        Ok(self.front_cover(path).await?)
    }

    async fn embed_artwork(&self, path: &Path, image: Bytes) -> BridgeResult<()> {
        Ok(self.replace_front_cover(path, &image).await?)
    }

    async fn content_fingerprint(&self, path: &Path) -> BridgeResult<Option<String>> {
        match fingerprint_file(path).await {
            Ok(fp) => Ok(Some(fp.digest)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => {
                warn!("Cannot fingerprint {}: {}", path.display(), e);
                Err(BridgeError::Io(e))
            }
        }
    }
}
