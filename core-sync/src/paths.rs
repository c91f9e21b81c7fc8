//! # Path Translator
//!
//! Maps absolute source-library paths to device paths.
//!
//! Files under the library root keep their relative layout. Anything else
//! goes through [`fallback_layout_path`], which rebuilds an
//! `Artist/Album/File` path from the two parent directory names. That
//! heuristic assumes a `Library/Artist/Album/File` layout and produces odd
//! destinations for flatter or deeper trees.
//!
//! Translation is pure path manipulation; nothing here touches the
//! filesystem or the device.

use core_library::normalize_path;
use std::path::{Component, Path, PathBuf};

/// Directory under the device music root that receives playlists
pub const PLAYLISTS_DIR: &str = "Playlists";

/// Which rule produced a device path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationRule {
    UnderLibraryRoot,
    ArtistAlbumFallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslatedPath {
    /// Forward-slash path relative to the device music root
    pub relative: String,
    pub rule: TranslationRule,
}

#[derive(Debug, Clone)]
pub struct PathTranslator {
    library_root: PathBuf,
    device_root: String,
}

impl PathTranslator {
    pub fn new(library_root: impl AsRef<Path>, device_root: impl Into<String>) -> Self {
        Self {
            library_root: normalize_path(library_root.as_ref()),
            device_root: device_root.into(),
        }
    }

    pub fn library_root(&self) -> &Path {
        &self.library_root
    }

    pub fn device_root(&self) -> &str {
        &self.device_root
    }

    /// Device path relative to the music root, or `None` when the caller
    /// has to skip the file.
    pub fn to_device_path(&self, source: &Path) -> Option<String> {
        self.translate(source).map(|translated| translated.relative)
    }

    /// Like [`to_device_path`](Self::to_device_path), also reporting the
    /// rule that applied.
    pub fn translate(&self, source: &Path) -> Option<TranslatedPath> {
        let source = normalize_path(source);

        if let Ok(relative) = source.strip_prefix(&self.library_root) {
            let relative = join_normal_components(relative);
            if relative.is_empty() {
                return None;
            }
            return Some(TranslatedPath {
                relative,
                rule: TranslationRule::UnderLibraryRoot,
            });
        }

        fallback_layout_path(&source).map(|relative| TranslatedPath {
            relative,
            rule: TranslationRule::ArtistAlbumFallback,
        })
    }

    /// Absolute device path for a path relative to the music root.
    pub fn device_absolute(&self, relative: &str) -> String {
        format!(
            "{}/{}",
            self.device_root.trim_end_matches('/'),
            relative.trim_start_matches('/')
        )
    }

    /// Absolute device directory holding playlists.
    pub fn playlists_dir(&self) -> String {
        self.device_absolute(PLAYLISTS_DIR)
    }
}

/// Rebuild `Artist/Album/File` from the two parent directory names.
///
/// Returns `None` when the path has no file name or neither parent
/// directory has a name (e.g. `/song.flac`).
pub fn fallback_layout_path(source: &Path) -> Option<String> {
    let file_name = source.file_name()?.to_string_lossy().into_owned();
    let album_dir = source.parent();
    let album = album_dir.and_then(Path::file_name);
    let artist = album_dir.and_then(Path::parent).and_then(Path::file_name);

    if album.is_none() && artist.is_none() {
        return None;
    }

    let mut parts: Vec<String> = [artist, album]
        .into_iter()
        .flatten()
        .map(|name| name.to_string_lossy().into_owned())
        .collect();
    parts.push(file_name);
    Some(parts.join("/"))
}

fn join_normal_components(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().replace('\\', "/")),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
