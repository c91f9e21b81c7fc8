//! # Track Catalog
//!
//! In-memory index of the tracks and playlists loaded from a library source.
//!
//! ## Overview
//!
//! The catalog is keyed by normalised absolute path. Inserting a second
//! track with the same path replaces the first in place, so each path maps
//! to exactly one track and catalog order stays stable.
//!
//! Playlist entries and library paths are produced by different tools and
//! do not always agree on the directory prefix. [`Catalog::resolve_entry`]
//! therefore falls back to a file-name match when the exact path is
//! unknown. The fallback picks the first track in catalog order and can
//! match the wrong file when two tracks share a name.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::Result;
use crate::models::{file_name_of, Playlist, Track};
use crate::normalize::normalize_path;
use crate::source::CatalogSource;

/// Read-only index over tracks and playlists
#[derive(Debug, Default, Clone)]
pub struct Catalog {
    tracks: Vec<Track>,
    by_path: HashMap<PathBuf, usize>,
    by_file_name: HashMap<String, usize>,
    playlists: Vec<Playlist>,
    by_playlist_name: HashMap<String, usize>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from already-loaded parts.
    pub fn from_parts(tracks: Vec<Track>, playlists: Vec<Playlist>) -> Self {
        let mut catalog = Self::new();
        for track in tracks {
            catalog.insert_track(track);
        }
        for playlist in playlists {
            catalog.insert_playlist(playlist);
        }
        catalog
    }

    /// Load tracks and playlists from `source`.
    ///
    /// A playlist failure is logged and leaves the catalog without playlists;
    /// only the library itself is required.
    ///
    /// # Errors
    ///
    /// Returns an error if the library cannot be loaded.
    pub async fn load(source: &dyn CatalogSource) -> Result<Self> {
        let tracks = source.load_library().await?;
        let playlists = match source.load_playlists().await {
            Ok(playlists) => playlists,
            Err(e) => {
                warn!("Playlists unavailable, playlist criteria will match nothing: {}", e);
                Vec::new()
            }
        };

        let catalog = Self::from_parts(tracks, playlists);
        info!(
            "Catalog ready: {} tracks, {} playlists",
            catalog.len(),
            catalog.playlists.len()
        );
        Ok(catalog)
    }

    /// Insert a track, replacing any existing track with the same path.
    ///
    /// Returns `false` if the track has no path and was rejected.
    pub fn insert_track(&mut self, mut track: Track) -> bool {
        if track.file_path.as_os_str().is_empty() {
            return false;
        }
        track.file_path = normalize_path(&track.file_path);

        if let Some(&index) = self.by_path.get(&track.file_path) {
            debug!("Replacing duplicate catalog entry: {}", track.file_path.display());
            self.tracks[index] = track;
            return true;
        }

        let index = self.tracks.len();
        self.by_path.insert(track.file_path.clone(), index);
        self.by_file_name.entry(track.file_name()).or_insert(index);
        self.tracks.push(track);
        true
    }

    /// Insert a playlist, replacing any existing playlist with the same name.
    pub fn insert_playlist(&mut self, playlist: Playlist) {
        match self.by_playlist_name.get(&playlist.name) {
            Some(&index) => self.playlists[index] = playlist,
            None => {
                self.by_playlist_name
                    .insert(playlist.name.clone(), self.playlists.len());
                self.playlists.push(playlist);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    /// All tracks in catalog order.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// All playlists in load order.
    pub fn playlists(&self) -> &[Playlist] {
        &self.playlists
    }

    pub fn playlist(&self, name: &str) -> Option<&Playlist> {
        self.by_playlist_name
            .get(name)
            .map(|&index| &self.playlists[index])
    }

    /// Exact lookup by (normalised) path.
    pub fn track(&self, path: &Path) -> Option<&Track> {
        self.by_path
            .get(&normalize_path(path))
            .map(|&index| &self.tracks[index])
    }

    /// First track in catalog order whose file name equals `file_name`.
    pub fn find_by_file_name(&self, file_name: &str) -> Option<&Track> {
        self.by_file_name
            .get(file_name)
            .map(|&index| &self.tracks[index])
    }

    /// Resolve a playlist entry: exact path first, then file name.
    pub fn resolve_entry(&self, path: &Path) -> Option<&Track> {
        self.track(path).or_else(|| {
            let name = file_name_of(path);
            if name.is_empty() {
                return None;
            }
            let found = self.find_by_file_name(&name);
            if let Some(track) = found {
                debug!(
                    "Matched {} to {} by file name",
                    path.display(),
                    track.file_path.display()
                );
            }
            found
        })
    }
}
