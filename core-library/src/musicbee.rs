//! # MusicBee Library Reader
//!
//! Reads the MusicBee library export and its M3U playlists.
//!
//! ## Library format
//!
//! ```xml
//! <Library>
//!   <Items>
//!     <Item FilePath="C:\Music\Artist\Album\01.flac" TrackTitle="..." Artist="..." Rating="80" ... />
//!   </Items>
//! </Library>
//! ```
//!
//! Items without a `FilePath` are dropped. Windows paths are mapped onto
//! their `/mnt/<drive>` mount and relative paths are joined to the library
//! root.
//!
//! ## Playlists
//!
//! Every `.m3u`/`.m3u8` file in the playlists directory becomes a playlist
//! named after its file stem. Only entries that exist on disk are kept.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, info, instrument, warn};

use crate::error::{LibraryError, Result};
use crate::models::Track;
use crate::normalize::{convert_windows_path, normalize_path, parse_count, parse_timestamp};
use crate::source::CatalogSource;
use crate::Playlist;

const PLAYLIST_EXTENSIONS: &[&str] = &["m3u", "m3u8"];

/// MusicBee export reader
#[derive(Debug, Clone)]
pub struct MusicBeeCatalogSource {
    library_xml: PathBuf,
    playlists_dir: Option<PathBuf>,
    library_root: PathBuf,
}

impl MusicBeeCatalogSource {
    pub fn new(library_xml: impl Into<PathBuf>, library_root: impl Into<PathBuf>) -> Self {
        Self {
            library_xml: library_xml.into(),
            playlists_dir: None,
            library_root: library_root.into(),
        }
    }

    pub fn with_playlists_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.playlists_dir = Some(dir.into());
        self
    }

    /// Parse library XML held in memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed or has no `Items` element.
    pub fn parse_library(&self, xml: &[u8]) -> Result<Vec<Track>> {
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();
        let mut saw_items = false;
        let mut tracks = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.name().as_ref() {
                    b"Items" => saw_items = true,
                    b"Item" => {
                        if let Some(track) = self.parse_item(&e)? {
                            tracks.push(track);
                        }
                    }
                    _ => {}
                },
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(LibraryError::Xml(format!(
                        "at position {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
                _ => {}
            }
            buf.clear();
        }

        if !saw_items {
            return Err(LibraryError::InvalidLibrary(
                "Items element not found".to_string(),
            ));
        }

        Ok(tracks)
    }

    fn parse_item(&self, item: &BytesStart<'_>) -> Result<Option<Track>> {
        let mut track = Track::new(PathBuf::new());
        let mut raw_path = String::new();

        for attr in item.attributes() {
            let attr = attr.map_err(|e| LibraryError::Xml(e.to_string()))?;
            let value = attr
                .unescape_value()
                .map_err(|e| LibraryError::Xml(e.to_string()))?;

            match attr.key.as_ref() {
                b"FilePath" => raw_path = value.into_owned(),
                b"TrackTitle" => track.title = value.into_owned(),
                b"Artist" => track.artist = value.into_owned(),
                b"Album" => track.album = value.into_owned(),
                b"AlbumArtist" => track.album_artist = value.into_owned(),
                b"Genre" => track.genre = value.into_owned(),
                b"Year" => track.year = parse_count(&value),
                b"TrackNo" => track.track_number = parse_count(&value),
                b"DiscNo" => track.disc_number = parse_count(&value),
                b"Rating" => track.rating = parse_count(&value).unwrap_or(0),
                b"PlayCount" => track.play_count = parse_count(&value).unwrap_or(0),
                b"DateAdded" => track.date_added = parse_timestamp(&value),
                b"DateModified" => track.date_modified = parse_timestamp(&value),
                b"LastPlayed" => track.last_played = parse_timestamp(&value),
                b"Bitrate" => track.bitrate = parse_count(&value),
                b"SampleRate" => track.sample_rate = parse_count(&value),
                b"Duration" => {
                    track.duration_seconds = value
                        .trim()
                        .parse::<f64>()
                        .ok()
                        .filter(|d| d.is_finite() && *d >= 0.0)
                        .unwrap_or(0.0)
                }
                _ => {}
            }
        }

        if raw_path.trim().is_empty() {
            return Ok(None);
        }
        track.file_path = self.resolve_library_path(&raw_path);
        Ok(Some(track))
    }

    fn resolve_library_path(&self, raw: &str) -> PathBuf {
        let path = PathBuf::from(convert_windows_path(raw.trim()));
        if path.is_absolute() {
            normalize_path(&path)
        } else {
            normalize_path(&self.library_root.join(path))
        }
    }

    /// Parse one playlist file's contents.
    ///
    /// Relative entries are tried against `playlist_dir` first, then the
    /// library root. Entries that do not exist are dropped.
    pub async fn parse_playlist(&self, content: &str, playlist_dir: &Path) -> Vec<PathBuf> {
        let mut entries = Vec::new();

        for line in content.lines() {
            let line = line.trim_start_matches('\u{feff}').trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line.starts_with("http://") || line.starts_with("https://") {
                continue;
            }

            let candidate = PathBuf::from(convert_windows_path(line));
            let resolved = if candidate.is_absolute() {
                existing(candidate).await
            } else {
                match existing(playlist_dir.join(&candidate)).await {
                    Some(path) => Some(path),
                    None => existing(self.library_root.join(&candidate)).await,
                }
            };

            match resolved {
                Some(path) => entries.push(normalize_path(&path)),
                None => debug!("Skipping missing playlist entry: {}", line),
            }
        }

        entries
    }
}

async fn existing(path: PathBuf) -> Option<PathBuf> {
    match tokio::fs::try_exists(&path).await {
        Ok(true) => Some(path),
        _ => None,
    }
}

#[async_trait]
impl CatalogSource for MusicBeeCatalogSource {
    #[instrument(skip(self), fields(path = %self.library_xml.display()))]
    async fn load_library(&self) -> Result<Vec<Track>> {
        if !tokio::fs::try_exists(&self.library_xml).await? {
            return Err(LibraryError::SourceNotFound(self.library_xml.clone()));
        }

        info!("Loading MusicBee library");
        let xml = tokio::fs::read(&self.library_xml).await?;
        let tracks = self.parse_library(&xml)?;
        info!("Loaded {} tracks from library", tracks.len());
        Ok(tracks)
    }

    #[instrument(skip(self))]
    async fn load_playlists(&self) -> Result<Vec<Playlist>> {
        let Some(dir) = &self.playlists_dir else {
            return Ok(Vec::new());
        };
        if !tokio::fs::try_exists(dir).await? {
            warn!("Playlists directory not found: {}", dir.display());
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        let mut listing = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = listing.next_entry().await? {
            let path = entry.path();
            let is_playlist = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| PLAYLIST_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
                .unwrap_or(false);
            if is_playlist {
                files.push(path);
            }
        }
        files.sort();

        let mut playlists = Vec::new();
        for path in files {
            let Some(name) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            let bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    warn!("Error reading playlist {}: {}", path.display(), e);
                    continue;
                }
            };
            let content = String::from_utf8_lossy(&bytes);
            let entries = self.parse_playlist(&content, dir).await;

            if entries.is_empty() {
                debug!("Playlist '{}' has no resolvable entries", name);
                continue;
            }
            debug!("Loaded playlist '{}' with {} tracks", name, entries.len());
            playlists.push(Playlist::new(name, entries));
        }

        info!("Loaded {} playlists", playlists.len());
        Ok(playlists)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;
    use tempfile::TempDir;

    const LIBRARY_XML: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<Library>
  <Items>
    <Item FilePath="C:\Music\Band\Album\01 Song.flac" TrackTitle="Song" Artist="Band"
          Album="Album" Genre="Rock" Year="2001" TrackNo="1/10" Rating="80"
          PlayCount="3" DateAdded="2024-01-15T10:00:00" Duration="215.4" />
    <Item TrackTitle="No path" />
    <Item FilePath="Other/Album/02 Tune.mp3" TrackTitle="Tune &amp; Co" Rating="bogus" />
  </Items>
</Library>"#;

    #[test]
    fn test_parse_library_items() {
        let source = MusicBeeCatalogSource::new("/unused.xml", "/lib");
        let tracks = source.parse_library(LIBRARY_XML.as_bytes()).unwrap();

        assert_eq!(tracks.len(), 2);

        let first = &tracks[0];
        assert_eq!(first.file_path, PathBuf::from("/mnt/c/Music/Band/Album/01 Song.flac"));
        assert_eq!(first.title, "Song");
        assert_eq!(first.genre, "Rock");
        assert_eq!(first.year, Some(2001));
        assert_eq!(first.track_number, Some(1));
        assert_eq!(first.rating, 80);
        assert_eq!(first.play_count, 3);
        assert_eq!(first.date_added.unwrap().year(), 2024);
        assert!((first.duration_seconds - 215.4).abs() < f64::EPSILON);

        let second = &tracks[1];
        assert_eq!(second.file_path, PathBuf::from("/lib/Other/Album/02 Tune.mp3"));
        assert_eq!(second.title, "Tune & Co");
        assert_eq!(second.rating, 0);
        assert!(second.date_added.is_none());
    }

    #[test]
    fn test_parse_library_requires_items() {
        let source = MusicBeeCatalogSource::new("/unused.xml", "/lib");
        let err = source.parse_library(b"<Library></Library>").unwrap_err();
        assert!(matches!(err, LibraryError::InvalidLibrary(_)));
    }

    #[tokio::test]
    async fn test_load_library_missing_file() {
        let dir = TempDir::new().unwrap();
        let source = MusicBeeCatalogSource::new(dir.path().join("missing.xml"), dir.path());
        let err = source.load_library().await.unwrap_err();
        assert!(matches!(err, LibraryError::SourceNotFound(_)));
    }

    #[tokio::test]
    async fn test_load_playlists_resolves_entries() {
        let root = TempDir::new().unwrap();
        let lib = root.path().join("lib");
        let playlists = root.path().join("playlists");
        std::fs::create_dir_all(lib.join("Band/Album")).unwrap();
        std::fs::create_dir_all(&playlists).unwrap();
        std::fs::write(lib.join("Band/Album/a.flac"), b"a").unwrap();
        std::fs::write(playlists.join("local.flac"), b"b").unwrap();

        let absolute = lib.join("Band/Album/a.flac");
        let m3u = format!(
            "#EXTM3U\n#EXTINF:100,Band - A\n{}\nlocal.flac\nBand/Album/a.flac\nhttp://radio/stream\nmissing.flac\n",
            absolute.display()
        );
        std::fs::write(playlists.join("Mix.m3u"), m3u).unwrap();
        std::fs::write(playlists.join("Empty.m3u8"), "#EXTM3U\nnothing.flac\n").unwrap();
        std::fs::write(playlists.join("notes.txt"), "ignored").unwrap();

        let source = MusicBeeCatalogSource::new(root.path().join("lib.xml"), &lib)
            .with_playlists_dir(&playlists);
        let loaded = source.load_playlists().await.unwrap();

        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].name, "Mix");
        assert_eq!(
            loaded[0].entries,
            vec![
                absolute.clone(),
                playlists.join("local.flac"),
                absolute,
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_playlists_dir_is_empty() {
        let root = TempDir::new().unwrap();
        let source = MusicBeeCatalogSource::new(root.path().join("lib.xml"), root.path())
            .with_playlists_dir(root.path().join("nope"));
        assert!(source.load_playlists().await.unwrap().is_empty());
    }
}
