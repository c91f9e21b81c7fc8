//! # Playlist Synthesizer
//!
//! Regenerates extended M3U playlists that reference device paths.
//!
//! ## Overview
//!
//! Only tracks that belong to the source playlist *and* to the current
//! transfer set are written, so a generated playlist never points at a file
//! this run did not place on the device. Tracks the [`PathTranslator`]
//! cannot map are left out.
//!
//! ```text
//! #EXTM3U
//! #EXTINF:215,Queen - Mustapha
//! Queen/Jazz/01 - Mustapha.flac
//! ```

use crate::paths::{PathTranslator, PLAYLISTS_DIR};
use core_library::{Catalog, Playlist, Track};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

/// Longest playlist file name stem, in characters
pub const MAX_PLAYLIST_NAME_LEN: usize = 255;

const INVALID_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// How track lines are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaylistPathStyle {
    /// `Artist/Album/track.flac`, relative to the device music root
    #[default]
    MusicRootRelative,
    /// `../Artist/Album/track.flac`, relative to the playlists directory
    PlaylistRelative,
    /// `/sdcard/Music/Artist/Album/track.flac`
    Absolute,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesizedPlaylist {
    /// Source playlist name
    pub name: String,
    pub content: String,
    /// Absolute device path of the playlist file
    pub device_path: String,
    /// Number of track entries written
    pub track_count: usize,
}

impl SynthesizedPlaylist {
    /// File name component of [`device_path`](Self::device_path)
    pub fn file_name(&self) -> &str {
        self.device_path
            .rsplit_once('/')
            .map_or(self.device_path.as_str(), |(_, name)| name)
    }
}

pub struct PlaylistSynthesizer {
    translator: PathTranslator,
    style: PlaylistPathStyle,
}

impl PlaylistSynthesizer {
    pub fn new(translator: PathTranslator, style: PlaylistPathStyle) -> Self {
        Self { translator, style }
    }

    /// Render `tracks` as an extended M3U playlist.
    ///
    /// `mappings` renames the destination file; the source name is kept in
    /// the result for reporting.
    pub fn synthesize(
        &self,
        playlist_name: &str,
        tracks: &[&Track],
        mappings: &HashMap<String, String>,
    ) -> SynthesizedPlaylist {
        let mut content = String::from("#EXTM3U\n");
        let mut track_count = 0;

        for track in tracks {
            let Some(relative) = self.translator.to_device_path(&track.file_path) else {
                continue;
            };
            content.push_str(&format!(
                "#EXTINF:{},{} - {}\n{}\n",
                track.duration_seconds.max(0.0) as u64,
                single_line(track.display_artist()),
                single_line(&track.display_title()),
                self.entry_path(&relative)
            ));
            track_count += 1;
        }

        let target_name = mappings
            .get(playlist_name)
            .map(String::as_str)
            .unwrap_or(playlist_name);
        let device_path = self.translator.device_absolute(&format!(
            "{}/{}.m3u",
            PLAYLISTS_DIR,
            sanitize_playlist_name(target_name)
        ));

        SynthesizedPlaylist {
            name: playlist_name.to_string(),
            content,
            device_path,
            track_count,
        }
    }

    fn entry_path(&self, relative: &str) -> String {
        match self.style {
            PlaylistPathStyle::MusicRootRelative => relative.to_string(),
            PlaylistPathStyle::PlaylistRelative => format!("../{}", relative),
            PlaylistPathStyle::Absolute => self.translator.device_absolute(relative),
        }
    }
}

/// Playlist members that are also in the transfer set, in playlist order.
///
/// Entries resolve through [`Catalog::resolve_entry`], the same lenient
/// match the selection engine uses.
pub fn members_in_transfer_set<'a>(
    catalog: &'a Catalog,
    playlist: &Playlist,
    transfer_set: &HashSet<&Path>,
) -> Vec<&'a Track> {
    playlist
        .entries
        .iter()
        .filter_map(|entry| catalog.resolve_entry(entry))
        .filter(|track| transfer_set.contains(track.file_path.as_path()))
        .collect()
}

/// Make a playlist name safe to use as a file name on the device.
pub fn sanitize_playlist_name(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| if INVALID_NAME_CHARS.contains(&c) { '_' } else { c })
        .collect();
    let trimmed: String = replaced
        .trim_matches(|c| c == ' ' || c == '.')
        .chars()
        .take(MAX_PLAYLIST_NAME_LEN)
        .collect();

    if trimmed.is_empty() {
        "Untitled".to_string()
    } else {
        trimmed
    }
}

fn single_line(value: &str) -> String {
    value.replace(['\r', '\n'], " ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn synthesizer(style: PlaylistPathStyle) -> PlaylistSynthesizer {
        PlaylistSynthesizer::new(PathTranslator::new("/lib", "/sdcard/Music"), style)
    }

    fn track(path: &str, artist: &str, title: &str, secs: f64) -> Track {
        let mut track = Track::new(path);
        track.artist = artist.to_string();
        track.title = title.to_string();
        track.duration_seconds = secs;
        track
    }

    #[test]
    fn test_extended_m3u_format() {
        let a = track("/lib/Queen/Jazz/Mustapha.flac", "Queen", "Mustapha", 183.9);
        let b = track("/lib/Misc/untitled.mp3", "", "", 61.0);

        let playlist = synthesizer(PlaylistPathStyle::MusicRootRelative).synthesize(
            "Road Trip",
            &[&a, &b],
            &HashMap::new(),
        );

        assert_eq!(
            playlist.content,
            "#EXTM3U\n\
             #EXTINF:183,Queen - Mustapha\n\
             Queen/Jazz/Mustapha.flac\n\
             #EXTINF:61,Unknown Artist - untitled.mp3\n\
             Misc/untitled.mp3\n"
        );
        assert_eq!(playlist.track_count, 2);
        assert_eq!(playlist.device_path, "/sdcard/Music/Playlists/Road Trip.m3u");
        assert_eq!(playlist.file_name(), "Road Trip.m3u");
    }

    #[test]
    fn test_mapping_overrides_file_name() {
        let a = track("/lib/a/b/c.flac", "x", "y", 1.0);
        let mut mappings = HashMap::new();
        mappings.insert("Road Trip".to_string(), "Car: Summer".to_string());

        let playlist = synthesizer(PlaylistPathStyle::MusicRootRelative).synthesize(
            "Road Trip",
            &[&a],
            &mappings,
        );
        assert_eq!(playlist.name, "Road Trip");
        assert_eq!(
            playlist.device_path,
            "/sdcard/Music/Playlists/Car_ Summer.m3u"
        );
    }

    #[test]
    fn test_path_styles() {
        let a = track("/lib/Rock/Song.flac", "A", "B", 10.0);

        let relative =
            synthesizer(PlaylistPathStyle::PlaylistRelative).synthesize("p", &[&a], &HashMap::new());
        assert!(relative.content.ends_with("\n../Rock/Song.flac\n"));

        let absolute =
            synthesizer(PlaylistPathStyle::Absolute).synthesize("p", &[&a], &HashMap::new());
        assert!(absolute.content.ends_with("\n/sdcard/Music/Rock/Song.flac\n"));
    }

    #[test]
    fn test_untranslatable_tracks_omitted() {
        let unmapped = track("/song.flac", "A", "B", 10.0);
        let playlist = synthesizer(PlaylistPathStyle::MusicRootRelative).synthesize(
            "p",
            &[&unmapped],
            &HashMap::new(),
        );
        assert_eq!(playlist.content, "#EXTM3U\n");
        assert_eq!(playlist.track_count, 0);
    }

    #[test]
    fn test_sanitize_playlist_name() {
        assert_eq!(sanitize_playlist_name("a<b>c:d\"e/f\\g|h?i*j"), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(sanitize_playlist_name("  .Chill. "), "Chill");
        assert_eq!(sanitize_playlist_name(" ... "), "Untitled");
        assert_eq!(sanitize_playlist_name(""), "Untitled");
        assert_eq!(sanitize_playlist_name(&"x".repeat(300)).chars().count(), 255);
    }

    #[test]
    fn test_members_limited_to_transfer_set() {
        let catalog = Catalog::from_parts(
            vec![
                Track::new("/lib/a.flac"),
                Track::new("/lib/b.flac"),
                Track::new("/lib/c.flac"),
            ],
            vec![],
        );
        let playlist = Playlist::new(
            "Mix",
            vec![
                PathBuf::from("/lib/c.flac"),
                PathBuf::from("/lib/a.flac"),
                PathBuf::from("/elsewhere/b.flac"),
                PathBuf::from("/lib/missing.flac"),
                PathBuf::from("/lib/c.flac"),
            ],
        );
        let selected = [Path::new("/lib/c.flac"), Path::new("/lib/b.flac")];
        let transfer_set: HashSet<&Path> = selected.into_iter().collect();

        let members: Vec<String> = members_in_transfer_set(&catalog, &playlist, &transfer_set)
            .iter()
            .map(|t| t.file_path.display().to_string())
            .collect();
        assert_eq!(members, vec!["/lib/c.flac", "/lib/b.flac", "/lib/c.flac"]);
    }
}
