//! # Track Selection Engine
//!
//! Evaluates the configured selection criteria against the catalog and
//! produces the transfer set.
//!
//! ## Overview
//!
//! Each criterion is evaluated independently against the whole catalog. The
//! results are concatenated in criterion order and deduplicated by source
//! path, keeping the first occurrence.
//!
//! Named playlists resolve their entries through
//! [`Catalog::resolve_entry`], so an entry whose directory prefix differs
//! from the library export still matches by file name.
//!
//! ## Configuration
//!
//! ```toml
//! [[sync.criteria]]
//! type = "named_playlists"
//! names = ["Road Trip", "Favourites"]
//!
//! [[sync.criteria]]
//! type = "smart_playlist"
//! rating_min = 80
//! added_within_days = 30
//! genres = ["rock", "metal"]
//! ```

use bridge_traits::Clock;
use chrono::{DateTime, Duration, Utc};
use core_library::{parse_timestamp, Catalog, Track};
use serde::{de, Deserialize, Deserializer};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// One rule contributing tracks to the sync set
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SelectionCriterion {
    EntireLibrary,
    NamedPlaylists { names: Vec<String> },
    SmartPlaylist(TrackPredicate),
    Custom(TrackPredicate),
}

impl SelectionCriterion {
    pub fn kind(&self) -> &'static str {
        match self {
            SelectionCriterion::EntireLibrary => "entire_library",
            SelectionCriterion::NamedPlaylists { .. } => "named_playlists",
            SelectionCriterion::SmartPlaylist(_) => "smart_playlist",
            SelectionCriterion::Custom(_) => "custom",
        }
    }
}

/// Conjunction of optional track filters.
///
/// Absent fields always pass. String filters are case-insensitive substring
/// matches, OR-ed within a list; an empty list matches nothing.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct TrackPredicate {
    pub rating_min: Option<u32>,
    #[serde(alias = "date_added_after", deserialize_with = "deserialize_timestamp")]
    pub added_after: Option<DateTime<Utc>>,
    #[serde(alias = "days")]
    pub added_within_days: Option<u32>,
    pub genres: Option<Vec<String>>,
    pub artists: Option<Vec<String>>,
    pub albums: Option<Vec<String>>,
}

impl TrackPredicate {
    pub fn matches(&self, track: &Track, now: DateTime<Utc>) -> bool {
        if let Some(min) = self.rating_min {
            if track.rating < min {
                return false;
            }
        }

        if let Some(cutoff) = self.added_after {
            if !added_since(track, cutoff) {
                return false;
            }
        }

        if let Some(days) = self.added_within_days {
            // A window reaching past the representable range has no lower bound
            let cutoff = Duration::try_days(i64::from(days))
                .and_then(|window| now.checked_sub_signed(window));
            let recent = match cutoff {
                Some(cutoff) => added_since(track, cutoff),
                None => track.date_added.is_some(),
            };
            if !recent {
                return false;
            }
        }

        contains_any(&track.genre, self.genres.as_deref())
            && contains_any(&track.artist, self.artists.as_deref())
            && contains_any(&track.album, self.albums.as_deref())
    }
}

fn added_since(track: &Track, cutoff: DateTime<Utc>) -> bool {
    track.date_added.is_some_and(|added| added >= cutoff)
}

fn contains_any(value: &str, needles: Option<&[String]>) -> bool {
    let Some(needles) = needles else {
        return true;
    };
    let value = value.to_lowercase();
    needles
        .iter()
        .any(|needle| value.contains(&needle.to_lowercase()))
}

fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|value| {
        parse_timestamp(&value)
            .ok_or_else(|| de::Error::custom(format!("unrecognised date '{}'", value)))
    })
    .transpose()
}

pub struct SelectionEngine {
    clock: Arc<dyn Clock>,
}

impl SelectionEngine {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// Evaluate `criteria` in order and deduplicate by path, first seen wins.
    pub fn select<'a>(
        &self,
        catalog: &'a Catalog,
        criteria: &[SelectionCriterion],
    ) -> Vec<&'a Track> {
        let mut seen: HashSet<&Path> = HashSet::new();
        let mut selected = Vec::new();

        for criterion in criteria {
            let matched = self.evaluate(catalog, criterion);
            debug!("Criterion {} matched {} tracks", criterion.kind(), matched.len());
            for track in matched {
                if seen.insert(track.file_path.as_path()) {
                    selected.push(track);
                }
            }
        }

        info!("Selected {} unique tracks", selected.len());
        selected
    }

    /// Tracks matched by a single criterion, in catalog or playlist order.
    pub fn evaluate<'a>(
        &self,
        catalog: &'a Catalog,
        criterion: &SelectionCriterion,
    ) -> Vec<&'a Track> {
        match criterion {
            SelectionCriterion::EntireLibrary => catalog.tracks().iter().collect(),
            SelectionCriterion::NamedPlaylists { names } => names
                .iter()
                .flat_map(|name| playlist_tracks(catalog, name))
                .collect(),
            SelectionCriterion::SmartPlaylist(predicate)
            | SelectionCriterion::Custom(predicate) => {
                let now = self.clock.now();
                catalog
                    .tracks()
                    .iter()
                    .filter(|track| predicate.matches(track, now))
                    .collect()
            }
        }
    }
}

fn playlist_tracks<'a>(catalog: &'a Catalog, name: &str) -> Vec<&'a Track> {
    let Some(playlist) = catalog.playlist(name) else {
        warn!("Playlist not found: {}", name);
        return Vec::new();
    };

    playlist
        .entries
        .iter()
        .filter_map(|entry| {
            let track = catalog.resolve_entry(entry);
            if track.is_none() {
                debug!("Playlist {} entry not in library: {}", name, entry.display());
            }
            track
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::FixedClock;
    use chrono::TimeZone;
    use core_library::Playlist;
    use std::path::PathBuf;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    fn engine() -> SelectionEngine {
        SelectionEngine::new(Arc::new(FixedClock(now())))
    }

    fn track(path: &str, genre: &str, artist: &str, rating: u32, days_ago: Option<i64>) -> Track {
        let mut track = Track::new(path);
        track.genre = genre.to_string();
        track.artist = artist.to_string();
        track.album = "Greatest Hits".to_string();
        track.rating = rating;
        track.date_added = days_ago.map(|days| now() - Duration::days(days));
        track
    }

    fn catalog() -> Catalog {
        Catalog::from_parts(
            vec![
                track("/lib/Rock/a.flac", "Hard Rock", "Queen", 100, Some(3)),
                track("/lib/Jazz/b.flac", "Jazz", "Miles Davis", 60, Some(90)),
                track("/lib/Rock/c.flac", "rock", "Queen", 20, None),
            ],
            vec![
                Playlist::new(
                    "Mix",
                    vec![PathBuf::from("/lib/Rock/c.flac"), PathBuf::from("/lib/Jazz/b.flac")],
                ),
                Playlist::new("Moved", vec![PathBuf::from("/old/mount/Jazz/b.flac")]),
            ],
        )
    }

    fn paths(tracks: &[&Track]) -> Vec<String> {
        tracks
            .iter()
            .map(|t| t.file_path.display().to_string())
            .collect()
    }

    #[test]
    fn test_entire_library() {
        let catalog = catalog();
        let selected = engine().select(&catalog, &[SelectionCriterion::EntireLibrary]);
        assert_eq!(selected.len(), 3);
    }

    #[test]
    fn test_dedup_keeps_first_seen_order() {
        let catalog = catalog();
        let criteria = vec![
            SelectionCriterion::NamedPlaylists {
                names: vec!["Mix".to_string()],
            },
            SelectionCriterion::EntireLibrary,
        ];

        let selected = engine().select(&catalog, &criteria);
        assert_eq!(
            paths(&selected),
            vec!["/lib/Rock/c.flac", "/lib/Jazz/b.flac", "/lib/Rock/a.flac"]
        );
    }

    #[test]
    fn test_named_playlist_lenient_match() {
        let catalog = catalog();
        let selected = engine().select(
            &catalog,
            &[SelectionCriterion::NamedPlaylists {
                names: vec!["Moved".to_string()],
            }],
        );
        assert_eq!(paths(&selected), vec!["/lib/Jazz/b.flac"]);
    }

    #[test]
    fn test_unknown_playlist_yields_nothing() {
        let catalog = catalog();
        let selected = engine().select(
            &catalog,
            &[SelectionCriterion::NamedPlaylists {
                names: vec!["Nope".to_string()],
            }],
        );
        assert!(selected.is_empty());
    }

    #[test]
    fn test_predicate_is_conjunction() {
        let catalog = catalog();
        let predicate = TrackPredicate {
            genres: Some(vec!["ROCK".to_string()]),
            rating_min: Some(50),
            ..Default::default()
        };
        let selected = engine().select(&catalog, &[SelectionCriterion::Custom(predicate)]);
        assert_eq!(paths(&selected), vec!["/lib/Rock/a.flac"]);
    }

    #[test]
    fn test_added_within_days_excludes_undated() {
        let catalog = catalog();
        let predicate = TrackPredicate {
            added_within_days: Some(30),
            ..Default::default()
        };
        let selected = engine().select(&catalog, &[SelectionCriterion::SmartPlaylist(predicate)]);
        assert_eq!(paths(&selected), vec!["/lib/Rock/a.flac"]);
    }

    #[test]
    fn test_huge_day_window_keeps_every_dated_track() {
        let criteria: SelectionCriterion = core_runtime::config::parse_toml(
            r#"
            type = "smart_playlist"
            added_within_days = 4000000000
        "#,
        )
        .unwrap();

        let catalog = catalog();
        let selected = engine().select(&catalog, &[criteria]);
        assert_eq!(paths(&selected), vec!["/lib/Rock/a.flac", "/lib/Jazz/b.flac"]);
    }

    #[test]
    fn test_added_after_is_inclusive() {
        let predicate = TrackPredicate {
            added_after: Some(now() - Duration::days(3)),
            ..Default::default()
        };
        let on_cutoff = track("/lib/x.flac", "", "", 0, Some(3));
        let before = track("/lib/y.flac", "", "", 0, Some(4));
        assert!(predicate.matches(&on_cutoff, now()));
        assert!(!predicate.matches(&before, now()));
    }

    #[test]
    fn test_empty_list_matches_nothing() {
        let predicate = TrackPredicate {
            artists: Some(Vec::new()),
            ..Default::default()
        };
        let t = track("/lib/a.flac", "Rock", "Queen", 0, None);
        assert!(!predicate.matches(&t, now()));
        assert!(TrackPredicate::default().matches(&t, now()));
    }

    #[test]
    fn test_criteria_deserialize() {
        #[derive(Deserialize)]
        struct Wrapper {
            criteria: Vec<SelectionCriterion>,
        }

        let wrapper: Wrapper = core_runtime::config::parse_toml(
            r#"
            [[criteria]]
            type = "entire_library"

            [[criteria]]
            type = "named_playlists"
            names = ["Road Trip"]

            [[criteria]]
            type = "smart_playlist"
            rating_min = 4
            days = 30
            genres = ["rock"]

            [[criteria]]
            type = "custom"
            added_after = "2024-01-15"
            albums = ["live"]
        "#,
        )
        .unwrap();

        assert_eq!(wrapper.criteria.len(), 4);
        assert_eq!(wrapper.criteria[0], SelectionCriterion::EntireLibrary);
        match &wrapper.criteria[2] {
            SelectionCriterion::SmartPlaylist(p) => {
                assert_eq!(p.rating_min, Some(4));
                assert_eq!(p.added_within_days, Some(30));
            }
            other => panic!("unexpected criterion {:?}", other),
        }
        match &wrapper.criteria[3] {
            SelectionCriterion::Custom(p) => {
                assert_eq!(
                    p.added_after,
                    Some(Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap())
                );
            }
            other => panic!("unexpected criterion {:?}", other),
        }
    }

    #[test]
    fn test_invalid_date_is_rejected() {
        #[derive(Debug, Deserialize)]
        struct Wrapper {
            #[allow(dead_code)]
            criteria: Vec<SelectionCriterion>,
        }

        let result: Result<Wrapper, _> = core_runtime::config::parse_toml(
            r#"
            [[criteria]]
            type = "custom"
            added_after = "sometime last spring"
        "#,
        );
        assert!(result.unwrap_err().to_string().contains("unrecognised date"));
    }
}
