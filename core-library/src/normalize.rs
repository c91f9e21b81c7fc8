//! Normalisation helpers shared by catalog sources.
//!
//! Library exports and playlists written on another machine disagree on
//! separators, drive letters and date formats; everything is folded into one
//! canonical form here before it reaches the [`Catalog`](crate::Catalog).

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use std::path::{Component, Path, PathBuf};

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];

/// Lexically normalise a path: drop `.` components and fold `..` into the parent.
///
/// Never touches the filesystem, so symlinks are not resolved.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let at_root = matches!(
                    normalized.components().next_back(),
                    None | Some(Component::RootDir) | Some(Component::Prefix(_))
                );
                if at_root {
                    if !path.has_root() {
                        normalized.push("..");
                    }
                } else if normalized.ends_with("..") {
                    normalized.push("..");
                } else {
                    normalized.pop();
                }
            }
            other => normalized.push(other.as_os_str()),
        }
    }
    normalized
}

/// Convert a Windows-style path into the host form.
///
/// `C:\Music\a.flac` becomes `/mnt/c/Music/a.flac`; paths without
/// backslashes are returned unchanged.
pub fn convert_windows_path(raw: &str) -> String {
    if !raw.contains('\\') {
        return raw.to_string();
    }

    let unix = raw.replace('\\', "/");
    match unix.split_once(':') {
        Some((drive, rest))
            if drive.len() == 1 && drive.chars().all(|c| c.is_ascii_alphabetic()) =>
        {
            let rest = rest.trim_start_matches('/');
            format!("/mnt/{}/{}", drive.to_ascii_lowercase(), rest)
        }
        _ => unix,
    }
}

/// Parse a timestamp in any of the formats library exports commonly use.
///
/// Values without an offset are taken as UTC. Returns `None` for empty or
/// unrecognised input.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(raw, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Parse a leading unsigned number, accepting `"3/12"` style track numbers.
pub fn parse_count(raw: &str) -> Option<u32> {
    raw.split('/').next()?.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_normalize_path_folds_dots() {
        assert_eq!(
            normalize_path(Path::new("/lib/./Rock/../Jazz/a.flac")),
            PathBuf::from("/lib/Jazz/a.flac")
        );
        assert_eq!(normalize_path(Path::new("/../a.flac")), PathBuf::from("/a.flac"));
        assert_eq!(normalize_path(Path::new("../x/a.flac")), PathBuf::from("../x/a.flac"));
    }

    #[test]
    fn test_convert_windows_path() {
        assert_eq!(
            convert_windows_path(r"C:\Music\Artist\a.flac"),
            "/mnt/c/Music/Artist/a.flac"
        );
        assert_eq!(convert_windows_path(r"Artist\a.flac"), "Artist/a.flac");
        assert_eq!(convert_windows_path("/music/a.flac"), "/music/a.flac");
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let rfc = parse_timestamp("2024-02-10T08:30:00Z").unwrap();
        assert_eq!((rfc.year(), rfc.month(), rfc.day(), rfc.hour()), (2024, 2, 10, 8));

        let naive = parse_timestamp("2024-02-10 08:30:00").unwrap();
        assert_eq!(naive, rfc);

        let us = parse_timestamp("02/10/2024 08:30:00").unwrap();
        assert_eq!(us, rfc);

        let date_only = parse_timestamp("2024-02-10").unwrap();
        assert_eq!(date_only.hour(), 0);

        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_parse_count() {
        assert_eq!(parse_count("3/12"), Some(3));
        assert_eq!(parse_count(" 7 "), Some(7));
        assert_eq!(parse_count("abc"), None);
        assert_eq!(parse_count(""), None);
    }
}
