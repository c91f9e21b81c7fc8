//! # Configuration Module
//!
//! Typed configuration sections shared by the sync tool, loaded from TOML.
//!
//! ## Overview
//!
//! The configuration file is split into sections (`[library]`, `[device]`,
//! `[timeouts]`, `[metadata]`, `[database]`, `[logging]`). Each section is a
//! plain `serde` struct with defaults for optional keys, and
//! [`RuntimeConfig::validate`] enforces fail-fast checks with actionable
//! messages before anything touches the device.
//!
//! The `[sync]` section belongs to the engine and is declared next to it;
//! callers compose both with `#[serde(flatten)]`.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{load_toml, RuntimeConfig, SyncRules};
//!
//! let config: RuntimeConfig = load_toml("/app/config/config.toml".as_ref())?;
//! config.validate()?;
//!
//! if let Some(rules) = SyncRules::load("/app/config/sync-rules.toml".as_ref())? {
//!     println!("{} playlist mappings", rules.playlist_mappings.len());
//! }
//! ```

use crate::error::{Error, Result};
use crate::logging::{LogFormat, LogLevel, LoggingConfig};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Read and deserialize a TOML file.
///
/// # Errors
///
/// Returns [`Error::Config`] when the file cannot be read or does not match
/// the expected shape. The message names the offending file.
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).map_err(|e| {
        Error::Config(format!(
            "Failed to read configuration file {}: {}",
            path.display(),
            e
        ))
    })?;
    parse_toml(&content)
        .map_err(|e| Error::Config(format!("Invalid configuration in {}: {}", path.display(), e)))
}

/// Deserialize TOML text.
pub fn parse_toml<T: DeserializeOwned>(content: &str) -> std::result::Result<T, toml::de::Error> {
    toml::from_str(content)
}

// ============================================================================
// Sections
// ============================================================================

/// Where the source library lives.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LibrarySettings {
    /// MusicBee library XML export
    pub library_xml: PathBuf,
    /// Directory holding `.m3u` / `.m3u8` playlists
    #[serde(default)]
    pub playlists_dir: Option<PathBuf>,
    /// Root directory that device paths are computed relative to
    pub library_root: PathBuf,
}

/// How to reach the device.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeviceSettings {
    pub ip_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_adb_path")]
    pub adb_path: PathBuf,
    #[serde(default = "default_music_root")]
    pub music_root: String,
}

fn default_port() -> u16 {
    5555
}

fn default_adb_path() -> PathBuf {
    PathBuf::from("adb")
}

fn default_music_root() -> String {
    "/sdcard/Music".to_string()
}

/// Per-operation time budgets, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TimeoutSettings {
    pub connect: u64,
    pub shell: u64,
    pub push: u64,
    pub playlist_push: u64,
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            connect: 30,
            shell: 30,
            push: 600,
            playlist_push: 60,
        }
    }
}

impl TimeoutSettings {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect)
    }

    pub fn shell(&self) -> Duration {
        Duration::from_secs(self.shell)
    }

    pub fn push(&self) -> Duration {
        Duration::from_secs(self.push)
    }

    pub fn playlist_push(&self) -> Duration {
        Duration::from_secs(self.playlist_push)
    }
}

/// Tag handling on the staged copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MetadataSettings {
    pub preserve_tags: bool,
    pub embed_artwork: bool,
    /// Longest edge of embedded artwork, in pixels
    pub artwork_size: u32,
}

impl Default for MetadataSettings {
    fn default() -> Self {
        Self {
            preserve_tags: true,
            embed_artwork: true,
            artwork_size: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file holding sync history
    pub path: PathBuf,
}

/// `[logging]` section, converted to a [`LoggingConfig`] at startup.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    pub level: LogLevel,
    pub format: LogFormat,
    pub file: Option<PathBuf>,
    pub max_file_size_mb: u64,
    pub backup_count: u32,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Pretty,
            file: None,
            max_file_size_mb: 10,
            backup_count: 5,
        }
    }
}

impl LoggingSettings {
    /// Build the logging configuration; `verbose` forces debug level.
    pub fn to_logging_config(&self, verbose: bool) -> LoggingConfig {
        let level = if verbose { LogLevel::Debug } else { self.level };
        let mut config = LoggingConfig::default()
            .with_format(self.format)
            .with_level(level)
            .with_rotation(self.max_file_size_mb * 1024 * 1024, self.backup_count);
        if let Some(file) = &self.file {
            config = config.with_file(file.clone());
        }
        config
    }
}

// ============================================================================
// Runtime configuration
// ============================================================================

/// Every non-engine section of the configuration file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RuntimeConfig {
    pub library: LibrarySettings,
    pub device: DeviceSettings,
    #[serde(default)]
    pub timeouts: TimeoutSettings,
    #[serde(default)]
    pub metadata: MetadataSettings,
    pub database: DatabaseSettings,
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl RuntimeConfig {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        // Validate paths
        if self.library.library_xml.as_os_str().is_empty() {
            return Err(Error::Config(
                "library.library_xml cannot be empty".to_string(),
            ));
        }

        if self.library.library_root.as_os_str().is_empty() {
            return Err(Error::Config(
                "library.library_root cannot be empty".to_string(),
            ));
        }

        if self.database.path.as_os_str().is_empty() {
            return Err(Error::Config("database.path cannot be empty".to_string()));
        }

        // Validate device
        if self.device.ip_address.trim().is_empty() {
            return Err(Error::Config(
                "device.ip_address cannot be empty".to_string(),
            ));
        }

        if self.device.port == 0 {
            return Err(Error::Config(
                "device.port must be greater than 0".to_string(),
            ));
        }

        if !self.device.music_root.starts_with('/') {
            return Err(Error::Config(format!(
                "device.music_root must be an absolute device path, got '{}'",
                self.device.music_root
            )));
        }

        // Validate timeouts
        let timeouts = [
            ("connect", self.timeouts.connect),
            ("shell", self.timeouts.shell),
            ("push", self.timeouts.push),
            ("playlist_push", self.timeouts.playlist_push),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, secs)| *secs == 0) {
            return Err(Error::Config(format!(
                "timeouts.{} must be greater than 0 seconds",
                name
            )));
        }

        if self.metadata.artwork_size == 0 {
            return Err(Error::Config(
                "metadata.artwork_size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

// ============================================================================
// Sync rules
// ============================================================================

/// Optional companion file with playlist name overrides.
///
/// ```toml
/// [playlist_mappings]
/// "Road Trip" = "Car"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SyncRules {
    #[serde(default)]
    pub playlist_mappings: HashMap<String, String>,
}

impl SyncRules {
    /// Load the rules file, returning `None` when it does not exist.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        match fs::metadata(path) {
            Ok(_) => load_toml(path).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Config(format!(
                "Failed to read sync rules {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Merge into `base`; entries here win over same-named ones in `base`.
    pub fn apply_to(&self, base: &mut HashMap<String, String>) {
        for (source, target) in &self.playlist_mappings {
            base.insert(source.clone(), target.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [library]
        library_xml = "/music/library.xml"
        library_root = "/music"

        [device]
        ip_address = "192.168.1.50"

        [database]
        path = "/app/data/sync.db"
    "#;

    fn minimal() -> RuntimeConfig {
        parse_toml(MINIMAL).unwrap()
    }

    #[test]
    fn test_defaults_applied() {
        let config = minimal();

        assert_eq!(config.device.port, 5555);
        assert_eq!(config.device.adb_path, PathBuf::from("adb"));
        assert_eq!(config.device.music_root, "/sdcard/Music");
        assert_eq!(config.timeouts, TimeoutSettings::default());
        assert_eq!(config.timeouts.push(), Duration::from_secs(600));
        assert!(config.metadata.preserve_tags);
        assert_eq!(config.metadata.artwork_size, 1000);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert!(config.library.playlists_dir.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_sections() {
        let config: RuntimeConfig = parse_toml(
            r#"
            [library]
            library_xml = "/music/library.xml"
            playlists_dir = "/music/Playlists"
            library_root = "/music"

            [device]
            ip_address = "10.0.0.7"
            port = 5037
            adb_path = "/usr/bin/adb"
            music_root = "/storage/emulated/0/Music"

            [timeouts]
            connect = 10
            push = 120

            [metadata]
            embed_artwork = false
            artwork_size = 600

            [database]
            path = "sync.db"

            [logging]
            level = "debug"
            format = "json"
            file = "/app/logs/sync.log"
            max_file_size_mb = 2
            backup_count = 1
        "#,
        )
        .unwrap();

        assert_eq!(config.device.port, 5037);
        assert_eq!(config.timeouts.connect(), Duration::from_secs(10));
        assert_eq!(config.timeouts.shell(), Duration::from_secs(30));
        assert!(!config.metadata.embed_artwork);
        assert!(config.metadata.preserve_tags);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert!(config.validate().is_ok());

        let logging = config.logging.to_logging_config(false);
        assert_eq!(logging.max_file_bytes, 2 * 1024 * 1024);
        assert_eq!(logging.backup_count, 1);
        assert_eq!(logging.file, Some(PathBuf::from("/app/logs/sync.log")));
    }

    #[test]
    fn test_missing_required_key() {
        let result: std::result::Result<RuntimeConfig, _> = parse_toml(
            r#"
            [library]
            library_root = "/music"
            [device]
            ip_address = "1.2.3.4"
            [database]
            path = "sync.db"
        "#,
        );
        let err = result.unwrap_err().to_string();
        assert!(err.contains("library_xml"));
    }

    #[test]
    fn test_validation_errors() {
        let mut config = minimal();
        config.device.port = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = minimal();
        config.device.ip_address = "  ".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = minimal();
        config.device.music_root = "Music".to_string();
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = minimal();
        config.timeouts.playlist_push = 0;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("playlist_push"));

        let mut config = minimal();
        config.metadata.artwork_size = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_verbose_forces_debug() {
        let settings = LoggingSettings::default();
        assert_eq!(settings.to_logging_config(false).level, LogLevel::Info);
        assert_eq!(settings.to_logging_config(true).level, LogLevel::Debug);
        assert!(settings.to_logging_config(true).file.is_none());
    }

    #[test]
    fn test_sync_rules_override() {
        let rules: SyncRules = parse_toml(
            r#"
            [playlist_mappings]
            "Road Trip" = "Car"
        "#,
        )
        .unwrap();

        let mut base = HashMap::new();
        base.insert("Road Trip".to_string(), "Old".to_string());
        base.insert("Gym".to_string(), "Workout".to_string());
        rules.apply_to(&mut base);

        assert_eq!(base["Road Trip"], "Car");
        assert_eq!(base["Gym"], "Workout");
    }
}
