//! Shared fakes for the sync scenario tests

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{BridgeError, DeviceBridge, DeviceInfo, FixedClock};
use chrono::{TimeZone, Utc};
use core_library::{CatalogSource, LibraryError, Playlist, Track};
use core_metadata::LoftyTagAccess;
use core_sync::{
    PathTranslator, SelectionCriterion, SqliteSyncStateStore, SyncConfig, SyncOrchestrator,
};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

pub const DEVICE_ROOT: &str = "/sdcard/Music";

// ============================================================================
// Fake device
// ============================================================================

#[derive(Default)]
struct DeviceState {
    unreachable: bool,
    connected: bool,
    files: BTreeMap<String, Vec<u8>>,
    dirs: BTreeSet<String>,
    /// Every explicit `mkdir` request, in order
    mkdir_calls: Vec<String>,
    /// Pushes to fail before succeeding again; `u32::MAX` fails forever
    failing_pushes: u32,
    push_attempts: Vec<String>,
    connects: u32,
    disconnects: u32,
}

/// In-memory device that stores pushed file contents by remote path.
#[derive(Default)]
pub struct FakeDevice {
    state: Mutex<DeviceState>,
}

impl FakeDevice {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn unreachable() -> Arc<Self> {
        let device = Self::default();
        device.state.lock().unwrap().unreachable = true;
        Arc::new(device)
    }

    pub fn fail_next_pushes(&self, count: u32) {
        self.state.lock().unwrap().failing_pushes = count;
    }

    pub fn fail_all_pushes(&self) {
        self.fail_next_pushes(u32::MAX);
    }

    pub fn file(&self, remote: &str) -> Option<Vec<u8>> {
        self.state.lock().unwrap().files.get(remote).cloned()
    }

    pub fn has_file(&self, remote: &str) -> bool {
        self.state.lock().unwrap().files.contains_key(remote)
    }

    pub fn files(&self) -> Vec<String> {
        self.state.lock().unwrap().files.keys().cloned().collect()
    }

    pub fn place_file(&self, remote: &str, content: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .files
            .insert(remote.to_string(), content.to_vec());
    }

    pub fn remove(&self, remote: &str) {
        self.state.lock().unwrap().files.remove(remote);
    }

    pub fn has_dir(&self, remote: &str) -> bool {
        self.state.lock().unwrap().dirs.contains(remote)
    }

    pub fn mkdir_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().mkdir_calls.clone()
    }

    /// Remote paths of every push attempt, successful or not
    pub fn push_attempts(&self) -> Vec<String> {
        self.state.lock().unwrap().push_attempts.clone()
    }

    pub fn connects(&self) -> u32 {
        self.state.lock().unwrap().connects
    }

    pub fn disconnects(&self) -> u32 {
        self.state.lock().unwrap().disconnects
    }
}

#[async_trait]
impl DeviceBridge for FakeDevice {
    async fn connect(&self, _retries: u32) -> BridgeResult<()> {
        let mut state = self.state.lock().unwrap();
        state.connects += 1;
        if state.unreachable {
            return Err(BridgeError::NotConnected("10.0.0.2:5555".to_string()));
        }
        state.connected = true;
        Ok(())
    }

    async fn is_connected(&self) -> bool {
        self.state.lock().unwrap().connected
    }

    async fn disconnect(&self) -> BridgeResult<()> {
        let mut state = self.state.lock().unwrap();
        state.disconnects += 1;
        state.connected = false;
        Ok(())
    }

    async fn shell(&self, command: &str, _timeout: Duration) -> BridgeResult<String> {
        Err(BridgeError::OperationFailed(format!(
            "shell not supported: {}",
            command
        )))
    }

    async fn push(&self, local: &Path, remote: &str, _timeout: Duration) -> BridgeResult<()> {
        let content = std::fs::read(local)?;
        let mut state = self.state.lock().unwrap();
        state.push_attempts.push(remote.to_string());
        if !state.connected {
            return Err(BridgeError::NotConnected("device".to_string()));
        }
        if state.failing_pushes > 0 {
            if state.failing_pushes != u32::MAX {
                state.failing_pushes -= 1;
            }
            return Err(BridgeError::Timeout {
                operation: format!("push {}", remote),
                secs: 600,
            });
        }
        if let Some((parent, _)) = remote.rsplit_once('/') {
            state.dirs.insert(parent.to_string());
        }
        state.files.insert(remote.to_string(), content);
        Ok(())
    }

    async fn pull(&self, remote: &str, local: &Path, _timeout: Duration) -> BridgeResult<()> {
        let content = self
            .file(remote)
            .ok_or_else(|| BridgeError::OperationFailed(format!("no such file: {}", remote)))?;
        std::fs::write(local, content)?;
        Ok(())
    }

    async fn file_exists(&self, remote: &str) -> BridgeResult<bool> {
        Ok(self.has_file(remote))
    }

    async fn mkdir(&self, remote: &str, _create_parents: bool) -> BridgeResult<()> {
        let mut state = self.state.lock().unwrap();
        state.mkdir_calls.push(remote.to_string());
        state.dirs.insert(remote.to_string());
        Ok(())
    }

    async fn list_files(&self, remote: &str, _recursive: bool) -> BridgeResult<Vec<String>> {
        let prefix = format!("{}/", remote.trim_end_matches('/'));
        Ok(self
            .files()
            .into_iter()
            .filter(|path| path.starts_with(&prefix))
            .collect())
    }

    async fn delete_file(&self, remote: &str) -> BridgeResult<()> {
        self.remove(remote);
        Ok(())
    }

    async fn file_size(&self, remote: &str) -> BridgeResult<u64> {
        self.file(remote)
            .map(|content| content.len() as u64)
            .ok_or_else(|| BridgeError::OperationFailed(format!("no such file: {}", remote)))
    }

    async fn device_info(&self) -> BridgeResult<DeviceInfo> {
        Ok(DeviceInfo {
            model: Some("Fake DAP".to_string()),
            manufacturer: Some("Test".to_string()),
            os_version: Some("13".to_string()),
            serial: None,
        })
    }
}

// ============================================================================
// Fake catalog source
// ============================================================================

#[derive(Default)]
pub struct FakeSource {
    pub tracks: Mutex<Vec<Track>>,
    pub playlists: Mutex<Vec<Playlist>>,
    pub broken_library: bool,
}

#[async_trait]
impl CatalogSource for FakeSource {
    async fn load_library(&self) -> core_library::Result<Vec<Track>> {
        if self.broken_library {
            return Err(LibraryError::InvalidLibrary(
                "no <Items> element".to_string(),
            ));
        }
        Ok(self.tracks.lock().unwrap().clone())
    }

    async fn load_playlists(&self) -> core_library::Result<Vec<Playlist>> {
        Ok(self.playlists.lock().unwrap().clone())
    }
}

// ============================================================================
// Harness
// ============================================================================

/// A library on disk, a fake device and a SQLite store in one temp dir.
pub struct Harness {
    pub dir: TempDir,
    pub device: Arc<FakeDevice>,
    pub source: Arc<FakeSource>,
    pub config: SyncConfig,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_device(FakeDevice::new())
    }

    pub fn with_device(device: Arc<FakeDevice>) -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("lib")).unwrap();
        Self {
            dir,
            device,
            source: Arc::new(FakeSource::default()),
            config: SyncConfig {
                criteria: vec![SelectionCriterion::EntireLibrary],
                retry_backoff_secs: 0,
                ..Default::default()
            },
        }
    }

    pub fn library_root(&self) -> PathBuf {
        self.dir.path().join("lib")
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("data").join("sync.db")
    }

    /// Write a file under the library root and add it to the catalog.
    pub fn add_track(&self, relative: &str, content: &[u8]) -> PathBuf {
        let path = self.library_root().join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, content).unwrap();

        let mut track = Track::new(&path);
        track.title = Path::new(relative)
            .file_stem()
            .unwrap()
            .to_string_lossy()
            .into_owned();
        track.artist = "Band".to_string();
        track.genre = if relative.starts_with("Rock") {
            "Rock".to_string()
        } else {
            "Jazz".to_string()
        };
        track.duration_seconds = 200.0;
        self.source.tracks.lock().unwrap().push(track);
        path
    }

    pub fn add_playlist(&self, name: &str, entries: Vec<PathBuf>) {
        self.source
            .playlists
            .lock()
            .unwrap()
            .push(Playlist::new(name, entries));
    }

    pub fn store(&self) -> SqliteSyncStateStore {
        SqliteSyncStateStore::new(self.db_path())
    }

    pub fn orchestrator(&self) -> SyncOrchestrator {
        self.orchestrator_with_store(Arc::new(self.store()))
    }

    pub fn orchestrator_with_store(
        &self,
        store: Arc<dyn core_sync::SyncStateStore>,
    ) -> SyncOrchestrator {
        SyncOrchestrator::new(
            self.config.clone(),
            PathTranslator::new(self.library_root(), DEVICE_ROOT),
            self.source.clone(),
            self.device.clone(),
            Arc::new(LoftyTagAccess::default()),
            store,
        )
        .with_clock(Arc::new(FixedClock(
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        )))
    }
}

pub fn device_path(relative: &str) -> String {
    format!("{}/{}", DEVICE_ROOT, relative)
}
