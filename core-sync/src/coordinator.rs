//! # Sync Orchestrator
//!
//! Sequences one sync run from device connection to statistics.
//!
//! ## Workflow
//!
//! 1. Connect to the device (bounded retries, transport reset per attempt)
//! 2. Load the catalog and evaluate the selection criteria
//! 3. Create the music root and playlist directories on the device
//! 4. Transfer selected tracks one at a time, in selection order
//! 5. Regenerate playlists that intersect the transfer set
//! 6. Disconnect (best effort) and finalize statistics
//!
//! Per-track and per-playlist failures are counted and the run continues.
//! The run fails only when the device cannot be reached, the library cannot
//! be loaded, or the state machine is violated.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{PathTranslator, SyncConfig, SyncOrchestrator};
//!
//! let orchestrator = SyncOrchestrator::new(
//!     config,
//!     PathTranslator::new("/music", "/sdcard/Music"),
//!     source,
//!     bridge,
//!     tags,
//!     store,
//! );
//! let report = orchestrator.run().await;
//! println!("{}", report.stats.summary());
//! ```

use crate::change::ChangeDetector;
use crate::paths::PathTranslator;
use crate::playlist::{members_in_transfer_set, PlaylistPathStyle, PlaylistSynthesizer, SynthesizedPlaylist};
use crate::run::{RunPhase, SyncMode, SyncReport, SyncRun, SyncStats};
use crate::selection::{SelectionCriterion, SelectionEngine};
use crate::state::SyncStateStore;
use crate::transfer::{RetryPolicy, StagingOptions, TransferExecutor};
use crate::{Result, SyncError};
use bridge_traits::{Clock, DeviceBridge, SystemClock, TagAccess};
use core_library::{Catalog, CatalogSource, Track};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};

/// `[sync]` section of the configuration file
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    pub mode: SyncMode,
    /// Evaluated in order; results are deduplicated
    pub criteria: Vec<SelectionCriterion>,
    /// Push attempts per file
    pub transfer_retries: u32,
    pub retry_backoff_secs: u64,
    pub connect_retries: u32,
    pub playlist_path_style: PlaylistPathStyle,
    /// Source playlist name to device file name
    pub playlist_mappings: HashMap<String, String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            mode: SyncMode::Incremental,
            criteria: Vec::new(),
            transfer_retries: 3,
            retry_backoff_secs: 3,
            connect_retries: 3,
            playlist_path_style: PlaylistPathStyle::default(),
            playlist_mappings: HashMap::new(),
        }
    }
}

impl SyncConfig {
    pub fn validate(&self) -> Result<()> {
        if self.criteria.is_empty() {
            return Err(SyncError::Config(
                "At least one [[sync.criteria]] entry is required".to_string(),
            ));
        }

        if self.transfer_retries == 0 {
            return Err(SyncError::Config(
                "sync.transfer_retries must be at least 1".to_string(),
            ));
        }

        if self.connect_retries == 0 {
            return Err(SyncError::Config(
                "sync.connect_retries must be at least 1".to_string(),
            ));
        }

        for criterion in &self.criteria {
            if let SelectionCriterion::NamedPlaylists { names } = criterion {
                if names.is_empty() {
                    return Err(SyncError::Config(
                        "named_playlists criterion needs at least one name".to_string(),
                    ));
                }
            }
        }

        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.transfer_retries,
            Duration::from_secs(self.retry_backoff_secs),
        )
    }
}

/// What a run would do, computed without touching the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPlan {
    pub catalog_tracks: usize,
    pub tracks_selected: usize,
    /// Selected tracks with no derivable device path
    pub tracks_unmapped: usize,
    pub bytes_selected: u64,
    /// Playlists that intersect the selection
    pub playlists: Vec<String>,
}

impl SyncPlan {
    pub fn summary(&self) -> String {
        format!(
            "{} of {} tracks selected ({} unmapped, {:.2} MB); {} playlists",
            self.tracks_selected,
            self.catalog_tracks,
            self.tracks_unmapped,
            self.bytes_selected as f64 / 1024.0 / 1024.0,
            self.playlists.len()
        )
    }
}

pub struct SyncOrchestrator {
    config: SyncConfig,
    translator: PathTranslator,
    source: Arc<dyn CatalogSource>,
    bridge: Arc<dyn DeviceBridge>,
    tags: Arc<dyn TagAccess>,
    store: Arc<dyn SyncStateStore>,
    clock: Arc<dyn Clock>,
    push_timeout: Duration,
    playlist_push_timeout: Duration,
    staging: StagingOptions,
}

impl SyncOrchestrator {
    pub fn new(
        config: SyncConfig,
        translator: PathTranslator,
        source: Arc<dyn CatalogSource>,
        bridge: Arc<dyn DeviceBridge>,
        tags: Arc<dyn TagAccess>,
        store: Arc<dyn SyncStateStore>,
    ) -> Self {
        Self {
            config,
            translator,
            source,
            bridge,
            tags,
            store,
            clock: Arc::new(SystemClock),
            push_timeout: Duration::from_secs(600),
            playlist_push_timeout: Duration::from_secs(60),
            staging: StagingOptions::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_timeouts(mut self, push: Duration, playlist_push: Duration) -> Self {
        self.push_timeout = push;
        self.playlist_push_timeout = playlist_push;
        self
    }

    pub fn with_staging(mut self, staging: StagingOptions) -> Self {
        self.staging = staging;
        self
    }

    /// Execute one sync run. Always returns a report; failures are in it.
    pub async fn run(&self) -> SyncReport {
        let mut run = SyncRun::new(self.clock.now());
        let span = info_span!("sync_run", run_id = %run.run_id, mode = %self.config.mode);

        let error = match self.execute(&mut run).instrument(span).await {
            Ok(()) => None,
            Err(e) => {
                error!("Sync aborted: {}", e);
                if !run.phase.is_terminal() && run.advance(RunPhase::Aborted).is_err() {
                    warn!("Run ended in phase {}", run.phase);
                }
                Some(e.to_string())
            }
        };

        let report = run.into_report(self.clock.now(), error);
        info!("Sync finished: {}", report.stats.summary());
        report
    }

    /// Load the catalog and evaluate the selection without device access.
    #[instrument(skip(self))]
    pub async fn plan(&self) -> Result<SyncPlan> {
        let catalog = Catalog::load(self.source.as_ref()).await?;
        let selected = self.select(&catalog);

        let mut bytes_selected = 0;
        for track in &selected {
            if let Ok(meta) = tokio::fs::metadata(&track.file_path).await {
                bytes_selected += meta.len();
            }
        }

        let transfer_set = transfer_set(&selected);
        let playlists = catalog
            .playlists()
            .iter()
            .filter(|playlist| {
                !members_in_transfer_set(&catalog, playlist, &transfer_set).is_empty()
            })
            .map(|playlist| playlist.name.clone())
            .collect();

        Ok(SyncPlan {
            catalog_tracks: catalog.len(),
            tracks_selected: selected.len(),
            tracks_unmapped: selected
                .iter()
                .filter(|track| self.translator.to_device_path(&track.file_path).is_none())
                .count(),
            bytes_selected,
            playlists,
        })
    }

    async fn execute(&self, run: &mut SyncRun) -> Result<()> {
        info!("Starting sync ({} mode)", self.config.mode);

        if let Err(e) = self.store.initialize().await {
            warn!("Sync state store unavailable, all files will transfer: {}", e);
        }

        // Idle → Connected
        if let Err(e) = self.bridge.connect(self.config.connect_retries).await {
            error!("Failed to connect to device: {}", e);
            run.advance(RunPhase::Aborted)?;
            return Err(e.into());
        }
        run.advance(RunPhase::Connected)?;
        match self.bridge.device_info().await {
            Ok(device) => info!(
                "Connected to {} {} (Android {})",
                device.manufacturer.as_deref().unwrap_or("unknown"),
                device.model.as_deref().unwrap_or("unknown"),
                device.os_version.as_deref().unwrap_or("unknown")
            ),
            Err(e) => debug!("Device info unavailable: {}", e),
        }

        // Connected → Selecting
        run.advance(RunPhase::Selecting)?;
        let catalog = match Catalog::load(self.source.as_ref()).await {
            Ok(catalog) => catalog,
            Err(e) => {
                error!("Failed to load library: {}", e);
                run.advance(RunPhase::Aborted)?;
                self.disconnect().await;
                return Err(e.into());
            }
        };
        let selected = self.select(&catalog);

        if selected.is_empty() {
            warn!("No tracks to sync");
            self.disconnect().await;
            run.advance(RunPhase::Disconnected)?;
            run.advance(RunPhase::Done)?;
            return Ok(());
        }

        // Selecting → Transferring
        run.advance(RunPhase::Transferring)?;
        self.ensure_directories().await;
        let executor = self.executor();
        let total = selected.len();
        info!("Syncing {} tracks", total);
        for (index, track) in selected.iter().enumerate() {
            info!("Syncing track {}/{}: {}", index + 1, total, track.file_name());
            let outcome = executor.transfer(track).await;
            run.stats.record(&outcome);
        }

        // Transferring → SyncingPlaylists
        run.advance(RunPhase::SyncingPlaylists)?;
        self.sync_playlists(&catalog, &selected, &mut run.stats).await;

        // SyncingPlaylists → Disconnected → Done
        self.disconnect().await;
        run.advance(RunPhase::Disconnected)?;
        run.advance(RunPhase::Done)?;

        Ok(())
    }

    fn select<'a>(&self, catalog: &'a Catalog) -> Vec<&'a Track> {
        SelectionEngine::new(self.clock.clone()).select(catalog, &self.config.criteria)
    }

    fn executor(&self) -> TransferExecutor {
        let detector = ChangeDetector::new(self.config.mode, self.store.clone(), self.clock.clone());
        TransferExecutor::new(
            self.bridge.clone(),
            self.tags.clone(),
            detector,
            self.translator.clone(),
        )
        .with_retry(self.config.retry_policy())
        .with_push_timeout(self.push_timeout)
        .with_staging(self.staging)
    }

    async fn ensure_directories(&self) {
        for dir in [
            self.translator.device_root().to_string(),
            self.translator.playlists_dir(),
        ] {
            if let Err(e) = self.bridge.mkdir(&dir, true).await {
                warn!("Failed to create {}: {}", dir, e);
            }
        }
    }

    async fn sync_playlists(&self, catalog: &Catalog, selected: &[&Track], stats: &mut SyncStats) {
        info!("Syncing playlists");
        let transfer_set = transfer_set(selected);
        let synthesizer =
            PlaylistSynthesizer::new(self.translator.clone(), self.config.playlist_path_style);

        for playlist in catalog.playlists() {
            let members = members_in_transfer_set(catalog, playlist, &transfer_set);
            if members.is_empty() {
                continue;
            }

            let synthesized =
                synthesizer.synthesize(&playlist.name, &members, &self.config.playlist_mappings);
            if synthesized.track_count == 0 {
                debug!("Playlist {} has no mappable tracks", playlist.name);
                continue;
            }

            match self.push_playlist(&synthesized).await {
                Ok(()) => {
                    info!(
                        "Synced playlist {} ({} tracks)",
                        playlist.name, synthesized.track_count
                    );
                    stats.playlists_synced += 1;
                }
                Err(e) => {
                    error!("Failed to sync playlist {}: {}", playlist.name, e);
                    stats.playlists_failed += 1;
                }
            }
        }
    }

    async fn push_playlist(&self, playlist: &SynthesizedPlaylist) -> Result<()> {
        let scratch = tempfile::Builder::new()
            .prefix("dap-sync-playlist-")
            .tempdir()?;
        let local = scratch.path().join(playlist.file_name());
        tokio::fs::write(&local, &playlist.content).await?;

        self.bridge
            .push(&local, &playlist.device_path, self.playlist_push_timeout)
            .await?;
        Ok(())
    }

    async fn disconnect(&self) {
        if let Err(e) = self.bridge.disconnect().await {
            warn!("Disconnect failed: {}", e);
        }
    }
}

fn transfer_set<'a>(selected: &[&'a Track]) -> HashSet<&'a Path> {
    selected
        .iter()
        .map(|track| track.file_path.as_path())
        .collect()
}
