//! # Transfer Executor
//!
//! Moves one selected track to the device.
//!
//! ## Workflow
//!
//! 1. Derive the device path and check the source exists
//! 2. Compute the fingerprint and consult the [`ChangeDetector`]
//! 3. Copy the file into a private scratch directory
//! 4. Optionally normalize artwork on the staged copy
//! 5. Push with bounded retry; the bridge creates the destination directory
//! 6. Record the outcome in the state store
//!
//! The scratch directory is a [`tempfile::TempDir`], removed when it goes
//! out of scope on every return path. The source file is never modified.

use crate::change::{ChangeDecision, ChangeDetector};
use crate::paths::PathTranslator;
use crate::run::{FailureReason, SkipReason, TransferOutcome};
use crate::state::RecordStatus;
use bridge_traits::{DeviceBridge, TagAccess};
use core_library::Track;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, error, info, instrument, warn};

/// Bounded retry with a fixed pause between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// At least one attempt is always made.
    pub fn new(attempts: u32, backoff: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(3))
    }
}

/// Tag handling applied to the staged copy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StagingOptions {
    pub preserve_tags: bool,
    pub embed_artwork: bool,
}

impl StagingOptions {
    fn normalizes_artwork(&self) -> bool {
        self.preserve_tags && self.embed_artwork
    }
}

pub struct TransferExecutor {
    bridge: Arc<dyn DeviceBridge>,
    tags: Arc<dyn TagAccess>,
    detector: ChangeDetector,
    translator: PathTranslator,
    retry: RetryPolicy,
    push_timeout: Duration,
    staging: StagingOptions,
}

impl TransferExecutor {
    pub fn new(
        bridge: Arc<dyn DeviceBridge>,
        tags: Arc<dyn TagAccess>,
        detector: ChangeDetector,
        translator: PathTranslator,
    ) -> Self {
        Self {
            bridge,
            tags,
            detector,
            translator,
            retry: RetryPolicy::default(),
            push_timeout: Duration::from_secs(600),
            staging: StagingOptions::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_push_timeout(mut self, timeout: Duration) -> Self {
        self.push_timeout = timeout;
        self
    }

    pub fn with_staging(mut self, staging: StagingOptions) -> Self {
        self.staging = staging;
        self
    }

    pub fn translator(&self) -> &PathTranslator {
        &self.translator
    }

    /// Sync one track. Never returns an error; every failure is an outcome.
    #[instrument(skip(self, track), fields(file = %track.file_name()))]
    pub async fn transfer(&self, track: &Track) -> TransferOutcome {
        let source = track.file_path.as_path();
        let key = source.to_string_lossy();

        let Some(relative) = self.translator.to_device_path(source) else {
            warn!("No device path for {}, skipping", source.display());
            return TransferOutcome::Skipped(SkipReason::Unmapped);
        };
        let device_path = self.translator.device_absolute(&relative);

        let size = match tokio::fs::metadata(source).await {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => {
                error!("Source file does not exist: {}", source.display());
                return TransferOutcome::Failed(FailureReason::SourceMissing);
            }
        };

        let fingerprint = match self.tags.content_fingerprint(source).await {
            Ok(Some(fingerprint)) => fingerprint,
            Ok(None) => {
                error!("Could not fingerprint {}", source.display());
                return TransferOutcome::Failed(FailureReason::FingerprintUnavailable);
            }
            Err(e) => {
                error!("Could not fingerprint {}: {}", source.display(), e);
                return TransferOutcome::Failed(FailureReason::FingerprintUnavailable);
            }
        };

        let decision = self
            .detector
            .should_transfer(&key, &fingerprint, size, self.device_has_file(&device_path))
            .await;

        let reason = match decision {
            ChangeDecision::Unchanged => {
                debug!("Skipping unchanged file");
                return TransferOutcome::Skipped(SkipReason::Unchanged);
            }
            ChangeDecision::Transfer(reason) => reason,
        };
        debug!("Transferring to {} ({:?})", device_path, reason);

        let (_scratch, staged) = match self.stage(source).await {
            Ok(staged) => staged,
            Err(e) => {
                error!("Failed to stage {}: {}", source.display(), e);
                self.detector
                    .record_outcome(&key, &fingerprint, size, RecordStatus::Failed)
                    .await;
                return TransferOutcome::Failed(FailureReason::Staging(e.to_string()));
            }
        };

        if self.staging.normalizes_artwork() {
            self.normalize_artwork(source, &staged).await;
        }

        match self.push_with_retry(&staged, &device_path).await {
            Ok(()) => {
                self.detector
                    .record_outcome(&key, &fingerprint, size, RecordStatus::Synced)
                    .await;
                info!("Synced {} ({} bytes)", track.file_name(), size);
                TransferOutcome::Synced { bytes: size }
            }
            Err(last_error) => {
                error!(
                    "Failed to sync {} after {} attempts: {}",
                    source.display(),
                    self.retry.attempts,
                    last_error
                );
                self.detector
                    .record_outcome(&key, &fingerprint, size, RecordStatus::Failed)
                    .await;
                TransferOutcome::Failed(FailureReason::PushExhausted {
                    attempts: self.retry.attempts,
                    last_error,
                })
            }
        }
    }

    async fn device_has_file(&self, device_path: &str) -> bool {
        match self.bridge.file_exists(device_path).await {
            Ok(exists) => exists,
            Err(e) => {
                warn!("Could not probe {}: {}", device_path, e);
                false
            }
        }
    }

    /// Copy `source` into a fresh scratch directory, keeping its file name.
    async fn stage(&self, source: &Path) -> std::io::Result<(TempDir, PathBuf)> {
        let scratch = tempfile::Builder::new().prefix("dap-sync-").tempdir()?;
        let file_name = source
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "track".into());
        let staged = scratch.path().join(file_name);
        tokio::fs::copy(source, &staged).await?;
        Ok((scratch, staged))
    }

    async fn normalize_artwork(&self, source: &Path, staged: &Path) {
        match self.tags.extract_artwork(source).await {
            Ok(Some(image)) => {
                if let Err(e) = self.tags.embed_artwork(staged, image).await {
                    warn!("Artwork normalization failed, pushing as-is: {}", e);
                }
            }
            Ok(None) => {}
            Err(e) => warn!("Could not read artwork: {}", e),
        }
    }

    async fn push_with_retry(&self, staged: &Path, device_path: &str) -> Result<(), String> {
        let attempts = self.retry.attempts;
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            debug!("Pushing to {} (attempt {}/{})", device_path, attempt, attempts);
            match self
                .bridge
                .push(staged, device_path, self.push_timeout)
                .await
            {
                Ok(()) => return Ok(()),
                Err(e) => {
                    last_error = e.to_string();
                    if attempt < attempts {
                        warn!(
                            "Push failed, retrying in {:?}: {}",
                            self.retry.backoff, last_error
                        );
                        tokio::time::sleep(self.retry.backoff).await;
                    }
                }
            }
        }

        Err(last_error)
    }
}
