//! # Change Detector
//!
//! Decides whether a selected file needs to be pushed, and records the
//! outcome of every attempt in the [`SyncStateStore`].
//!
//! ## Decision Policy
//!
//! Evaluated in order, first match wins:
//!
//! 1. `full` mode: transfer.
//! 2. No prior record: transfer (new file).
//! 3. Prior fingerprint differs: transfer (changed file).
//! 4. Prior attempt failed: transfer.
//! 5. Device does not hold the file at its mapped path: transfer (repair).
//! 6. Otherwise the file is unchanged.
//!
//! The store is an optimization. When it cannot be read the detector answers
//! "transfer"; when it cannot be written the failure is logged and the run
//! continues.

use crate::state::{RecordStatus, SyncRecord, SyncStateStore};
use crate::SyncMode;
use bridge_traits::Clock;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

/// Why a file is (re)transferred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferReason {
    FullMode,
    New,
    Changed,
    PreviouslyFailed,
    MissingOnDevice,
    StateUnavailable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeDecision {
    Transfer(TransferReason),
    Unchanged,
}

impl ChangeDecision {
    pub fn needs_transfer(&self) -> bool {
        matches!(self, ChangeDecision::Transfer(_))
    }
}

pub struct ChangeDetector {
    mode: SyncMode,
    store: Arc<dyn SyncStateStore>,
    clock: Arc<dyn Clock>,
}

impl ChangeDetector {
    pub fn new(mode: SyncMode, store: Arc<dyn SyncStateStore>, clock: Arc<dyn Clock>) -> Self {
        Self { mode, store, clock }
    }

    pub fn mode(&self) -> SyncMode {
        self.mode
    }

    /// Decide whether `path` needs to be transferred.
    ///
    /// `device_has_file` is only awaited when the earlier rules did not
    /// already decide, so the device is probed at most once and only when
    /// needed.
    pub async fn should_transfer<F>(
        &self,
        path: &str,
        fingerprint: &str,
        size: u64,
        device_has_file: F,
    ) -> ChangeDecision
    where
        F: Future<Output = bool>,
    {
        if self.mode == SyncMode::Full {
            return ChangeDecision::Transfer(TransferReason::FullMode);
        }

        let record = match self.store.get(path).await {
            Ok(Some(record)) => record,
            Ok(None) => return ChangeDecision::Transfer(TransferReason::New),
            Err(e) => {
                warn!("Sync state unavailable for {}, transferring: {}", path, e);
                return ChangeDecision::Transfer(TransferReason::StateUnavailable);
            }
        };

        if record.fingerprint != fingerprint {
            debug!(
                "Fingerprint changed for {} ({} bytes, was {} bytes)",
                path, size, record.size_bytes
            );
            return ChangeDecision::Transfer(TransferReason::Changed);
        }

        if record.status == RecordStatus::Failed {
            return ChangeDecision::Transfer(TransferReason::PreviouslyFailed);
        }

        if !device_has_file.await {
            return ChangeDecision::Transfer(TransferReason::MissingOnDevice);
        }

        ChangeDecision::Unchanged
    }

    /// Upsert the outcome of a transfer attempt. Store failures are logged.
    pub async fn record_outcome(
        &self,
        path: &str,
        fingerprint: &str,
        size: u64,
        status: RecordStatus,
    ) {
        let record = SyncRecord {
            file_path: path.to_string(),
            fingerprint: fingerprint.to_string(),
            size_bytes: size,
            last_synced_at: self.clock.unix_timestamp(),
            status,
        };

        if let Err(e) = self.store.upsert(&record).await {
            warn!("Failed to record {} outcome for {}: {}", status, path, e);
        }
    }
}
