//! # Sync Run Model
//!
//! Run-level types: the sync mode, the orchestrator state machine, per-file
//! transfer outcomes and the statistics aggregated from them.
//!
//! ## State Machine
//!
//! ```text
//! Idle → Connected → Selecting → Transferring → SyncingPlaylists → Disconnected → Done
//!   ↓        ↓           ↓   ↘                       ↓                            ↑
//!   └──────→ Aborted ←───┘    └─────── (empty selection) ───────→ Disconnected ──┘
//! ```
//!
//! `Aborted` is reachable from every non-terminal phase before `Disconnected`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{RunPhase, SyncRun};
//!
//! let mut run = SyncRun::new(clock.now());
//! run.advance(RunPhase::Connected)?;
//! run.advance(RunPhase::Selecting)?;
//! run.stats.record(&outcome);
//! ```

use crate::{Result, SyncError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// Sync Mode
// ============================================================================

/// How the change detector treats previously synced files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Transfer every selected file
    Full,
    /// Transfer only new, changed, failed or missing files
    #[default]
    Incremental,
}

impl SyncMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMode::Full => "full",
            SyncMode::Incremental => "incremental",
        }
    }
}

impl FromStr for SyncMode {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "full" => Ok(SyncMode::Full),
            "incremental" => Ok(SyncMode::Incremental),
            _ => Err(SyncError::InvalidSyncMode(s.to_string())),
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Run Phase
// ============================================================================

/// Orchestrator phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Idle,
    Connected,
    Selecting,
    Transferring,
    SyncingPlaylists,
    Disconnected,
    Done,
    Aborted,
}

impl RunPhase {
    /// Check if this phase ends the run
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Done | RunPhase::Aborted)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunPhase::Idle => "idle",
            RunPhase::Connected => "connected",
            RunPhase::Selecting => "selecting",
            RunPhase::Transferring => "transferring",
            RunPhase::SyncingPlaylists => "syncing_playlists",
            RunPhase::Disconnected => "disconnected",
            RunPhase::Done => "done",
            RunPhase::Aborted => "aborted",
        }
    }
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Transfer Outcomes
// ============================================================================

/// Why a selected track was not pushed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Unchanged since the last successful sync and present on the device
    Unchanged,
    /// No device path could be derived for the source path
    Unmapped,
}

/// Why a transfer attempt failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    SourceMissing,
    FingerprintUnavailable,
    Staging(String),
    PushExhausted { attempts: u32, last_error: String },
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::SourceMissing => write!(f, "source file is missing"),
            FailureReason::FingerprintUnavailable => write!(f, "fingerprint unavailable"),
            FailureReason::Staging(e) => write!(f, "staging failed: {}", e),
            FailureReason::PushExhausted {
                attempts,
                last_error,
            } => write!(f, "push failed after {} attempts: {}", attempts, last_error),
        }
    }
}

/// Result of one file's sync attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Skipped(SkipReason),
    Synced { bytes: u64 },
    Failed(FailureReason),
}

// ============================================================================
// Statistics
// ============================================================================

/// Counters for one orchestrator run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    pub tracks_synced: u64,
    pub tracks_skipped: u64,
    pub tracks_failed: u64,
    pub playlists_synced: u64,
    pub playlists_failed: u64,
    pub bytes_transferred: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl SyncStats {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            tracks_synced: 0,
            tracks_skipped: 0,
            tracks_failed: 0,
            playlists_synced: 0,
            playlists_failed: 0,
            bytes_transferred: 0,
            started_at,
            finished_at: None,
        }
    }

    /// Fold one transfer outcome into the counters.
    ///
    /// Unmapped tracks are not counted anywhere.
    pub fn record(&mut self, outcome: &TransferOutcome) {
        match outcome {
            TransferOutcome::Skipped(SkipReason::Unchanged) => self.tracks_skipped += 1,
            TransferOutcome::Skipped(SkipReason::Unmapped) => {}
            TransferOutcome::Synced { bytes } => {
                self.tracks_synced += 1;
                self.bytes_transferred += bytes;
            }
            TransferOutcome::Failed(_) => self.tracks_failed += 1,
        }
    }

    pub fn finish(&mut self, at: DateTime<Utc>) {
        self.finished_at = Some(at);
    }

    /// Wall time of the run, once finished
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }

    /// One-line human readable summary
    pub fn summary(&self) -> String {
        let secs = self
            .duration()
            .map(|d| d.num_milliseconds() as f64 / 1000.0)
            .unwrap_or(0.0);
        format!(
            "tracks: {} synced, {} skipped, {} failed; playlists: {} synced, {} failed; {:.2} MB in {:.1}s",
            self.tracks_synced,
            self.tracks_skipped,
            self.tracks_failed,
            self.playlists_synced,
            self.playlists_failed,
            self.bytes_transferred as f64 / 1024.0 / 1024.0,
            secs
        )
    }
}

// ============================================================================
// Run
// ============================================================================

/// Mutable state of one orchestrator invocation
#[derive(Debug, Clone)]
pub struct SyncRun {
    pub run_id: Uuid,
    pub phase: RunPhase,
    pub stats: SyncStats,
}

impl SyncRun {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            phase: RunPhase::Idle,
            stats: SyncStats::new(started_at),
        }
    }

    /// Move to `to`, rejecting transitions the state machine does not allow
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidStateTransition`] for an illegal move
    pub fn advance(&mut self, to: RunPhase) -> Result<()> {
        self.validate_transition(to)?;
        self.phase = to;
        Ok(())
    }

    /// Close the run and produce its report
    pub fn into_report(mut self, finished_at: DateTime<Utc>, error: Option<String>) -> SyncReport {
        self.stats.finish(finished_at);
        SyncReport {
            run_id: self.run_id,
            success: self.phase == RunPhase::Done && error.is_none(),
            final_phase: self.phase,
            stats: self.stats,
            error,
        }
    }

    fn validate_transition(&self, to: RunPhase) -> Result<()> {
        let valid = match (self.phase, to) {
            (RunPhase::Idle, RunPhase::Connected) => true,
            (RunPhase::Connected, RunPhase::Selecting) => true,
            (RunPhase::Selecting, RunPhase::Transferring) => true,
            // Empty selection finishes early
            (RunPhase::Selecting, RunPhase::Disconnected) => true,
            (RunPhase::Transferring, RunPhase::SyncingPlaylists) => true,
            (RunPhase::SyncingPlaylists, RunPhase::Disconnected) => true,
            (RunPhase::Disconnected, RunPhase::Done) => true,

            (RunPhase::Done, _) | (RunPhase::Aborted, _) => false,
            (RunPhase::Disconnected, RunPhase::Aborted) => false,
            (_, RunPhase::Aborted) => true,

            _ => false,
        };

        if !valid {
            return Err(SyncError::InvalidStateTransition {
                from: self.phase.as_str().to_string(),
                to: to.as_str().to_string(),
                reason: format!(
                    "Cannot transition from {} to {}",
                    self.phase.as_str(),
                    to.as_str()
                ),
            });
        }

        Ok(())
    }
}

/// Final result of an orchestrator run
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    /// The device was reached and the run completed
    pub success: bool,
    pub final_phase: RunPhase,
    pub stats: SyncStats,
    pub error: Option<String>,
}
