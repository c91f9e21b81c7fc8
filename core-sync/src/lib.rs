//! # Sync Engine
//!
//! Mirrors a selected subset of the desktop music library onto a portable
//! player over the device bridge.
//!
//! ## Overview
//!
//! This crate decides which tracks to move, detects what changed since the
//! last run, maps every file to its place on the device, and regenerates
//! playlists that reference the transferred files. Progress is persisted per
//! file so an interrupted run resumes where it left off.
//!
//! ## Components
//!
//! - **State Store** (`state`): SQLite-backed record of the last attempt per file
//! - **Change Detector** (`change`): Decides whether a file needs to be pushed
//! - **Path Translator** (`paths`): Maps source paths to device paths
//! - **Selection Engine** (`selection`): Evaluates selection criteria against the catalog
//! - **Transfer Executor** (`transfer`): Stages and pushes one file with bounded retry
//! - **Playlist Synthesizer** (`playlist`): Writes extended M3U playlists for the device
//! - **Sync Orchestrator** (`coordinator`): Runs the whole sequence and reports statistics

pub mod change;
pub mod coordinator;
pub mod error;
pub mod paths;
pub mod playlist;
pub mod run;
pub mod selection;
pub mod state;
pub mod transfer;

pub use change::{ChangeDecision, ChangeDetector, TransferReason};
pub use coordinator::{SyncConfig, SyncOrchestrator, SyncPlan};
pub use error::{Result, SyncError};
pub use paths::{fallback_layout_path, PathTranslator, TranslatedPath, TranslationRule};
pub use playlist::{
    members_in_transfer_set, sanitize_playlist_name, PlaylistPathStyle, PlaylistSynthesizer,
    SynthesizedPlaylist,
};
pub use run::{
    FailureReason, RunPhase, SkipReason, SyncMode, SyncReport, SyncRun, SyncStats,
    TransferOutcome,
};
pub use selection::{SelectionCriterion, SelectionEngine, TrackPredicate};
pub use state::{RecordStatus, SqliteSyncStateStore, SyncRecord, SyncStateStore};
pub use transfer::{RetryPolicy, StagingOptions, TransferExecutor};
