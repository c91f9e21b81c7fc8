//! # Host Bridge Traits
//!
//! Collaborator contracts the sync engine depends on.
//!
//! ## Overview
//!
//! The engine decides what to copy and where; the traits here describe the
//! parts it delegates:
//!
//! - [`DeviceBridge`](device::DeviceBridge) - Connection, shell, push/pull and filesystem probes on the device
//! - [`TagAccess`](tags::TagAccess) - Audio tag reading, artwork extraction/embedding, fingerprints
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Implementations
//!
//! | Trait | Implementation | Crate |
//! |-------|----------------|-------|
//! | `DeviceBridge` | `AdbDeviceBridge` | `bridge-desktop` |
//! | `TagAccess` | `LoftyTagAccess` | `core-metadata` |
//! | `Clock` | `SystemClock` | this crate |
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Callers
//! in the engine never let a bridge error escape the step that produced it;
//! failures are counted and logged instead.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so they can be shared as
//! `Arc<dyn Trait>` between engine components.

pub mod device;
pub mod error;
pub mod tags;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use device::{DeviceBridge, DeviceInfo};
pub use tags::TagAccess;
pub use time::{Clock, FixedClock, SystemClock};
