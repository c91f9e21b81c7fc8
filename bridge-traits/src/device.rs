//! Device Transport Abstraction
//!
//! Contract for the link between the host and the portable playback device.
//! Every call is awaited to completion before the next is issued; the sync
//! engine never drives two operations against the device concurrently.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::Result;

/// Identifying properties reported by the device.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub model: Option<String>,
    pub manufacturer: Option<String>,
    pub os_version: Option<String>,
    pub serial: Option<String>,
}

/// Device bridge trait
///
/// Remote paths are absolute, forward-slash device paths
/// (e.g. `/sdcard/Music/Artist/Album/01.flac`).
///
/// # Example
///
/// ```ignore
/// use bridge_traits::device::DeviceBridge;
/// use std::time::Duration;
///
/// async fn send(bridge: &dyn DeviceBridge, local: &Path) -> Result<()> {
///     bridge.connect(3).await?;
///     bridge.mkdir("/sdcard/Music", true).await?;
///     bridge.push(local, "/sdcard/Music/song.flac", Duration::from_secs(600)).await?;
///     bridge.disconnect().await
/// }
/// ```
#[async_trait]
pub trait DeviceBridge: Send + Sync {
    /// Establish the connection, resetting the transport before each attempt.
    ///
    /// # Errors
    ///
    /// Returns an error if no attempt out of `retries` produced a usable connection.
    async fn connect(&self, retries: u32) -> Result<()>;

    /// Whether the device is currently reachable.
    async fn is_connected(&self) -> bool;

    /// Drop the connection.
    async fn disconnect(&self) -> Result<()>;

    /// Run a shell command on the device and return its standard output.
    ///
    /// # Errors
    ///
    /// Returns an error if the command exits non-zero or exceeds `timeout`.
    async fn shell(&self, command: &str, timeout: Duration) -> Result<String>;

    /// Copy a local file to the device, creating the remote parent directory first.
    async fn push(&self, local: &Path, remote: &str, timeout: Duration) -> Result<()>;

    /// Copy a device file to the host.
    async fn pull(&self, remote: &str, local: &Path, timeout: Duration) -> Result<()>;

    /// Whether a regular file exists at `remote`.
    async fn file_exists(&self, remote: &str) -> Result<bool>;

    /// Create a directory.
    ///
    /// A failed create is re-checked for existence before being reported,
    /// so calling this on an existing directory succeeds.
    async fn mkdir(&self, remote: &str, create_parents: bool) -> Result<()>;

    /// List regular files below `remote`.
    async fn list_files(&self, remote: &str, recursive: bool) -> Result<Vec<String>>;

    /// Delete a single file.
    async fn delete_file(&self, remote: &str) -> Result<()>;

    /// Size of a device file in bytes.
    async fn file_size(&self, remote: &str) -> Result<u64>;

    /// Query device properties.
    async fn device_info(&self) -> Result<DeviceInfo>;
}
