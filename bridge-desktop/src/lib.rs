//! # Desktop Bridge Implementations
//!
//! Desktop implementations of the bridge traits (Linux, macOS, Windows).
//!
//! ## Overview
//!
//! - `DeviceBridge` using the `adb` executable over TCP/IP ([`AdbDeviceBridge`])
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{AdbConfig, AdbDeviceBridge};
//! use bridge_traits::DeviceBridge;
//!
//! #[tokio::main]
//! async fn main() {
//!     let bridge = AdbDeviceBridge::new(AdbConfig::new("192.168.1.50", 5555));
//!     bridge.connect(3).await.unwrap();
//! }
//! ```

mod adb;

pub use adb::{AdbConfig, AdbDeviceBridge};
