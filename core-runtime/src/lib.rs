//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the sync tool:
//! - Logging and tracing infrastructure
//! - Configuration loading and validation
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the other crates and the
//! binary depend on. It establishes the logging conventions and the typed
//! configuration sections read from the TOML config file.

pub mod config;
pub mod error;
pub mod logging;

pub use error::{Error, Result};
