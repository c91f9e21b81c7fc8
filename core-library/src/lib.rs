//! # Library Catalog Module
//!
//! Loads the desktop music library into an in-memory catalog.
//!
//! ## Overview
//!
//! This module provides:
//! - The [`Track`] and [`Playlist`] domain models
//! - [`Catalog`], a path-keyed index with file-name fallback lookup
//! - [`CatalogSource`], the seam between the catalog and a concrete library format
//! - [`MusicBeeCatalogSource`], a reader for MusicBee XML exports and M3U playlists
//! - Path, timestamp and number normalisation helpers

pub mod catalog;
pub mod error;
pub mod models;
pub mod musicbee;
pub mod normalize;
pub mod source;

pub use catalog::Catalog;
pub use error::{LibraryError, Result};
pub use models::{Playlist, Track};
pub use musicbee::MusicBeeCatalogSource;
pub use normalize::{normalize_path, parse_timestamp};
pub use source::CatalogSource;
