//! # Metadata Module
//!
//! Tag access, artwork normalisation and change-detection fingerprints for
//! audio files headed to the device.
//!
//! ## Overview
//!
//! This module handles:
//! - Audio tag reading (ID3, Vorbis, MP4, FLAC) via [`LoftyTagAccess`]
//! - Embedded artwork extraction and front-cover replacement
//! - Artwork resizing and JPEG re-encoding
//! - Size+mtime fingerprints for incremental sync

pub mod artwork;
pub mod error;
pub mod extractor;
pub mod fingerprint;

pub use error::{MetadataError, Result};
pub use extractor::{is_supported_audio, LoftyTagAccess, SUPPORTED_EXTENSIONS};
pub use fingerprint::{fingerprint, fingerprint_file, FileFingerprint};
