//! Audio Tag Access
//!
//! Contract for reading and rewriting metadata embedded in audio files.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::path::Path;

use crate::error::Result;

/// Tag reader/writer trait
///
/// Implementations must never modify a file unless asked to through
/// [`embed_artwork`](TagAccess::embed_artwork).
#[async_trait]
pub trait TagAccess: Send + Sync {
    /// Read tag fields as a flat attribute map.
    ///
    /// Files without tags yield an empty map rather than an error.
    async fn read_metadata(&self, path: &Path) -> Result<HashMap<String, String>>;

    /// Extract embedded artwork, preferring the front cover.
    async fn extract_artwork(&self, path: &Path) -> Result<Option<Bytes>>;

    /// Replace the file's front cover with `image`.
    async fn embed_artwork(&self, path: &Path, image: Bytes) -> Result<()>;

    /// Cheap change-detection fingerprint derived from size and modification time.
    ///
    /// Returns `None` if the file cannot be inspected.
    async fn content_fingerprint(&self, path: &Path) -> Result<Option<String>>;
}
