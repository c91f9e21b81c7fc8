//! Catalog source abstraction.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Playlist, Track};

/// Supplies the tracks and playlists a [`Catalog`](crate::Catalog) is built from.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Load every track known to the library.
    ///
    /// # Errors
    ///
    /// Returns an error if the library export is missing or unreadable.
    async fn load_library(&self) -> Result<Vec<Track>>;

    /// Load every playlist.
    ///
    /// # Errors
    ///
    /// Returns an error if the playlist directory cannot be listed.
    async fn load_playlists(&self) -> Result<Vec<Playlist>>;
}
