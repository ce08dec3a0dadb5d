//! Metadata extraction bridge.

use async_trait::async_trait;

use crate::error::Result;
use crate::playback::{MediaMetadata, MediaSource};

/// Reads display metadata (title, artist, embedded artwork) for a source.
///
/// Implementations should return whatever they could read; the core falls
/// back to [`MediaMetadata::fallback_for`] when this returns an error.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::metadata::MetadataExtractor;
///
/// async fn title_of(extractor: &dyn MetadataExtractor, source: &MediaSource) -> String {
///     extractor
///         .extract(source)
///         .await
///         .map(|m| m.title)
///         .unwrap_or_else(|_| source.display_name())
/// }
/// ```
#[async_trait]
pub trait MetadataExtractor: Send + Sync {
    async fn extract(&self, source: &MediaSource) -> Result<MediaMetadata>;
}
