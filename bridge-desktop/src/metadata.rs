//! Tag-based metadata extraction using `lofty`.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result};
use bridge_traits::{Artwork, MediaMetadata, MediaSource, MetadataExtractor};
use bytes::Bytes;
use lofty::config::ParseOptions;
use lofty::file::TaggedFileExt;
use lofty::probe::Probe;
use lofty::tag::{Accessor, Tag};
use std::io::Cursor;
use tracing::{debug, instrument};

/// Reads title, artist and the first embedded picture from local files.
///
/// Content URIs need a host resolver and are reported as unavailable, which
/// makes the core fall back to the derived display name.
#[derive(Debug, Clone)]
pub struct LoftyMetadataExtractor {
    parse_options: ParseOptions,
}

impl LoftyMetadataExtractor {
    pub fn new() -> Self {
        Self {
            parse_options: ParseOptions::new(),
        }
    }

    pub fn with_options(parse_options: ParseOptions) -> Self {
        Self { parse_options }
    }

    fn parse(&self, source: &MediaSource, data: &[u8]) -> Result<MediaMetadata> {
        let tagged_file = Probe::new(Cursor::new(data))
            .options(self.parse_options)
            .guess_file_type()
            .map_err(|e| BridgeError::OperationFailed(format!("Failed to probe file: {}", e)))?
            .read()
            .map_err(|e| BridgeError::Unsupported(format!("Failed to parse tags: {}", e)))?;

        let Some(tag) = tagged_file.primary_tag().or_else(|| tagged_file.first_tag()) else {
            debug!("no tags; using display name");
            return Ok(MediaMetadata::fallback_for(source));
        };

        let title = tag
            .title()
            .map(|s| normalize_text(s.as_ref()))
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| source.display_name());

        let mut metadata = MediaMetadata::new(title).with_artwork(first_artwork(tag));
        if let Some(artist) = tag
            .artist()
            .map(|s| normalize_text(s.as_ref()))
            .filter(|s| !s.is_empty())
        {
            metadata = metadata.with_subtitle(artist);
        }
        Ok(metadata)
    }
}

impl Default for LoftyMetadataExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataExtractor for LoftyMetadataExtractor {
    #[instrument(skip(self, source), fields(source = %source.display_name()))]
    async fn extract(&self, source: &MediaSource) -> Result<MediaMetadata> {
        let Some(path) = source.local_path() else {
            return Err(BridgeError::NotAvailable(
                "content URIs are not readable on desktop".to_string(),
            ));
        };

        let data = tokio::fs::read(path).await?;
        self.parse(source, &data)
    }
}

/// First picture whose bytes decode as a known image format.
fn first_artwork(tag: &Tag) -> Artwork {
    tag.pictures()
        .iter()
        .find_map(|picture| artwork_from_bytes(picture.data()))
        .unwrap_or(Artwork::Placeholder)
}

/// Sniffs the image format from the data itself; tag MIME fields lie.
pub(crate) fn artwork_from_bytes(data: &[u8]) -> Option<Artwork> {
    if data.is_empty() {
        return None;
    }
    let format = image::guess_format(data).ok()?;
    Some(Artwork::Embedded {
        data: Bytes::copy_from_slice(data),
        mime_type: format.to_mime_type().to_string(),
    })
}

/// Collapses whitespace and strips control characters.
fn normalize_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .filter(|c| !c.is_control())
        .collect()
}
