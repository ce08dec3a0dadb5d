//! Playback engine bridge traits and supporting media types.
//!
//! The core never decodes media itself. A host supplies an [`EngineFactory`]
//! that produces one [`PlaybackEngine`] per session; each engine reports its
//! lifecycle through the [`EngineEventSink`] it was created with. Engines are
//! free to deliver those callbacks from any thread.

use crate::error::Result;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Reference to the single media source a session plays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// Local file accessible to the host runtime.
    LocalFile { path: PathBuf },
    /// Opaque content reference resolved by the host (e.g. `content://...`).
    ContentUri { uri: String },
}

impl MediaSource {
    /// Parse a raw source reference.
    ///
    /// `file://` references and bare paths become [`MediaSource::LocalFile`],
    /// anything else carrying a scheme becomes [`MediaSource::ContentUri`].
    /// Returns `None` for blank references.
    pub fn parse(reference: &str) -> Option<Self> {
        let reference = reference.trim();
        if reference.is_empty() {
            return None;
        }

        if let Some(path) = reference.strip_prefix("file://") {
            if path.is_empty() {
                return None;
            }
            return Some(Self::LocalFile {
                path: PathBuf::from(path),
            });
        }

        match reference.split_once("://") {
            Some((scheme, rest)) if !scheme.is_empty() && !rest.is_empty() => {
                Some(Self::ContentUri {
                    uri: reference.to_string(),
                })
            }
            _ => Some(Self::LocalFile {
                path: PathBuf::from(reference),
            }),
        }
    }

    /// Local path, when the source lives on disk.
    pub fn local_path(&self) -> Option<&Path> {
        match self {
            MediaSource::LocalFile { path } => Some(path.as_path()),
            MediaSource::ContentUri { .. } => None,
        }
    }

    /// Human readable name derived from the reference itself.
    ///
    /// Used when tag extraction yields no title: the file name for local
    /// sources, the last path segment for URIs, the full reference otherwise.
    pub fn display_name(&self) -> String {
        match self {
            MediaSource::LocalFile { path } => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.to_string_lossy().into_owned()),
            MediaSource::ContentUri { uri } => {
                let without_query = uri.split(['?', '#']).next().unwrap_or(uri);
                let after_scheme = without_query
                    .split_once("://")
                    .map(|(_, rest)| rest)
                    .unwrap_or(without_query);
                match after_scheme.trim_end_matches('/').rsplit_once('/') {
                    Some((_, segment)) if !segment.is_empty() => segment.to_string(),
                    _ => uri.clone(),
                }
            }
        }
    }
}

impl std::fmt::Display for MediaSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MediaSource::LocalFile { path } => write!(f, "{}", path.display()),
            MediaSource::ContentUri { uri } => f.write_str(uri),
        }
    }
}

/// Artwork attached to a source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artwork {
    /// Image bytes embedded in the media container.
    Embedded { data: Bytes, mime_type: String },
    /// No usable artwork; renderers draw their tinted placeholder.
    Placeholder,
}

impl Artwork {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Artwork::Placeholder)
    }
}

/// Display metadata for the loaded source. Immutable once extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaMetadata {
    pub title: String,
    pub subtitle: Option<String>,
    pub artwork: Option<Artwork>,
}

impl MediaMetadata {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            subtitle: None,
            artwork: None,
        }
    }

    pub fn with_subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    pub fn with_artwork(mut self, artwork: Artwork) -> Self {
        self.artwork = Some(artwork);
        self
    }

    /// Metadata used when extraction fails: derived name, placeholder art.
    pub fn fallback_for(source: &MediaSource) -> Self {
        Self {
            title: source.display_name(),
            subtitle: None,
            artwork: Some(Artwork::Placeholder),
        }
    }
}

/// Asynchronous lifecycle notifications emitted by an engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// Source decoded and duration known.
    Ready,
    /// Unrecoverable engine failure.
    Error { code: i32, message: String },
    /// The media clock jumped (e.g. a loop restart or a device change).
    PositionDiscontinuity,
    /// A previously requested seek finished.
    SeekComplete,
    /// Playback reached the end of the source.
    Completion,
}

/// Raw engine state as reported by [`PlaybackEngine::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineStatus {
    pub is_playing: bool,
    pub is_looping: bool,
    pub position_ms: i64,
    /// Zero when unknown.
    pub duration_ms: i64,
}

/// Receiver for engine callbacks. Implementations must not block.
pub trait EngineEventSink: Send + Sync {
    fn deliver(&self, event: EngineEvent);
}

/// Platform decode/output primitive for a single source.
///
/// Commands are fire-and-forget: their effects surface through
/// [`PlaybackEngine::status`] and the event sink. After [`release`] every call
/// may fail with [`BridgeError::Released`](crate::error::BridgeError::Released).
///
/// [`release`]: PlaybackEngine::release
pub trait PlaybackEngine: Send + Sync {
    /// Bind the source. Fails if it cannot be read or its format is unsupported.
    ///
    /// May block on file I/O. Callers run it on a blocking thread, never
    /// while holding controller state.
    fn set_source(&self, source: &MediaSource) -> Result<()>;

    /// Start asynchronous preparation; [`EngineEvent::Ready`] follows.
    fn prepare_async(&self) -> Result<()>;

    fn start(&self) -> Result<()>;

    fn pause(&self) -> Result<()>;

    fn seek_to(&self, position_ms: i64) -> Result<()>;

    fn set_looping(&self, looping: bool) -> Result<()>;

    fn status(&self) -> Result<EngineStatus>;

    /// Free native resources. Must be idempotent.
    fn release(&self);
}

/// Creates a fresh engine for every session.
pub trait EngineFactory: Send + Sync {
    fn create(&self, events: Arc<dyn EngineEventSink>) -> Result<Arc<dyn PlaybackEngine>>;
}
