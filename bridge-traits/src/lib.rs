//! # Host Bridge Traits
//!
//! Platform abstraction traits that each host must implement for the
//! playback core.
//!
//! ## Overview
//!
//! This crate defines the contract between the synchronization core and the
//! platform it runs on. The core owns playback state and decides what both
//! views show; everything that touches the OS goes through a trait here.
//!
//! ## Traits
//!
//! ### Playback
//! - [`EngineFactory`](playback::EngineFactory) / [`PlaybackEngine`](playback::PlaybackEngine) - decode/output primitive, one per session
//! - [`EngineEventSink`](playback::EngineEventSink) - receives engine callbacks from any thread
//! - [`MetadataExtractor`](metadata::MetadataExtractor) - title/artist/artwork lookup
//!
//! ### Views
//! - [`OverlayDisplay`](surface::OverlayDisplay) - attach/detach/move/render the floating panel
//! - [`StatusSurface`](surface::StatusSurface) - persistent status entry with three actions
//! - [`UiDispatcher`](surface::UiDispatcher) - marshals view updates onto the UI context
//!
//! ### Platform Integration
//! - [`CapabilityGate`](surface::CapabilityGate) - overlay permission check
//! - [`NoticeSink`](surface::NoticeSink) - transient user-visible messages
//! - [`SettingsStore`](storage::SettingsStore) - persisted preferences
//! - [`LoggerSink`](logging::LoggerSink) - forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use [`BridgeError`](error::BridgeError). Implementations
//! should convert platform errors and keep messages actionable.
//!
//! ## Thread Safety
//!
//! Every trait requires `Send + Sync`. Engine callbacks, poller ticks and user
//! gestures arrive on different threads; only the view traits are guaranteed
//! to be called from the UI context.

pub mod error;
pub mod logging;
pub mod metadata;
pub mod playback;
pub mod storage;
pub mod surface;

pub use error::BridgeError;

// Re-export commonly used types
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use metadata::MetadataExtractor;
pub use playback::{
    Artwork, EngineEvent, EngineEventSink, EngineFactory, EngineStatus, MediaMetadata,
    MediaSource, PlaybackEngine,
};
pub use storage::{SettingChange, SettingsStore};
pub use surface::{
    CapabilityGate, InlineDispatcher, Notice, NoticeSink, OverlayDisplay, OverlayFrame,
    ScreenPoint, StatusAction, StatusButton, StatusIcon, StatusSurface, StatusView,
    TimelineView, UiDispatcher, UiJob,
};
