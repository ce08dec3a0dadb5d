//! # Playback Synchronization Core
//!
//! Keeps one playback engine, a floating overlay and a persistent status
//! entry in agreement.
//!
//! ## Overview
//!
//! This crate handles:
//! - The canonical [`PlaybackSnapshot`] and session lifecycle
//! - An engine adapter that tags callbacks with their session
//! - A cancellable position poller that runs only while playing
//! - Overlay behaviour (drag, lock, timeline scrubbing)
//! - Status entry projection
//! - The [`PlaybackController`] tying it all together
//!
//! ## Usage
//!
//! ```ignore
//! use core_playback::PlaybackController;
//!
//! let (controller, pump) = PlaybackController::new(&config, worker.handle());
//! tokio::spawn(pump.run());
//!
//! controller.load_source("file:///music/song.flac").await?;
//! controller.handle_trigger("toggle-play-pause");
//! controller.exit();
//! ```

pub mod command;
pub mod controller;
pub mod engine;
pub mod error;
pub mod overlay;
pub mod poller;
pub mod snapshot;
pub mod status;

pub use command::{ControlCommand, UnknownTrigger};
pub use controller::{EngineEventPump, PlaybackController};
pub use engine::{EngineHandle, TaggedEngineEvent};
pub use error::{PlaybackError, Result};
pub use overlay::{
    format_timestamp, OverlayButton, OverlayCommand, OverlayControl, OverlayWidget, TouchEvent,
    TouchPhase,
};
pub use poller::{PositionPoller, PositionTarget};
pub use snapshot::{PlaybackSnapshot, SessionId, SessionPhase};
pub use status::StatusPresenter;
