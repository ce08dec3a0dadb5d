//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the playback core:
//! - Logging and tracing infrastructure
//! - Configuration management (`PlayerConfig`, `PlayerPreferences`)
//! - Event bus system
//! - A dedicated worker runtime for periodic tasks
//!
//! ## Overview
//!
//! This crate contains the runtime utilities the other `core-*` crates depend
//! on. It establishes the logging conventions, the bridge wiring and the event
//! broadcasting used throughout the player.

pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod worker;

pub use config::{PlayerConfig, PlayerConfigBuilder, PlayerPreferences};
pub use error::{Error, Result};
pub use events::{CoreEvent, EventBus, PlaybackEvent, SessionEvent};
pub use worker::WorkerRuntime;
