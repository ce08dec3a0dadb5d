//! # Desktop Bridge Implementations
//!
//! Default implementations of the bridge traits for desktop platforms
//! (macOS, Windows, Linux) and headless runs.
//!
//! ## Overview
//!
//! - `HeadlessEngineFactory` / `HeadlessEngine`: transport clock over a
//!   `symphonia`-probed source, no audio output
//! - `LoftyMetadataExtractor`: title, artist and artwork via `lofty`
//! - `SqliteSettingsStore`: SQLite key-value store with change notifications
//! - `TracingOverlayDisplay`, `TracingStatusSurface`, `TracingNoticeSink`:
//!   view surfaces that log instead of drawing
//! - `DesktopCapabilityGate`: overlay permission (granted by default)
//! - `UiThread`: dedicated thread running view jobs in order
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::{HeadlessEngineFactory, SqliteSettingsStore, UiThread};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engines = HeadlessEngineFactory::current()?;
//!     let settings = SqliteSettingsStore::in_memory().await?;
//!     let ui = UiThread::spawn("floatplay-ui")?;
//!     // Hand them to the player configuration
//!     Ok(())
//! }
//! ```

mod engine;
mod metadata;
mod settings;
mod surface;
mod ui;

#[cfg(test)]
mod fixtures;

pub use engine::{probe_duration, HeadlessEngine, HeadlessEngineFactory};
pub use metadata::LoftyMetadataExtractor;
pub use settings::SqliteSettingsStore;
pub use surface::{
    DesktopCapabilityGate, TracingNoticeSink, TracingOverlayDisplay, TracingStatusSurface,
};
pub use ui::UiThread;
