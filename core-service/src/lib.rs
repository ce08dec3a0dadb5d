//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (engine, views,
//! metadata, settings) into the playback core and keeps the supporting tasks
//! running. Desktop apps typically enable the `desktop-shims` feature (which
//! depends on `bridge-desktop`) and call [`bootstrap_desktop`].

pub mod command;
pub mod error;
pub mod service;

pub use command::{command_channel, serve_lines, CommandReceiver, CommandSender};
pub use error::{CoreError, Result};
pub use service::PlayerService;

#[cfg(feature = "desktop-shims")]
use std::path::PathBuf;

/// Options for [`bootstrap_desktop`].
#[cfg(feature = "desktop-shims")]
#[derive(Debug, Clone, Default)]
pub struct DesktopOptions {
    /// SQLite settings database; in-memory when `None`.
    pub settings_path: Option<PathBuf>,
    /// Preferences written to the store before the service starts.
    pub preferences: Option<core_runtime::PlayerPreferences>,
}

/// Convenience bootstrapper for desktop and headless hosts.
///
/// Uses the headless engine, log-backed views, a dedicated UI thread and a
/// SQLite settings store.
///
/// ```no_run
/// # async fn example() -> core_service::Result<()> {
/// use core_service::{bootstrap_desktop, DesktopOptions};
///
/// let service = bootstrap_desktop(DesktopOptions::default()).await?;
/// service.load_source("/music/song.flac").await?;
/// service.commands().send("toggle-loop").await?;
/// service.shutdown().await;
/// # Ok(())
/// # }
/// ```
#[cfg(feature = "desktop-shims")]
pub async fn bootstrap_desktop(options: DesktopOptions) -> Result<PlayerService> {
    use bridge_desktop::{
        HeadlessEngineFactory, SqliteSettingsStore, TracingOverlayDisplay, TracingStatusSurface,
        UiThread,
    };
    use bridge_traits::SettingsStore;
    use core_runtime::config::{
        PlayerConfig, KEY_CLOSE_ON_COMPLETION, KEY_DEFAULT_LOOP, KEY_OVERLAY_ENABLED,
    };
    use std::sync::Arc;

    let settings: Arc<dyn SettingsStore> = match options.settings_path {
        Some(path) => Arc::new(SqliteSettingsStore::new(path).await?),
        None => Arc::new(SqliteSettingsStore::in_memory().await?),
    };

    if let Some(preferences) = options.preferences {
        settings
            .set_bool(KEY_OVERLAY_ENABLED, preferences.overlay_enabled)
            .await?;
        settings
            .set_bool(KEY_DEFAULT_LOOP, preferences.default_loop)
            .await?;
        settings
            .set_bool(KEY_CLOSE_ON_COMPLETION, preferences.close_on_completion)
            .await?;
    }

    let config = PlayerConfig::builder()
        .engine_factory(Arc::new(HeadlessEngineFactory::current()?))
        .overlay_display(Arc::new(TracingOverlayDisplay::new()))
        .status_surface(Arc::new(TracingStatusSurface::new()))
        .ui_dispatcher(Arc::new(UiThread::spawn("floatplay-ui")?))
        .settings_store(settings)
        .build()?;

    PlayerService::start(config).await
}
