//! # Player Configuration Module
//!
//! Provides configuration management for the playback core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a
//! `PlayerConfig` that holds every bridge the synchronization engine talks to,
//! plus the few tunables it has. Validation is fail-fast: a missing bridge is
//! reported by name before anything is wired.
//!
//! ## Required Dependencies
//!
//! - `EngineFactory` - creates one playback engine per session
//! - `OverlayDisplay` - the floating panel
//! - `StatusSurface` - the persistent status entry
//!
//! ## Optional Dependencies (with platform defaults)
//!
//! - `MetadataExtractor` - desktop default: lofty tag reader
//! - `CapabilityGate` - desktop default: always granted
//! - `NoticeSink` - desktop default: tracing-backed notices
//! - `UiDispatcher` - default: inline dispatch on the calling thread
//! - `SettingsStore` - without one, preferences come from the builder only
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::{PlayerConfig, PlayerPreferences};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let config = PlayerConfig::builder()
//!     .engine_factory(Arc::new(MyEngineFactory))
//!     .overlay_display(Arc::new(MyOverlay))
//!     .status_surface(Arc::new(MyStatus))
//!     .poll_interval(Duration::from_millis(50))
//!     .preferences(PlayerPreferences::default().with_overlay_enabled(true))
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::{
    CapabilityGate, EngineFactory, InlineDispatcher, MetadataExtractor, NoticeSink,
    OverlayDisplay, SettingsStore, StatusSurface, UiDispatcher,
};
use std::sync::Arc;
use std::time::Duration;

/// Default position poll interval.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(50);

const MIN_POLL_INTERVAL: Duration = Duration::from_millis(10);
const MAX_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Preference key: show the floating overlay.
pub const KEY_OVERLAY_ENABLED: &str = "overlay_enabled";
/// Preference key: new sources start with looping on.
pub const KEY_DEFAULT_LOOP: &str = "default_loop";
/// Preference key: tear the session down when a non-looping source completes.
pub const KEY_CLOSE_ON_COMPLETION: &str = "close_on_completion";

/// Persisted user preferences. Every flag defaults to `false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlayerPreferences {
    pub overlay_enabled: bool,
    pub default_loop: bool,
    pub close_on_completion: bool,
}

impl PlayerPreferences {
    /// All preference keys, in the order hosts usually list them.
    pub const KEYS: [&'static str; 3] = [
        KEY_OVERLAY_ENABLED,
        KEY_DEFAULT_LOOP,
        KEY_CLOSE_ON_COMPLETION,
    ];

    pub fn with_overlay_enabled(mut self, enabled: bool) -> Self {
        self.overlay_enabled = enabled;
        self
    }

    pub fn with_default_loop(mut self, enabled: bool) -> Self {
        self.default_loop = enabled;
        self
    }

    pub fn with_close_on_completion(mut self, enabled: bool) -> Self {
        self.close_on_completion = enabled;
        self
    }

    /// Reads all preferences from `store`. Absent keys read as `false`.
    pub async fn load(store: &dyn SettingsStore) -> Result<Self> {
        Ok(Self {
            overlay_enabled: store.get_bool(KEY_OVERLAY_ENABLED).await?.unwrap_or(false),
            default_loop: store.get_bool(KEY_DEFAULT_LOOP).await?.unwrap_or(false),
            close_on_completion: store
                .get_bool(KEY_CLOSE_ON_COMPLETION)
                .await?
                .unwrap_or(false),
        })
    }

    /// Whether `key` is one of the preference keys.
    pub fn is_preference_key(key: &str) -> bool {
        Self::KEYS.contains(&key)
    }
}

/// Configuration for the playback core.
///
/// Use [`PlayerConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct PlayerConfig {
    pub engine_factory: Arc<dyn EngineFactory>,
    pub metadata_extractor: Arc<dyn MetadataExtractor>,
    pub capability_gate: Arc<dyn CapabilityGate>,
    pub overlay_display: Arc<dyn OverlayDisplay>,
    pub status_surface: Arc<dyn StatusSurface>,
    pub ui_dispatcher: Arc<dyn UiDispatcher>,
    pub notice_sink: Arc<dyn NoticeSink>,

    /// Source of persisted preferences (optional)
    pub settings_store: Option<Arc<dyn SettingsStore>>,

    /// Interval between position samples while playing
    pub poll_interval: Duration,

    /// Capacity of the broadcast event bus
    pub event_buffer_size: usize,

    /// Preferences used until the settings store has been read
    pub preferences: PlayerPreferences,
}

impl std::fmt::Debug for PlayerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerConfig")
            .field("engine_factory", &"EngineFactory { ... }")
            .field("metadata_extractor", &"MetadataExtractor { ... }")
            .field("capability_gate", &"CapabilityGate { ... }")
            .field("overlay_display", &"OverlayDisplay { ... }")
            .field("status_surface", &"StatusSurface { ... }")
            .field("ui_dispatcher", &"UiDispatcher { ... }")
            .field("notice_sink", &"NoticeSink { ... }")
            .field(
                "settings_store",
                &self
                    .settings_store
                    .as_ref()
                    .map(|_| "SettingsStore { ... }"),
            )
            .field("poll_interval", &self.poll_interval)
            .field("event_buffer_size", &self.event_buffer_size)
            .field("preferences", &self.preferences)
            .finish()
    }
}

impl PlayerConfig {
    /// Creates a new builder for constructing a `PlayerConfig`.
    pub fn builder() -> PlayerConfigBuilder {
        PlayerConfigBuilder::default()
    }

    /// Validates tunables.
    ///
    /// This checks:
    /// - Poll interval lies within 10 ms..=1 s
    /// - Event bus capacity is non-zero
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval < MIN_POLL_INTERVAL || self.poll_interval > MAX_POLL_INTERVAL {
            return Err(Error::Config(format!(
                "Poll interval must be between {}ms and {}ms, got {}ms",
                MIN_POLL_INTERVAL.as_millis(),
                MAX_POLL_INTERVAL.as_millis(),
                self.poll_interval.as_millis()
            )));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

fn capability_missing(capability: &str, message: &str) -> Error {
    Error::CapabilityMissing {
        capability: capability.to_string(),
        message: message.to_string(),
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_metadata_extractor() -> Result<Arc<dyn MetadataExtractor>> {
    Ok(Arc::new(bridge_desktop::LoftyMetadataExtractor::new()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_metadata_extractor() -> Result<Arc<dyn MetadataExtractor>> {
    Err(capability_missing(
        "MetadataExtractor",
        "MetadataExtractor implementation is required to label sessions. \
         Desktop: enable the 'desktop-shims' feature to use the lofty-based extractor. \
         Mobile: inject the platform media metadata retriever.",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_capability_gate() -> Result<Arc<dyn CapabilityGate>> {
    Ok(Arc::new(bridge_desktop::DesktopCapabilityGate::default()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_capability_gate() -> Result<Arc<dyn CapabilityGate>> {
    Err(capability_missing(
        "CapabilityGate",
        "CapabilityGate implementation is required before the overlay can attach. \
         Desktop: enable the 'desktop-shims' feature. \
         Mobile: inject the draw-over-other-apps permission check.",
    ))
}

#[cfg(feature = "desktop-shims")]
fn provide_default_notice_sink() -> Result<Arc<dyn NoticeSink>> {
    Ok(Arc::new(bridge_desktop::TracingNoticeSink::default()))
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_notice_sink() -> Result<Arc<dyn NoticeSink>> {
    Err(capability_missing(
        "NoticeSink",
        "NoticeSink implementation is required to report playback failures. \
         Desktop: enable the 'desktop-shims' feature. \
         Mobile: inject a toast/snackbar sink.",
    ))
}

/// Builder for constructing [`PlayerConfig`] instances.
#[derive(Default)]
pub struct PlayerConfigBuilder {
    engine_factory: Option<Arc<dyn EngineFactory>>,
    metadata_extractor: Option<Arc<dyn MetadataExtractor>>,
    capability_gate: Option<Arc<dyn CapabilityGate>>,
    overlay_display: Option<Arc<dyn OverlayDisplay>>,
    status_surface: Option<Arc<dyn StatusSurface>>,
    ui_dispatcher: Option<Arc<dyn UiDispatcher>>,
    notice_sink: Option<Arc<dyn NoticeSink>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    poll_interval: Option<Duration>,
    event_buffer_size: Option<usize>,
    preferences: PlayerPreferences,
}

impl PlayerConfigBuilder {
    pub fn engine_factory(mut self, factory: Arc<dyn EngineFactory>) -> Self {
        self.engine_factory = Some(factory);
        self
    }

    pub fn metadata_extractor(mut self, extractor: Arc<dyn MetadataExtractor>) -> Self {
        self.metadata_extractor = Some(extractor);
        self
    }

    pub fn capability_gate(mut self, gate: Arc<dyn CapabilityGate>) -> Self {
        self.capability_gate = Some(gate);
        self
    }

    pub fn overlay_display(mut self, display: Arc<dyn OverlayDisplay>) -> Self {
        self.overlay_display = Some(display);
        self
    }

    pub fn status_surface(mut self, surface: Arc<dyn StatusSurface>) -> Self {
        self.status_surface = Some(surface);
        self
    }

    /// Sets the dispatcher view updates are posted through.
    ///
    /// Defaults to [`InlineDispatcher`], which runs updates on whichever
    /// thread produced them.
    pub fn ui_dispatcher(mut self, dispatcher: Arc<dyn UiDispatcher>) -> Self {
        self.ui_dispatcher = Some(dispatcher);
        self
    }

    pub fn notice_sink(mut self, sink: Arc<dyn NoticeSink>) -> Self {
        self.notice_sink = Some(sink);
        self
    }

    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.settings_store = Some(store);
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    pub fn preferences(mut self, preferences: PlayerPreferences) -> Self {
        self.preferences = preferences;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::CapabilityMissing`] when a required bridge was not
    ///   provided and no platform default exists
    /// - [`Error::Config`] when a tunable is out of range
    pub fn build(self) -> Result<PlayerConfig> {
        let engine_factory = self.engine_factory.ok_or_else(|| {
            capability_missing(
                "EngineFactory",
                "EngineFactory implementation is required to create playback engines. \
                 Desktop: use bridge_desktop::HeadlessEngineFactory. \
                 Mobile: wrap the platform media player.",
            )
        })?;

        let overlay_display = self.overlay_display.ok_or_else(|| {
            capability_missing(
                "OverlayDisplay",
                "OverlayDisplay implementation is required to show the floating panel.",
            )
        })?;

        let status_surface = self.status_surface.ok_or_else(|| {
            capability_missing(
                "StatusSurface",
                "StatusSurface implementation is required for the persistent status entry.",
            )
        })?;

        let metadata_extractor = match self.metadata_extractor {
            Some(extractor) => extractor,
            None => provide_default_metadata_extractor()?,
        };

        let capability_gate = match self.capability_gate {
            Some(gate) => gate,
            None => provide_default_capability_gate()?,
        };

        let notice_sink = match self.notice_sink {
            Some(sink) => sink,
            None => provide_default_notice_sink()?,
        };

        let ui_dispatcher = self
            .ui_dispatcher
            .unwrap_or_else(|| Arc::new(InlineDispatcher));

        let config = PlayerConfig {
            engine_factory,
            metadata_extractor,
            capability_gate,
            overlay_display,
            status_surface,
            ui_dispatcher,
            notice_sink,
            settings_store: self.settings_store,
            poll_interval: self.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL),
            event_buffer_size: self.event_buffer_size.unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
            preferences: self.preferences,
        };

        config.validate()?;
        Ok(config)
    }
}
