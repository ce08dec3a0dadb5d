//! Settings Storage Abstraction
//!
//! Provides a platform-agnostic key-value store for persisted preferences.
//! The core only reads from it; hosts write preferences from their own
//! settings screens.

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::Result;

/// Notification that a stored value changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettingChange {
    pub key: String,
}

/// Key-value settings storage trait
///
/// Abstracts platform-specific preferences/settings storage:
/// - Android: SharedPreferences / DataStore
/// - iOS: UserDefaults
/// - Desktop: SQLite-backed store or config files
///
/// # Example
///
/// ```ignore
/// use bridge_traits::storage::SettingsStore;
///
/// async fn overlay_enabled(store: &dyn SettingsStore) -> Result<bool> {
///     Ok(store.get_bool("overlay_enabled").await?.unwrap_or(false))
/// }
/// ```
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Store a boolean value
    async fn set_bool(&self, key: &str, value: bool) -> Result<()>;

    /// Retrieve a boolean value; `None` when the key was never written.
    async fn get_bool(&self, key: &str) -> Result<Option<bool>>;

    /// Live change notifications, when the store supports them.
    fn subscribe(&self) -> Option<broadcast::Receiver<SettingChange>> {
        None
    }
}
