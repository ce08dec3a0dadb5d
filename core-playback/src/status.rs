//! Status surface projection.
//!
//! The status entry is rebuilt from scratch on every push: title, subtitle,
//! artwork and exactly three actions in fixed order. Publishing also
//! re-asserts the entry's foreground/visible status, so pushes are never
//! deduplicated here.

use crate::snapshot::PlaybackSnapshot;

use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{MediaMetadata, StatusAction, StatusButton, StatusIcon, StatusSurface, StatusView};

use std::sync::Arc;
use tracing::trace;

/// Builds the status view for `snapshot`.
pub fn project(snapshot: &PlaybackSnapshot, metadata: Option<&MediaMetadata>) -> StatusView {
    let play_pause = if snapshot.is_playing {
        StatusButton {
            action: StatusAction::TogglePlayPause,
            label: "Pause",
            icon: StatusIcon::Pause,
        }
    } else {
        StatusButton {
            action: StatusAction::TogglePlayPause,
            label: "Play",
            icon: StatusIcon::Play,
        }
    };

    let looping = if snapshot.is_looping {
        StatusButton {
            action: StatusAction::ToggleLoop,
            label: "No loop",
            icon: StatusIcon::LoopOn,
        }
    } else {
        StatusButton {
            action: StatusAction::ToggleLoop,
            label: "Loop",
            icon: StatusIcon::LoopOff,
        }
    };

    let exit = StatusButton {
        action: StatusAction::Exit,
        label: "Exit",
        icon: StatusIcon::Close,
    };

    StatusView {
        title: metadata.map(|m| m.title.clone()).unwrap_or_default(),
        subtitle: metadata.and_then(|m| m.subtitle.clone()),
        artwork: metadata.and_then(|m| m.artwork.clone()),
        buttons: [play_pause, looping, exit],
        compact: [0, 1, 2],
    }
}

/// Owns the status surface on the UI context.
pub struct StatusPresenter {
    surface: Arc<dyn StatusSurface>,
    visible: bool,
    last_view: Option<StatusView>,
}

impl StatusPresenter {
    pub fn new(surface: Arc<dyn StatusSurface>) -> Self {
        Self {
            surface,
            visible: false,
            last_view: None,
        }
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn last_view(&self) -> Option<&StatusView> {
        self.last_view.as_ref()
    }

    /// Rebuilds and publishes the entry.
    pub fn push(
        &mut self,
        snapshot: &PlaybackSnapshot,
        metadata: Option<&MediaMetadata>,
    ) -> BridgeResult<()> {
        let view = project(snapshot, metadata);
        self.surface.publish(&view)?;
        trace!(label = view.buttons[0].label, "status published");
        self.visible = true;
        self.last_view = Some(view);
        Ok(())
    }

    /// Removes the entry. No-op when nothing is shown.
    pub fn clear(&mut self) -> BridgeResult<()> {
        if !self.visible {
            return Ok(());
        }
        self.visible = false;
        self.last_view = None;
        self.surface.clear()
    }
}

impl std::fmt::Debug for StatusPresenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusPresenter")
            .field("visible", &self.visible)
            .finish()
    }
}
