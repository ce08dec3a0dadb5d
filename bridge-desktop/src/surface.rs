//! Log-backed view surfaces.
//!
//! Headless desktop runs have no compositor to draw on, so the overlay panel,
//! the status entry and transient notices are written to `tracing` instead.
//! Each surface also keeps the small amount of state a real one would
//! (attached, visible, last content) so hosts and tests can inspect it.

use bridge_traits::error::Result;
use bridge_traits::{
    CapabilityGate, Notice, NoticeSink, OverlayDisplay, OverlayFrame, ScreenPoint, StatusSurface,
    StatusView,
};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
pub struct TracingOverlayDisplay {
    attached: AtomicBool,
    origin: Mutex<ScreenPoint>,
    last_frame: Mutex<Option<OverlayFrame>>,
}

impl TracingOverlayDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn origin(&self) -> ScreenPoint {
        *self.origin.lock()
    }

    pub fn last_frame(&self) -> Option<OverlayFrame> {
        self.last_frame.lock().clone()
    }
}

impl OverlayDisplay for TracingOverlayDisplay {
    fn attach(&self, origin: ScreenPoint) -> Result<()> {
        *self.origin.lock() = origin;
        if !self.attached.swap(true, Ordering::AcqRel) {
            info!(x = origin.x, y = origin.y, "overlay shown");
        }
        Ok(())
    }

    fn detach(&self) -> Result<()> {
        if self.attached.swap(false, Ordering::AcqRel) {
            info!("overlay hidden");
        }
        Ok(())
    }

    fn is_attached(&self) -> bool {
        self.attached.load(Ordering::Acquire)
    }

    fn move_to(&self, origin: ScreenPoint) -> Result<()> {
        *self.origin.lock() = origin;
        debug!(x = origin.x, y = origin.y, "overlay moved");
        Ok(())
    }

    fn render(&self, frame: &OverlayFrame) {
        debug!(
            title = %frame.title,
            playing = frame.is_playing,
            looping = frame.is_looping,
            elapsed = %frame.elapsed_label,
            total = %frame.total_label,
            locked = frame.locked,
            "overlay frame"
        );
        *self.last_frame.lock() = Some(frame.clone());
    }
}

#[derive(Debug, Default)]
pub struct TracingStatusSurface {
    last_view: Mutex<Option<StatusView>>,
}

impl TracingStatusSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_visible(&self) -> bool {
        self.last_view.lock().is_some()
    }

    pub fn last_view(&self) -> Option<StatusView> {
        self.last_view.lock().clone()
    }
}

impl StatusSurface for TracingStatusSurface {
    fn publish(&self, view: &StatusView) -> Result<()> {
        let actions: Vec<&str> = view.buttons.iter().map(|b| b.label).collect();
        info!(
            title = %view.title,
            subtitle = view.subtitle.as_deref().unwrap_or(""),
            actions = ?actions,
            "status entry"
        );
        *self.last_view.lock() = Some(view.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.last_view.lock().take().is_some() {
            info!("status entry removed");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNoticeSink;

impl NoticeSink for TracingNoticeSink {
    fn show(&self, notice: Notice) {
        warn!(notice = %notice.text(), "notice");
    }
}

/// Desktop window managers let any process keep a window on top, so the
/// overlay is allowed unless the host says otherwise.
#[derive(Debug, Clone, Copy)]
pub struct DesktopCapabilityGate {
    overlay_allowed: bool,
}

impl DesktopCapabilityGate {
    pub fn new(overlay_allowed: bool) -> Self {
        Self { overlay_allowed }
    }
}

impl Default for DesktopCapabilityGate {
    fn default() -> Self {
        Self::new(true)
    }
}

impl CapabilityGate for DesktopCapabilityGate {
    fn can_show_overlay(&self) -> bool {
        self.overlay_allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::{StatusAction, StatusButton, StatusIcon, TimelineView};

    fn frame(title: &str) -> OverlayFrame {
        OverlayFrame {
            title: title.to_string(),
            subtitle: None,
            artwork: None,
            is_playing: true,
            is_looping: false,
            timeline: TimelineView::unknown(),
            elapsed_label: "0:00".to_string(),
            total_label: "0:00".to_string(),
            locked: false,
            elevated: false,
        }
    }

    #[test]
    fn test_overlay_tracks_attachment_and_frames() {
        let overlay = TracingOverlayDisplay::new();
        assert!(!overlay.is_attached());

        overlay.attach(ScreenPoint::new(10.0, 20.0)).unwrap();
        overlay.attach(ScreenPoint::new(10.0, 20.0)).unwrap();
        assert!(overlay.is_attached());

        overlay.move_to(ScreenPoint::new(30.0, 40.0)).unwrap();
        assert_eq!(overlay.origin(), ScreenPoint::new(30.0, 40.0));

        overlay.render(&frame("Song"));
        assert_eq!(overlay.last_frame().unwrap().title, "Song");

        overlay.detach().unwrap();
        overlay.detach().unwrap();
        assert!(!overlay.is_attached());
    }

    #[test]
    fn test_status_visibility_follows_publish_and_clear() {
        let status = TracingStatusSurface::new();
        let button = |action, label, icon| StatusButton {
            action,
            label,
            icon,
        };
        let view = StatusView {
            title: "Song".to_string(),
            subtitle: Some("Artist".to_string()),
            artwork: None,
            buttons: [
                button(StatusAction::TogglePlayPause, "Pause", StatusIcon::Pause),
                button(StatusAction::ToggleLoop, "Loop", StatusIcon::LoopOff),
                button(StatusAction::Exit, "Exit", StatusIcon::Close),
            ],
            compact: [0, 1, 2],
        };

        status.publish(&view).unwrap();
        assert!(status.is_visible());
        assert_eq!(status.last_view(), Some(view));

        status.clear().unwrap();
        status.clear().unwrap();
        assert!(!status.is_visible());
    }

    #[test]
    fn test_capability_gate() {
        assert!(DesktopCapabilityGate::default().can_show_overlay());
        assert!(!DesktopCapabilityGate::new(false).can_show_overlay());
    }
}
