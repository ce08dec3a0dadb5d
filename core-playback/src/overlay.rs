//! # Overlay Widget
//!
//! Behaviour of the floating panel: what it shows, how it is dragged and
//! locked, and how the scrubbable timeline arbitrates between the user's
//! finger and engine-driven position updates.
//!
//! [`OverlayWidget`] is a plain state machine owned by the UI context. It
//! renders through an [`OverlayDisplay`] and returns [`OverlayCommand`]s for
//! the gestures that need the synchronization engine. [`OverlayControl`] is
//! the entry point hosts wire their input events to; it forwards commands to
//! a listener after releasing the widget lock.
//!
//! ## Timeline arbitration
//!
//! While the user scrubs, pushes from the engine update the cached position
//! and labels but leave the displayed timeline value alone, unless the
//! duration changed. Releasing the timeline emits exactly one
//! [`OverlayCommand::SeekRequested`]; the next push then shows the engine's
//! real position again.

use crate::snapshot::{clamp_seek, PlaybackSnapshot};

use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{MediaMetadata, OverlayDisplay, OverlayFrame, ScreenPoint, TimelineView};

use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, trace};

/// Commands the overlay sends upward.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayCommand {
    SettingsRequested,
    CloseRequested,
    PlayPauseToggled,
    LoopToggled,
    /// Emitted only when the timeline is released.
    SeekRequested(i64),
}

/// Tappable controls on the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverlayButton {
    Settings,
    Close,
    PlayPause,
    Loop,
    Lock,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TouchPhase {
    Down,
    Move,
    Up,
    Cancel,
}

/// Touch on the panel's drag area, in raw screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TouchEvent {
    pub phase: TouchPhase,
    pub point: ScreenPoint,
}

impl TouchEvent {
    pub fn new(phase: TouchPhase, x: f32, y: f32) -> Self {
        Self {
            phase,
            point: ScreenPoint::new(x, y),
        }
    }
}

/// Formats milliseconds as `m:ss`. Minutes are not wrapped into hours.
pub fn format_timestamp(ms: i64) -> String {
    let total_secs = ms.max(0) / 1000;
    format!("{}:{:02}", total_secs / 60, total_secs % 60)
}

pub struct OverlayWidget {
    display: Arc<dyn OverlayDisplay>,
    attached: bool,
    origin: ScreenPoint,
    drag_offset: Option<ScreenPoint>,
    locked: bool,
    scrubbing: bool,
    metadata: Option<MediaMetadata>,
    /// Last values pushed by the engine side.
    engine: PlaybackSnapshot,
    /// Value the timeline currently shows.
    displayed_ms: i64,
    last_frame: Option<OverlayFrame>,
}

impl OverlayWidget {
    pub fn new(display: Arc<dyn OverlayDisplay>, origin: ScreenPoint) -> Self {
        Self {
            display,
            attached: false,
            origin,
            drag_offset: None,
            locked: false,
            scrubbing: false,
            metadata: None,
            engine: PlaybackSnapshot::idle(),
            displayed_ms: 0,
            last_frame: None,
        }
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn is_scrubbing(&self) -> bool {
        self.scrubbing
    }

    pub fn is_dragging(&self) -> bool {
        self.drag_offset.is_some()
    }

    pub fn origin(&self) -> ScreenPoint {
        self.origin
    }

    pub fn displayed_position_ms(&self) -> i64 {
        self.displayed_ms
    }

    /// Last engine-side state this widget received.
    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.engine
    }

    /// Adds the panel to the screen. Returns `false` if it already was.
    pub fn attach(&mut self) -> BridgeResult<bool> {
        if self.attached {
            return Ok(false);
        }
        self.display.attach(self.origin)?;
        self.attached = true;
        self.last_frame = None;
        debug!(x = self.origin.x, y = self.origin.y, "overlay attached");
        self.render_if_changed();
        Ok(true)
    }

    /// Removes the panel. Returns `false` if it was not attached.
    ///
    /// The widget counts as detached even when the display call fails.
    pub fn detach(&mut self) -> BridgeResult<bool> {
        if !self.attached {
            return Ok(false);
        }
        self.attached = false;
        self.drag_offset = None;
        self.scrubbing = false;
        self.last_frame = None;
        self.display.detach()?;
        debug!("overlay detached");
        Ok(true)
    }

    /// Replaces the title/subtitle/artwork source. `None` clears them.
    pub fn set_metadata(&mut self, metadata: Option<MediaMetadata>) {
        if self.metadata == metadata {
            return;
        }
        self.metadata = metadata;
        self.render_if_changed();
    }

    /// Full state push from the synchronization engine.
    pub fn push_state(&mut self, snapshot: PlaybackSnapshot) {
        self.apply_timeline(snapshot.position_ms, snapshot.duration_ms);
        self.engine = snapshot;
        self.render_if_changed();
    }

    /// Metadata and state together, rendered as one frame.
    pub fn present(&mut self, metadata: Option<MediaMetadata>, snapshot: PlaybackSnapshot) {
        self.metadata = metadata;
        self.push_state(snapshot);
    }

    /// Position sample from the poller. Play/loop flags are left alone.
    pub fn push_position(&mut self, position_ms: i64, duration_ms: i64) {
        if !self.engine.source_loaded {
            return;
        }
        let sample = PlaybackSnapshot {
            position_ms,
            duration_ms,
            ..self.engine
        }
        .normalized();
        self.apply_timeline(sample.position_ms, sample.duration_ms);
        self.engine = sample;
        self.render_if_changed();
    }

    fn apply_timeline(&mut self, position_ms: i64, duration_ms: i64) {
        let duration_changed = duration_ms != self.engine.duration_ms;
        if !self.scrubbing || duration_changed {
            self.displayed_ms = position_ms;
        } else {
            trace!(position_ms, "timeline held while scrubbing");
        }
    }

    /// Drag handling. Ignored entirely while locked, except that a gesture
    /// already in progress is always ended.
    pub fn on_touch(&mut self, event: TouchEvent) -> BridgeResult<()> {
        match event.phase {
            TouchPhase::Down => {
                if self.locked {
                    return Ok(());
                }
                self.drag_offset = Some(self.origin - event.point);
                self.render_if_changed();
            }
            TouchPhase::Move => {
                let Some(offset) = self.drag_offset else {
                    return Ok(());
                };
                if self.locked {
                    return Ok(());
                }
                self.origin = event.point + offset;
                if self.attached {
                    self.display.move_to(self.origin)?;
                }
            }
            TouchPhase::Up | TouchPhase::Cancel => {
                if self.drag_offset.take().is_some() {
                    self.render_if_changed();
                }
            }
        }
        Ok(())
    }

    pub fn set_locked(&mut self, locked: bool) {
        if self.locked == locked {
            return;
        }
        self.locked = locked;
        if locked {
            self.drag_offset = None;
        }
        self.render_if_changed();
    }

    /// Finger down on the timeline.
    pub fn scrub_start(&mut self) {
        if !self.timeline_enabled() {
            return;
        }
        self.scrubbing = true;
    }

    /// Finger moving on the timeline; only the displayed value changes.
    pub fn scrub_move(&mut self, value_ms: i64) {
        if !self.scrubbing {
            return;
        }
        self.displayed_ms = clamp_seek(value_ms, self.engine.duration_ms);
        self.render_if_changed();
    }

    /// Finger released on the timeline. Yields the single seek request.
    pub fn scrub_end(&mut self, value_ms: i64) -> Option<OverlayCommand> {
        if !self.scrubbing {
            return None;
        }
        self.scrubbing = false;
        let target = clamp_seek(value_ms, self.engine.duration_ms);
        self.displayed_ms = target;
        self.render_if_changed();
        Some(OverlayCommand::SeekRequested(target))
    }

    pub fn press(&mut self, button: OverlayButton) -> Option<OverlayCommand> {
        match button {
            OverlayButton::Settings => Some(OverlayCommand::SettingsRequested),
            OverlayButton::Close => Some(OverlayCommand::CloseRequested),
            OverlayButton::PlayPause => Some(OverlayCommand::PlayPauseToggled),
            OverlayButton::Loop => Some(OverlayCommand::LoopToggled),
            OverlayButton::Lock => {
                self.set_locked(!self.locked);
                None
            }
        }
    }

    fn timeline_enabled(&self) -> bool {
        self.engine.duration_ms > 0
    }

    /// The frame the panel should currently show.
    pub fn frame(&self) -> OverlayFrame {
        let timeline = if self.timeline_enabled() {
            TimelineView {
                enabled: true,
                value_ms: self.displayed_ms,
                max_ms: Some(self.engine.duration_ms),
            }
        } else {
            TimelineView::unknown()
        };

        let (title, subtitle, artwork) = match &self.metadata {
            Some(meta) => (meta.title.clone(), meta.subtitle.clone(), meta.artwork.clone()),
            None => (String::new(), None, None),
        };

        OverlayFrame {
            title,
            subtitle,
            artwork,
            is_playing: self.engine.is_playing,
            is_looping: self.engine.is_looping,
            timeline,
            elapsed_label: format_timestamp(self.engine.position_ms),
            total_label: format_timestamp(self.engine.duration_ms),
            locked: self.locked,
            elevated: self.drag_offset.is_some(),
        }
    }

    fn render_if_changed(&mut self) {
        if !self.attached {
            return;
        }
        let frame = self.frame();
        if self.last_frame.as_ref() == Some(&frame) {
            return;
        }
        self.display.render(&frame);
        self.last_frame = Some(frame);
    }
}

impl std::fmt::Debug for OverlayWidget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayWidget")
            .field("attached", &self.attached)
            .field("origin", &self.origin)
            .field("locked", &self.locked)
            .field("scrubbing", &self.scrubbing)
            .field("displayed_ms", &self.displayed_ms)
            .finish()
    }
}

/// Receives overlay commands.
pub type OverlayListener = Arc<dyn Fn(OverlayCommand) + Send + Sync>;

/// Input entry point for the overlay, called from the UI context.
///
/// The widget lock is released before the listener runs, so listeners may
/// push state straight back into the widget.
#[derive(Clone)]
pub struct OverlayControl {
    widget: Arc<Mutex<OverlayWidget>>,
    listener: Arc<Mutex<Option<OverlayListener>>>,
}

impl OverlayControl {
    pub fn new(widget: Arc<Mutex<OverlayWidget>>) -> Self {
        Self {
            widget,
            listener: Arc::new(Mutex::new(None)),
        }
    }

    pub fn set_listener(&self, listener: OverlayListener) {
        *self.listener.lock() = Some(listener);
    }

    pub fn clear_listener(&self) {
        self.listener.lock().take();
    }

    pub fn widget(&self) -> &Arc<Mutex<OverlayWidget>> {
        &self.widget
    }

    pub fn press(&self, button: OverlayButton) {
        let command = self.widget.lock().press(button);
        self.dispatch(command);
    }

    pub fn touch(&self, event: TouchEvent) {
        if let Err(err) = self.widget.lock().on_touch(event) {
            debug!(error = %err, "overlay move failed");
        }
    }

    pub fn scrub_start(&self) {
        self.widget.lock().scrub_start();
    }

    pub fn scrub_move(&self, value_ms: i64) {
        self.widget.lock().scrub_move(value_ms);
    }

    pub fn scrub_end(&self, value_ms: i64) {
        let command = self.widget.lock().scrub_end(value_ms);
        self.dispatch(command);
    }

    fn dispatch(&self, command: Option<OverlayCommand>) {
        let Some(command) = command else {
            return;
        };
        let listener = self.listener.lock().clone();
        match listener {
            Some(listener) => listener(command),
            None => trace!(?command, "overlay command without listener"),
        }
    }
}

impl std::fmt::Debug for OverlayControl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayControl")
            .field("has_listener", &self.listener.lock().is_some())
            .finish()
    }
}
