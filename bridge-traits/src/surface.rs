//! View surfaces the core renders into.
//!
//! The core owns what the overlay and the status entry show; hosts own how
//! they are drawn. Every call in this module is made from the UI-affinity
//! context, i.e. from inside a job posted through [`UiDispatcher`].

use crate::error::Result;
use crate::playback::Artwork;
use serde::{Deserialize, Serialize};

/// Screen coordinate in host pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
}

impl ScreenPoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

impl std::ops::Add for ScreenPoint {
    type Output = ScreenPoint;

    fn add(self, rhs: ScreenPoint) -> ScreenPoint {
        ScreenPoint::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for ScreenPoint {
    type Output = ScreenPoint;

    fn sub(self, rhs: ScreenPoint) -> ScreenPoint {
        ScreenPoint::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// Scrubbable timeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimelineView {
    pub enabled: bool,
    pub value_ms: i64,
    /// Upper bound of the scale; `None` renders an unbounded/unset scale.
    pub max_ms: Option<i64>,
}

impl TimelineView {
    /// Disabled, unbounded timeline shown while duration is unknown.
    pub fn unknown() -> Self {
        Self {
            enabled: false,
            value_ms: 0,
            max_ms: None,
        }
    }
}

impl Default for TimelineView {
    fn default() -> Self {
        Self::unknown()
    }
}

/// Everything the overlay panel draws.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlayFrame {
    pub title: String,
    pub subtitle: Option<String>,
    pub artwork: Option<Artwork>,
    pub is_playing: bool,
    pub is_looping: bool,
    pub timeline: TimelineView,
    pub elapsed_label: String,
    pub total_label: String,
    pub locked: bool,
    /// Raised while the panel is being dragged.
    pub elevated: bool,
}

/// Display primitive hosting the overlay panel.
///
/// `attach`/`detach` are idempotent on the host side as well; the core still
/// tracks the attached state to avoid redundant calls.
pub trait OverlayDisplay: Send + Sync {
    fn attach(&self, origin: ScreenPoint) -> Result<()>;

    fn detach(&self) -> Result<()>;

    fn is_attached(&self) -> bool;

    /// Move the panel; applied immediately, no animation.
    fn move_to(&self, origin: ScreenPoint) -> Result<()>;

    fn render(&self, frame: &OverlayFrame);
}

/// The three externally invokable status actions, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusAction {
    TogglePlayPause,
    ToggleLoop,
    Exit,
}

impl StatusAction {
    /// Fixed button order.
    pub const ORDER: [StatusAction; 3] = [
        StatusAction::TogglePlayPause,
        StatusAction::ToggleLoop,
        StatusAction::Exit,
    ];

    /// Command channel trigger fired when the button is pressed.
    pub fn trigger(&self) -> &'static str {
        match self {
            StatusAction::TogglePlayPause => "toggle-play-pause",
            StatusAction::ToggleLoop => "toggle-loop",
            StatusAction::Exit => "exit",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusIcon {
    Play,
    Pause,
    LoopOn,
    LoopOff,
    Close,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusButton {
    pub action: StatusAction,
    pub label: &'static str,
    pub icon: StatusIcon,
}

/// Fully rebuilt status entry.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusView {
    pub title: String,
    pub subtitle: Option<String>,
    pub artwork: Option<Artwork>,
    pub buttons: [StatusButton; 3],
    /// Button indices shown in the compact presentation.
    pub compact: [usize; 3],
}

/// OS-visible status entry (notification, tray item, media session).
pub trait StatusSurface: Send + Sync {
    /// Replace the entry and (re)assert foreground status for the process.
    fn publish(&self, view: &StatusView) -> Result<()>;

    /// Remove the entry and drop foreground status.
    fn clear(&self) -> Result<()>;
}

/// Job marshalled onto the UI-affinity context.
pub type UiJob = Box<dyn FnOnce() + Send + 'static>;

/// Marshals work onto the single UI-affinity context.
///
/// Jobs must run in posting order. `post` never blocks on the job itself.
pub trait UiDispatcher: Send + Sync {
    fn post(&self, job: UiJob);
}

/// Runs jobs on the calling thread. Suitable for tests and hosts whose
/// callers already live on the UI context.
#[derive(Debug, Clone, Copy, Default)]
pub struct InlineDispatcher;

impl UiDispatcher for InlineDispatcher {
    fn post(&self, job: UiJob) {
        job();
    }
}

/// Permission check for drawing over other applications.
pub trait CapabilityGate: Send + Sync {
    fn can_show_overlay(&self) -> bool;
}

/// Short user-visible message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    PlaybackFailed { message: String },
    LoadFailed { source: String, message: String },
}

impl Notice {
    pub fn text(&self) -> String {
        match self {
            Notice::PlaybackFailed { message } => format!("Playback failed: {}", message),
            Notice::LoadFailed { source, message } => {
                format!("Cannot open {}: {}", source, message)
            }
        }
    }
}

/// Transient messaging (toasts, snackbars, desktop notifications).
pub trait NoticeSink: Send + Sync {
    fn show(&self, notice: Notice);
}
