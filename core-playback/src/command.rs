//! Control commands accepted by the synchronization engine.
//!
//! Commands arrive from three surfaces: overlay gestures, status entry
//! buttons and the external command channel. All of them are normalized into
//! [`ControlCommand`] before reaching the controller.

use crate::overlay::OverlayCommand;

use bridge_traits::StatusAction;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    TogglePlayPause,
    ToggleLoop,
    /// Seek to an absolute position; clamped by the controller.
    Seek(i64),
    Exit,
    /// Forwarded to the host; does not touch playback.
    OpenSettings,
}

/// Trigger string not understood by the command channel.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unrecognized trigger: {0:?}")]
pub struct UnknownTrigger(pub String);

impl ControlCommand {
    /// Parses an external command channel trigger. Unknown triggers yield `None`.
    pub fn from_trigger(trigger: &str) -> Option<Self> {
        match trigger.trim() {
            "toggle-play-pause" => Some(ControlCommand::TogglePlayPause),
            "toggle-loop" => Some(ControlCommand::ToggleLoop),
            "exit" => Some(ControlCommand::Exit),
            _ => None,
        }
    }

    /// Trigger string for commands reachable from the command channel.
    pub fn trigger(&self) -> Option<&'static str> {
        match self {
            ControlCommand::TogglePlayPause => Some(StatusAction::TogglePlayPause.trigger()),
            ControlCommand::ToggleLoop => Some(StatusAction::ToggleLoop.trigger()),
            ControlCommand::Exit => Some(StatusAction::Exit.trigger()),
            ControlCommand::Seek(_) | ControlCommand::OpenSettings => None,
        }
    }
}

impl FromStr for ControlCommand {
    type Err = UnknownTrigger;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_trigger(s).ok_or_else(|| UnknownTrigger(s.to_string()))
    }
}

impl fmt::Display for ControlCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControlCommand::Seek(ms) => write!(f, "seek({})", ms),
            ControlCommand::OpenSettings => f.write_str("open-settings"),
            other => f.write_str(other.trigger().unwrap_or_default()),
        }
    }
}

impl From<StatusAction> for ControlCommand {
    fn from(action: StatusAction) -> Self {
        match action {
            StatusAction::TogglePlayPause => ControlCommand::TogglePlayPause,
            StatusAction::ToggleLoop => ControlCommand::ToggleLoop,
            StatusAction::Exit => ControlCommand::Exit,
        }
    }
}

impl From<OverlayCommand> for ControlCommand {
    fn from(command: OverlayCommand) -> Self {
        match command {
            OverlayCommand::SettingsRequested => ControlCommand::OpenSettings,
            OverlayCommand::CloseRequested => ControlCommand::Exit,
            OverlayCommand::PlayPauseToggled => ControlCommand::TogglePlayPause,
            OverlayCommand::LoopToggled => ControlCommand::ToggleLoop,
            OverlayCommand::SeekRequested(ms) => ControlCommand::Seek(ms),
        }
    }
}
