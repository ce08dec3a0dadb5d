//! Canonical playback state.
//!
//! [`PlaybackSnapshot`] is the single value both views are projected from.
//! It is always normalized: position is never negative, and never past the
//! duration once the duration is known.

use bridge_traits::EngineStatus;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifies one load-to-teardown session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle of the synchronization engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SessionPhase {
    /// No source loaded.
    #[default]
    Idle,
    /// Source handed to the engine, waiting for ready.
    Preparing,
    /// Engine ready; playback controls apply.
    Active,
}

impl SessionPhase {
    pub fn has_source(self) -> bool {
        !matches!(self, SessionPhase::Idle)
    }
}

/// Point-in-time playback state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    pub source_loaded: bool,
    pub is_playing: bool,
    pub is_looping: bool,
    pub position_ms: i64,
    /// `0` while unknown.
    pub duration_ms: i64,
}

impl PlaybackSnapshot {
    /// Snapshot of an idle controller.
    pub fn idle() -> Self {
        Self::default()
    }

    /// Builds a normalized snapshot from an engine status sample.
    pub fn from_status(status: EngineStatus) -> Self {
        Self {
            source_loaded: true,
            is_playing: status.is_playing,
            is_looping: status.is_looping,
            position_ms: status.position_ms,
            duration_ms: status.duration_ms,
        }
        .normalized()
    }

    /// Enforces `0 <= position <= duration` (upper bound only when known).
    pub fn normalized(mut self) -> Self {
        self.duration_ms = self.duration_ms.max(0);
        self.position_ms = self.position_ms.max(0);
        if self.duration_ms > 0 {
            self.position_ms = self.position_ms.min(self.duration_ms);
        }
        self
    }

    pub fn has_duration(&self) -> bool {
        self.duration_ms > 0
    }

    /// Fraction of the source played, `None` while the duration is unknown.
    pub fn progress(&self) -> Option<f64> {
        self.has_duration()
            .then(|| self.position_ms as f64 / self.duration_ms as f64)
    }
}

/// Clamps a requested seek target into `[0, duration_ms]`.
///
/// An unknown duration collapses the range to the start of the source.
pub fn clamp_seek(target_ms: i64, duration_ms: i64) -> i64 {
    target_ms.clamp(0, duration_ms.max(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status_clamps_position() {
        let snap = PlaybackSnapshot::from_status(EngineStatus {
            is_playing: true,
            is_looping: false,
            position_ms: 120_480,
            duration_ms: 120_000,
        });
        assert_eq!(snap.position_ms, 120_000);
        assert!(snap.source_loaded);

        let negative = PlaybackSnapshot::from_status(EngineStatus {
            position_ms: -12,
            duration_ms: -1,
            ..Default::default()
        });
        assert_eq!(negative.position_ms, 0);
        assert_eq!(negative.duration_ms, 0);
        assert!(negative.progress().is_none());
    }

    #[test]
    fn test_unknown_duration_keeps_position() {
        let snap = PlaybackSnapshot {
            source_loaded: true,
            position_ms: 5_000,
            ..Default::default()
        }
        .normalized();
        assert_eq!(snap.position_ms, 5_000);
        assert!(!snap.has_duration());
    }

    #[test]
    fn test_clamp_seek() {
        assert_eq!(clamp_seek(150_000, 120_000), 120_000);
        assert_eq!(clamp_seek(-5, 120_000), 0);
        assert_eq!(clamp_seek(42, 120_000), 42);
        assert_eq!(clamp_seek(9_000, 0), 0);
        assert_eq!(clamp_seek(9_000, -1), 0);
    }

    #[test]
    fn test_progress() {
        let snap = PlaybackSnapshot {
            source_loaded: true,
            position_ms: 30_000,
            duration_ms: 120_000,
            ..Default::default()
        };
        assert_eq!(snap.progress(), Some(0.25));
    }

    #[test]
    fn test_phase_has_source() {
        assert!(!SessionPhase::Idle.has_source());
        assert!(SessionPhase::Preparing.has_source());
        assert!(SessionPhase::Active.has_source());
    }

    #[test]
    fn test_session_ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
    }
}
