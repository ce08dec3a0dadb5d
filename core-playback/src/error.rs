//! # Playback Error Types
//!
//! Errors surfaced by the synchronization engine.

use bridge_traits::BridgeError;
use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Load Failures
    // ========================================================================
    /// The source reference was empty or could not be parsed.
    #[error("Invalid source reference: {0:?}")]
    InvalidSource(String),

    /// The source could not be opened or read.
    #[error("Source unreadable: {source_ref}: {message}")]
    SourceUnreadable { source_ref: String, message: String },

    /// The source was read but its format is not supported.
    #[error("Unsupported format: {source_ref}: {message}")]
    UnsupportedFormat { source_ref: String, message: String },

    /// `exit` arrived while the load was in flight; no session was started.
    #[error("Load cancelled by exit")]
    LoadCancelled,

    // ========================================================================
    // Session Errors
    // ========================================================================
    /// The engine reported an unrecoverable error.
    #[error("Engine failure ({code}): {message}")]
    EngineFailure { code: i32, message: String },

    /// The overlay was requested but the platform denied it.
    #[error("Overlay capability denied")]
    CapabilityDenied,

    /// The operation needs a loaded source.
    #[error("No active session")]
    NoActiveSession,

    /// The engine has been released or could not be created.
    #[error("Playback engine unavailable: {0}")]
    EngineUnavailable(String),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Classifies a bridge error raised while loading `source_ref`.
    pub fn load_failure(source_ref: impl Into<String>, err: BridgeError) -> Self {
        let source_ref = source_ref.into();
        match err {
            BridgeError::Unsupported(message) => PlaybackError::UnsupportedFormat {
                source_ref,
                message,
            },
            other => PlaybackError::SourceUnreadable {
                source_ref,
                message: other.to_string(),
            },
        }
    }

    /// Returns `true` if this error means a `loadSource` did not start a session.
    pub fn is_load_failure(&self) -> bool {
        matches!(
            self,
            PlaybackError::InvalidSource(_)
                | PlaybackError::SourceUnreadable { .. }
                | PlaybackError::UnsupportedFormat { .. }
        )
    }

    /// Returns `true` if this error ends the session.
    pub fn is_fatal(&self) -> bool {
        matches!(self, PlaybackError::EngineFailure { .. })
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
