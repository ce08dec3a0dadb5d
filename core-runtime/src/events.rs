//! # Event Bus System
//!
//! Broadcasts session and playback events from the core to anyone interested
//! (host navigation, diagnostics, tests) using `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! - **Event Types**: `CoreEvent` wraps `SessionEvent` (lifecycle) and
//!   `PlaybackEvent` (state pushes)
//! - **EventBus**: central broadcast channel
//! - **EventStream**: receiver wrapper with optional filtering
//!
//! ```text
//! ┌────────────────────┐    emit     ┌──────────┐   subscribe   ┌──────────────┐
//! │ PlaybackController ├────────────>│ EventBus ├──────────────>│ Host / tests │
//! └────────────────────┘             └──────────┘               └──────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, SessionEvent};
//!
//! let bus = EventBus::new(16);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Session(SessionEvent::SettingsRequested)).ok();
//! assert_eq!(
//!     rx.try_recv().unwrap(),
//!     CoreEvent::Session(SessionEvent::SettingsRequested)
//! );
//! ```
//!
//! ## Error Handling
//!
//! `emit` returns an error only when nobody is subscribed. The core always
//! discards that error; a player with no listeners is normal.
//!
//! Subscribers should handle `RecvError::Lagged` gracefully and treat
//! `RecvError::Closed` as a signal to exit.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// The poller does not publish here, so traffic is one event per state push.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Session lifecycle
    Session(SessionEvent),
    /// Snapshot pushes
    Playback(PlaybackEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Session(e) => e.description(),
            CoreEvent::Playback(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Session(SessionEvent::LoadFailed { .. }) => EventSeverity::Error,
            CoreEvent::Session(SessionEvent::Ended {
                reason: EndReason::EngineFailure { .. },
                ..
            }) => EventSeverity::Error,
            CoreEvent::Session(SessionEvent::Ready { .. })
            | CoreEvent::Session(SessionEvent::Ended { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Session Events
// ============================================================================

/// Why a session ended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind")]
pub enum EndReason {
    /// `exit` command from any surface
    Exit,
    /// The engine reported an unrecoverable error
    EngineFailure { message: String },
    /// A non-looping source finished and close-on-completion is set
    Completed,
    /// A new source was loaded over this one
    Replaced,
}

/// Session lifecycle events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum SessionEvent {
    /// A source was accepted and the engine is preparing.
    Loading {
        session_id: String,
        /// Display name of the source (never a full path)
        source: String,
    },
    /// The engine is ready and playback has started.
    Ready {
        session_id: String,
        duration_ms: i64,
    },
    /// The session was torn down.
    Ended {
        session_id: String,
        reason: EndReason,
    },
    /// A load command failed; no session was created.
    LoadFailed { source: String, message: String },
    /// The overlay's settings control was pressed.
    SettingsRequested,
}

impl SessionEvent {
    pub fn description(&self) -> &str {
        match self {
            SessionEvent::Loading { .. } => "Loading source",
            SessionEvent::Ready { .. } => "Session ready",
            SessionEvent::Ended { .. } => "Session ended",
            SessionEvent::LoadFailed { .. } => "Source failed to load",
            SessionEvent::SettingsRequested => "Settings requested",
        }
    }
}

// ============================================================================
// Playback Events
// ============================================================================

/// Events emitted alongside every view push.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// Both views were updated from this snapshot.
    StateChanged {
        session_id: String,
        is_playing: bool,
        is_looping: bool,
        position_ms: i64,
        duration_ms: i64,
    },
    /// The engine reached the end of the source.
    Completed { session_id: String, looped: bool },
}

impl PlaybackEvent {
    pub fn description(&self) -> &str {
        match self {
            PlaybackEvent::StateChanged { .. } => "Playback state changed",
            PlaybackEvent::Completed { .. } => "Playback completed",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus. Cheap to clone; all clones share one channel.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// Subscribers that fall behind by more than `capacity` events receive
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A wrapper around `broadcast::Receiver` with optional filtering.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let bus = EventBus::new(16);
/// let sessions_only = EventStream::new(bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Session(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_changed(playing: bool) -> CoreEvent {
        CoreEvent::Playback(PlaybackEvent::StateChanged {
            session_id: "s-1".to_string(),
            is_playing: playing,
            is_looping: false,
            position_ms: 0,
            duration_ms: 120_000,
        })
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(state_changed(true)).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        assert_eq!(bus.emit(state_changed(true)).unwrap(), 2);

        assert_eq!(first.recv().await.unwrap(), state_changed(true));
        assert_eq!(second.recv().await.unwrap(), state_changed(true));
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Session(_)));

        bus.emit(state_changed(true)).unwrap();
        bus.emit(CoreEvent::Session(SessionEvent::SettingsRequested))
            .unwrap();

        let event = stream.recv().await.unwrap();
        assert_eq!(event, CoreEvent::Session(SessionEvent::SettingsRequested));
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();

        for _ in 0..5 {
            bus.emit(state_changed(false)).unwrap();
        }

        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(_))));
        assert!(rx.recv().await.is_ok());
    }

    #[test]
    fn test_event_severity() {
        let failure = CoreEvent::Session(SessionEvent::Ended {
            session_id: "s-1".to_string(),
            reason: EndReason::EngineFailure {
                message: "decoder crashed".to_string(),
            },
        });
        assert_eq!(failure.severity(), EventSeverity::Error);

        let exit = CoreEvent::Session(SessionEvent::Ended {
            session_id: "s-1".to_string(),
            reason: EndReason::Exit,
        });
        assert_eq!(exit.severity(), EventSeverity::Info);

        assert_eq!(state_changed(true).severity(), EventSeverity::Debug);
        assert_eq!(
            CoreEvent::Session(SessionEvent::LoadFailed {
                source: "song.mp3".to_string(),
                message: "unreadable".to_string(),
            })
            .severity(),
            EventSeverity::Error
        );
    }

    #[test]
    fn test_event_description() {
        assert_eq!(state_changed(true).description(), "Playback state changed");
        assert_eq!(
            CoreEvent::Session(SessionEvent::SettingsRequested).description(),
            "Settings requested"
        );
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Session(SessionEvent::Ended {
            session_id: "s-1".to_string(),
            reason: EndReason::Completed,
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"Session\""));
        assert!(json.contains("\"kind\":\"Completed\""));

        let back: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[tokio::test]
    async fn test_try_recv_empty() {
        let bus = EventBus::default();
        let mut stream = EventStream::new(bus.subscribe());
        assert!(stream.try_recv().is_none());
    }
}
