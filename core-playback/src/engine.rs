//! # Engine Adapter
//!
//! Wraps one [`PlaybackEngine`] for the lifetime of a session.
//!
//! The adapter adds what the raw bridge does not guarantee:
//! - commands are no-ops until a source has been bound
//! - `release` is idempotent and every later call is a no-op
//! - seeks are clamped into `[0, duration]`
//! - engine callbacks are tagged with the owning session and queued, so a
//!   late callback from a replaced engine can be told apart
//!
//! ```text
//!  engine thread                 queue                      controller
//! ┌──────────────┐  deliver  ┌───────────────┐  drain/run  ┌────────────┐
//! │ PlaybackEngine├─────────>│ SessionEvent- ├────────────>│ Controller │
//! └──────────────┘           │ Sink (mpsc)   │             └────────────┘
//!                            └───────────────┘
//! ```

use crate::error::{PlaybackError, Result};
use crate::snapshot::{clamp_seek, PlaybackSnapshot, SessionId};

use bridge_traits::{
    EngineEvent, EngineEventSink, EngineFactory, EngineStatus, MediaSource, PlaybackEngine,
};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

/// Engine callback tagged with the session whose engine produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedEngineEvent {
    pub session: SessionId,
    pub event: EngineEvent,
}

/// Sender half of the engine event queue.
pub type EngineEventSender = mpsc::UnboundedSender<TaggedEngineEvent>;
/// Receiver half of the engine event queue.
pub type EngineEventReceiver = mpsc::UnboundedReceiver<TaggedEngineEvent>;

/// Creates the engine event queue.
pub fn engine_event_queue() -> (EngineEventSender, EngineEventReceiver) {
    mpsc::unbounded_channel()
}

/// [`EngineEventSink`] handed to one engine; tags and enqueues its callbacks.
pub struct SessionEventSink {
    session: SessionId,
    queue: EngineEventSender,
}

impl SessionEventSink {
    pub fn new(session: SessionId, queue: EngineEventSender) -> Self {
        Self { session, queue }
    }
}

impl EngineEventSink for SessionEventSink {
    fn deliver(&self, event: EngineEvent) {
        trace!(session = %self.session, ?event, "engine callback queued");
        if self
            .queue
            .send(TaggedEngineEvent {
                session: self.session,
                event,
            })
            .is_err()
        {
            debug!(session = %self.session, "engine event queue closed; callback dropped");
        }
    }
}

/// Session-scoped handle over a [`PlaybackEngine`].
pub struct EngineHandle {
    session: SessionId,
    engine: Arc<dyn PlaybackEngine>,
    source_loaded: AtomicBool,
    released: AtomicBool,
}

impl EngineHandle {
    /// Creates a fresh engine for `session` whose callbacks go to `queue`.
    pub fn create(
        factory: &dyn EngineFactory,
        session: SessionId,
        queue: EngineEventSender,
    ) -> Result<Arc<Self>> {
        let sink: Arc<dyn EngineEventSink> = Arc::new(SessionEventSink::new(session, queue));
        let engine = factory
            .create(sink)
            .map_err(|e| PlaybackError::EngineUnavailable(e.to_string()))?;
        Ok(Arc::new(Self::new(session, engine)))
    }

    pub fn new(session: SessionId, engine: Arc<dyn PlaybackEngine>) -> Self {
        Self {
            session,
            engine,
            source_loaded: AtomicBool::new(false),
            released: AtomicBool::new(false),
        }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    pub fn source_loaded(&self) -> bool {
        self.source_loaded.load(Ordering::Acquire) && !self.is_released()
    }

    /// Binds `source` and starts asynchronous preparation.
    ///
    /// # Errors
    ///
    /// A load failure ([`PlaybackError::is_load_failure`]) when the engine
    /// rejects the source.
    pub fn load(&self, source: &MediaSource) -> Result<()> {
        self.bind(source)?;
        self.prepare(source)
    }

    /// Binds `source` without preparing it. Engines may probe the source
    /// here, so this can block on I/O.
    pub fn bind(&self, source: &MediaSource) -> Result<()> {
        if self.is_released() {
            return Err(PlaybackError::EngineUnavailable(
                "engine already released".to_string(),
            ));
        }
        self.engine
            .set_source(source)
            .map_err(|e| PlaybackError::load_failure(source.to_string(), e))
    }

    /// Starts asynchronous preparation of the bound `source`; `Ready` follows
    /// through the event queue.
    pub fn prepare(&self, source: &MediaSource) -> Result<()> {
        if self.is_released() {
            return Err(PlaybackError::EngineUnavailable(
                "engine already released".to_string(),
            ));
        }
        self.engine
            .prepare_async()
            .map_err(|e| PlaybackError::load_failure(source.to_string(), e))?;
        self.source_loaded.store(true, Ordering::Release);
        Ok(())
    }

    pub fn start(&self) -> Result<()> {
        self.when_loaded(|engine| engine.start())
    }

    pub fn pause(&self) -> Result<()> {
        self.when_loaded(|engine| engine.pause())
    }

    pub fn set_looping(&self, looping: bool) -> Result<()> {
        self.when_loaded(|engine| engine.set_looping(looping))
    }

    /// Seeks to `target_ms` clamped into `[0, duration]`. Returns the
    /// position actually requested from the engine.
    pub fn seek(&self, target_ms: i64) -> Result<i64> {
        if !self.source_loaded() {
            return Ok(0);
        }
        let duration_ms = self.engine.status()?.duration_ms;
        let clamped = clamp_seek(target_ms, duration_ms);
        self.engine.seek_to(clamped)?;
        Ok(clamped)
    }

    /// Raw engine status; `None` once released or before a source is bound.
    pub fn status(&self) -> Option<EngineStatus> {
        if !self.source_loaded() {
            return None;
        }
        match self.engine.status() {
            Ok(status) => Some(status),
            Err(err) => {
                debug!(session = %self.session, error = %err, "engine status unavailable");
                None
            }
        }
    }

    /// Normalized snapshot of the engine state.
    pub fn snapshot(&self) -> PlaybackSnapshot {
        match self.status() {
            Some(status) => PlaybackSnapshot::from_status(status),
            None => PlaybackSnapshot {
                source_loaded: self.source_loaded(),
                ..PlaybackSnapshot::idle()
            },
        }
    }

    /// `(position_ms, duration_ms)` for the poller, normalized.
    pub fn sample(&self) -> Option<(i64, i64)> {
        self.status().map(|status| {
            let snapshot = PlaybackSnapshot::from_status(status);
            (snapshot.position_ms, snapshot.duration_ms)
        })
    }

    /// Releases the engine. Later calls are no-ops.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        self.source_loaded.store(false, Ordering::Release);
        self.engine.release();
        debug!(session = %self.session, "engine released");
    }

    fn when_loaded<F>(&self, op: F) -> Result<()>
    where
        F: FnOnce(&dyn PlaybackEngine) -> bridge_traits::error::Result<()>,
    {
        if !self.source_loaded() {
            trace!(session = %self.session, "engine command ignored: no source loaded");
            return Ok(());
        }
        op(self.engine.as_ref()).map_err(|err| {
            warn!(session = %self.session, error = %err, "engine command failed");
            PlaybackError::Bridge(err)
        })
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineHandle")
            .field("session", &self.session)
            .field("source_loaded", &self.source_loaded())
            .field("released", &self.is_released())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::BridgeError;
    use mockall::mock;
    use mockall::predicate::eq;

    mock! {
        pub Engine {}

        impl PlaybackEngine for Engine {
            fn set_source(&self, source: &MediaSource) -> bridge_traits::error::Result<()>;
            fn prepare_async(&self) -> bridge_traits::error::Result<()>;
            fn start(&self) -> bridge_traits::error::Result<()>;
            fn pause(&self) -> bridge_traits::error::Result<()>;
            fn seek_to(&self, position_ms: i64) -> bridge_traits::error::Result<()>;
            fn set_looping(&self, looping: bool) -> bridge_traits::error::Result<()>;
            fn status(&self) -> bridge_traits::error::Result<EngineStatus>;
            fn release(&self);
        }
    }

    fn source() -> MediaSource {
        MediaSource::parse("/music/song.mp3").unwrap()
    }

    fn loaded(mut engine: MockEngine) -> EngineHandle {
        engine.expect_set_source().returning(|_| Ok(()));
        engine.expect_prepare_async().returning(|| Ok(()));
        let handle = EngineHandle::new(SessionId::new(), Arc::new(engine));
        handle.load(&source()).unwrap();
        handle
    }

    #[test]
    fn test_commands_are_noops_before_load() {
        let mut engine = MockEngine::new();
        engine.expect_start().never();
        engine.expect_pause().never();
        engine.expect_set_looping().never();
        engine.expect_seek_to().never();
        engine.expect_release().times(1).return_const(());

        let handle = EngineHandle::new(SessionId::new(), Arc::new(engine));
        handle.start().unwrap();
        handle.pause().unwrap();
        handle.set_looping(true).unwrap();
        assert_eq!(handle.seek(5_000).unwrap(), 0);
        assert!(handle.sample().is_none());
        assert!(!handle.snapshot().source_loaded);
    }

    #[test]
    fn test_load_failure_is_classified() {
        let mut engine = MockEngine::new();
        engine
            .expect_set_source()
            .returning(|_| Err(BridgeError::Unsupported("no demuxer".to_string())));
        engine.expect_prepare_async().never();
        engine.expect_release().return_const(());

        let handle = EngineHandle::new(SessionId::new(), Arc::new(engine));
        let err = handle.load(&source()).unwrap_err();
        assert!(matches!(err, PlaybackError::UnsupportedFormat { .. }));
        assert!(!handle.source_loaded());
    }

    #[test]
    fn test_seek_is_clamped_to_duration() {
        let mut engine = MockEngine::new();
        engine.expect_status().returning(|| {
            Ok(EngineStatus {
                is_playing: true,
                is_looping: false,
                position_ms: 1_000,
                duration_ms: 120_000,
            })
        });
        engine
            .expect_seek_to()
            .with(eq(120_000))
            .times(1)
            .returning(|_| Ok(()));
        engine
            .expect_seek_to()
            .with(eq(0))
            .times(1)
            .returning(|_| Ok(()));
        engine.expect_release().return_const(());

        let handle = loaded(engine);
        assert_eq!(handle.seek(150_000).unwrap(), 120_000);
        assert_eq!(handle.seek(-10).unwrap(), 0);
    }

    #[test]
    fn test_seek_before_duration_known_targets_start() {
        let mut engine = MockEngine::new();
        engine
            .expect_status()
            .returning(|| Ok(EngineStatus::default()));
        engine
            .expect_seek_to()
            .with(eq(0))
            .times(1)
            .returning(|_| Ok(()));
        engine.expect_release().return_const(());

        let handle = loaded(engine);
        assert_eq!(handle.seek(9_000).unwrap(), 0);
    }

    #[test]
    fn test_release_is_idempotent_and_silences_engine() {
        let mut engine = MockEngine::new();
        engine.expect_release().times(1).return_const(());
        engine.expect_start().never();
        engine.expect_status().never();

        let handle = loaded(engine);
        handle.release();
        handle.release();

        assert!(handle.is_released());
        handle.start().unwrap();
        assert!(handle.sample().is_none());
        assert!(handle.load(&source()).is_err());
    }

    #[test]
    fn test_bound_source_ignores_commands_until_prepared() {
        let mut engine = MockEngine::new();
        engine.expect_set_source().times(1).returning(|_| Ok(()));
        engine.expect_prepare_async().times(1).returning(|| Ok(()));
        engine.expect_start().times(1).returning(|| Ok(()));
        engine.expect_release().return_const(());

        let handle = EngineHandle::new(SessionId::new(), Arc::new(engine));
        handle.bind(&source()).unwrap();
        assert!(!handle.source_loaded());
        handle.start().unwrap();

        handle.prepare(&source()).unwrap();
        assert!(handle.source_loaded());
        handle.start().unwrap();
    }

    #[test]
    fn test_sink_tags_events_with_session() {
        let (tx, mut rx) = engine_event_queue();
        let session = SessionId::new();
        let sink = SessionEventSink::new(session, tx);

        sink.deliver(EngineEvent::Ready);
        sink.deliver(EngineEvent::Completion);

        assert_eq!(
            rx.try_recv().unwrap(),
            TaggedEngineEvent {
                session,
                event: EngineEvent::Ready
            }
        );
        assert_eq!(rx.try_recv().unwrap().event, EngineEvent::Completion);
    }

    #[test]
    fn test_sink_tolerates_closed_queue() {
        let (tx, rx) = engine_event_queue();
        drop(rx);
        SessionEventSink::new(SessionId::new(), tx).deliver(EngineEvent::SeekComplete);
    }
}
