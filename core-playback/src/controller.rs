//! # Synchronization Engine
//!
//! [`PlaybackController`] owns the session: the engine, the poller and the
//! two views. Every state-affecting input (commands from any surface, engine
//! callbacks) runs under one state lock that covers recompute and push, so
//! the overlay and the status entry always receive the same snapshot.
//!
//! ```text
//!            load_source
//!   Idle ─────────────────> Preparing ──Ready──> Active
//!    ^                          │                  │
//!    └──────── exit / engine error / load failure ─┘
//! ```
//!
//! ## Threads
//!
//! - Commands may come from any thread.
//! - Engine callbacks are queued by the engine's sink and applied by an
//!   [`EngineEventPump`], so they are processed one at a time.
//! - The poller ticks on its own runtime and feeds only the overlay.
//! - View mutations are posted through the [`UiDispatcher`], in order.

use crate::command::ControlCommand;
use crate::engine::{
    engine_event_queue, EngineEventReceiver, EngineEventSender, EngineHandle, TaggedEngineEvent,
};
use crate::error::{PlaybackError, Result};
use crate::overlay::{OverlayCommand, OverlayControl, OverlayWidget};
use crate::poller::{PositionPoller, PositionTarget};
use crate::snapshot::{PlaybackSnapshot, SessionId, SessionPhase};
use crate::status::StatusPresenter;

use bridge_traits::{
    CapabilityGate, EngineEvent, EngineFactory, MediaMetadata, MediaSource, MetadataExtractor,
    Notice, NoticeSink, ScreenPoint, UiDispatcher,
};
use core_runtime::config::{PlayerConfig, PlayerPreferences};
use core_runtime::events::{CoreEvent, EndReason, EventBus, PlaybackEvent, SessionEvent};

use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use tokio::sync::mpsc::error::TryRecvError;
use tracing::{debug, error, info, instrument, warn};

struct Session {
    id: SessionId,
    engine: Arc<EngineHandle>,
    source: MediaSource,
    metadata: MediaMetadata,
}

#[derive(Default)]
struct ControllerState {
    phase: SessionPhase,
    session: Option<Session>,
    preferences: PlayerPreferences,
    /// What the views were last given; identical pushes are skipped.
    last_pushed: Option<(SessionId, PlaybackSnapshot)>,
    /// Bumped by `exit`; a load that started under an older value is dropped.
    load_generation: u64,
}

struct Inner {
    engine_factory: Arc<dyn EngineFactory>,
    metadata_extractor: Arc<dyn MetadataExtractor>,
    capability_gate: Arc<dyn CapabilityGate>,
    ui: Arc<dyn UiDispatcher>,
    notices: Arc<dyn NoticeSink>,
    events: EventBus,
    overlay: Arc<Mutex<OverlayWidget>>,
    status: Arc<Mutex<StatusPresenter>>,
    control: OverlayControl,
    poller: PositionPoller,
    engine_events: EngineEventSender,
    /// Serializes `load_source` calls across the metadata await.
    load_gate: tokio::sync::Mutex<()>,
    state: Mutex<ControllerState>,
}

/// The playback-state synchronization engine.
///
/// Cheap to clone; clones share one session.
#[derive(Clone)]
pub struct PlaybackController {
    inner: Arc<Inner>,
}

/// Applies queued engine callbacks to a controller.
///
/// Hosts either spawn [`run`](EngineEventPump::run) or call
/// [`drain`](EngineEventPump::drain) from their own loop.
pub struct EngineEventPump {
    receiver: EngineEventReceiver,
    controller: Weak<Inner>,
}

impl PlaybackController {
    /// Builds a controller from `config`. The poller runs on `poller_runtime`.
    pub fn new(config: &PlayerConfig, poller_runtime: Handle) -> (Self, EngineEventPump) {
        Self::with_event_bus(
            config,
            poller_runtime,
            EventBus::new(config.event_buffer_size),
        )
    }

    /// Like [`new`](Self::new), publishing on an existing bus.
    pub fn with_event_bus(
        config: &PlayerConfig,
        poller_runtime: Handle,
        events: EventBus,
    ) -> (Self, EngineEventPump) {
        let (engine_events, receiver) = engine_event_queue();
        let overlay = Arc::new(Mutex::new(OverlayWidget::new(
            config.overlay_display.clone(),
            ScreenPoint::default(),
        )));
        let control = OverlayControl::new(overlay.clone());

        let inner = Arc::new(Inner {
            engine_factory: config.engine_factory.clone(),
            metadata_extractor: config.metadata_extractor.clone(),
            capability_gate: config.capability_gate.clone(),
            ui: config.ui_dispatcher.clone(),
            notices: config.notice_sink.clone(),
            events,
            overlay,
            status: Arc::new(Mutex::new(StatusPresenter::new(
                config.status_surface.clone(),
            ))),
            control,
            poller: PositionPoller::new(poller_runtime, config.poll_interval),
            engine_events,
            load_gate: tokio::sync::Mutex::new(()),
            state: Mutex::new(ControllerState {
                preferences: config.preferences,
                ..Default::default()
            }),
        });

        let weak = Arc::downgrade(&inner);
        inner
            .control
            .set_listener(Arc::new(move |command: OverlayCommand| {
                if let Some(inner) = weak.upgrade() {
                    inner.handle_command(command.into());
                }
            }));

        let pump = EngineEventPump {
            receiver,
            controller: Arc::downgrade(&inner),
        };
        (Self { inner }, pump)
    }

    /// Starts a session for `reference`, replacing any current one.
    ///
    /// Metadata extraction never fails the load; a derived name and
    /// placeholder artwork are used instead.
    ///
    /// # Errors
    ///
    /// A load failure ([`PlaybackError::is_load_failure`]) if the reference is
    /// invalid or the engine rejects the source. The controller is idle
    /// afterwards, except that an invalid reference leaves the current
    /// session untouched. [`PlaybackError::LoadCancelled`] if `exit` was
    /// requested before the session could start.
    #[instrument(skip(self, reference), fields(source = %core_runtime::logging::strip_path(reference)))]
    pub async fn load_source(&self, reference: &str) -> Result<SessionId> {
        let _serialized = self.inner.load_gate.lock().await;
        let generation = self.inner.state.lock().load_generation;

        let Some(source) = MediaSource::parse(reference) else {
            let err = PlaybackError::InvalidSource(reference.to_string());
            self.inner
                .report_load_failure(reference.trim().to_string(), &err);
            return Err(err);
        };

        let metadata = match self.inner.metadata_extractor.extract(&source).await {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!(error = %err, "metadata extraction failed; using fallback");
                MediaMetadata::fallback_for(&source)
            }
        };

        self.inner.start_session(generation, source, metadata).await
    }

    pub fn toggle_play_pause(&self) {
        self.inner.handle_command(ControlCommand::TogglePlayPause);
    }

    pub fn toggle_loop(&self) {
        self.inner.handle_command(ControlCommand::ToggleLoop);
    }

    /// Seeks within `[0, duration]`.
    pub fn seek(&self, position_ms: i64) {
        self.inner.handle_command(ControlCommand::Seek(position_ms));
    }

    /// Ends the session. Safe from any state, any number of times.
    pub fn exit(&self) {
        self.inner.handle_command(ControlCommand::Exit);
    }

    pub fn handle_command(&self, command: ControlCommand) {
        self.inner.handle_command(command);
    }

    /// Applies an external command channel trigger. Returns `false` for
    /// unrecognized triggers, which are otherwise ignored.
    pub fn handle_trigger(&self, trigger: &str) -> bool {
        match ControlCommand::from_trigger(trigger) {
            Some(command) => {
                self.inner.handle_command(command);
                true
            }
            None => {
                debug!(trigger, "ignoring unrecognized trigger");
                false
            }
        }
    }

    /// Applies one engine callback directly, bypassing the queue.
    pub fn handle_engine_event(&self, event: TaggedEngineEvent) {
        self.inner.handle_engine_event(event);
    }

    /// Live overlay preference change.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::CapabilityDenied`] when enabling while the platform
    /// refuses the overlay. Nothing is attached and the stored preference
    /// is left for the host to manage.
    pub fn on_overlay_preference_changed(&self, enabled: bool) -> Result<()> {
        self.inner.set_overlay_enabled(enabled)
    }

    /// Replaces all preferences; overlay changes behave like
    /// [`on_overlay_preference_changed`](Self::on_overlay_preference_changed).
    pub fn apply_preferences(&self, preferences: PlayerPreferences) -> Result<()> {
        let overlay_changed = {
            let mut state = self.inner.state.lock();
            let changed = state.preferences.overlay_enabled != preferences.overlay_enabled;
            state.preferences.default_loop = preferences.default_loop;
            state.preferences.close_on_completion = preferences.close_on_completion;
            changed
        };
        if overlay_changed {
            self.inner.set_overlay_enabled(preferences.overlay_enabled)?;
        }
        Ok(())
    }

    pub fn preferences(&self) -> PlayerPreferences {
        self.inner.state.lock().preferences
    }

    /// Current engine state, or the idle snapshot.
    pub fn snapshot(&self) -> PlaybackSnapshot {
        let state = self.inner.state.lock();
        state
            .session
            .as_ref()
            .map(|session| session.engine.snapshot())
            .unwrap_or_else(PlaybackSnapshot::idle)
    }

    pub fn phase(&self) -> SessionPhase {
        self.inner.state.lock().phase
    }

    pub fn is_idle(&self) -> bool {
        self.phase() == SessionPhase::Idle
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.inner.state.lock().session.as_ref().map(|s| s.id)
    }

    pub fn metadata(&self) -> Option<MediaMetadata> {
        self.inner
            .state
            .lock()
            .session
            .as_ref()
            .map(|s| s.metadata.clone())
    }

    pub fn source(&self) -> Option<MediaSource> {
        self.inner
            .state
            .lock()
            .session
            .as_ref()
            .map(|s| s.source.clone())
    }

    pub fn poller_running(&self) -> bool {
        self.inner.poller.is_running()
    }

    /// Input entry point for the overlay panel.
    pub fn overlay_control(&self) -> OverlayControl {
        self.inner.control.clone()
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.events
    }
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("phase", &self.phase())
            .field("session", &self.session_id())
            .finish()
    }
}

impl Inner {
    async fn start_session(
        &self,
        generation: u64,
        source: MediaSource,
        metadata: MediaMetadata,
    ) -> Result<SessionId> {
        {
            let mut state = self.state.lock();
            if state.load_generation != generation {
                info!(source = %source.display_name(), "load cancelled by exit");
                return Err(PlaybackError::LoadCancelled);
            }
            // The previous source goes first; the views stay up for the new one.
            self.teardown_locked(&mut state, EndReason::Replaced, false);
        }

        // Engine creation and binding may probe the file; keep them off the
        // state lock and off the async workers.
        let id = SessionId::new();
        let factory = self.engine_factory.clone();
        let queue = self.engine_events.clone();
        let bind_source = source.clone();
        let bound = tokio::task::spawn_blocking(move || {
            let engine = EngineHandle::create(factory.as_ref(), id, queue)?;
            engine.bind(&bind_source)?;
            Ok::<_, PlaybackError>(engine)
        })
        .await
        .unwrap_or_else(|err| {
            Err(PlaybackError::Internal(format!(
                "engine setup task failed: {}",
                err
            )))
        });

        let mut state = self.state.lock();
        if state.load_generation != generation {
            if let Ok(engine) = &bound {
                engine.release();
            }
            info!(session = %id, "load cancelled by exit");
            return Err(PlaybackError::LoadCancelled);
        }

        // Preparing under the lock: Ready cannot be applied before the
        // session is installed.
        let engine = match bound.and_then(|engine| engine.prepare(&source).map(|()| engine)) {
            Ok(engine) => engine,
            Err(err) => {
                self.detach_views();
                drop(state);
                self.report_load_failure(source.display_name(), &err);
                return Err(err);
            }
        };

        if state.preferences.default_loop {
            if let Err(err) = engine.set_looping(true) {
                warn!(session = %id, error = %err, "could not apply default loop");
            }
        }

        info!(session = %id, source = %source.display_name(), "session loading");
        self.emit(CoreEvent::Session(SessionEvent::Loading {
            session_id: id.to_string(),
            source: source.display_name(),
        }));

        state.phase = SessionPhase::Preparing;
        state.session = Some(Session {
            id,
            engine,
            source,
            metadata,
        });
        self.push_locked(&mut state);
        Ok(id)
    }

    fn report_load_failure(&self, source: String, err: &PlaybackError) {
        warn!(source = %source, error = %err, "load failed");
        self.notices.show(Notice::LoadFailed {
            source: source.clone(),
            message: err.to_string(),
        });
        self.emit(CoreEvent::Session(SessionEvent::LoadFailed {
            source,
            message: err.to_string(),
        }));
    }

    fn handle_command(&self, command: ControlCommand) {
        let mut state = self.state.lock();
        match command {
            ControlCommand::TogglePlayPause => {
                let Some(engine) = active_engine(&state) else {
                    debug!("toggle play/pause ignored: no active session");
                    return;
                };
                let result = if engine.snapshot().is_playing {
                    engine.pause()
                } else {
                    engine.start()
                };
                if let Err(err) = result {
                    warn!(error = %err, "play/pause failed");
                }
                self.push_locked(&mut state);
            }
            ControlCommand::ToggleLoop => {
                let Some(engine) = state.session.as_ref().map(|s| s.engine.clone()) else {
                    debug!("toggle loop ignored: idle");
                    return;
                };
                let looping = engine.snapshot().is_looping;
                if let Err(err) = engine.set_looping(!looping) {
                    warn!(error = %err, "set looping failed");
                }
                self.push_locked(&mut state);
            }
            ControlCommand::Seek(target_ms) => {
                let Some(engine) = active_engine(&state) else {
                    debug!(target_ms, "seek ignored: no active session");
                    return;
                };
                match engine.seek(target_ms) {
                    Ok(clamped) => debug!(target_ms, clamped, "seek"),
                    Err(err) => warn!(target_ms, error = %err, "seek failed"),
                }
                self.push_locked(&mut state);
            }
            ControlCommand::Exit => {
                info!("exit requested");
                state.load_generation = state.load_generation.wrapping_add(1);
                self.teardown_locked(&mut state, EndReason::Exit, true);
            }
            ControlCommand::OpenSettings => {
                drop(state);
                self.emit(CoreEvent::Session(SessionEvent::SettingsRequested));
            }
        }
    }

    fn handle_engine_event(&self, tagged: TaggedEngineEvent) {
        let mut state = self.state.lock();
        let Some(session) = state.session.as_ref() else {
            debug!(session = %tagged.session, event = ?tagged.event, "engine event after teardown ignored");
            return;
        };
        if session.id != tagged.session {
            debug!(session = %tagged.session, event = ?tagged.event, "stale engine event ignored");
            return;
        }
        let id = session.id;
        let engine = session.engine.clone();

        match tagged.event {
            EngineEvent::Ready => {
                state.phase = SessionPhase::Active;
                if let Err(err) = engine.start() {
                    warn!(session = %id, error = %err, "auto-start failed");
                }
                let snapshot = engine.snapshot();
                info!(session = %id, duration_ms = snapshot.duration_ms, "session ready");
                self.push_locked(&mut state);
                self.emit(CoreEvent::Session(SessionEvent::Ready {
                    session_id: id.to_string(),
                    duration_ms: snapshot.duration_ms,
                }));
            }
            EngineEvent::Error { code, message } => {
                let err = PlaybackError::EngineFailure { code, message };
                error!(session = %id, error = %err, "engine failure; tearing down");
                self.teardown_locked(
                    &mut state,
                    EndReason::EngineFailure {
                        message: err.to_string(),
                    },
                    true,
                );
                drop(state);
                self.notices.show(Notice::PlaybackFailed {
                    message: err.to_string(),
                });
            }
            EngineEvent::PositionDiscontinuity | EngineEvent::SeekComplete => {
                self.push_locked(&mut state);
            }
            EngineEvent::Completion => {
                let looped = engine.snapshot().is_looping;
                self.emit(CoreEvent::Playback(PlaybackEvent::Completed {
                    session_id: id.to_string(),
                    looped,
                }));
                if !looped && state.preferences.close_on_completion {
                    info!(session = %id, "completed; closing session");
                    self.teardown_locked(&mut state, EndReason::Completed, true);
                } else {
                    self.push_locked(&mut state);
                }
            }
        }
    }

    fn set_overlay_enabled(&self, enabled: bool) -> Result<()> {
        let mut state = self.state.lock();

        if !enabled {
            state.preferences.overlay_enabled = false;
            let overlay = self.overlay.clone();
            self.ui.post(Box::new(move || {
                if let Err(err) = overlay.lock().detach() {
                    warn!(error = %err, "overlay detach failed");
                }
            }));
            return Ok(());
        }

        if !self.capability_gate.can_show_overlay() {
            warn!("overlay enabled but capability denied");
            return Err(PlaybackError::CapabilityDenied);
        }
        state.preferences.overlay_enabled = true;

        if state.phase.has_source() {
            // Force a full push so the freshly attached panel gets content.
            state.last_pushed = None;
            self.push_locked(&mut state);
        }
        Ok(())
    }

    /// Recomputes the snapshot and hands it to both views and the poller.
    fn push_locked(&self, state: &mut ControllerState) {
        let Some(session) = state.session.as_ref() else {
            return;
        };
        let snapshot = session.engine.snapshot();

        if snapshot.is_playing {
            let feed: Arc<dyn PositionTarget> = Arc::new(OverlayFeed {
                overlay: self.overlay.clone(),
                ui: self.ui.clone(),
            });
            self.poller.start(Arc::downgrade(&session.engine), feed);
        } else {
            self.poller.stop();
        }

        let key = (session.id, snapshot);
        if state.last_pushed == Some(key) {
            debug!(session = %session.id, "snapshot unchanged; push skipped");
            return;
        }
        state.last_pushed = Some(key);

        debug!(
            session = %session.id,
            playing = snapshot.is_playing,
            looping = snapshot.is_looping,
            position_ms = snapshot.position_ms,
            duration_ms = snapshot.duration_ms,
            "pushing snapshot"
        );

        let metadata = session.metadata.clone();
        let want_overlay = state.preferences.overlay_enabled;
        let overlay = self.overlay.clone();
        let status = self.status.clone();
        let gate = self.capability_gate.clone();
        self.ui.post(Box::new(move || {
            {
                let mut widget = overlay.lock();
                if want_overlay && !widget.is_attached() {
                    if gate.can_show_overlay() {
                        if let Err(err) = widget.attach() {
                            warn!(error = %err, "overlay attach failed");
                        }
                    } else {
                        debug!("overlay capability denied; not attaching");
                    }
                } else if !want_overlay && widget.is_attached() {
                    if let Err(err) = widget.detach() {
                        warn!(error = %err, "overlay detach failed");
                    }
                }
                widget.present(Some(metadata.clone()), snapshot);
            }
            if let Err(err) = status.lock().push(&snapshot, Some(&metadata)) {
                warn!(error = %err, "status publish failed");
            }
        }));

        self.emit(CoreEvent::Playback(PlaybackEvent::StateChanged {
            session_id: session.id.to_string(),
            is_playing: snapshot.is_playing,
            is_looping: snapshot.is_looping,
            position_ms: snapshot.position_ms,
            duration_ms: snapshot.duration_ms,
        }));
    }

    /// Poller, then engine, then (optionally) the views. Each step runs even
    /// if an earlier one failed.
    fn teardown_locked(&self, state: &mut ControllerState, reason: EndReason, detach_views: bool) {
        self.poller.stop();

        if let Some(session) = state.session.take() {
            session.engine.release();
            info!(session = %session.id, ?reason, "session ended");
            self.emit(CoreEvent::Session(SessionEvent::Ended {
                session_id: session.id.to_string(),
                reason,
            }));
        }

        state.phase = SessionPhase::Idle;
        state.last_pushed = None;

        if detach_views {
            self.detach_views();
        }
    }

    fn detach_views(&self) {
        let overlay = self.overlay.clone();
        let status = self.status.clone();
        self.ui.post(Box::new(move || {
            {
                let mut widget = overlay.lock();
                if let Err(err) = widget.detach() {
                    warn!(error = %err, "overlay detach failed");
                }
                widget.present(None, PlaybackSnapshot::idle());
            }
            if let Err(err) = status.lock().clear() {
                warn!(error = %err, "status clear failed");
            }
        }));
    }

    fn emit(&self, event: CoreEvent) {
        // No subscribers is normal.
        let _ = self.events.emit(event);
    }
}

fn active_engine(state: &ControllerState) -> Option<Arc<EngineHandle>> {
    if state.phase != SessionPhase::Active {
        return None;
    }
    state.session.as_ref().map(|s| s.engine.clone())
}

/// Poller target that marshals samples onto the UI context.
struct OverlayFeed {
    overlay: Arc<Mutex<OverlayWidget>>,
    ui: Arc<dyn UiDispatcher>,
}

impl PositionTarget for OverlayFeed {
    fn on_position(&self, position_ms: i64, duration_ms: i64) {
        let overlay = self.overlay.clone();
        self.ui.post(Box::new(move || {
            overlay.lock().push_position(position_ms, duration_ms);
        }));
    }
}

impl EngineEventPump {
    /// Applies callbacks until the controller is dropped.
    pub async fn run(mut self) {
        while let Some(event) = self.receiver.recv().await {
            let Some(inner) = self.controller.upgrade() else {
                break;
            };
            inner.handle_engine_event(event);
        }
        debug!("engine event pump stopped");
    }

    /// Applies every queued callback without waiting. Returns how many ran.
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(inner) = self.controller.upgrade() else {
                        return applied;
                    };
                    inner.handle_engine_event(event);
                    applied += 1;
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return applied,
            }
        }
    }
}

impl std::fmt::Debug for EngineEventPump {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineEventPump")
            .field("controller_alive", &(self.controller.strong_count() > 0))
            .finish()
    }
}
