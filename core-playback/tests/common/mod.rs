//! Shared fakes for the controller and poller suites.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    BridgeError, CapabilityGate, EngineEvent, EngineEventSink, EngineFactory, EngineStatus,
    InlineDispatcher, MediaMetadata, MediaSource, MetadataExtractor, Notice, NoticeSink,
    OverlayDisplay, OverlayFrame, PlaybackEngine, ScreenPoint, StatusSurface, StatusView,
};
use core_playback::{EngineEventPump, PlaybackController};
use core_runtime::config::{PlayerConfig, PlayerPreferences};
use core_runtime::events::{CoreEvent, Receiver};
use mockall::mock;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Notify;

pub const DURATION_MS: i64 = 120_000;

// ============================================================================
// Engine
// ============================================================================

#[derive(Debug, Default)]
pub struct FakeEngineState {
    pub source: Option<MediaSource>,
    pub prepared: bool,
    pub playing: bool,
    pub looping: bool,
    pub position_ms: i64,
    pub released: bool,
    pub release_calls: usize,
}

/// Engine whose callbacks are fired by the test.
pub struct FakeEngine {
    pub state: Mutex<FakeEngineState>,
    sink: Arc<dyn EngineEventSink>,
    duration_ms: i64,
    reject_sources: bool,
    bind_gate: Option<Arc<BindGate>>,
}

/// Holds `set_source` on its blocking thread until the test lets it go.
pub struct BindGate {
    pub entered: Notify,
    release: Mutex<mpsc::Receiver<()>>,
}

impl BindGate {
    pub fn new() -> (Arc<Self>, mpsc::Sender<()>) {
        let (tx, rx) = mpsc::channel();
        let gate = Arc::new(Self {
            entered: Notify::new(),
            release: Mutex::new(rx),
        });
        (gate, tx)
    }

    fn wait(&self) {
        self.entered.notify_one();
        let _ = self.release.lock().unwrap().recv();
    }
}

impl FakeEngine {
    /// Marks the source prepared and fires `Ready`.
    pub fn become_ready(&self) {
        self.state.lock().unwrap().prepared = true;
        self.fire(EngineEvent::Ready);
    }

    /// Runs to the end of the source and fires `Completion`.
    pub fn complete(&self) {
        {
            let mut state = self.state.lock().unwrap();
            if state.looping {
                state.position_ms = 0;
            } else {
                state.position_ms = self.duration_ms;
                state.playing = false;
            }
        }
        self.fire(EngineEvent::Completion);
    }

    pub fn advance(&self, ms: i64) {
        let mut state = self.state.lock().unwrap();
        state.position_ms = (state.position_ms + ms).min(self.duration_ms);
    }

    pub fn fire(&self, event: EngineEvent) {
        self.sink.deliver(event);
    }

    pub fn is_released(&self) -> bool {
        self.state.lock().unwrap().released
    }

    pub fn release_calls(&self) -> usize {
        self.state.lock().unwrap().release_calls
    }

    pub fn position_ms(&self) -> i64 {
        self.state.lock().unwrap().position_ms
    }

    fn ensure_live(&self) -> BridgeResult<()> {
        if self.state.lock().unwrap().released {
            Err(BridgeError::Released)
        } else {
            Ok(())
        }
    }
}

impl PlaybackEngine for FakeEngine {
    fn set_source(&self, source: &MediaSource) -> BridgeResult<()> {
        self.ensure_live()?;
        if let Some(gate) = &self.bind_gate {
            gate.wait();
        }
        if self.reject_sources {
            return Err(BridgeError::Unsupported("fake codec".to_string()));
        }
        self.state.lock().unwrap().source = Some(source.clone());
        Ok(())
    }

    fn prepare_async(&self) -> BridgeResult<()> {
        self.ensure_live()
    }

    fn start(&self) -> BridgeResult<()> {
        self.ensure_live()?;
        self.state.lock().unwrap().playing = true;
        Ok(())
    }

    fn pause(&self) -> BridgeResult<()> {
        self.ensure_live()?;
        self.state.lock().unwrap().playing = false;
        Ok(())
    }

    fn seek_to(&self, position_ms: i64) -> BridgeResult<()> {
        self.ensure_live()?;
        self.state.lock().unwrap().position_ms = position_ms;
        Ok(())
    }

    fn set_looping(&self, looping: bool) -> BridgeResult<()> {
        self.ensure_live()?;
        self.state.lock().unwrap().looping = looping;
        Ok(())
    }

    fn status(&self) -> BridgeResult<EngineStatus> {
        self.ensure_live()?;
        let state = self.state.lock().unwrap();
        Ok(EngineStatus {
            is_playing: state.playing,
            is_looping: state.looping,
            position_ms: state.position_ms,
            duration_ms: if state.prepared { self.duration_ms } else { 0 },
        })
    }

    fn release(&self) {
        let mut state = self.state.lock().unwrap();
        state.released = true;
        state.playing = false;
        state.release_calls += 1;
    }
}

#[derive(Default)]
pub struct FakeFactory {
    pub engines: Mutex<Vec<Arc<FakeEngine>>>,
    pub reject_sources: Mutex<bool>,
    pub unavailable: Mutex<bool>,
    pub bind_gate: Mutex<Option<Arc<BindGate>>>,
}

impl FakeFactory {
    pub fn last(&self) -> Arc<FakeEngine> {
        self.engines
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no engine created")
    }

    pub fn created(&self) -> usize {
        self.engines.lock().unwrap().len()
    }
}

impl EngineFactory for FakeFactory {
    fn create(&self, events: Arc<dyn EngineEventSink>) -> BridgeResult<Arc<dyn PlaybackEngine>> {
        if *self.unavailable.lock().unwrap() {
            return Err(BridgeError::NotAvailable("no audio device".to_string()));
        }
        let engine = Arc::new(FakeEngine {
            state: Mutex::new(FakeEngineState::default()),
            sink: events,
            duration_ms: DURATION_MS,
            reject_sources: *self.reject_sources.lock().unwrap(),
            bind_gate: self.bind_gate.lock().unwrap().clone(),
        });
        self.engines.lock().unwrap().push(engine.clone());
        Ok(engine)
    }
}

// ============================================================================
// Views
// ============================================================================

#[derive(Default)]
pub struct RecordingOverlay {
    pub attached: Mutex<bool>,
    pub attach_calls: Mutex<usize>,
    pub detach_calls: Mutex<usize>,
    pub frames: Mutex<Vec<OverlayFrame>>,
}

impl RecordingOverlay {
    pub fn last_frame(&self) -> Option<OverlayFrame> {
        self.frames.lock().unwrap().last().cloned()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().unwrap().len()
    }
}

impl OverlayDisplay for RecordingOverlay {
    fn attach(&self, _origin: ScreenPoint) -> BridgeResult<()> {
        *self.attached.lock().unwrap() = true;
        *self.attach_calls.lock().unwrap() += 1;
        Ok(())
    }

    fn detach(&self) -> BridgeResult<()> {
        *self.attached.lock().unwrap() = false;
        *self.detach_calls.lock().unwrap() += 1;
        Ok(())
    }

    fn is_attached(&self) -> bool {
        *self.attached.lock().unwrap()
    }

    fn move_to(&self, _origin: ScreenPoint) -> BridgeResult<()> {
        Ok(())
    }

    fn render(&self, frame: &OverlayFrame) {
        self.frames.lock().unwrap().push(frame.clone());
    }
}

#[derive(Default)]
pub struct RecordingStatus {
    pub published: Mutex<Vec<StatusView>>,
    pub visible: Mutex<bool>,
    pub clear_calls: Mutex<usize>,
}

impl RecordingStatus {
    pub fn last_view(&self) -> Option<StatusView> {
        self.published.lock().unwrap().last().cloned()
    }

    pub fn publish_count(&self) -> usize {
        self.published.lock().unwrap().len()
    }

    pub fn is_visible(&self) -> bool {
        *self.visible.lock().unwrap()
    }
}

impl StatusSurface for RecordingStatus {
    fn publish(&self, view: &StatusView) -> BridgeResult<()> {
        self.published.lock().unwrap().push(view.clone());
        *self.visible.lock().unwrap() = true;
        Ok(())
    }

    fn clear(&self) -> BridgeResult<()> {
        *self.visible.lock().unwrap() = false;
        *self.clear_calls.lock().unwrap() += 1;
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotices {
    pub shown: Mutex<Vec<Notice>>,
}

impl NoticeSink for RecordingNotices {
    fn show(&self, notice: Notice) {
        self.shown.lock().unwrap().push(notice);
    }
}

// ============================================================================
// Mocked collaborators
// ============================================================================

mock! {
    pub Gate {}

    impl CapabilityGate for Gate {
        fn can_show_overlay(&self) -> bool;
    }
}

mock! {
    pub Extractor {}

    #[async_trait]
    impl MetadataExtractor for Extractor {
        async fn extract(&self, source: &MediaSource) -> BridgeResult<MediaMetadata>;
    }
}

/// Extractor that parks inside `extract` until `release` is notified.
#[derive(Default)]
pub struct ParkedExtractor {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

#[async_trait]
impl MetadataExtractor for ParkedExtractor {
    async fn extract(&self, source: &MediaSource) -> BridgeResult<MediaMetadata> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(MediaMetadata::fallback_for(source))
    }
}

pub fn gate(allow: bool) -> MockGate {
    let mut gate = MockGate::new();
    gate.expect_can_show_overlay().return_const(allow);
    gate
}

pub fn tagged_extractor() -> MockExtractor {
    let mut extractor = MockExtractor::new();
    extractor
        .expect_extract()
        .returning(|_| Ok(MediaMetadata::new("Song").with_subtitle("Artist")));
    extractor
}

pub fn failing_extractor() -> MockExtractor {
    let mut extractor = MockExtractor::new();
    extractor
        .expect_extract()
        .returning(|_| Err(BridgeError::OperationFailed("no tags".to_string())));
    extractor
}

// ============================================================================
// Harness
// ============================================================================

pub struct Harness {
    pub controller: PlaybackController,
    pub pump: EngineEventPump,
    pub factory: Arc<FakeFactory>,
    pub overlay: Arc<RecordingOverlay>,
    pub status: Arc<RecordingStatus>,
    pub notices: Arc<RecordingNotices>,
    pub events: Receiver<CoreEvent>,
}

pub struct HarnessBuilder {
    preferences: PlayerPreferences,
    gate: MockGate,
    extractor: Arc<dyn MetadataExtractor>,
    poll_interval: Duration,
}

impl HarnessBuilder {
    pub fn new() -> Self {
        Self {
            preferences: PlayerPreferences::default().with_overlay_enabled(true),
            gate: gate(true),
            extractor: Arc::new(tagged_extractor()),
            poll_interval: Duration::from_millis(50),
        }
    }

    pub fn preferences(mut self, preferences: PlayerPreferences) -> Self {
        self.preferences = preferences;
        self
    }

    pub fn gate(mut self, gate: MockGate) -> Self {
        self.gate = gate;
        self
    }

    pub fn extractor(mut self, extractor: impl MetadataExtractor + 'static) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    /// Must be called inside a tokio runtime; the poller uses the current one.
    pub fn build(self) -> Harness {
        let factory = Arc::new(FakeFactory::default());
        let overlay = Arc::new(RecordingOverlay::default());
        let status = Arc::new(RecordingStatus::default());
        let notices = Arc::new(RecordingNotices::default());

        let config = PlayerConfig::builder()
            .engine_factory(factory.clone())
            .overlay_display(overlay.clone())
            .status_surface(status.clone())
            .metadata_extractor(self.extractor)
            .capability_gate(Arc::new(self.gate))
            .notice_sink(notices.clone())
            .ui_dispatcher(Arc::new(InlineDispatcher))
            .poll_interval(self.poll_interval)
            .preferences(self.preferences)
            .build()
            .expect("valid test config");

        let (controller, pump) = PlaybackController::new(&config, Handle::current());
        let events = controller.events().subscribe();

        Harness {
            controller,
            pump,
            factory,
            overlay,
            status,
            notices,
            events,
        }
    }
}

impl Harness {
    pub fn engine(&self) -> Arc<FakeEngine> {
        self.factory.last()
    }

    /// Fires `Ready` on the current engine and applies it.
    pub fn ready(&mut self) {
        self.engine().become_ready();
        self.pump.drain();
    }

    pub fn collected_events(&mut self) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            events.push(event);
        }
        events
    }

    /// Both views must report the same play and loop state.
    pub fn assert_views_agree(&self) {
        let frame = self.overlay.last_frame().expect("overlay rendered");
        let view = self.status.last_view().expect("status published");

        let status_playing = view.buttons[0].label == "Pause";
        let status_looping = view.buttons[1].label == "No loop";

        assert_eq!(frame.is_playing, status_playing, "play state diverged");
        assert_eq!(frame.is_looping, status_looping, "loop state diverged");

        let snapshot = self.controller.snapshot();
        assert_eq!(frame.is_playing, snapshot.is_playing);
        assert_eq!(frame.is_looping, snapshot.is_looping);
    }
}
