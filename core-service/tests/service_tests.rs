//! Service wiring: pump, command channel and preference watcher.

#![cfg(feature = "desktop-shims")]

use bridge_traits::error::Result as BridgeResult;
use bridge_traits::{
    EngineEvent, EngineEventSink, EngineFactory, EngineStatus, InlineDispatcher, MediaSource, OverlayDisplay, OverlayFrame, PlaybackEngine, ScreenPoint, SettingsStore,
    StatusAction, StatusSurface, StatusView,
};
use core_playback::SessionPhase;
use core_runtime::config::{PlayerConfig, KEY_DEFAULT_LOOP, KEY_OVERLAY_ENABLED};
use core_runtime::events::{CoreEvent, SessionEvent};
use core_service::PlayerService;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Fakes
// ============================================================================

/// Engine that becomes ready as soon as it is prepared.
struct InstantEngine {
    sink: Arc<dyn EngineEventSink>,
    status: Mutex<EngineStatus>,
    released: AtomicBool,
}

impl PlaybackEngine for InstantEngine {
    fn set_source(&self, _source: &MediaSource) -> BridgeResult<()> {
        Ok(())
    }

    fn prepare_async(&self) -> BridgeResult<()> {
        self.status.lock().duration_ms = 90_000;
        self.sink.deliver(EngineEvent::Ready);
        Ok(())
    }

    fn start(&self) -> BridgeResult<()> {
        self.status.lock().is_playing = true;
        Ok(())
    }

    fn pause(&self) -> BridgeResult<()> {
        self.status.lock().is_playing = false;
        Ok(())
    }

    fn seek_to(&self, position_ms: i64) -> BridgeResult<()> {
        self.status.lock().position_ms = position_ms;
        Ok(())
    }

    fn set_looping(&self, looping: bool) -> BridgeResult<()> {
        self.status.lock().is_looping = looping;
        Ok(())
    }

    fn status(&self) -> BridgeResult<EngineStatus> {
        Ok(*self.status.lock())
    }

    fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct InstantFactory {
    engines: Mutex<Vec<Arc<InstantEngine>>>,
}

impl InstantFactory {
    fn last(&self) -> Arc<InstantEngine> {
        self.engines.lock().last().cloned().expect("engine created")
    }
}

impl EngineFactory for InstantFactory {
    fn create(&self, events: Arc<dyn EngineEventSink>) -> BridgeResult<Arc<dyn PlaybackEngine>> {
        let engine = Arc::new(InstantEngine {
            sink: events,
            status: Mutex::new(EngineStatus::default()),
            released: AtomicBool::new(false),
        });
        self.engines.lock().push(engine.clone());
        Ok(engine)
    }
}

#[derive(Default)]
struct Overlay {
    attached: AtomicBool,
}

impl OverlayDisplay for Overlay {
    fn attach(&self, _origin: ScreenPoint) -> BridgeResult<()> {
        self.attached.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn detach(&self) -> BridgeResult<()> {
        self.attached.store(false, Ordering::SeqCst);
        Ok(())
    }

    fn is_attached(&self) -> bool {
        self.attached.load(Ordering::SeqCst)
    }

    fn move_to(&self, _origin: ScreenPoint) -> BridgeResult<()> {
        Ok(())
    }

    fn render(&self, _frame: &OverlayFrame) {}
}

#[derive(Default)]
struct Status {
    last: Mutex<Option<StatusView>>,
}

impl StatusSurface for Status {
    fn publish(&self, view: &StatusView) -> BridgeResult<()> {
        *self.last.lock() = Some(view.clone());
        Ok(())
    }

    fn clear(&self) -> BridgeResult<()> {
        *self.last.lock() = None;
        Ok(())
    }
}

struct Fixture {
    service: PlayerService,
    factory: Arc<InstantFactory>,
    overlay: Arc<Overlay>,
    status: Arc<Status>,
    settings: Arc<dyn SettingsStore>,
}

async fn start_service() -> Fixture {
    let factory = Arc::new(InstantFactory::default());
    let overlay = Arc::new(Overlay::default());
    let status = Arc::new(Status::default());
    let settings: Arc<dyn SettingsStore> =
        Arc::new(bridge_desktop::SqliteSettingsStore::in_memory().await.unwrap());

    let config = PlayerConfig::builder()
        .engine_factory(factory.clone())
        .overlay_display(overlay.clone())
        .status_surface(status.clone())
        .ui_dispatcher(Arc::new(InlineDispatcher))
        .settings_store(settings.clone())
        .build()
        .unwrap();

    let service = PlayerService::start(config).await.unwrap();
    Fixture {
        service,
        factory,
        overlay,
        status,
        settings,
    }
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_pump_applies_ready() {
    let fx = start_service().await;
    let mut events = fx.service.subscribe().filter(|e| {
        matches!(e, CoreEvent::Session(SessionEvent::Ready { .. }))
    });

    fx.service.load_source("/music/track.ogg").await.unwrap();

    let ready = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("ready in time")
        .unwrap();
    assert!(matches!(
        ready,
        CoreEvent::Session(SessionEvent::Ready {
            duration_ms: 90_000,
            ..
        })
    ));

    let controller = fx.service.controller();
    assert_eq!(controller.phase(), SessionPhase::Active);
    assert!(controller.snapshot().is_playing);
    assert!(controller.poller_running());
    let status = fx.status.clone();
    eventually(|| {
        status.last.lock().as_ref().map(|v| v.buttons[0].label) == Some("Pause")
    })
    .await;

    fx.service.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_command_channel_drives_controller() {
    let fx = start_service().await;
    fx.service.load_source("/music/track.ogg").await.unwrap();
    let controller = fx.service.controller().clone();
    eventually(|| controller.phase() == SessionPhase::Active).await;

    let commands = fx.service.commands();
    commands.send("toggle-play-pause").await.unwrap();
    eventually(|| !controller.snapshot().is_playing).await;

    commands.send("not-a-trigger").await.unwrap();
    commands.send_action(StatusAction::ToggleLoop).await.unwrap();
    eventually(|| controller.snapshot().is_looping).await;

    commands.send("exit").await.unwrap();
    eventually(|| controller.is_idle()).await;
    assert!(fx.factory.last().released.load(Ordering::SeqCst));
    assert!(fx.status.last.lock().is_none());

    fx.service.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_preference_changes_apply_live() {
    let fx = start_service().await;
    fx.service.load_source("/music/track.ogg").await.unwrap();
    let controller = fx.service.controller().clone();
    eventually(|| controller.phase() == SessionPhase::Active).await;
    assert!(!fx.overlay.is_attached());

    fx.settings.set_bool(KEY_OVERLAY_ENABLED, true).await.unwrap();
    let overlay = fx.overlay.clone();
    eventually(|| overlay.is_attached()).await;

    fx.settings.set_bool(KEY_DEFAULT_LOOP, true).await.unwrap();
    eventually(|| controller.preferences().default_loop).await;

    fx.settings
        .set_bool(KEY_OVERLAY_ENABLED, false)
        .await
        .unwrap();
    eventually(|| !overlay.is_attached()).await;

    fx.service.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_stored_preferences_are_read_at_start() {
    let settings = bridge_desktop::SqliteSettingsStore::in_memory()
        .await
        .unwrap();
    settings.set_bool(KEY_DEFAULT_LOOP, true).await.unwrap();

    let config = PlayerConfig::builder()
        .engine_factory(Arc::new(InstantFactory::default()))
        .overlay_display(Arc::new(Overlay::default()))
        .status_surface(Arc::new(Status::default()))
        .ui_dispatcher(Arc::new(InlineDispatcher))
        .settings_store(Arc::new(settings))
        .build()
        .unwrap();

    let service = PlayerService::start(config).await.unwrap();
    assert!(service.controller().preferences().default_loop);
    assert!(!service.controller().preferences().overlay_enabled);
    service.shutdown().await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_shutdown_releases_session() {
    let fx = start_service().await;
    fx.service.load_source("/music/track.ogg").await.unwrap();
    let controller = fx.service.controller().clone();
    eventually(|| controller.phase() == SessionPhase::Active).await;
    let commands = fx.service.commands();

    fx.service.shutdown().await;

    assert!(controller.is_idle());
    assert!(fx.factory.last().released.load(Ordering::SeqCst));
    assert!(!controller.poller_running());
    eventually(|| commands.is_closed()).await;
}

