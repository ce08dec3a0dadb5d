//! Headless playback engine.
//!
//! Runs the transport clock of a source without an audio device: the source
//! is probed with `symphonia` for its duration, and a tokio task tracks the
//! end of the track to deliver completion (or to restart when looping). Used
//! by the headless player and by hosts without an audio backend.

use bridge_traits::error::{BridgeError, Result};
use bridge_traits::{
    EngineEvent, EngineEventSink, EngineFactory, EngineStatus, MediaSource, PlaybackEngine,
};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Reads the duration of the first audio track in `path`.
///
/// Returns `0` when the container does not state a frame count.
pub fn probe_duration(path: &Path) -> Result<i64> {
    let file = std::fs::File::open(path)?;
    let stream = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(extension);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            stream,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| BridgeError::Unsupported(format!("Failed to probe format: {}", e)))?;

    let track = probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| BridgeError::Unsupported("No supported audio tracks".to_string()))?;

    let params = &track.codec_params;
    let duration_ms = match (params.n_frames, params.sample_rate) {
        (Some(frames), Some(rate)) if rate > 0 => (frames as u128 * 1_000 / rate as u128) as i64,
        _ => 0,
    };
    Ok(duration_ms)
}

#[derive(Debug, Default)]
struct Transport {
    source: Option<MediaSource>,
    duration_ms: i64,
    prepared: bool,
    playing: bool,
    looping: bool,
    /// Position at `anchor`, or the frozen position while paused.
    base_ms: i64,
    anchor: Option<Instant>,
}

impl Transport {
    fn position_ms(&self, now: Instant) -> i64 {
        let elapsed = self
            .anchor
            .map(|anchor| now.saturating_duration_since(anchor).as_millis() as i64)
            .unwrap_or(0);
        let position = self.base_ms + elapsed;
        if self.duration_ms > 0 {
            position.min(self.duration_ms)
        } else {
            position
        }
    }

    /// Time until the end of the source, while playing a source of known length.
    fn remaining(&self, now: Instant) -> Option<Duration> {
        if !self.playing || self.duration_ms <= 0 {
            return None;
        }
        let left = (self.duration_ms - self.position_ms(now)).max(0);
        Some(Duration::from_millis(left as u64))
    }

    fn freeze(&mut self, now: Instant) {
        self.base_ms = self.position_ms(now);
        self.anchor = None;
    }
}

/// Engine that keeps time but produces no sound.
pub struct HeadlessEngine {
    runtime: Handle,
    events: Arc<dyn EngineEventSink>,
    transport: Arc<Mutex<Transport>>,
    wake: Arc<Notify>,
    cancel: CancellationToken,
    clock_started: AtomicBool,
    released: AtomicBool,
}

impl HeadlessEngine {
    pub fn new(runtime: Handle, events: Arc<dyn EngineEventSink>) -> Self {
        Self {
            runtime,
            events,
            transport: Arc::new(Mutex::new(Transport::default())),
            wake: Arc::new(Notify::new()),
            cancel: CancellationToken::new(),
            clock_started: AtomicBool::new(false),
            released: AtomicBool::new(false),
        }
    }

    fn ensure_live(&self) -> Result<()> {
        if self.released.load(Ordering::Acquire) {
            Err(BridgeError::Released)
        } else {
            Ok(())
        }
    }

    fn spawn_clock(&self) {
        if self.clock_started.swap(true, Ordering::AcqRel) {
            return;
        }
        let transport = self.transport.clone();
        let events = self.events.clone();
        let wake = self.wake.clone();
        let cancel = self.cancel.clone();
        self.runtime
            .spawn(run_clock(transport, events, wake, cancel));
    }
}

async fn run_clock(
    transport: Arc<Mutex<Transport>>,
    events: Arc<dyn EngineEventSink>,
    wake: Arc<Notify>,
    cancel: CancellationToken,
) {
    // Preparation is instant; the source was probed when it was bound.
    transport.lock().prepared = true;
    events.deliver(EngineEvent::Ready);

    loop {
        let remaining = transport.lock().remaining(Instant::now());
        let end_of_source = async {
            match remaining {
                Some(left) => tokio::time::sleep(left).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = wake.notified() => continue,
            _ = end_of_source => {}
        }

        let event = {
            let mut state = transport.lock();
            let now = Instant::now();
            if !state.playing || state.position_ms(now) < state.duration_ms {
                continue;
            }
            if state.looping {
                state.base_ms = 0;
                state.anchor = Some(now);
                EngineEvent::PositionDiscontinuity
            } else {
                state.playing = false;
                state.base_ms = state.duration_ms;
                state.anchor = None;
                EngineEvent::Completion
            }
        };
        trace!(?event, "end of source");
        events.deliver(event);
    }
    trace!("transport clock stopped");
}

impl PlaybackEngine for HeadlessEngine {
    fn set_source(&self, source: &MediaSource) -> Result<()> {
        self.ensure_live()?;
        let Some(path) = source.local_path() else {
            return Err(BridgeError::Unsupported(
                "content URIs need a platform engine".to_string(),
            ));
        };

        let duration_ms = probe_duration(path)?;
        debug!(duration_ms, "source bound");

        let mut state = self.transport.lock();
        let looping = state.looping;
        *state = Transport {
            source: Some(source.clone()),
            duration_ms,
            looping,
            ..Transport::default()
        };
        Ok(())
    }

    fn prepare_async(&self) -> Result<()> {
        self.ensure_live()?;
        if self.transport.lock().source.is_none() {
            return Err(BridgeError::OperationFailed("no source bound".to_string()));
        }
        self.spawn_clock();
        Ok(())
    }

    fn start(&self) -> Result<()> {
        self.ensure_live()?;
        {
            let mut state = self.transport.lock();
            if !state.prepared {
                return Err(BridgeError::OperationFailed("not prepared".to_string()));
            }
            if state.playing {
                return Ok(());
            }
            // Starting at the end replays from the top.
            if state.duration_ms > 0 && state.base_ms >= state.duration_ms {
                state.base_ms = 0;
            }
            state.playing = true;
            state.anchor = Some(Instant::now());
        }
        self.wake.notify_one();
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        self.ensure_live()?;
        {
            let mut state = self.transport.lock();
            if !state.playing {
                return Ok(());
            }
            state.freeze(Instant::now());
            state.playing = false;
        }
        self.wake.notify_one();
        Ok(())
    }

    fn seek_to(&self, position_ms: i64) -> Result<()> {
        self.ensure_live()?;
        {
            let mut state = self.transport.lock();
            let mut target = position_ms.max(0);
            if state.duration_ms > 0 {
                target = target.min(state.duration_ms);
            }
            state.base_ms = target;
            if state.playing {
                state.anchor = Some(Instant::now());
            }
        }
        self.wake.notify_one();
        self.events.deliver(EngineEvent::SeekComplete);
        Ok(())
    }

    fn set_looping(&self, looping: bool) -> Result<()> {
        self.ensure_live()?;
        self.transport.lock().looping = looping;
        self.wake.notify_one();
        Ok(())
    }

    fn status(&self) -> Result<EngineStatus> {
        self.ensure_live()?;
        let state = self.transport.lock();
        Ok(EngineStatus {
            is_playing: state.playing,
            is_looping: state.looping,
            position_ms: state.position_ms(Instant::now()),
            duration_ms: if state.prepared { state.duration_ms } else { 0 },
        })
    }

    fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        self.cancel.cancel();
        let mut state = self.transport.lock();
        state.playing = false;
        state.anchor = None;
        debug!("headless engine released");
    }
}

impl Drop for HeadlessEngine {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Creates [`HeadlessEngine`]s whose clocks run on `runtime`.
#[derive(Clone)]
pub struct HeadlessEngineFactory {
    runtime: Handle,
}

impl HeadlessEngineFactory {
    pub fn new(runtime: Handle) -> Self {
        Self { runtime }
    }

    /// Factory bound to the runtime of the calling task.
    ///
    /// # Errors
    ///
    /// [`BridgeError::NotAvailable`] outside a tokio runtime.
    pub fn current() -> Result<Self> {
        Handle::try_current()
            .map(Self::new)
            .map_err(|e| BridgeError::NotAvailable(format!("no tokio runtime: {}", e)))
    }
}

impl EngineFactory for HeadlessEngineFactory {
    fn create(&self, events: Arc<dyn EngineEventSink>) -> Result<Arc<dyn PlaybackEngine>> {
        Ok(Arc::new(HeadlessEngine::new(self.runtime.clone(), events)))
    }
}
