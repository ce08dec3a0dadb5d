//! # Position Poller
//!
//! Samples `(position, duration)` at a fixed interval while playback runs and
//! forwards each sample to a [`PositionTarget`] (the overlay timeline).
//!
//! ```text
//! stopped --start--> running --stop--> stopped
//! ```
//!
//! - `start` is idempotent: a running poller is never duplicated.
//! - `stop` cancels without waiting. A tick already in flight may still run
//!   once; it holds only a weak engine handle and does nothing if the engine
//!   is gone or released.
//! - Tick failures are swallowed.

use crate::engine::EngineHandle;

use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Receiver of position samples.
pub trait PositionTarget: Send + Sync {
    fn on_position(&self, position_ms: i64, duration_ms: i64);
}

struct PollTask {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

impl PollTask {
    fn is_live(&self) -> bool {
        !self.cancel.is_cancelled() && !self.join.is_finished()
    }

    fn cancel(self) {
        self.cancel.cancel();
        self.join.abort();
    }
}

/// Cancellable periodic sampler. At most one task exists at a time.
pub struct PositionPoller {
    runtime: Handle,
    interval: Duration,
    task: Mutex<Option<PollTask>>,
}

impl PositionPoller {
    /// Creates a stopped poller whose task will run on `runtime`.
    pub fn new(runtime: Handle, interval: Duration) -> Self {
        Self {
            runtime,
            interval,
            task: Mutex::new(None),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Starts sampling `engine` into `target`.
    ///
    /// Returns `false` if a poll task was already running.
    pub fn start(&self, engine: Weak<EngineHandle>, target: Arc<dyn PositionTarget>) -> bool {
        let mut slot = self.task.lock();
        if slot.as_ref().is_some_and(PollTask::is_live) {
            trace!("poller already running");
            return false;
        }
        if let Some(stale) = slot.take() {
            stale.cancel();
        }

        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let period = self.interval;

        let join = self.runtime.spawn(async move {
            // First sample one period after start.
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {
                        if token.is_cancelled() {
                            break;
                        }
                        tick(&engine, target.as_ref());
                    }
                }
            }
            trace!("poll task exited");
        });

        *slot = Some(PollTask { cancel, join });
        debug!(interval_ms = period.as_millis() as u64, "poller started");
        true
    }

    /// Stops sampling. Returns `false` if nothing was running.
    pub fn stop(&self) -> bool {
        let Some(task) = self.task.lock().take() else {
            return false;
        };
        let was_live = task.is_live();
        task.cancel();
        if was_live {
            debug!("poller stopped");
        }
        was_live
    }

    pub fn is_running(&self) -> bool {
        self.task.lock().as_ref().is_some_and(PollTask::is_live)
    }
}

impl Drop for PositionPoller {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.cancel();
        }
    }
}

impl std::fmt::Debug for PositionPoller {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PositionPoller")
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish()
    }
}

fn tick(engine: &Weak<EngineHandle>, target: &dyn PositionTarget) {
    let Some(engine) = engine.upgrade() else {
        return;
    };
    if let Some((position_ms, duration_ms)) = engine.sample() {
        target.on_position(position_ms, duration_ms);
    }
}
