//! Dedicated single-worker runtime.
//!
//! Periodic work (the position poller) runs on its own thread with a
//! current-thread tokio runtime, so it never competes with the host's UI
//! thread or the engine's callback thread. Tasks are spawned through the
//! exposed [`Handle`]; dropping the [`WorkerRuntime`] stops the thread and
//! drops whatever is still scheduled on it.

use crate::error::{Error, Result};

use std::thread::{self, JoinHandle, ThreadId};

use tokio::runtime::{Builder, Handle};
use tokio::sync::oneshot;
use tracing::{debug, warn};

pub struct WorkerRuntime {
    name: String,
    handle: Handle,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
    thread_id: ThreadId,
}

impl WorkerRuntime {
    /// Starts a worker thread named `name`.
    pub fn spawn(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let runtime = Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| Error::Worker(format!("failed to build runtime for {}: {}", name, e)))?;
        let handle = runtime.handle().clone();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let thread_name = name.clone();
        let thread = thread::Builder::new()
            .name(name.clone())
            .spawn(move || {
                runtime.block_on(async {
                    // Sender dropped or signalled: either way we are done.
                    let _ = shutdown_rx.await;
                });
                debug!(worker = %thread_name, "worker runtime stopped");
            })
            .map_err(|e| Error::Worker(format!("failed to spawn {} thread: {}", name, e)))?;

        let thread_id = thread.thread().id();
        debug!(worker = %name, "worker runtime started");

        Ok(Self {
            name,
            handle,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
            thread_id,
        })
    }

    /// Handle for spawning tasks onto the worker.
    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stops the worker and waits for its thread to exit.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        let Some(thread) = self.thread.take() else {
            return;
        };

        // Joining from the worker itself would never return.
        if thread::current().id() == self.thread_id {
            return;
        }

        if thread.join().is_err() {
            warn!(worker = %self.name, "worker thread panicked");
        }
    }
}

impl Drop for WorkerRuntime {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for WorkerRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerRuntime")
            .field("name", &self.name)
            .field("running", &self.thread.is_some())
            .finish()
    }
}
