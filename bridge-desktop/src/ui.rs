//! Dedicated UI thread.
//!
//! Desktop hosts without their own event loop get a single named thread that
//! runs posted view jobs one after another, in posting order.

use bridge_traits::error::{BridgeError, Result};
use bridge_traits::{UiDispatcher, UiJob};
use std::thread::{self, JoinHandle, ThreadId};
use tokio::sync::mpsc;
use tracing::{debug, warn};

pub struct UiThread {
    sender: Option<mpsc::UnboundedSender<UiJob>>,
    thread: Option<JoinHandle<()>>,
    thread_id: ThreadId,
}

impl UiThread {
    /// Spawns the UI thread.
    ///
    /// # Errors
    ///
    /// [`BridgeError::Io`] if the OS refuses to create the thread.
    pub fn spawn(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let (sender, mut receiver) = mpsc::unbounded_channel::<UiJob>();

        let thread = thread::Builder::new().name(name.clone()).spawn(move || {
            while let Some(job) = receiver.blocking_recv() {
                job();
            }
            debug!("ui thread drained");
        })?;

        let thread_id = thread.thread().id();
        debug!(name = %name, "ui thread started");
        Ok(Self {
            sender: Some(sender),
            thread: Some(thread),
            thread_id,
        })
    }

    /// Whether the caller is running on this UI thread.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Blocks until every job posted so far has run.
    ///
    /// # Errors
    ///
    /// [`BridgeError::OperationFailed`] when called from the UI thread itself
    /// or after the thread has stopped.
    pub fn flush(&self) -> Result<()> {
        if self.is_current() {
            return Err(BridgeError::OperationFailed(
                "flush called on the ui thread".to_string(),
            ));
        }
        let (done, wait) = std::sync::mpsc::channel();
        self.send(Box::new(move || {
            let _ = done.send(());
        }))?;
        wait.recv()
            .map_err(|_| BridgeError::OperationFailed("ui thread stopped".to_string()))
    }

    fn send(&self, job: UiJob) -> Result<()> {
        self.sender
            .as_ref()
            .ok_or_else(|| BridgeError::OperationFailed("ui thread stopped".to_string()))?
            .send(job)
            .map_err(|_| BridgeError::OperationFailed("ui thread stopped".to_string()))
    }
}

impl UiDispatcher for UiThread {
    fn post(&self, job: UiJob) {
        if let Err(err) = self.send(job) {
            warn!(error = %err, "ui job dropped");
        }
    }
}

impl Drop for UiThread {
    fn drop(&mut self) {
        // Closing the channel lets the thread finish the queued jobs and exit.
        self.sender.take();
        if let Some(thread) = self.thread.take() {
            if self.is_current() {
                return;
            }
            if thread.join().is_err() {
                warn!("ui thread panicked");
            }
        }
    }
}

impl std::fmt::Debug for UiThread {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UiThread")
            .field("thread_id", &self.thread_id)
            .field("running", &self.sender.is_some())
            .finish()
    }
}
