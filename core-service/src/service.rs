//! Player service façade.
//!
//! [`PlayerService`] owns everything a host needs running next to the
//! controller: the poller worker thread, the engine-event pump, the
//! preference watcher and the command channel listener.

use crate::command::{self, command_channel, CommandSender, DEFAULT_COMMAND_BUFFER};
use crate::error::{CoreError, Result};

use bridge_traits::storage::SettingsStore;
use core_playback::{PlaybackController, SessionId};
use core_runtime::config::{PlayerConfig, PlayerPreferences};
use core_runtime::events::{EventStream, RecvError};
use core_runtime::WorkerRuntime;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

const POLLER_THREAD: &str = "floatplay-poller";

pub struct PlayerService {
    controller: PlaybackController,
    commands: CommandSender,
    cancel: CancellationToken,
    pump: JoinHandle<()>,
    tasks: Vec<JoinHandle<()>>,
    worker: Option<WorkerRuntime>,
}

impl PlayerService {
    /// Validates `config`, reads stored preferences and starts the background
    /// tasks on the current tokio runtime.
    ///
    /// # Errors
    ///
    /// Fails outside a tokio runtime, on invalid configuration, or when the
    /// poller thread cannot be started. Unreadable preferences are logged and
    /// the configured defaults are kept.
    #[instrument(skip(config))]
    pub async fn start(config: PlayerConfig) -> Result<Self> {
        config.validate()?;
        let runtime = Handle::try_current()
            .map_err(|e| CoreError::InitializationFailed(format!("no tokio runtime: {}", e)))?;

        let worker = WorkerRuntime::spawn(POLLER_THREAD)?;
        let (controller, pump) = PlaybackController::new(&config, worker.handle());
        let cancel = CancellationToken::new();
        let mut tasks = Vec::new();

        if let Some(store) = config.settings_store.clone() {
            reload_preferences(store.as_ref(), &controller).await;
            tasks.push(runtime.spawn(watch_preferences(
                store,
                controller.clone(),
                cancel.clone(),
            )));
        }

        let (commands, receiver) = command_channel(DEFAULT_COMMAND_BUFFER);
        tasks.push(runtime.spawn(command::listen(
            receiver,
            controller.clone(),
            cancel.clone(),
        )));

        let pump = runtime.spawn(pump.run());

        info!(
            poll_interval_ms = config.poll_interval.as_millis() as u64,
            "player service started"
        );

        Ok(Self {
            controller,
            commands,
            cancel,
            pump,
            tasks,
            worker: Some(worker),
        })
    }

    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }

    /// Starts a session for `reference`, replacing any current one.
    pub async fn load_source(&self, reference: &str) -> Result<SessionId> {
        Ok(self.controller.load_source(reference).await?)
    }

    /// Sender for the external command channel.
    pub fn commands(&self) -> CommandSender {
        self.commands.clone()
    }

    /// Stream of core events emitted from now on.
    pub fn subscribe(&self) -> EventStream {
        EventStream::new(self.controller.events().subscribe())
    }

    /// Ends any session and stops every background task.
    pub async fn shutdown(mut self) {
        self.controller.exit();
        self.stop_tasks();
        for task in self.tasks.drain(..) {
            if let Err(err) = task.await {
                if !err.is_cancelled() {
                    warn!(error = %err, "service task failed");
                }
            }
        }
        if let Some(worker) = self.worker.take() {
            worker.shutdown();
        }
        info!("player service stopped");
    }

    fn stop_tasks(&self) {
        self.cancel.cancel();
        // The pump only ends with the controller, which clones keep alive.
        self.pump.abort();
    }
}

impl Drop for PlayerService {
    fn drop(&mut self) {
        self.stop_tasks();
        for task in &self.tasks {
            task.abort();
        }
    }
}

impl std::fmt::Debug for PlayerService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerService")
            .field("controller", &self.controller)
            .field("tasks", &self.tasks.len())
            .finish()
    }
}

async fn reload_preferences(store: &dyn SettingsStore, controller: &PlaybackController) {
    let preferences = match PlayerPreferences::load(store).await {
        Ok(preferences) => preferences,
        Err(err) => {
            warn!(error = %err, "could not read preferences; keeping current values");
            return;
        }
    };
    debug!(?preferences, "preferences loaded");
    if let Err(err) = controller.apply_preferences(preferences) {
        warn!(error = %err, "preference change not applied");
    }
}

/// Re-reads preferences whenever one of their keys changes.
async fn watch_preferences(
    store: Arc<dyn SettingsStore>,
    controller: PlaybackController,
    cancel: CancellationToken,
) {
    let Some(mut changes) = store.subscribe() else {
        debug!("settings store has no change feed; preferences are read once");
        return;
    };

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            change = changes.recv() => match change {
                Ok(change) if !PlayerPreferences::is_preference_key(&change.key) => {}
                Ok(_) | Err(RecvError::Lagged(_)) => {
                    reload_preferences(store.as_ref(), &controller).await;
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
    debug!("preference watcher stopped");
}
