//! External command channel.
//!
//! Other processes, status entry buttons and scripts drive the player by
//! sending trigger strings (`toggle-play-pause`, `toggle-loop`, `exit`).
//! Triggers are queued in order and applied by the service's listener task;
//! unrecognized triggers are ignored there.

use crate::error::{CoreError, Result};

use bridge_traits::StatusAction;
use core_playback::PlaybackController;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

/// Default number of triggers buffered before senders wait.
pub const DEFAULT_COMMAND_BUFFER: usize = 32;

/// Sending half of the command channel. Cheap to clone.
#[derive(Debug, Clone)]
pub struct CommandSender {
    sender: mpsc::Sender<String>,
}

/// Receiving half, consumed by [`listen`].
#[derive(Debug)]
pub struct CommandReceiver {
    receiver: mpsc::Receiver<String>,
}

/// Creates a bounded command channel.
pub fn command_channel(capacity: usize) -> (CommandSender, CommandReceiver) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    (CommandSender { sender }, CommandReceiver { receiver })
}

impl CommandSender {
    /// Queues `trigger`, waiting for room.
    ///
    /// # Errors
    ///
    /// [`CoreError::CommandChannelClosed`] once the listener has stopped.
    pub async fn send(&self, trigger: impl Into<String>) -> Result<()> {
        self.sender
            .send(trigger.into())
            .await
            .map_err(|_| CoreError::CommandChannelClosed)
    }

    /// Queues `trigger` without waiting.
    ///
    /// # Errors
    ///
    /// [`CoreError::CommandBufferFull`] when the listener is behind and
    /// [`CoreError::CommandChannelClosed`] once it has stopped.
    pub fn try_send(&self, trigger: impl Into<String>) -> Result<()> {
        self.sender.try_send(trigger.into()).map_err(|err| match err {
            TrySendError::Full(_) => CoreError::CommandBufferFull,
            TrySendError::Closed(_) => CoreError::CommandChannelClosed,
        })
    }

    /// Status entry button press.
    pub async fn send_action(&self, action: StatusAction) -> Result<()> {
        self.send(action.trigger()).await
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

impl CommandReceiver {
    pub async fn recv(&mut self) -> Option<String> {
        self.receiver.recv().await
    }
}

/// Applies triggers to `controller` until cancelled or every sender is gone.
pub async fn listen(
    mut commands: CommandReceiver,
    controller: PlaybackController,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            trigger = commands.recv() => {
                let Some(trigger) = trigger else {
                    break;
                };
                trace!(trigger = %trigger, "command received");
                controller.handle_trigger(&trigger);
            }
        }
    }
    debug!("command listener stopped");
}

/// Forwards every non-blank line of `reader` as a trigger.
///
/// Returns the number of lines forwarded once the reader is exhausted.
///
/// # Errors
///
/// I/O errors from `reader`, or [`CoreError::CommandChannelClosed`].
pub async fn serve_lines<R>(reader: R, sender: &CommandSender) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut forwarded = 0;
    while let Some(line) = lines.next_line().await? {
        let trigger = line.trim();
        if trigger.is_empty() {
            continue;
        }
        sender.send(trigger).await?;
        forwarded += 1;
    }
    Ok(forwarded)
}
