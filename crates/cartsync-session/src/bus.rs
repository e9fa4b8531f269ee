//! Process-wide command bus.
//!
//! Commands are broadcast to every listening manager; each manager consumes
//! them through its own ordered event channel.

use cartsync_core::CommandEvent;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::state::ManagerEvent;

const DEFAULT_BUS_CAPACITY: usize = 16;

#[derive(Debug, Clone)]
pub struct CommandBus {
    tx: broadcast::Sender<CommandEvent>,
}

impl CommandBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(DEFAULT_BUS_CAPACITY);
        Self { tx }
    }

    /// Broadcast a command. Returns how many listeners received it.
    pub fn publish(&self, command: CommandEvent) -> usize {
        match self.tx.send(command) {
            Ok(listeners) => listeners,
            Err(_) => {
                tracing::debug!(command = %command, "no session manager is listening");
                0
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CommandEvent> {
        self.tx.subscribe()
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Pipe bus commands into a manager's event channel until either side closes.
pub fn forward_commands(bus: &CommandBus, events: mpsc::Sender<ManagerEvent>) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(command) => {
                    if events.send(ManagerEvent::Command(command)).await.is_err() {
                        tracing::debug!("session manager gone, command forwarding stopped");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "command bus lagged, commands were dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}
