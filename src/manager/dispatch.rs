// src/manager/dispatch.rs

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::manager::{Command, Manager, ManagerEvent, Trigger};
use crate::transport::{InboundMessage, OutboundMessage, Outbox};
use crate::types::DisconnectMode;

/// Why the dispatch loop returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// `disconnect` finished and the process should re-exec itself.
    Restart,
    /// Ctrl-C, or `disconnect` with `on_disconnect = "exit"`.
    Shutdown,
    /// Every event sender went away.
    Closed,
}

/// Drains the event queue, one event at a time.
///
/// This is the IO shell around [`Manager`]: it parses commands, replies
/// with `ack` or `error`, and decides when the process should end.
pub struct DispatchLoop {
    manager: Manager,
    events: mpsc::Receiver<ManagerEvent>,
    outbox: Outbox,
    on_disconnect: DisconnectMode,
}

impl DispatchLoop {
    pub fn new(
        manager: Manager,
        events: mpsc::Receiver<ManagerEvent>,
        outbox: Outbox,
        on_disconnect: DisconnectMode,
    ) -> Self {
        Self {
            manager,
            events,
            outbox,
            on_disconnect,
        }
    }

    pub fn manager(&self) -> &Manager {
        &self.manager
    }

    pub async fn run(mut self) -> LoopExit {
        info!(state = %self.manager.state(), "dispatch loop started");

        let exit = loop {
            let Some(event) = self.events.recv().await else {
                info!("event queue closed");
                self.manager.shutdown().await;
                break LoopExit::Closed;
            };

            match event {
                ManagerEvent::Command(message) => {
                    if let Some(exit) = self.handle_command(message).await {
                        break exit;
                    }
                }
                ManagerEvent::LauncherDied(notice) => {
                    if let Some(state) = self.manager.launcher_died(notice).await {
                        debug!(%state, "launcher death handled");
                    }
                }
                ManagerEvent::Shutdown => {
                    info!("shutdown requested");
                    self.manager.shutdown().await;
                    break LoopExit::Shutdown;
                }
            }
        };

        info!(?exit, "dispatch loop exiting");
        exit
    }

    async fn handle_command(&mut self, message: InboundMessage) -> Option<LoopExit> {
        let id = message.reply_id();

        let command = match Command::parse(&message) {
            Ok(command) => command,
            Err(e) => {
                warn!(command = %message.command, error = %e, "rejected command");
                self.outbox.send(OutboundMessage::error(id, &e));
                return None;
            }
        };

        let trigger = command.trigger();
        match self.manager.apply(command).await {
            Ok(transition) => {
                self.outbox.send(OutboundMessage::ack(
                    id,
                    format!("{trigger} completed"),
                    transition.to.as_str(),
                ));
            }
            Err(e) => {
                warn!(%trigger, state = %self.manager.state(), error = %e, "command failed");
                self.outbox.send(OutboundMessage::error(id, &e));
                return None;
            }
        }

        if trigger != Trigger::Disconnect {
            return None;
        }
        match self.on_disconnect {
            DisconnectMode::Exec => Some(LoopExit::Restart),
            DisconnectMode::Exit => Some(LoopExit::Shutdown),
            DisconnectMode::Stay => None,
        }
    }
}
