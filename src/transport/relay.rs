// src/transport/relay.rs

//! Legacy GUI relay: older exercise frontends push their GUI frames to a
//! separate socket; every text frame is forwarded to the command client as
//! an `update` notification.

use anyhow::{Context, Result};
use futures_util::StreamExt;
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use crate::transport::{OutboundMessage, Outbox};

/// Running relay listener; stopped explicitly or when dropped.
#[derive(Debug)]
pub struct RelayHandle {
    port: u16,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl RelayHandle {
    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn stop(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        info!(port = self.port, "GUI relay stopped");
    }
}

impl Drop for RelayHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Bind the relay on `host:port` and start forwarding.
pub async fn start_relay(host: &str, port: u16, outbox: Outbox) -> Result<RelayHandle> {
    let listener = TcpListener::bind((host, port))
        .await
        .with_context(|| format!("binding GUI relay on {host}:{port}"))?;
    let port = listener.local_addr().map(|a| a.port()).unwrap_or(port);
    info!(port, "GUI relay listening");

    let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
    let task = tokio::spawn(async move {
        let mut clients = JoinSet::new();
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "GUI relay client connected");
                        clients.spawn(forward_frames(stream, outbox.clone()));
                    }
                    Err(e) => warn!(error = %e, "GUI relay accept failed"),
                },
                _ = &mut shutdown_rx => break,
            }
        }
        clients.shutdown().await;
    });

    Ok(RelayHandle {
        port,
        shutdown: Some(shutdown_tx),
        task: Some(task),
    })
}

async fn forward_frames(stream: TcpStream, outbox: Outbox) {
    let mut ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(error = %e, "GUI relay handshake failed");
            return;
        }
    };

    while let Some(frame) = ws.next().await {
        match frame {
            Ok(WsMessage::Text(text)) => {
                let data = serde_json::from_str::<Value>(text.as_str())
                    .unwrap_or_else(|_| Value::String(text.to_string()));
                outbox.send(OutboundMessage::update(data));
            }
            Ok(WsMessage::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(error = %e, "GUI relay connection ended");
                break;
            }
        }
    }
}
