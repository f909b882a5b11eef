// src/transport/websocket.rs

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tracing::{debug, info, warn};

use crate::manager::ManagerEvent;
use crate::transport::{OutboundMessage, parse_frame};

/// Command socket. Serves one client at a time; further connections wait
/// in the listen backlog until the current client leaves.
pub struct WebSocketServer {
    listener: TcpListener,
    events: mpsc::Sender<ManagerEvent>,
    outbound: mpsc::UnboundedReceiver<OutboundMessage>,
}

impl WebSocketServer {
    pub async fn bind(
        host: &str,
        port: u16,
        events: mpsc::Sender<ManagerEvent>,
        outbound: mpsc::UnboundedReceiver<OutboundMessage>,
    ) -> Result<Self> {
        let listener = TcpListener::bind((host, port))
            .await
            .with_context(|| format!("binding command socket on {host}:{port}"))?;
        info!(host, port, "command socket listening");
        Ok(Self {
            listener,
            events,
            outbound,
        })
    }

    pub fn local_port(&self) -> Option<u16> {
        self.listener.local_addr().ok().map(|a| a.port())
    }

    /// Accept clients until `shutdown` flips to true or the dispatch loop
    /// goes away.
    pub async fn serve(mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => {
                    let (stream, peer) = accepted.context("accepting connection")?;
                    info!(%peer, "client connected");
                    match self.handle_client(stream, &mut shutdown).await {
                        Ok(ClientEnd::Closed) => info!(%peer, "client disconnected"),
                        Ok(ClientEnd::Shutdown) => break,
                        Err(e) => warn!(%peer, error = %e, "client connection failed"),
                    }
                }
                message = self.outbound.recv() => {
                    match message {
                        Some(message) => debug!(command = %message.command, "no client connected; dropping message"),
                        None => break,
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
            if self.events.is_closed() {
                break;
            }
        }
        info!("command socket closed");
        Ok(())
    }

    async fn handle_client(
        &mut self,
        stream: TcpStream,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<ClientEnd> {
        let ws = tokio_tungstenite::accept_async(stream)
            .await
            .context("websocket handshake")?;
        let (mut sink, mut stream) = ws.split();

        loop {
            tokio::select! {
                frame = stream.next() => {
                    let Some(frame) = frame else {
                        return Ok(ClientEnd::Closed);
                    };
                    match frame.context("reading websocket frame")? {
                        WsMessage::Text(text) => match parse_frame(text.as_str()) {
                            Ok(message) => {
                                debug!(command = %message.command, id = ?message.id, "command received");
                                if self.events.send(ManagerEvent::Command(message)).await.is_err() {
                                    return Ok(ClientEnd::Shutdown);
                                }
                            }
                            Err(reply) => {
                                sink.send(WsMessage::Text(serde_json::to_string(&reply)?.into())).await?;
                            }
                        },
                        WsMessage::Ping(payload) => sink.send(WsMessage::Pong(payload)).await?,
                        WsMessage::Close(_) => return Ok(ClientEnd::Closed),
                        _ => {}
                    }
                }
                message = self.outbound.recv() => {
                    let Some(message) = message else {
                        return Ok(ClientEnd::Shutdown);
                    };
                    sink.send(WsMessage::Text(serde_json::to_string(&message)?.into())).await?;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        // Flush what the dispatch loop already produced.
                        while let Ok(message) = self.outbound.try_recv() {
                            sink.send(WsMessage::Text(serde_json::to_string(&message)?.into())).await?;
                        }
                        let _ = sink.send(WsMessage::Close(None)).await;
                        return Ok(ClientEnd::Shutdown);
                    }
                }
            }
        }
    }
}

enum ClientEnd {
    Closed,
    Shutdown,
}
