// tests/dispatch_loop.rs

mod common;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::sync::watch;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use sandbox_manager::manager::{DispatchLoop, LoopExit, ManagerEvent, State};
use sandbox_manager::transport::{InboundMessage, OutboundMessage, WebSocketServer};
use sandbox_manager::types::DisconnectMode;

use crate::common::builders::{FAKE_PROFILE, FAKE_WORLD, LaunchConfigBuilder, frame};
use crate::common::{Harness, init_tracing, next_of, with_timeout};

fn command(id: &str, name: &str, data: Option<Value>) -> ManagerEvent {
    ManagerEvent::Command(InboundMessage::new(id, name, data))
}

/// Replies (`ack` / `error`) in the order they were sent.
fn replies(messages: &[OutboundMessage]) -> Vec<(String, String)> {
    messages
        .iter()
        .filter(|m| m.command == "ack" || m.command == "error")
        .map(|m| (m.id.clone(), m.command.clone()))
        .collect()
}

#[tokio::test]
async fn every_command_gets_exactly_one_reply() {
    init_tracing();
    let mut h = Harness::new();
    let launch = LaunchConfigBuilder::new(FAKE_WORLD).payload();

    let script = vec![
        command("1", "pause", None),
        command("2", "connect", None),
        command("3", "launch", Some(launch)),
        command("4", "prepare_visualization", Some(json!(FAKE_PROFILE))),
        command("5", "run", Some(json!("print('hi')"))),
        command("6", "self_destruct", None),
        command("7", "disconnect", None),
    ];
    for event in script {
        h.events_tx.send(event).await.unwrap();
    }

    let dispatch = DispatchLoop::new(h.manager, h.events_rx, h.outbox.clone(), DisconnectMode::Exec);
    let exit = with_timeout(dispatch.run()).await;
    assert_eq!(exit, LoopExit::Restart);

    let mut messages = Vec::new();
    while let Ok(message) = h.outbound.try_recv() {
        messages.push(message);
    }
    let replies = replies(&messages);
    let expected: Vec<(String, String)> = [
        ("1", "error"),
        ("2", "ack"),
        ("3", "ack"),
        ("4", "ack"),
        ("5", "ack"),
        ("6", "error"),
        ("7", "ack"),
    ]
    .into_iter()
    .map(|(id, kind)| (id.to_string(), kind.to_string()))
    .collect();
    assert_eq!(replies, expected);

    let ack = messages.iter().find(|m| m.id == "5").unwrap();
    assert_eq!(ack.data["state"], State::ApplicationRunning.as_str());
    let unknown = messages.iter().find(|m| m.id == "6").unwrap();
    assert_eq!(unknown.data["code"], "unknown_command");
}

#[tokio::test]
async fn stay_mode_keeps_serving_after_disconnect() {
    let mut h = Harness::new();
    for event in [
        command("1", "connect", None),
        command("2", "disconnect", None),
        command("3", "connect", None),
        ManagerEvent::Shutdown,
    ] {
        h.events_tx.send(event).await.unwrap();
    }

    let dispatch = DispatchLoop::new(h.manager, h.events_rx, h.outbox.clone(), DisconnectMode::Stay);
    assert_eq!(with_timeout(dispatch.run()).await, LoopExit::Shutdown);

    let mut acks = 0;
    while let Ok(message) = h.outbound.try_recv() {
        if message.command == "ack" {
            acks += 1;
        }
    }
    assert_eq!(acks, 3);
}

#[tokio::test]
async fn shutdown_tears_down_without_restart() {
    let mut h = Harness::new();
    for event in [
        command("1", "connect", None),
        command("2", "launch_world", Some(LaunchConfigBuilder::new(FAKE_WORLD).payload())),
        ManagerEvent::Shutdown,
    ] {
        h.events_tx.send(event).await.unwrap();
    }

    let journal = h.journal.clone();
    let dispatch = DispatchLoop::new(h.manager, h.events_rx, h.outbox.clone(), DisconnectMode::Exec);
    assert_eq!(with_timeout(dispatch.run()).await, LoopExit::Shutdown);
    assert_eq!(journal.with_prefix("terminate:"), ["terminate:world"]);
}

#[tokio::test]
async fn closed_queue_ends_the_loop() {
    let h = Harness::new();
    let (tx, rx) = tokio::sync::mpsc::channel(1);
    drop(tx);

    let dispatch = DispatchLoop::new(h.manager, rx, h.outbox.clone(), DisconnectMode::Exec);
    assert_eq!(with_timeout(dispatch.run()).await, LoopExit::Closed);
}

#[tokio::test]
async fn websocket_round_trip() {
    init_tracing();
    let h = Harness::new();
    let Harness {
        manager,
        events_tx,
        events_rx,
        outbox,
        outbound,
        ..
    } = h;

    let server = WebSocketServer::bind("127.0.0.1", 0, events_tx, outbound)
        .await
        .unwrap();
    let port = server.local_port().unwrap();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server_task = tokio::spawn(server.serve(shutdown_rx));

    let dispatch = DispatchLoop::new(manager, events_rx, outbox, DisconnectMode::Exit);
    let dispatch_task = tokio::spawn(dispatch.run());

    let (mut ws, _) = connect_async(format!("ws://127.0.0.1:{port}")).await.unwrap();

    ws.send(WsMessage::Text(frame("a", "connect", None).into()))
        .await
        .unwrap();
    let introspection = read_message(&mut ws, "introspection").await;
    assert_eq!(introspection.data["gpu_avaliable"], false);
    let ack = read_message(&mut ws, "ack").await;
    assert_eq!(ack.id, "a");
    assert_eq!(ack.data["state"], "connected");

    ws.send(WsMessage::Text("{ not json".to_string().into())).await.unwrap();
    let error = read_message(&mut ws, "error").await;
    assert_eq!(error.data["code"], "invalid_payload");

    ws.send(WsMessage::Text(frame("b", "disconnect", None).into()))
        .await
        .unwrap();
    let ack = read_message(&mut ws, "ack").await;
    assert_eq!(ack.id, "b");
    assert_eq!(ack.data["state"], "idle");

    assert_eq!(with_timeout(dispatch_task).await.unwrap(), LoopExit::Shutdown);
    let _ = shutdown_tx.send(true);
    with_timeout(server_task).await.unwrap().unwrap();
}

async fn read_message<S>(ws: &mut S, wanted: &str) -> OutboundMessage
where
    S: futures_util::Stream<Item = Result<WsMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    with_timeout(async {
        loop {
            let frame = ws.next().await.expect("socket closed").expect("read failed");
            if let WsMessage::Text(text) = frame {
                let message: OutboundMessage = serde_json::from_str(text.as_str()).unwrap();
                if message.command == wanted {
                    return message;
                }
            }
        }
    })
    .await
}

#[tokio::test]
async fn outbound_helper_filters_by_command() {
    let mut h = Harness::new();
    h.outbox.send(OutboundMessage::update(json!({ "frame": 1 })));
    h.outbox.send(OutboundMessage::state_changed("connected"));

    let message = next_of(&mut h.outbound, "state-changed").await;
    assert_eq!(message.data["state"], "connected");
}
