// tests/simulation_relay.rs

mod common;

use futures_util::SinkExt;
use serde_json::json;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message as WsMessage;

use sandbox_manager::config::SimulationSection;
use sandbox_manager::simulation::{CommandWorldControl, WorldControl};
use sandbox_manager::transport::{Outbox, start_relay};

use crate::common::{init_tracing, next_of, with_timeout};

#[cfg(unix)]
#[tokio::test]
async fn world_control_runs_the_configured_commands() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("world.log");
    let append = |word: &str| Some(format!("echo {word} >> {}", log.display()));

    let world = CommandWorldControl::new(append("pause"), append("unpause"), None);
    world.pause().await.unwrap();
    world.unpause().await.unwrap();
    world.reset().await.unwrap();

    assert_eq!(std::fs::read_to_string(&log).unwrap(), "pause\nunpause\n");
}

#[cfg(unix)]
#[tokio::test]
async fn failing_world_command_is_an_error() {
    let world = CommandWorldControl::new(Some("echo no physics >&2; exit 1".to_string()), None, None);
    let err = world.pause().await.unwrap_err();
    assert_eq!(err.code(), "internal");
    assert!(err.to_string().contains("no physics"), "{err}");

    CommandWorldControl::disabled().reset().await.unwrap();
}

#[test]
fn unset_commands_fall_back_to_gazebo_services() {
    let settings = SimulationSection {
        reset_command: Some("true".to_string()),
        ..SimulationSection::default()
    };
    let ros2 = format!("{:?}", CommandWorldControl::from_settings(&settings, 2));
    assert!(ros2.contains("ros2 service call /pause_physics std_srvs/srv/Empty"), "{ros2}");
    assert!(ros2.contains("\"true\""), "{ros2}");

    let ros1 = format!("{:?}", CommandWorldControl::from_settings(&settings, 1));
    assert!(ros1.contains("rosservice call /gazebo/unpause_physics"), "{ros1}");
}

#[tokio::test]
async fn relay_forwards_frames_as_updates() {
    init_tracing();
    let (outbox, mut outbound) = Outbox::channel();
    let relay = start_relay("127.0.0.1", 0, outbox).await.unwrap();
    let port = relay.port();
    assert_ne!(port, 0);

    let (mut ws, _) = with_timeout(connect_async(format!("ws://127.0.0.1:{port}")))
        .await
        .unwrap();
    ws.send(WsMessage::Text(json!({ "pose": [1, 2] }).to_string().into()))
        .await
        .unwrap();
    ws.send(WsMessage::Text("plain text".to_string().into()))
        .await
        .unwrap();

    let first = next_of(&mut outbound, "update").await;
    assert_eq!(first.data, json!({ "pose": [1, 2] }));
    let second = next_of(&mut outbound, "update").await;
    assert_eq!(second.data, json!("plain text"));

    with_timeout(relay.stop()).await;
    assert!(
        tokio::net::TcpStream::connect(("127.0.0.1", port)).await.is_err(),
        "relay still accepting after stop"
    );
}
