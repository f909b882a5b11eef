#![allow(dead_code)]

pub use sandbox_manager_test_utils::builders;
pub use sandbox_manager_test_utils::fakes;
pub use sandbox_manager_test_utils::{Harness, init_tracing, with_timeout};

use std::time::Duration;

use tokio::sync::mpsc;

use sandbox_manager::transport::OutboundMessage;

/// Wait for the next outbound message whose `command` is `command`,
/// skipping everything else.
pub async fn next_of(
    outbound: &mut mpsc::UnboundedReceiver<OutboundMessage>,
    command: &str,
) -> OutboundMessage {
    with_timeout(async {
        loop {
            let message = outbound.recv().await.expect("outbound channel closed");
            if message.command == command {
                return message;
            }
        }
    })
    .await
}

/// Poll `check` every 20ms for up to `limit`.
pub async fn eventually(limit: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + limit;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    check()
}
