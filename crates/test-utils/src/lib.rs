pub mod builders;
pub mod fakes;

use std::sync::Once;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt};

use sandbox_manager::exec::ProcessTable;
use sandbox_manager::introspection::Introspection;
use sandbox_manager::launcher::{LaunchCatalog, LaunchContext, LauncherEngine, LauncherRegistry};
use sandbox_manager::manager::{Manager, ManagerEvent, RelaySettings};
use sandbox_manager::transport::{OutboundMessage, Outbox};

use crate::builders::{fake_catalog, fast_launch_section};
use crate::fakes::{FakeApplication, FakeWorldControl, Journal, fake_registry};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .init();
    });
}

/// Run a future with a 10-second timeout.
#[allow(dead_code)]
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(10), f)
        .await
        .expect("Test timed out after 10 seconds")
}

/// A manager wired to fakes, plus the channel ends a test drives it with.
pub struct Harness {
    pub manager: Manager,
    pub events_tx: mpsc::Sender<ManagerEvent>,
    pub events_rx: mpsc::Receiver<ManagerEvent>,
    pub outbox: Outbox,
    pub outbound: mpsc::UnboundedReceiver<OutboundMessage>,
    pub journal: Journal,
    pub table: ProcessTable,
}

impl Harness {
    /// Fake catalog, registry with the fake module, fake application and
    /// world control.
    pub fn new() -> Self {
        let journal = Journal::new();
        Self::with_parts(
            fake_catalog(),
            fake_registry(&journal),
            FakeApplication::new(journal.clone()),
            FakeWorldControl::new(journal.clone()),
            journal,
        )
    }

    pub fn with_parts(
        catalog: LaunchCatalog,
        registry: LauncherRegistry,
        application: FakeApplication,
        world: FakeWorldControl,
        journal: Journal,
    ) -> Self {
        let table = ProcessTable::new();
        let (events_tx, events_rx) = mpsc::channel(64);
        let (outbox, outbound) = Outbox::channel();

        let context = LaunchContext::new(table.clone(), fast_launch_section());
        let engine = LauncherEngine::new(registry, catalog, context, events_tx.clone());
        let manager = Manager::new(
            engine,
            Box::new(application),
            Box::new(world),
            outbox.clone(),
            test_introspection(),
            RelaySettings::disabled(),
        );

        Self {
            manager,
            events_tx,
            events_rx,
            outbox,
            outbound,
            journal,
            table,
        }
    }

    /// Every outbound message produced so far.
    pub fn drain_outbound(&mut self) -> Vec<OutboundMessage> {
        let mut out = Vec::new();
        while let Ok(message) = self.outbound.try_recv() {
            out.push(message);
        }
        out
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

pub fn test_introspection() -> Introspection {
    Introspection {
        image_tag: "test".to_string(),
        ros_version: "humble".to_string(),
        gpu_available: false,
        gpu_device: None,
    }
}
