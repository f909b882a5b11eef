// src/lib.rs

pub mod application;
pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod introspection;
pub mod launcher;
pub mod logging;
pub mod manager;
pub mod simulation;
pub mod transport;
pub mod types;
pub mod workspace;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::application::{ProcessApplication, lint};
use crate::cli::CliArgs;
use crate::config::{Settings, load_or_default};
use crate::exec::ProcessTable;
use crate::introspection::Introspection;
use crate::launcher::{LaunchCatalog, LaunchContext, LauncherEngine, LauncherRegistry};
use crate::manager::{DispatchLoop, LoopExit, Manager, ManagerEvent, RelaySettings};
use crate::simulation::CommandWorldControl;
use crate::transport::{Outbox, WebSocketServer};
use crate::workspace::Workspace;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - settings loading
/// - workspace directories and introspection
/// - launcher engine, application and simulation control
/// - the command socket and the dispatch loop
/// - Ctrl-C handling
///
/// Returns how the dispatch loop ended so `main` can re-exec on
/// [`LoopExit::Restart`].
pub async fn run(args: CliArgs) -> Result<LoopExit> {
    let settings = load_or_default(args.config.as_deref().map(Path::new))
        .context("loading settings")?;
    let registry = LauncherRegistry::builtin();
    let catalog = LaunchCatalog::builtin();

    if args.dry_run {
        print_dry_run(&settings, &catalog, &registry);
        return Ok(LoopExit::Shutdown);
    }

    warn_if_init(std::process::id());

    let workspace = Workspace::new(&settings.workspace.root);
    workspace.ensure().context("preparing workspace")?;

    let introspection = Introspection::detect();
    info!(
        image = %introspection.image_tag,
        ros = %introspection.ros_version,
        gpu = introspection.gpu_available,
        "introspection"
    );

    let table = ProcessTable::new();
    let (events_tx, events_rx) = mpsc::channel::<ManagerEvent>(settings.server.queue_capacity);
    let (outbox, outbound_rx) = Outbox::channel();

    let context = LaunchContext::new(table.clone(), settings.launch.clone())
        .with_gpu_device(introspection.gpu_device.clone());
    let engine = LauncherEngine::new(registry, catalog, context, events_tx.clone());

    let linter = lint::from_settings(&settings.lint)?;
    let application = ProcessApplication::new(
        settings.application.clone(),
        workspace,
        linter,
        table.clone(),
        settings.launch.stop_timeout,
    );
    let world = CommandWorldControl::from_settings(&settings.simulation, settings.launch.ros_version);

    let relay = RelaySettings {
        host: args.host.clone(),
        port: settings.visualization.relay_port,
        profiles: settings.visualization.relay_profiles.clone(),
    };
    let manager = Manager::new(
        engine,
        Box::new(application),
        Box::new(world),
        outbox.clone(),
        introspection,
        relay,
    );

    let server = WebSocketServer::bind(&args.host, args.port, events_tx.clone(), outbound_rx).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server_task = tokio::spawn(server.serve(shutdown_rx));

    spawn_signal_task(events_tx, table, settings.server.shutdown_grace);

    let exit = DispatchLoop::new(manager, events_rx, outbox, settings.server.on_disconnect)
        .run()
        .await;

    let _ = shutdown_tx.send(true);
    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(error = %e, "command socket failed"),
        Err(e) => warn!(error = %e, "command socket task panicked"),
    }

    Ok(exit)
}

/// First Ctrl-C enqueues `Shutdown` and lets the dispatch loop clean up.
/// A second Ctrl-C, or cleanup outliving `grace`, kills every supervised
/// process directly and exits.
fn spawn_signal_task(events: mpsc::Sender<ManagerEvent>, table: ProcessTable, grace: Duration) {
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for Ctrl-C");
            return;
        }
        info!("Ctrl-C received; shutting down");

        let graceful = async {
            let _ = events.send(ManagerEvent::Shutdown).await;
            sleep(grace).await;
            warn!(?grace, "cleanup did not finish in time");
        };

        tokio::select! {
            _ = graceful => {}
            _ = tokio::signal::ctrl_c() => warn!("second Ctrl-C"),
        }

        let killed = table.signal_all(libc::SIGKILL);
        warn!(count = killed.len(), pids = ?killed, "killed every supervised process");
        std::process::exit(130);
    });
}

/// Orphans from launched sessions are re-parented to pid 1 and only an init
/// reaps them. The manager waits on its own children only.
fn warn_if_init(pid: u32) {
    if pid == 1 {
        warn!(
            "running as pid 1; exited orphans will stay zombies. \
             Start the container with an init such as `docker run --init` or tini"
        );
    }
}

/// Print resolved settings, the launch catalog and the launcher registry.
fn print_dry_run(settings: &Settings, catalog: &LaunchCatalog, registry: &LauncherRegistry) {
    println!("sandbox-manager dry-run");
    println!("  server.on_disconnect = {:?}", settings.server.on_disconnect);
    println!("  server.queue_capacity = {}", settings.server.queue_capacity);
    println!("  server.shutdown_grace = {:?}", settings.server.shutdown_grace);
    println!("  workspace.root = {}", settings.workspace.root.display());
    println!("  launch.ros_version = {}", settings.launch.ros_version);
    println!("  launch.poll_interval = {:?}", settings.launch.poll_interval);
    println!("  launch.readiness_timeout = {:?}", settings.launch.readiness_timeout);
    println!("  visualization.relay_port = {}", settings.visualization.relay_port);
    println!("  application.interpreter = {}", settings.application.interpreter);
    if let Some(ref command) = settings.lint.command {
        println!("  lint.command = {command}");
    }
    println!();

    println!("worlds:");
    for world in catalog.world_names() {
        println!("  - {world}");
    }
    println!("visualization profiles:");
    for profile in catalog.profile_names() {
        println!("  - {profile}");
    }
    println!("launcher modules:");
    for module in registry.modules() {
        println!("  - {module} ({})", launcher::strategy_identifier(module));
    }

    debug!("dry-run complete (nothing launched)");
}

