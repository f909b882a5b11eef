// src/main.rs

use sandbox_manager::manager::LoopExit;
use sandbox_manager::{cli, logging, run};

#[tokio::main]
async fn main() {
    match run_main().await {
        Ok(LoopExit::Restart) => {
            if let Err(err) = restart() {
                eprintln!("sandbox-manager error: {err:?}");
                std::process::exit(1);
            }
        }
        Ok(_) => {}
        Err(err) => {
            eprintln!("sandbox-manager error: {err:?}");
            std::process::exit(1);
        }
    }
}

async fn run_main() -> anyhow::Result<LoopExit> {
    let args = cli::parse();
    logging::init_logging(args.log_level)?;
    run(args).await
}

/// Replace this process with a fresh copy started with the same arguments.
#[cfg(unix)]
fn restart() -> anyhow::Result<()> {
    use std::os::unix::process::CommandExt;

    use anyhow::Context;

    let exe = std::env::current_exe().context("locating current executable")?;
    let args: Vec<_> = std::env::args_os().skip(1).collect();
    tracing::info!(exe = %exe.display(), "restarting after disconnect");

    let err = std::process::Command::new(&exe).args(&args).exec();
    Err(err).context("re-executing sandbox-manager")
}

#[cfg(not(unix))]
fn restart() -> anyhow::Result<()> {
    anyhow::bail!("restart on disconnect is only supported on unix")
}
