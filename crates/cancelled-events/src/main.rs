/*
[INPUT]:  CLI arguments, optional YAML configuration file, OS shutdown signals
[OUTPUT]: One demo run: destination switch, scoped job cancelled, detached job completed
[POS]:    Binary entry point
[UPDATE]: When changing CLI flags, startup flow, or shutdown handling
*/

use anyhow::{Context, Result, anyhow};
use clap::Parser;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use cancelled_events::{DemoConfig, Store, ViewHost};

#[derive(Parser, Debug)]
#[command(name = "cancelled-events", version, about = "Scoped task cancellation on destination switch")]
struct Cli {
    #[arg(long = "config", value_name = "PATH")]
    config_path: Option<PathBuf>,
    #[arg(long = "log-level", value_name = "LEVEL", default_value = "info")]
    log_level: String,
    /// Write logs to a daily rolling file in this directory instead of stdout
    #[arg(long = "log-dir", value_name = "DIR")]
    log_dir: Option<PathBuf>,
    /// Override the length of one time unit
    #[arg(long = "time-unit-ms", value_name = "MS")]
    time_unit_ms: Option<u64>,
    #[arg(long = "dry-run")]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    let _log_guard = init_tracing(&args.log_level, args.log_dir.as_deref())?;

    let mut config = load_config(args.config_path.as_deref())?;
    if let Some(time_unit_ms) = args.time_unit_ms {
        config.time_unit_ms = time_unit_ms;
    }
    config.validate().context("validate config")?;

    info!(
        time_unit_ms = config.time_unit_ms,
        change_destination_after = config.change_destination_after,
        long_running = config.long_running,
        opted_out = config.opted_out,
        "configuration loaded"
    );

    if args.dry_run {
        info!("dry-run requested; configuration validated");
        return Ok(());
    }

    let (store, _) = Store::new(&config);
    let handle = store.handle();
    let shutdown = handle.shutdown_token();
    setup_signal_handlers(shutdown.clone());

    let store_task = tokio::spawn(store.run());
    let view_task = tokio::spawn(ViewHost::new(handle.clone()).run());

    tokio::select! {
        _ = shutdown.cancelled() => info!("shutdown signal received"),
        _ = tokio::time::sleep(config.run_for()) => {
            info!("demo run finished");
            handle.shutdown();
        }
    }

    view_task
        .await
        .context("join view task")?
        .context("view host")?;
    store_task
        .await
        .context("join store task")?
        .context("shutdown store")?;
    info!("shutdown complete");

    Ok(())
}

fn init_tracing(log_level: &str, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_new(log_level).context("invalid log level")?;

    let Some(dir) = log_dir else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .try_init()
            .map_err(|err| anyhow!(err))
            .context("initialize tracing subscriber")?;
        return Ok(None);
    };

    let appender = tracing_appender::rolling::daily(dir, "cancelled-events.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(writer)
        .try_init()
        .map_err(|err| anyhow!(err))
        .context("initialize tracing subscriber")?;
    Ok(Some(guard))
}

fn load_config(path: Option<&Path>) -> Result<DemoConfig> {
    match path {
        Some(path) => DemoConfig::from_file(path).context("load config"),
        None => Ok(DemoConfig::default()),
    }
}

fn setup_signal_handlers(shutdown: CancellationToken) {
    let shutdown_clone = shutdown.clone();
    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to install SIGINT handler");
            return;
        }
        info!("received SIGINT");
        shutdown_clone.cancel();
    });

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let shutdown_clone = shutdown.clone();
        tokio::spawn(async move {
            match signal(SignalKind::terminate()) {
                Ok(mut stream) => {
                    stream.recv().await;
                    info!("received SIGTERM");
                    shutdown_clone.cancel();
                }
                Err(err) => {
                    warn!(error = %err, "failed to install SIGTERM handler");
                }
            }
        });
    }
}
