// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `finj-controller`: dials a set of engines and either drives them
//! through an injection session (`-w <workload.csv>`) or just listens
//! and logs what they report (pull mode, no `-w`).

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use finj_controller::{run_inject, run_pull, DriverConfig};
use finj_core::{Clock, Config, SystemClock};
use finj_storage::WorkloadReader;
use finj_transport::Client;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "finj-controller", about = "Fault-injection harness controller")]
struct Args {
    /// Path to a JSON or TOML configuration file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,
    /// Workload CSV to inject; omit to run in pull/listen mode.
    #[arg(short = 'w', long = "workload")]
    workload: Option<PathBuf>,
    /// Caps the number of tasks sent, regardless of workload length.
    #[arg(short = 'm', long = "max-tasks")]
    max_tasks: Option<u32>,
    /// Comma-separated `ip:port` list; overrides HOSTS from the config.
    #[arg(short = 'a', long = "addresses")]
    addresses: Option<String>,
    /// Suppresses the console echo of non-terminal status messages.
    #[arg(short = 'p', long = "probe")]
    probe: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging();
    let config = Config::load(args.config.as_deref());

    let hosts = match &args.addresses {
        Some(raw) => finj_core::peer::parse_peer_list(raw).context("invalid -a address list")?,
        None => config
            .hosts
            .iter()
            .map(|s| s.parse())
            .collect::<Result<Vec<_>, _>>()
            .context("invalid HOSTS entry in config")?,
    };
    if hosts.is_empty() {
        anyhow::bail!("no engine hosts configured (use -a or the HOSTS config key)");
    }

    let session_ts = (SystemClock.epoch_ms() / 1000) as u32;
    let (client, inbound) = Client::new(
        SystemClock,
        session_ts,
        config.retry_interval,
        config.retry_period,
        config.recover_after_disconnect,
    );
    client.connect_all(&hosts).await;

    let workload_name = args
        .workload
        .as_deref()
        .and_then(|p| p.file_stem())
        .and_then(|s| s.to_str())
        .unwrap_or("workload")
        .to_string();
    let driver_config = DriverConfig {
        results_dir: config.results_dir.clone(),
        session_wait: config.session_wait,
        pre_send_interval: i64::from(config.pre_send_interval),
        workload_padding: config.workload_padding,
        max_tasks: args.max_tasks,
        log_outputs: config.log_outputs,
        workload_name,
        quiet: args.probe,
    };

    let shutdown = CancellationToken::new();
    let shutdown_signals = shutdown.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate_signal() => {}
        }
        shutdown_signals.cancel();
    });

    let result = match &args.workload {
        Some(path) => {
            let reader = WorkloadReader::open(path).with_context(|| format!("could not open workload file {}", path.display()))?;
            run_inject(SystemClock, client.clone(), inbound, reader, driver_config, &shutdown).await
        }
        None => run_pull(SystemClock, client.clone(), inbound, driver_config, &shutdown).await,
    };

    client.shutdown();
    result.map_err(anyhow::Error::from)
}

fn init_logging() {
    use tracing_subscriber::EnvFilter;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}

#[cfg(unix)]
async fn terminate_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            term.recv().await;
        }
        Err(err) => {
            tracing::error!(error = %err, "failed to install SIGTERM handler");
            std::future::pending::<()>().await
        }
    }
}

#[cfg(not(unix))]
async fn terminate_signal() {
    std::future::pending::<()>().await
}
