// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `finj-engine`: listens for a controller to take the session master
//! role, then executes the tasks it schedules.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use finj_core::{Clock, Config, Peer, SystemClock};
use finj_engine::{AuxProcessManager, SessionManager, WorkerPool, WorkerPoolConfig};
use finj_transport::{InboundEvent, Server};
use finj_wire::Message;

#[derive(Parser, Debug)]
#[command(name = "finj-engine", about = "Fault-injection harness engine")]
struct Args {
    /// Path to a JSON or TOML configuration file.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,
    /// Listening port; overrides SERVER_PORT from the config file.
    #[arg(short = 'p', long = "port")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let args = Args::parse();
    let config = Config::load(args.config.as_deref());
    let port = args.port.unwrap_or(config.server_port);

    let clock = SystemClock;
    let session_ts = (clock.epoch_ms() / 1000) as u32;
    let (server, inbound) = Server::bind(clock.clone(), session_ts, port, config.recover_after_disconnect)
        .await
        .with_context(|| format!("could not bind listening port {port}"))?;
    tracing::info!(port = server.port(), "engine listening");

    let pool_config = WorkerPoolConfig {
        max_requests: config.max_requests,
        skip_expired: config.skip_expired,
        retry_tasks: config.retry_tasks,
        retry_tasks_on_error: config.retry_tasks_on_error,
        enable_root: config.enable_root,
    };
    let pool = WorkerPool::new(clock, Arc::clone(&server), pool_config);
    pool.start();

    let mut aux = AuxProcessManager::start(&config.aux_commands);
    let session_mgr = SessionManager::new();

    run(&server, inbound, &pool, &session_mgr, config.recover_after_disconnect).await;

    tracing::info!("exit requested, cleaning up");
    pool.stop(config.abrupt_task_kill).await;
    server.shutdown();
    aux.stop().await;
    tracing::info!("injection engine stopped");
    Ok(())
}

async fn run(
    server: &Arc<Server<SystemClock>>,
    mut inbound: tokio::sync::mpsc::UnboundedReceiver<InboundEvent>,
    pool: &Arc<WorkerPool<SystemClock>>,
    session_mgr: &SessionManager,
    replay_enabled: bool,
) {
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = terminate_signal() => break,
            event = inbound.recv() => {
                match event {
                    Some(InboundEvent::Message { peer, message, .. }) => {
                        if handle_message(server, pool, session_mgr, peer, message, replay_enabled).await {
                            break;
                        }
                    }
                    Some(InboundEvent::ConnectionLost { peer }) => {
                        tracing::info!(%peer, "peer connection lost");
                    }
                    Some(InboundEvent::ConnectionRestored { peer }) | Some(InboundEvent::ConnectionFinalized { peer }) => {
                        tracing::debug!(%peer, "client-only transport event received by engine");
                    }
                    None => break,
                }
            }
        }
    }
}

/// Dispatches one decoded message per `InjectorEngine.listen`'s match
/// statement. Returns true when the session master has requested
/// termination of this engine process.
async fn handle_message(
    server: &Arc<Server<SystemClock>>,
    pool: &Arc<WorkerPool<SystemClock>>,
    session_mgr: &SessionManager,
    from: Peer,
    message: Message,
    replay_enabled: bool,
) -> bool {
    match message {
        Message::CommandSessionStart { timestamp } => {
            let hosts = server.registered_peers();
            let update = session_mgr.start_session(&from, timestamp, &hosts, replay_enabled);
            if update.pool_restart {
                pool.stop(true).await;
                pool.start();
            }
            tracing::info!(%from, accepted = update.ack_positive, "injection session start request");
            send_ack(server, &from, update.ack_positive, update.ack_error).await;
        }
        Message::CommandSessionEnd { .. } => {
            let update = session_mgr.end_session(&from);
            tracing::info!(%from, accepted = update.ack_positive, "injection session end request");
            send_ack(server, &from, update.ack_positive, update.ack_error).await;
        }
        Message::CommandSetTime { timestamp } if session_mgr.is_master(&from) => {
            pool.reset_session(timestamp);
        }
        Message::CommandCorrectTime { timestamp } if session_mgr.is_master(&from) => {
            pool.correct_time(timestamp);
        }
        Message::CommandTerminate => {
            if session_mgr.is_master(&from) {
                tracing::info!(%from, "termination command received from master");
                return true;
            }
            tracing::warn!(%from, "termination command received from non-master host, ignoring");
        }
        Message::CommandStart(fields) if session_mgr.is_master(&from) => {
            pool.submit(fields.into());
        }
        Message::CommandGreet { .. } => {
            let reply = Message::status_greet(epoch_secs(), pool.active_tasks(), session_mgr.session_active());
            if let Err(err) = server.send(&from, reply).await {
                tracing::warn!(%from, error = %err, "failed to send greet reply");
            }
        }
        other => {
            tracing::warn!(%from, message_type = other.type_name(), "invalid command sent from non-master host");
        }
    }
    false
}

async fn send_ack(server: &Arc<Server<SystemClock>>, to: &Peer, positive: bool, error: Option<i32>) {
    let ack = Message::ack(epoch_secs(), positive, error);
    if let Err(err) = server.send(to, ack).await {
        tracing::warn!(%to, error = %err, "failed to send ack");
    }
}

fn epoch_secs() -> i64 {
    (SystemClock.epoch_ms() / 1000) as i64
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
