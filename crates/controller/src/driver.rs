// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Injection driver: the controller-side loop that takes over a set of
//! engines as their session master, streams scheduled task starts, and
//! records every status event into per-host execution logs.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use finj_core::{Clock, Peer, Task};
use finj_storage::{paths, ExecutionLogWriter, WorkloadReader};
use finj_transport::{Client, InboundEvent};
use finj_wire::Message;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::ControllerError;

/// How often the controller re-broadcasts its virtual clock so engines
/// can correct for drift, per the session's CORRECT-TIME cadence.
const CORRECTION_BROADCAST_PERIOD: Duration = Duration::from_secs(30);
/// Main-loop idle sleep between pre-send scans.
const LOOP_SLEEP: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub results_dir: String,
    pub session_wait: u32,
    /// Seconds ahead of the virtual clock a task is pre-sent; negative
    /// means "send the whole remaining workload immediately".
    pub pre_send_interval: i64,
    pub workload_padding: u32,
    pub max_tasks: Option<u32>,
    pub log_outputs: bool,
    /// Stem used to name per-peer execution-log files (the workload
    /// filename without its extension). Ignored in pull mode.
    pub workload_name: String,
    /// Suppresses the console echo of non-terminal status messages
    /// (`-p`/"probe" on the controller binary).
    pub quiet: bool,
}

fn epoch_secs<C: Clock>(clock: &C) -> i64 {
    (clock.epoch_ms() / 1000) as i64
}

/// Drives an injection session: reads `reader`'s tasks in timestamp
/// order and streams them to whichever peers accept the session.
pub async fn run_inject<C: Clock + 'static>(
    clock: C,
    client: std::sync::Arc<Client<C>>,
    mut inbound: mpsc::UnboundedReceiver<InboundEvent>,
    mut reader: WorkloadReader,
    config: DriverConfig,
    shutdown: &CancellationToken,
) -> Result<(), ControllerError> {
    let mut next_task = reader.read_entry()?;
    let Some(first_task) = next_task.clone() else {
        return Err(ControllerError::EmptyWorkload);
    };

    let candidates = client.registry().peers();
    let session_wall_ts = epoch_secs(&clock);
    client.broadcast(Message::CommandSessionStart { timestamp: session_wall_ts }).await;
    let mut active = collect_acks(&mut inbound, &candidates, config.session_wait).await;
    if active.is_empty() {
        tracing::warn!("no engine accepted the injection session");
    }

    let mut pending: HashMap<Peer, HashSet<u32>> = HashMap::new();
    let mut logs: HashMap<Peer, ExecutionLogWriter> = HashMap::new();
    std::fs::create_dir_all(&config.results_dir)?;
    for peer in &active {
        pending.insert(peer.clone(), HashSet::new());
        let path = paths::execution_log_filename(&config.results_dir, peer, Some(&config.workload_name));
        let mut writer = ExecutionLogWriter::create(Path::new(&path))?;
        let _ = writer.write_message(&Message::CommandSessionStart { timestamp: session_wall_ts });
        logs.insert(peer.clone(), writer);
    }

    let session_start_ts = first_task.timestamp as i64 - config.workload_padding as i64;
    for peer in &active {
        let _ = client.send(peer, Message::CommandSetTime { timestamp: session_start_ts }).await;
    }

    let anchor_wall = clock.now();
    let mut last_correction = anchor_wall;
    let mut tasks_sent: u32 = 0;

    loop {
        while let Ok(event) = inbound.try_recv() {
            handle_event(event, &client, &mut active, &mut pending, &mut logs, &config, session_wall_ts, session_start_ts).await;
        }

        let virt_now = session_start_ts as f64 + clock.now().saturating_duration_since(anchor_wall).as_secs_f64();

        if clock.now().saturating_duration_since(last_correction) >= CORRECTION_BROADCAST_PERIOD {
            for peer in &active {
                let _ = client.send(peer, Message::CommandCorrectTime { timestamp: virt_now as i64 }).await;
            }
            last_correction = clock.now();
        }

        pre_send(&client, &active, &mut pending, &mut reader, &mut next_task, virt_now, &config, &mut tasks_sent).await?;

        let pending_empty = pending.values().all(HashSet::is_empty);
        if next_task.is_none() && pending_empty {
            break;
        }
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = tokio::time::sleep(LOOP_SLEEP) => {}
        }
    }

    let end_ts = epoch_secs(&clock);
    for peer in &active {
        let _ = client.send(peer, Message::CommandSessionEnd { timestamp: end_ts }).await;
        log_message(&mut logs, peer, &Message::CommandSessionEnd { timestamp: end_ts });
    }
    let closing: Vec<Peer> = active.iter().cloned().collect();
    collect_acks(&mut inbound, &closing, config.session_wait).await;
    Ok(())
}

/// Pull/listen mode (`reader == None`): greets every configured peer and
/// appends every inbound message to a per-peer log until shut down.
pub async fn run_pull<C: Clock + 'static>(
    clock: C,
    client: std::sync::Arc<Client<C>>,
    mut inbound: mpsc::UnboundedReceiver<InboundEvent>,
    config: DriverConfig,
    shutdown: &CancellationToken,
) -> Result<(), ControllerError> {
    let greet_ts = epoch_secs(&clock);
    client.broadcast(Message::CommandGreet { timestamp: greet_ts }).await;
    std::fs::create_dir_all(&config.results_dir)?;

    let mut logs: HashMap<Peer, ExecutionLogWriter> = HashMap::new();
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            event = inbound.recv() => {
                let Some(event) = event else { break };
                if let InboundEvent::Message { peer, message, .. } = event {
                    if !config.quiet {
                        tracing::info!(%peer, message_type = message.type_name(), "status received");
                    }
                    let writer = match logs.entry(peer.clone()) {
                        Entry::Occupied(o) => o.into_mut(),
                        Entry::Vacant(v) => {
                            let path = paths::execution_log_filename(&config.results_dir, &peer, None);
                            v.insert(ExecutionLogWriter::create(Path::new(&path))?)
                        }
                    };
                    let _ = writer.write_message(&message);
                }
            }
        }
    }
    Ok(())
}

/// Waits up to `session_wait` seconds for every peer in `candidates` to
/// answer the pending session request, returning the ones that sent
/// `ack_yes`. A peer that answers `ack_no`, or never answers, is dropped.
async fn collect_acks(inbound: &mut mpsc::UnboundedReceiver<InboundEvent>, candidates: &[Peer], session_wait: u32) -> HashSet<Peer> {
    let mut accepted = HashSet::new();
    let mut remaining: HashSet<Peer> = candidates.iter().cloned().collect();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(session_wait as u64);
    while !remaining.is_empty() {
        let now = tokio::time::Instant::now();
        if now >= deadline {
            break;
        }
        match tokio::time::timeout(deadline - now, inbound.recv()).await {
            Ok(Some(InboundEvent::Message { peer, message, .. })) => match message {
                Message::AckYes { .. } => {
                    if remaining.remove(&peer) {
                        accepted.insert(peer);
                    }
                }
                Message::AckNo { .. } => {
                    remaining.remove(&peer);
                }
                _ => {}
            },
            Ok(Some(_)) => {}
            Ok(None) | Err(_) => break,
        }
    }
    accepted
}

#[allow(clippy::too_many_arguments)]
async fn handle_event<C: Clock + 'static>(
    event: InboundEvent,
    client: &std::sync::Arc<Client<C>>,
    active: &mut HashSet<Peer>,
    pending: &mut HashMap<Peer, HashSet<u32>>,
    logs: &mut HashMap<Peer, ExecutionLogWriter>,
    config: &DriverConfig,
    session_wall_ts: i64,
    session_start_ts: i64,
) {
    match event {
        InboundEvent::ConnectionLost { peer } => {
            if active.contains(&peer) {
                if let Some(w) = logs.get_mut(&peer) {
                    let _ = w.write_message(&Message::DetectedLost { timestamp: session_wall_ts });
                }
            }
        }
        InboundEvent::ConnectionRestored { peer } => {
            if active.contains(&peer) {
                let _ = client.send(&peer, Message::CommandSessionStart { timestamp: session_wall_ts }).await;
                let _ = client.send(&peer, Message::CommandSetTime { timestamp: session_start_ts }).await;
                if let Some(w) = logs.get_mut(&peer) {
                    let _ = w.write_message(&Message::DetectedRestored { timestamp: session_wall_ts });
                }
            }
        }
        InboundEvent::ConnectionFinalized { peer } => {
            if active.remove(&peer) {
                pending.remove(&peer);
                tracing::warn!(%peer, "engine connection finalized, dropping from session");
            }
        }
        InboundEvent::Message { peer, message, .. } => {
            if !active.contains(&peer) {
                return;
            }
            match &message {
                Message::StatusEnd { task, output } => {
                    if let Some(set) = pending.get_mut(&peer) {
                        set.remove(&task.seq_num);
                    }
                    if config.log_outputs {
                        if let Some(out) = output {
                            write_task_output(&config.results_dir, &peer, &config.workload_name, &task.args, task.seq_num, out);
                        }
                    }
                    log_message(logs, &peer, &message);
                }
                Message::StatusErr { task, output, .. } => {
                    if let Some(set) = pending.get_mut(&peer) {
                        set.remove(&task.seq_num);
                    }
                    if config.log_outputs {
                        if let Some(out) = output {
                            write_task_output(&config.results_dir, &peer, &config.workload_name, &task.args, task.seq_num, out);
                        }
                    }
                    log_message(logs, &peer, &message);
                }
                Message::AckYes { error, .. } => {
                    log_message(logs, &peer, &message);
                    if error.is_some() {
                        if let Some(set) = pending.get_mut(&peer) {
                            set.clear();
                        }
                        log_message(logs, &peer, &Message::StatusReset { timestamp: session_wall_ts });
                    }
                }
                Message::AckNo { .. } => {
                    tracing::warn!(%peer, "engine rejected session resume, dropping peer");
                    active.remove(&peer);
                    pending.remove(&peer);
                }
                other => {
                    if !config.quiet {
                        tracing::info!(%peer, message_type = other.type_name(), "status received");
                    }
                    log_message(logs, &peer, &message);
                }
            }
        }
    }
}

fn log_message(logs: &mut HashMap<Peer, ExecutionLogWriter>, peer: &Peer, message: &Message) {
    if let Some(w) = logs.get_mut(peer) {
        let _ = w.write_message(message);
    }
}

fn write_task_output(results_dir: &str, peer: &Peer, workload_name: &str, args: &str, seq_num: u32, output: &str) {
    let dir = paths::output_directory(results_dir, peer, Some(workload_name));
    if std::fs::create_dir_all(&dir).is_err() {
        return;
    }
    let path = format!("{dir}/{}", paths::task_output_filename(args, seq_num));
    if let Err(err) = std::fs::write(&path, output) {
        tracing::warn!(path, error = %err, "could not write task output file");
    }
}

/// Broadcasts every task whose scheduled time falls within the pre-send
/// window, advancing `next_task` until the workload is exhausted or
/// `max_tasks` is reached.
async fn pre_send<C: Clock + 'static>(
    client: &std::sync::Arc<Client<C>>,
    active: &HashSet<Peer>,
    pending: &mut HashMap<Peer, HashSet<u32>>,
    reader: &mut WorkloadReader,
    next_task: &mut Option<Task>,
    virt_now: f64,
    config: &DriverConfig,
    tasks_sent: &mut u32,
) -> Result<(), ControllerError> {
    loop {
        let Some(task) = next_task.clone() else { break };
        if let Some(max) = config.max_tasks {
            if *tasks_sent >= max {
                *next_task = None;
                break;
            }
        }
        let within_window = config.pre_send_interval < 0 || (task.timestamp as f64) < virt_now + config.pre_send_interval as f64;
        if !within_window {
            break;
        }
        for peer in active {
            let _ = client.send(peer, Message::command_start(&task)).await;
            pending.entry(peer.clone()).or_default().insert(task.seq_num);
        }
        *tasks_sent += 1;
        *next_task = reader.read_entry()?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
