// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker pool: a fixed number of concurrent slots execute scheduled
//! [`Task`]s against the virtual workload clock, broadcasting their
//! start/end/error status to every connected peer.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use finj_core::task::DURATION_UNBOUNDED;
use finj_core::{Clock, Task};
use finj_transport::Server;
use finj_wire::Message;
use parking_lot::Mutex;
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::sync::Mutex as AsyncMutex;
use tokio_util::sync::CancellationToken;

/// How far (in seconds of workload time) the local clock may drift from
/// the injector's clock before a correction is applied.
const CORRECTION_THRESHOLD: f64 = 60.0;
const CORRECTION_GAIN: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    pub max_requests: u32,
    pub skip_expired: bool,
    pub retry_tasks: bool,
    /// Supplemented knob: also retry a task that exited early with a
    /// non-zero code, not only one that exited early cleanly. See
    /// DESIGN.md.
    pub retry_tasks_on_error: bool,
    /// Interface-parity knob carried from `ENABLE_ROOT`; currently inert.
    /// See DESIGN.md §4.10.
    pub enable_root: bool,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self { max_requests: 20, skip_expired: true, retry_tasks: true, retry_tasks_on_error: false, enable_root: false }
    }
}

/// Tracks the virtual workload clock against real elapsed time, applying
/// an adaptive correction factor when the two drift apart.
struct SessionClock<C: Clock> {
    clock: C,
    start: Mutex<f64>,
    start_abs: Mutex<std::time::Instant>,
    correction: Mutex<f64>,
}

impl<C: Clock> SessionClock<C> {
    fn new(clock: C) -> Self {
        let now = clock.now();
        Self { clock, start: Mutex::new(0.0), start_abs: Mutex::new(now), correction: Mutex::new(0.0) }
    }

    /// `timestamp` is the workload's virtual start time, possibly
    /// negative (a `WORKLOAD_PADDING` that exceeds the first task's own
    /// timestamp shifts the session origin before zero).
    fn reset(&self, timestamp: i64) {
        *self.start.lock() = timestamp as f64;
        *self.start_abs.lock() = self.clock.now();
        *self.correction.lock() = 0.0;
    }

    fn real_elapsed_secs(&self) -> f64 {
        self.clock.now().saturating_duration_since(*self.start_abs.lock()).as_secs_f64()
    }

    /// The workload-relative time estimate without the drift correction,
    /// used as the comparison point for a remote correction request.
    fn uncorrected_workload_time(&self) -> f64 {
        *self.start.lock() + self.real_elapsed_secs()
    }

    /// The workload-relative time estimate to schedule task starts
    /// against.
    fn corrected_workload_time(&self) -> f64 {
        self.uncorrected_workload_time() + *self.correction.lock()
    }

    fn correct(&self, remote_timestamp: i64) {
        let diff = remote_timestamp as f64 - self.uncorrected_workload_time() - *self.correction.lock();
        if diff.abs() > CORRECTION_THRESHOLD {
            tracing::warn!(diff, "clock is drifting against the injector's clock");
            *self.correction.lock() += CORRECTION_GAIN * diff;
        }
    }
}

struct RunningState {
    task_tx: mpsc::UnboundedSender<Task>,
    cancel: CancellationToken,
    kill_abruptly: Arc<AtomicBool>,
    workers: Vec<tokio::task::JoinHandle<()>>,
}

/// The engine's worker pool: `config.max_requests` concurrent slots pull
/// tasks off a shared queue and execute them against the virtual workload
/// clock.
pub struct WorkerPool<C: Clock + 'static> {
    server: Arc<Server<C>>,
    config: WorkerPoolConfig,
    session: Arc<SessionClock<C>>,
    active_tasks: Arc<AtomicU32>,
    state: Mutex<Option<RunningState>>,
}

impl<C: Clock + 'static> WorkerPool<C> {
    pub fn new(clock: C, server: Arc<Server<C>>, config: WorkerPoolConfig) -> Arc<Self> {
        let session = Arc::new(SessionClock::new(clock));
        Arc::new(Self { server, config, session, active_tasks: Arc::new(AtomicU32::new(0)), state: Mutex::new(None) })
    }

    pub fn active_tasks(&self) -> u32 {
        self.active_tasks.load(Ordering::SeqCst)
    }

    /// Resets the session's virtual-clock origin. `timestamp` is the
    /// workload-relative start time (itself already padded by the
    /// controller, so it may be negative).
    pub fn reset_session(&self, timestamp: i64) {
        self.session.reset(timestamp);
    }

    pub fn correct_time(&self, remote_timestamp: i64) {
        self.session.correct(remote_timestamp);
    }

    /// Starts the pool's worker slots. A no-op if already running,
    /// matching `ThreadPool.start`'s `_initialized` guard.
    pub fn start(self: &Arc<Self>) {
        let mut state = self.state.lock();
        if state.is_some() {
            return;
        }
        let (task_tx, task_rx) = mpsc::unbounded_channel();
        let task_rx = Arc::new(AsyncMutex::new(task_rx));
        let cancel = CancellationToken::new();
        let kill_abruptly = Arc::new(AtomicBool::new(false));
        let mut workers = Vec::with_capacity(self.config.max_requests as usize);
        for _ in 0..self.config.max_requests {
            let this = Arc::clone(self);
            let task_rx = task_rx.clone();
            let cancel = cancel.clone();
            let kill_abruptly = kill_abruptly.clone();
            workers.push(tokio::spawn(async move { this.worker_loop(task_rx, cancel, kill_abruptly).await }));
        }
        *state = Some(RunningState { task_tx, cancel, kill_abruptly, workers });
        tracing::debug!("worker pool started");
    }

    /// Queues a task for execution. Silently dropped if the pool isn't
    /// running.
    pub fn submit(&self, task: Task) {
        if let Some(state) = self.state.lock().as_ref() {
            let _ = state.task_tx.send(task);
        }
    }

    /// Stops the pool, joining all worker slots. If `kill_abruptly` is
    /// true, any subprocess currently running is killed immediately
    /// rather than allowed to finish.
    pub async fn stop(self: &Arc<Self>, kill_abruptly: bool) {
        let state = self.state.lock().take();
        let Some(state) = state else {
            return;
        };
        state.kill_abruptly.store(kill_abruptly, Ordering::SeqCst);
        state.cancel.cancel();
        for worker in state.workers {
            let _ = worker.await;
        }
        tracing::debug!("worker pool stopped");
    }

    async fn worker_loop(
        self: Arc<Self>,
        task_rx: Arc<AsyncMutex<mpsc::UnboundedReceiver<Task>>>,
        cancel: CancellationToken,
        kill_abruptly: Arc<AtomicBool>,
    ) {
        loop {
            let task = {
                let mut rx = task_rx.lock().await;
                tokio::select! {
                    _ = cancel.cancelled() => None,
                    task = rx.recv() => task,
                }
            };
            let Some(task) = task else {
                break;
            };
            self.execute_task(task, &cancel, &kill_abruptly).await;
        }
    }

    async fn execute_task(&self, task: Task, cancel: &CancellationToken, kill_abruptly: &Arc<AtomicBool>) {
        let time_to_task = task.timestamp as f64 - self.session.corrected_workload_time();
        if time_to_task > 0.0 {
            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(Duration::from_secs_f64(time_to_task)) => {}
            }
        } else if time_to_task < 0.0 && self.config.skip_expired {
            tracing::warn!(args = %task.args, "starting time of task expired, skipping");
            self.report_error(&task, -1).await;
            return;
        }
        if cancel.is_cancelled() {
            return;
        }

        let argv = match task.argv() {
            Ok(argv) if !argv.is_empty() => with_numa_affinity(argv, &task.cores),
            _ => {
                tracing::error!(args = %task.args, "error while starting task, check if path is correct");
                self.report_error(&task, -1).await;
                return;
            }
        };

        let mut child = match spawn_task(&argv) {
            Ok(child) => child,
            Err(err) => {
                tracing::error!(args = %task.args, error = %err, "error while starting task, check if path is correct");
                self.report_error(&task, -1).await;
                return;
            }
        };

        tracing::info!(args = %task.args, "executing new task");
        self.active_tasks.fetch_add(1, Ordering::SeqCst);
        self.report_start(&task).await;

        let unbounded = task.duration == DURATION_UNBOUNDED;
        let mut remaining = task.duration as f64;
        let mut rcode = 0i32;

        loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    if kill_abruptly.load(Ordering::SeqCst) {
                        let _ = child.start_kill();
                    }
                    let _ = child.wait().await;
                    self.active_tasks.fetch_sub(1, Ordering::SeqCst);
                    return;
                }
                result = wait_with_optional_timeout(&mut child, unbounded, remaining) => result,
            };

            let (run_secs, status) = match outcome {
                WaitOutcome::Exited(run_secs, status) => (run_secs, status),
                WaitOutcome::TimedOut(_run_secs) => {
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    rcode = 0;
                    break;
                }
                WaitOutcome::Error => {
                    rcode = -1;
                    break;
                }
            };
            rcode = status;
            if unbounded {
                break;
            }
            remaining -= run_secs;
            let retry_ok = self.config.retry_tasks && remaining > 0.0 && (rcode == 0 || self.config.retry_tasks_on_error);
            if !retry_ok {
                break;
            }
            if rcode != 0 {
                tracing::warn!(args = %task.args, "sub-task terminated unexpectedly");
            }
            child = match spawn_task(&argv) {
                Ok(child) => child,
                Err(_) => break,
            };
        }

        self.active_tasks.fetch_sub(1, Ordering::SeqCst);
        self.report_outcome(&task, rcode).await;
        if rcode != 0 {
            tracing::error!(args = %task.args, "task terminated unexpectedly");
        } else {
            tracing::info!(args = %task.args, "task terminated normally");
        }
    }

    async fn report_start(&self, task: &Task) {
        self.server.broadcast(Message::status_start(task)).await;
    }

    async fn report_outcome(&self, task: &Task, rcode: i32) {
        if rcode != 0 {
            self.server.broadcast(Message::status_error(task, Some(rcode), None)).await;
        } else {
            self.server.broadcast(Message::status_end(task, None)).await;
        }
    }

    async fn report_error(&self, task: &Task, code: i32) {
        self.server.broadcast(Message::status_error(task, Some(code), None)).await;
    }
}

/// Prepends `numactl --physcpubind=<cores>` when the task restricts itself
/// to a core list other than "all", mirroring the original's core-pinning
/// behavior on top of the split argv.
fn with_numa_affinity(argv: Vec<String>, cores: &Option<String>) -> Vec<String> {
    match cores {
        Some(cores) if cores != "all" => {
            let mut pinned = vec!["numactl".to_string(), format!("--physcpubind={cores}")];
            pinned.extend(argv);
            pinned
        }
        _ => argv,
    }
}

fn spawn_task(argv: &[String]) -> std::io::Result<Child> {
    Command::new(&argv[0])
        .args(&argv[1..])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()
}

enum WaitOutcome {
    Exited(f64, i32),
    TimedOut(f64),
    Error,
}

async fn wait_with_optional_timeout(child: &mut Child, unbounded: bool, remaining_secs: f64) -> WaitOutcome {
    let start = tokio::time::Instant::now();
    if unbounded {
        return match child.wait().await {
            Ok(status) => WaitOutcome::Exited(start.elapsed().as_secs_f64(), status.code().unwrap_or(0)),
            Err(_) => WaitOutcome::Error,
        };
    }
    let timeout = Duration::from_secs_f64(remaining_secs.max(0.0));
    match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => WaitOutcome::Exited(start.elapsed().as_secs_f64(), status.code().unwrap_or(0)),
        Ok(Err(_)) => WaitOutcome::Error,
        Err(_) => WaitOutcome::TimedOut(start.elapsed().as_secs_f64()),
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
