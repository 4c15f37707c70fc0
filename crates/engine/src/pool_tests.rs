// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use finj_core::{FakeClock, SystemClock};
use finj_wire::Frame;
use serial_test::serial;
use tokio::net::TcpStream;
use tokio::time::{timeout, Duration as TokioDuration};

#[test]
fn numa_affinity_is_prepended_when_cores_are_restricted() {
    let argv = vec!["stress-ng".to_string(), "--cpu".to_string(), "2".to_string()];
    let pinned = with_numa_affinity(argv, &Some("0,1".to_string()));
    assert_eq!(pinned, vec!["numactl", "--physcpubind=0,1", "stress-ng", "--cpu", "2"]);
}

#[test]
fn numa_affinity_is_skipped_for_all_cores_or_none() {
    let argv = vec!["true".to_string()];
    assert_eq!(with_numa_affinity(argv.clone(), &Some("all".to_string())), argv);
    assert_eq!(with_numa_affinity(argv.clone(), &None), argv);
}

#[test]
fn session_clock_schedules_relative_to_reset_point() {
    let clock = FakeClock::new();
    let session = SessionClock::new(clock.clone());
    session.reset(1000);
    clock.advance(Duration::from_secs(5));
    // 5 real seconds elapsed since reset(1000), so workload time is now ~1005
    assert!((session.corrected_workload_time() - 1005.0).abs() < 0.01);
}

#[test]
fn correction_factor_only_applies_past_the_threshold() {
    let clock = FakeClock::new();
    let session = SessionClock::new(clock);
    session.reset(0);
    session.correct(10); // within threshold, no correction
    assert_eq!(*session.correction.lock(), 0.0);
    session.correct(1000); // far beyond threshold
    assert!(*session.correction.lock() > 0.0);
}

async fn connect_raw(port: u16) -> TcpStream {
    TcpStream::connect(("127.0.0.1", port)).await.unwrap()
}

fn task(args: &str, timestamp: u32, duration: u32) -> Task {
    Task { args: args.to_string(), timestamp, duration, seq_num: 1, is_fault: false, cores: None }
}

#[tokio::test]
#[serial]
async fn expired_task_is_skipped_and_reported_as_error() {
    let (server, _inbound) = Server::bind(SystemClock, 1000, 0, false).await.unwrap();
    let port = server.port();
    let mut sock = connect_raw(port).await;
    tokio::time::sleep(TokioDuration::from_millis(50)).await;

    let pool = WorkerPool::new(SystemClock, server, WorkerPoolConfig { skip_expired: true, ..Default::default() });
    pool.reset_session(10_000);
    pool.start();
    pool.submit(task("true", 0, 0));

    let frame = timeout(TokioDuration::from_secs(2), finj_wire::read_frame(&mut sock)).await.unwrap().unwrap().unwrap();
    match frame {
        Frame::Message { message: Message::StatusErr { error, .. }, .. } => assert_eq!(error, Some(-1)),
        other => panic!("unexpected frame: {other:?}"),
    }
    pool.stop(true).await;
}

#[tokio::test]
#[serial]
async fn successful_task_reports_status_start_then_end() {
    let (server, _inbound) = Server::bind(SystemClock, 1000, 0, false).await.unwrap();
    let port = server.port();
    let mut sock = connect_raw(port).await;
    tokio::time::sleep(TokioDuration::from_millis(50)).await;

    let pool = WorkerPool::new(SystemClock, server, WorkerPoolConfig { skip_expired: false, ..Default::default() });
    pool.reset_session(0);
    pool.start();
    pool.submit(task("true", 0, 0));

    let start_frame = timeout(TokioDuration::from_secs(2), finj_wire::read_frame(&mut sock)).await.unwrap().unwrap().unwrap();
    assert!(matches!(start_frame, Frame::Message { message: Message::StatusStart(_), .. }));

    let end_frame = timeout(TokioDuration::from_secs(2), finj_wire::read_frame(&mut sock)).await.unwrap().unwrap().unwrap();
    assert!(matches!(end_frame, Frame::Message { message: Message::StatusEnd { .. }, .. }));
    pool.stop(true).await;
}

#[tokio::test]
#[serial]
async fn failing_task_reports_status_err_with_its_exit_code() {
    let (server, _inbound) = Server::bind(SystemClock, 1000, 0, false).await.unwrap();
    let port = server.port();
    let mut sock = connect_raw(port).await;
    tokio::time::sleep(TokioDuration::from_millis(50)).await;

    let pool = WorkerPool::new(SystemClock, server, WorkerPoolConfig { skip_expired: false, ..Default::default() });
    pool.reset_session(0);
    pool.start();
    pool.submit(task("false", 0, 0));

    // drain the start frame
    finj_wire::read_frame(&mut sock).await.unwrap();
    let end_frame = timeout(TokioDuration::from_secs(2), finj_wire::read_frame(&mut sock)).await.unwrap().unwrap().unwrap();
    match end_frame {
        Frame::Message { message: Message::StatusErr { error, .. }, .. } => assert_eq!(error, Some(1)),
        other => panic!("unexpected frame: {other:?}"),
    }
    pool.stop(true).await;
}

#[tokio::test]
#[serial]
async fn short_lived_task_is_retried_until_its_duration_elapses() {
    let (server, _inbound) = Server::bind(SystemClock, 1000, 0, false).await.unwrap();
    let port = server.port();
    let mut sock = connect_raw(port).await;
    tokio::time::sleep(TokioDuration::from_millis(50)).await;

    let pool = WorkerPool::new(
        SystemClock,
        server,
        WorkerPoolConfig { skip_expired: false, retry_tasks: true, ..Default::default() },
    );
    pool.reset_session(0);
    pool.start();
    // "true" exits immediately; with a 1-second duration and retry_tasks on, the
    // pool keeps respawning it until the second elapses.
    pool.submit(task("true", 0, 1));

    finj_wire::read_frame(&mut sock).await.unwrap(); // status_start
    let end_frame = timeout(TokioDuration::from_secs(3), finj_wire::read_frame(&mut sock)).await.unwrap().unwrap().unwrap();
    assert!(matches!(end_frame, Frame::Message { message: Message::StatusEnd { .. }, .. }));
    pool.stop(true).await;
}

#[tokio::test]
#[serial]
async fn active_tasks_reflects_currently_running_work() {
    let (server, _inbound) = Server::bind(SystemClock, 1000, 0, false).await.unwrap();
    let pool = WorkerPool::new(SystemClock, server, WorkerPoolConfig { skip_expired: false, ..Default::default() });
    pool.reset_session(0);
    pool.start();
    assert_eq!(pool.active_tasks(), 0);

    pool.submit(task("sleep 0.3", 0, 0));
    tokio::time::sleep(TokioDuration::from_millis(100)).await;
    assert_eq!(pool.active_tasks(), 1);

    tokio::time::sleep(TokioDuration::from_millis(400)).await;
    assert_eq!(pool.active_tasks(), 0);
    pool.stop(true).await;
}
