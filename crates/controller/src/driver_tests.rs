// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use finj_core::{Peer, SystemClock, Task};
use finj_storage::workload::WorkloadWriter;
use finj_wire::{read_frame, write_frame, Frame, Message};
use serial_test::serial;
use tokio::net::TcpListener;
use tokio::time::{timeout, Duration};
use tokio_util::sync::CancellationToken;

use super::*;

async fn spawn_fake_engine() -> (TcpListener, Peer) {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let port = listener.local_addr().unwrap().port();
    (listener, Peer::new("127.0.0.1", port))
}

fn test_config(results_dir: &str, workload_name: &str) -> DriverConfig {
    DriverConfig {
        results_dir: results_dir.to_string(),
        session_wait: 3,
        pre_send_interval: -1,
        workload_padding: 0,
        max_tasks: None,
        log_outputs: false,
        workload_name: workload_name.to_string(),
        quiet: true,
    }
}

fn write_workload(path: &std::path::Path, tasks: &[Task]) {
    let mut writer = WorkloadWriter::create(path).unwrap();
    for task in tasks {
        writer.write_entry(task).unwrap();
    }
}

#[tokio::test]
#[serial]
async fn full_session_records_status_events_to_the_execution_log() {
    let (listener, peer) = spawn_fake_engine().await;
    let dir = tempfile::tempdir().unwrap();
    let workload_path = dir.path().join("wl.csv");
    write_workload(
        &workload_path,
        &[Task { args: "true".into(), timestamp: 0, duration: 0, seq_num: 1, is_fault: false, cores: None }],
    );

    let (client, inbound) = Client::new(SystemClock, 1000, 600, 30, false);
    client.connect(peer.clone()).await;
    let (mut sock, _) = listener.accept().await.unwrap();

    let reader = WorkloadReader::open(&workload_path).unwrap();
    let config = test_config(dir.path().join("results").to_str().unwrap(), "wl");
    let shutdown = CancellationToken::new();

    let driver = tokio::spawn(async move { run_inject(SystemClock, client, inbound, reader, config, &shutdown).await });

    // session-start handshake
    let frame = read_frame(&mut sock).await.unwrap().unwrap();
    assert!(matches!(frame, Frame::Message { message: Message::CommandSessionStart { .. }, .. }));
    write_frame(&mut sock, &Frame::message(1000, 0, Message::AckYes { timestamp: 1, error: None })).await.unwrap();

    // set-time anchor
    let frame = read_frame(&mut sock).await.unwrap().unwrap();
    assert!(matches!(frame, Frame::Message { message: Message::CommandSetTime { .. }, .. }));

    // command_start for the one task
    let frame = read_frame(&mut sock).await.unwrap().unwrap();
    let Frame::Message { message: Message::CommandStart(fields), .. } = frame else {
        panic!("expected command_start");
    };
    assert_eq!(fields.seq_num, 1);

    write_frame(
        &mut sock,
        &Frame::message(1000, 1, Message::status_end(&Task { args: "true".into(), timestamp: 0, duration: 0, seq_num: 1, is_fault: false, cores: None }, None)),
    )
    .await
    .unwrap();

    let frame = read_frame(&mut sock).await.unwrap().unwrap();
    assert!(matches!(frame, Frame::Message { message: Message::CommandSessionEnd { .. }, .. }));
    write_frame(&mut sock, &Frame::message(1000, 2, Message::AckYes { timestamp: 2, error: None })).await.unwrap();

    timeout(Duration::from_secs(5), driver).await.unwrap().unwrap().unwrap();

    let log_path = finj_storage::paths::execution_log_filename(dir.path().join("results").to_str().unwrap(), &peer, Some("wl"));
    let contents = std::fs::read_to_string(log_path).unwrap();
    assert!(contents.contains("command_session_s"));
    assert!(contents.contains("status_end"));
    assert!(contents.contains("command_session_e"));
}

#[tokio::test]
#[serial]
async fn peer_that_rejects_the_session_is_excluded() {
    let (listener, peer) = spawn_fake_engine().await;
    let dir = tempfile::tempdir().unwrap();
    let workload_path = dir.path().join("wl.csv");
    write_workload(&workload_path, &[Task { args: "true".into(), timestamp: 0, duration: 0, seq_num: 1, is_fault: false, cores: None }]);

    let (client, inbound) = Client::new(SystemClock, 1000, 600, 30, false);
    client.connect(peer.clone()).await;
    let (mut sock, _) = listener.accept().await.unwrap();

    let reader = WorkloadReader::open(&workload_path).unwrap();
    let mut config = test_config(dir.path().join("results").to_str().unwrap(), "wl");
    config.session_wait = 1;
    let shutdown = CancellationToken::new();

    let driver = tokio::spawn(async move { run_inject(SystemClock, client, inbound, reader, config, &shutdown).await });

    let frame = read_frame(&mut sock).await.unwrap().unwrap();
    assert!(matches!(frame, Frame::Message { message: Message::CommandSessionStart { .. }, .. }));
    write_frame(&mut sock, &Frame::message(1000, 0, Message::AckNo { timestamp: 1, error: None })).await.unwrap();

    timeout(Duration::from_secs(5), driver).await.unwrap().unwrap().unwrap();

    let log_path = finj_storage::paths::execution_log_filename(dir.path().join("results").to_str().unwrap(), &peer, Some("wl"));
    assert!(!std::path::Path::new(&log_path).exists());
}

#[tokio::test]
#[serial]
async fn empty_workload_is_rejected_before_opening_a_session() {
    let dir = tempfile::tempdir().unwrap();
    let workload_path = dir.path().join("wl.csv");
    write_workload(&workload_path, &[]);

    let (client, inbound) = Client::new(SystemClock, 1000, 600, 30, false);
    let reader = WorkloadReader::open(&workload_path).unwrap();
    let config = test_config(dir.path().join("results").to_str().unwrap(), "wl");
    let shutdown = CancellationToken::new();

    let err = run_inject(SystemClock, client, inbound, reader, config, &shutdown).await.unwrap_err();
    assert!(matches!(err, ControllerError::EmptyWorkload));
}

#[tokio::test]
#[serial]
async fn pull_mode_logs_every_inbound_message_without_a_session() {
    let (listener, peer) = spawn_fake_engine().await;
    let dir = tempfile::tempdir().unwrap();

    let (client, inbound) = Client::new(SystemClock, 1000, 600, 30, false);
    client.connect(peer.clone()).await;
    let (mut sock, _) = listener.accept().await.unwrap();

    let config = test_config(dir.path().join("results").to_str().unwrap(), "");
    let shutdown = CancellationToken::new();
    let shutdown_clone = shutdown.clone();
    let results_dir = config.results_dir.clone();

    let driver = tokio::spawn(async move { run_pull(SystemClock, client, inbound, config, &shutdown_clone).await });

    let frame = read_frame(&mut sock).await.unwrap().unwrap();
    assert!(matches!(frame, Frame::Message { message: Message::CommandGreet { .. }, .. }));
    write_frame(&mut sock, &Frame::message(1000, 0, Message::status_greet(5, 0, false))).await.unwrap();

    tokio::time::sleep(Duration::from_millis(200)).await;
    shutdown.cancel();
    timeout(Duration::from_secs(5), driver).await.unwrap().unwrap().unwrap();

    let log_path = finj_storage::paths::execution_log_filename(&results_dir, &peer, None);
    let contents = std::fs::read_to_string(log_path).unwrap();
    assert!(contents.contains("status_greet"));
}
