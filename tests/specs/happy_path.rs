// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scenario 1 from the design notes: a controller driving one engine
//! through two short tasks should produce a log with the session
//! bracket around two start/end pairs, in order.

use serial_test::serial;

use crate::support::{self, Engine};

#[test]
#[serial]
fn two_tasks_complete_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let port = support::unused_port();
    let engine = Engine::spawn(port);

    let workload_path = dir.path().join("wl.csv");
    support::write_workload(
        &workload_path,
        &[
            finj_core::Task { args: "true".into(), timestamp: 2, duration: 0, seq_num: 0, is_fault: false, cores: None },
            finj_core::Task { args: "true".into(), timestamp: 3, duration: 0, seq_num: 1, is_fault: false, cores: None },
        ],
    );

    let results_dir = dir.path().join("results");
    let config_path = dir.path().join("controller.json");
    support::write_config(
        &config_path,
        &serde_json::json!({
            "RESULTS_DIR": results_dir.to_str().unwrap(),
            "WORKLOAD_PADDING": 0,
            "SESSION_WAIT": 10,
        }),
    );

    let status = support::run_controller(&[
        "-c",
        config_path.to_str().unwrap(),
        "-w",
        workload_path.to_str().unwrap(),
        "-a",
        &format!("127.0.0.1:{port}"),
    ]);
    assert!(status.success());
    drop(engine);

    let contents = support::read_log(&results_dir, "127.0.0.1", port, Some("wl"));
    let order: Vec<&str> = contents
        .lines()
        .skip(1)
        .filter_map(|line| line.split(';').nth(1))
        .collect();

    assert_eq!(order.first(), Some(&"command_session_s"));
    assert_eq!(order.last(), Some(&"command_session_e"));
    assert_eq!(order.iter().filter(|t| **t == "status_start").count(), 2);
    assert_eq!(order.iter().filter(|t| **t == "status_end").count(), 2);

    let first_start = order.iter().position(|t| *t == "status_start").unwrap();
    let first_end = order.iter().position(|t| *t == "status_end").unwrap();
    assert!(first_start < first_end, "a status_start must precede the status_end pairing with it");
}
