// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pull mode: no `-w` means the controller just greets every configured
//! engine and logs whatever comes back, without ever opening a session.

use std::time::Duration;

use assert_cmd::cargo::CommandCargoExt;
use serial_test::serial;

use crate::support::{self, Engine};

#[test]
#[serial]
fn greets_and_logs_without_opening_a_session() {
    let dir = tempfile::tempdir().unwrap();
    let port = support::unused_port();
    let engine = Engine::spawn(port);

    let results_dir = dir.path().join("results");
    let config_path = dir.path().join("controller.json");
    support::write_config(&config_path, &serde_json::json!({ "RESULTS_DIR": results_dir.to_str().unwrap() }));

    let mut cmd = std::process::Command::cargo_bin("finj-controller").expect("finj-controller binary");
    cmd.args(["-c", config_path.to_str().unwrap(), "-a", &format!("127.0.0.1:{port}")]);
    cmd.stdout(std::process::Stdio::null()).stderr(std::process::Stdio::null());
    let mut child = cmd.spawn().expect("spawn finj-controller");

    // Give the engine time to answer the greet, then kill the pull-mode
    // controller since it has no natural termination point.
    std::thread::sleep(Duration::from_millis(500));
    let _ = child.kill();
    let _ = child.wait();
    drop(engine);

    let contents = support::read_log(&results_dir, "127.0.0.1", port, None);
    assert!(contents.contains("status_greet"));
}
