// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness for spawning the real binaries against a scratch
//! results directory.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

use assert_cmd::cargo::CommandCargoExt;
use finj_core::Task;
use finj_storage::workload::WorkloadWriter;

/// A spawned `finj-engine`, killed on drop so a panicking assertion
/// never leaves an orphan listening on the test's port.
pub struct Engine {
    child: Child,
}

impl Engine {
    pub fn spawn(port: u16) -> Self {
        let mut cmd = Command::cargo_bin("finj-engine").expect("finj-engine binary");
        cmd.args(["-p", &port.to_string()]);
        cmd.stdout(Stdio::null()).stderr(Stdio::null());
        let child = cmd.spawn().expect("failed to spawn finj-engine");
        wait_for_port(port);
        Self { child }
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn wait_for_port(port: u16) {
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while std::time::Instant::now() < deadline {
        if std::net::TcpStream::connect(("127.0.0.1", port)).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    panic!("finj-engine never opened port {port}");
}

/// Runs `finj-controller` to completion with a generous timeout. The
/// driver's own session-close handshake is what ends the process; a
/// timeout here means the scenario didn't converge and is a test bug,
/// not expected behavior, so it kills the child and panics.
pub fn run_controller(args: &[&str]) -> std::process::ExitStatus {
    let mut cmd = Command::cargo_bin("finj-controller").expect("finj-controller binary");
    cmd.args(args);
    cmd.stdout(Stdio::null()).stderr(Stdio::null());
    let mut child = cmd.spawn().expect("failed to spawn finj-controller");
    wait_with_timeout(&mut child, Duration::from_secs(30))
}

fn wait_with_timeout(child: &mut Child, timeout: Duration) -> std::process::ExitStatus {
    let deadline = std::time::Instant::now() + timeout;
    loop {
        if let Ok(Some(status)) = child.try_wait() {
            return status;
        }
        if std::time::Instant::now() >= deadline {
            let _ = child.kill();
            panic!("finj-controller did not exit within {timeout:?}");
        }
        std::thread::sleep(Duration::from_millis(50));
    }
}

pub fn write_workload(path: &Path, tasks: &[Task]) {
    let mut writer = WorkloadWriter::create(path).expect("create workload");
    for task in tasks {
        writer.write_entry(task).expect("write workload entry");
    }
}

pub fn write_config(path: &Path, json: &serde_json::Value) {
    let mut file = std::fs::File::create(path).expect("create config file");
    file.write_all(serde_json::to_string_pretty(json).unwrap().as_bytes()).expect("write config file");
}

pub fn unused_port() -> u16 {
    std::net::TcpListener::bind(("127.0.0.1", 0)).expect("bind ephemeral port").local_addr().unwrap().port()
}

pub fn read_log(results_dir: &Path, host: &str, port: u16, workload_name: Option<&str>) -> String {
    let peer = finj_core::Peer::new(host, port);
    let path = finj_storage::paths::execution_log_filename(results_dir.to_str().unwrap(), &peer, workload_name);
    std::fs::read_to_string(PathBuf::from(path)).expect("read execution log")
}
