// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Result-file naming conventions, matching the original tool's
//! `util/misc.py` helpers so existing result directories stay readable.

use finj_core::Peer;

const INJECTION_PREFIX: &str = "injection-";
const OUTPUT_PREFIX: &str = "output-";
const LISTENING_PREFIX: &str = "listening-";

/// Execution-log filename for a given peer and (optional) workload name.
/// A `None` workload name means the controller was running in pull/listen
/// mode rather than driving an injection session.
pub fn execution_log_filename(results_dir: &str, peer: &Peer, workload_name: Option<&str>) -> String {
    match workload_name {
        Some(name) => format!("{results_dir}/{INJECTION_PREFIX}{name}-{}_{}.csv", peer.host, peer.port),
        None => format!("{results_dir}/{LISTENING_PREFIX}{}_{}.csv", peer.host, peer.port),
    }
}

/// Directory name for a task's captured stdout/stderr logs.
pub fn output_directory(results_dir: &str, peer: &Peer, workload_name: Option<&str>) -> String {
    match workload_name {
        Some(name) => format!("{results_dir}/{OUTPUT_PREFIX}{name}-{}_{}", peer.host, peer.port),
        None => format!("{results_dir}/{OUTPUT_PREFIX}{}_{}", peer.host, peer.port),
    }
}

/// Filename for one task's captured output within `output_directory`.
pub fn task_output_filename(args: &str, seq_num: u32) -> String {
    let stripped = args.replace("sudo", "").replace("./", "");
    let name = stripped.trim().split(' ').next().unwrap_or("task");
    format!("{name}_{seq_num}.log")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execution_log_filename_for_injection_session() {
        let peer = Peer::new("10.0.0.1", 30000);
        let name = execution_log_filename("results", &peer, Some("wl1"));
        assert_eq!(name, "results/injection-wl1-10.0.0.1_30000.csv");
    }

    #[test]
    fn execution_log_filename_for_listen_mode() {
        let peer = Peer::new("10.0.0.1", 30000);
        let name = execution_log_filename("results", &peer, None);
        assert_eq!(name, "results/listening-10.0.0.1_30000.csv");
    }

    #[test]
    fn task_output_filename_strips_sudo_and_path() {
        assert_eq!(task_output_filename("sudo ./stress-ng --cpu 1", 3), "stress-ng_3.log");
    }
}
