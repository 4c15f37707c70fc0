// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[tokio::test]
async fn starts_and_stops_configured_commands() {
    let mut mgr = AuxProcessManager::start(&["sleep 30".to_string()]);
    assert_eq!(mgr.children.len(), 1);
    mgr.stop().await;
    assert!(mgr.children.is_empty());
}

#[tokio::test]
async fn unparsable_command_is_skipped_without_panicking() {
    let mgr = AuxProcessManager::start(&["echo \"unterminated".to_string()]);
    assert!(mgr.children.is_empty());
}

#[tokio::test]
async fn unspawnable_command_is_skipped_without_panicking() {
    let mgr = AuxProcessManager::start(&["/no/such/binary-here".to_string()]);
    assert!(mgr.children.is_empty());
}

#[tokio::test]
async fn empty_command_list_spawns_nothing() {
    let mgr = AuxProcessManager::start(&[]);
    assert!(mgr.children.is_empty());
}
