//! Snapshot save at shutdown / on request and restore at start-up.

use std::fs;
use std::path::Path;
use std::time::Instant;

use millennium::adapters::state_file::FileStateStore;
use millennium::app::ports::StatePort;
use millennium::app::service::DaemonController;
use millennium::config::SystemConfig;
use millennium::fsm::PhoneState;

use crate::mock_hw::{BridgeCall, Harness};

fn controller(path: &Path) -> DaemonController {
    DaemonController::new(SystemConfig::default(), Instant::now())
        .with_store(Box::new(FileStateStore::new(path, false)))
}

fn restart(path: &Path) -> Harness {
    let restored = FileStateStore::new(path, false).load();
    let mut h = Harness::build(controller(path), restored);
    h.settle();
    h
}

#[test]
fn shutdown_saves_and_restart_restores_credit() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state");

    let mut h = Harness::build(controller(&path), None);
    h.panel(b"HU");
    h.panel(b"V8");
    h.panel(b"V7");
    h.controller.shutdown(&mut h.bridge);
    assert_eq!(h.bridge.calls.last(), Some(&BridgeCall::Shutdown));

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.contains("inserted_cents=35"));
    assert!(text.contains("last_state=2"));

    let h = restart(&path);
    assert_eq!(h.phone_state(), PhoneState::IdleUp);
    assert_eq!(h.credit(), 35);
    assert_eq!(h.controller.registry().active_name(), Some("Classic Phone"));
}

#[test]
fn save_state_command_persists_active_plugin() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state");

    let mut h = Harness::build(controller(&path), None);
    let handle = h.controller.control_handle();
    assert!(handle.execute("activate_plugin:Jukebox"));
    assert!(handle.execute("save_state"));
    h.settle();
    assert!(path.exists());

    let h = restart(&path);
    assert_eq!(h.controller.registry().active_name(), Some("Jukebox"));
    assert_eq!(h.phone_state(), PhoneState::IdleDown);
}

#[test]
fn mid_call_snapshot_resumes_idle_up_without_a_call() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state");
    fs::write(
        &path,
        "inserted_cents=10\nlast_state=4\nactive_plugin=Classic Phone\n",
    )
    .unwrap();

    let h = restart(&path);
    assert_eq!(h.phone_state(), PhoneState::IdleUp);
    assert_eq!(h.credit(), 10);
    assert!(h.bridge.placed().is_empty());
}

#[test]
fn credit_is_not_restored_with_receiver_down() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state");
    fs::write(&path, "inserted_cents=50\nlast_state=1\nactive_plugin=Jukebox\n").unwrap();

    let h = restart(&path);
    assert_eq!(h.phone_state(), PhoneState::IdleDown);
    assert_eq!(h.credit(), 0);
    assert_eq!(h.controller.registry().active_name(), Some("Jukebox"));
}

#[test]
fn unknown_plugin_in_snapshot_falls_back_to_default() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state");
    fs::write(&path, "inserted_cents=0\nlast_state=1\nactive_plugin=Karaoke\n").unwrap();

    let h = restart(&path);
    assert_eq!(h.controller.registry().active_name(), Some("Classic Phone"));
}

#[test]
fn corrupt_snapshot_starts_fresh() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state");
    fs::write(&path, "inserted_cents=lots\nlast_state=2\n").unwrap();

    let h = restart(&path);
    assert_eq!(h.phone_state(), PhoneState::IdleDown);
    assert_eq!(h.credit(), 0);
}
