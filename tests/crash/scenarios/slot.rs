//! Slot creation and drop crash scenarios
//!
//! - Crash anywhere before promotion: no slot after restart, name reusable
//! - Crash after promotion: slot restored at its anchor
//! - Crash mid-drop: slot gone after restart
//! - A second process waits for the data directory and sees the first's slot

use std::thread;
use std::time::Duration;

use crate::crash::harness::{create_slot, drop_slot, report_failure, validate_post_crash_state};
use crate::crash::utils::{slot_dirs, TestServer};
use slotanchor::anchor::CreateAnchoredSlot;
use slotanchor::auth::Identity;
use slotanchor::crash_point::points;
use slotanchor::session::Session;
use slotanchor::slot::SlotPersistency;
use slotanchor::types::ProcessId;

const ANCHOR: &str = "0/10000000";

fn crash_during_create(point: &str, temporary: bool) -> TestServer {
    let server = TestServer::new();
    let result = create_slot(Some(point), &server.config_path(), "switch_a", ANCHOR, temporary);
    if !result.hit_crash_point() {
        report_failure(point, "create", &result);
    }
    assert!(result.crashed);
    assert!(result.hit_crash_point());
    server
}

fn assert_no_slot_after_restart(server: &TestServer, point: &str) {
    let svc = server.reopen().unwrap();
    assert!(svc.list_slots().is_empty(), "slot survived crash at {}", point);
    assert!(slot_dirs(&server.data_dir()).is_empty());
    assert!(!svc.horizon().published().min_xmin().is_valid());

    if let Err(errors) = validate_post_crash_state(&server.data_dir()) {
        panic!("inconsistent state after crash at {}: {:?}", point, errors);
    }
}

fn assert_retry_succeeds(server: &TestServer) {
    let result = create_slot(None, &server.config_path(), "switch_a", ANCHOR, false);
    if result.crashed {
        report_failure("none", "retry create", &result);
    }
    assert!(!result.crashed);

    let svc = server.reopen().unwrap();
    let slot = svc.registry().get("switch_a").unwrap();
    assert_eq!(slot.persistency, SlotPersistency::Persistent);
    assert_eq!(slot.confirmed_flush_lsn.to_string(), "0/10000000");
}

#[test]
fn test_crash_before_promotion_leaves_no_slot() {
    for point in [
        points::SLOT_AFTER_ALLOCATE,
        points::SLOT_STATE_BEFORE_RENAME,
        points::SLOT_AFTER_ANCHOR,
        points::SLOT_AFTER_HORIZON,
        points::SLOT_BEFORE_PERSIST,
    ] {
        let server = crash_during_create(point, false);
        assert_no_slot_after_restart(&server, point);
        assert_retry_succeeds(&server);
    }
}

#[test]
fn test_crash_during_temporary_create_leaves_no_slot() {
    let server = crash_during_create(points::SLOT_AFTER_HORIZON, true);
    assert_no_slot_after_restart(&server, points::SLOT_AFTER_HORIZON);
    assert_retry_succeeds(&server);
}

#[test]
fn test_crash_after_persist_keeps_slot() {
    let server = crash_during_create(points::SLOT_AFTER_PERSIST, false);

    let svc = server.reopen().unwrap();
    let slot = svc.registry().get("switch_a").unwrap();
    assert_eq!(slot.persistency, SlotPersistency::Persistent);
    assert_eq!(slot.restart_lsn.to_string(), ANCHOR);
    assert_eq!(slot.confirmed_flush_lsn.to_string(), ANCHOR);
    assert_eq!(slot.active_pid, None);
    assert!(slot.catalog_xmin.is_valid());
    assert_eq!(svc.horizon().published().slot_catalog_xmin, slot.catalog_xmin);

    assert!(validate_post_crash_state(&server.data_dir()).is_ok());
    drop(svc);

    // The name is taken for good
    let again = create_slot(None, &server.config_path(), "switch_a", ANCHOR, false);
    assert!(again.crashed);
    assert!(!again.hit_crash_point());
    assert!(again.stdout.contains("already exists"));
}

#[test]
fn test_crash_mid_drop_removes_slot() {
    let server = TestServer::new();
    let created = create_slot(None, &server.config_path(), "switch_a", ANCHOR, false);
    assert!(!created.crashed);

    let result = drop_slot(Some(points::SLOT_DROP_AFTER_REMOVE), &server.config_path(), "switch_a");
    if !result.hit_crash_point() {
        report_failure(points::SLOT_DROP_AFTER_REMOVE, "drop", &result);
    }
    assert!(result.hit_crash_point());

    assert_no_slot_after_restart(&server, points::SLOT_DROP_AFTER_REMOVE);
}

#[test]
fn test_second_process_waits_for_open_service() {
    let server = TestServer::new();
    let svc = server.reopen().unwrap();
    let session = Session::new(ProcessId::new(9), Identity::new("postgres"), "postgres");
    let request = CreateAnchoredSlot::new("switch_a", "test_decoding", ANCHOR.parse().unwrap());
    svc.create_logical_replication_slot_lsn(&session, &request).unwrap();

    let config_path = server.config_path();
    let other = thread::spawn(move || create_slot(None, &config_path, "switch_a", ANCHOR, false));

    thread::sleep(Duration::from_millis(300));
    assert!(!other.is_finished(), "second process ran while the data directory was held");

    svc.end_session(&session);
    drop(svc);

    let result = other.join().unwrap();
    assert!(result.crashed);
    assert!(!result.hit_crash_point());
    assert!(result.stdout.contains("already exists"), "stdout: {}", result.stdout);
    assert_eq!(slot_dirs(&server.data_dir()), vec!["switch_a".to_string()]);
}
