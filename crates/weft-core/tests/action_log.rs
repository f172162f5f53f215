// crates/weft-core/tests/action_log.rs
// ============================================================================
// Module: Action Log Unit Tests
// Description: Append ordering, uniqueness, firing edges, and export.
// Purpose: Validate the log invariants the firing guard depends on.
// ============================================================================

//! In-memory action log tests.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use common::ok_completion;
use serde_json::json;
use weft_core::ActionLog;
use weft_core::ActionRecord;
use weft_core::ConceptUri;
use weft_core::Fields;
use weft_core::FlowId;
use weft_core::InMemoryActionLog;
use weft_core::LogError;
use weft_core::RecordId;
use weft_core::SyncName;

// ============================================================================
// SECTION: Append and Round-Trip
// ============================================================================

#[test]
fn appended_completion_is_last_in_flow_order() {
    let log = InMemoryActionLog::new();
    log.append_completion(ok_completion("c1", "U", "create", "f", &[]), None).unwrap();
    log.append_completion(ok_completion("c2", "U", "create", "f", &[]), None).unwrap();

    let completions = log.completions_for_flow(&FlowId::new("f")).unwrap();
    assert_eq!(completions.len(), 2);
    assert_eq!(completions.last().map(|record| record.id.as_str()), Some("c2"));
}

#[test]
fn flows_are_isolated() {
    let log = InMemoryActionLog::new();
    log.append_completion(ok_completion("c1", "U", "create", "f1", &[]), None).unwrap();
    log.append_completion(ok_completion("c2", "U", "create", "f2", &[]), None).unwrap();

    assert_eq!(log.completions_for_flow(&FlowId::new("f1")).unwrap().len(), 1);
    assert_eq!(log.completions_for_flow(&FlowId::new("f2")).unwrap().len(), 1);
    assert!(log.completions_for_flow(&FlowId::new("f3")).unwrap().is_empty());
}

#[test]
fn completion_redelivery_returns_the_stored_record() {
    let log = InMemoryActionLog::new();
    let stored =
        log.append_completion(ok_completion("c1", "U", "create", "f", &[]), None).unwrap();
    let redelivered =
        log.append_completion(ok_completion("c1", "U", "create", "f", &[]), None).unwrap();
    assert_eq!(stored, redelivered);
    assert_eq!(log.completions_for_flow(&FlowId::new("f")).unwrap().len(), 1);
}

#[test]
fn duplicate_invocation_append_is_rejected() {
    let log = InMemoryActionLog::new();
    let invocation = ActionRecord::invocation(
        RecordId::new("i1"),
        ConceptUri::new("P"),
        "init",
        Fields::new(),
        FlowId::new("f"),
    );
    log.append_invocation(invocation.clone(), None).unwrap();
    let result = log.append_invocation(invocation, None);
    assert!(matches!(result, Err(LogError::DuplicateRecord { .. })));
}

#[test]
fn completion_and_its_invocation_share_an_identifier() {
    let log = InMemoryActionLog::new();
    let invocation = ActionRecord::invocation(
        RecordId::new("i1"),
        ConceptUri::new("P"),
        "init",
        Fields::new(),
        FlowId::new("f"),
    );
    log.append_invocation(invocation, None).unwrap();
    log.append_completion(ok_completion("i1", "P", "init", "f", &[]), None).unwrap();

    let records = log.records_for_flow(&FlowId::new("f")).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].id, records[1].id);
}

#[test]
fn kind_mismatch_is_rejected() {
    let log = InMemoryActionLog::new();
    let result = log.append_invocation(ok_completion("c1", "U", "create", "f", &[]), None);
    assert!(matches!(result, Err(LogError::KindMismatch { .. })));
}

// ============================================================================
// SECTION: Firing Guard Edges
// ============================================================================

#[test]
fn firing_edges_are_idempotent_and_order_insensitive() {
    let log = InMemoryActionLog::new();
    let sync = SyncName::new("S");
    let forward = [RecordId::new("a"), RecordId::new("b")];
    let reversed = [RecordId::new("b"), RecordId::new("a")];

    assert!(!log.has_fired(&forward, &sync).unwrap());
    log.record_sync_firing(&forward, &sync).unwrap();
    log.record_sync_firing(&forward, &sync).unwrap();
    assert!(log.has_fired(&forward, &sync).unwrap());
    assert!(log.has_fired(&reversed, &sync).unwrap(), "guard key ignores match order");
}

#[test]
fn firing_edges_are_scoped_per_sync() {
    let log = InMemoryActionLog::new();
    let matched = [RecordId::new("a")];
    log.record_sync_firing(&matched, &SyncName::new("S1")).unwrap();
    assert!(log.has_fired(&matched, &SyncName::new("S1")).unwrap());
    assert!(!log.has_fired(&matched, &SyncName::new("S2")).unwrap());
}

#[test]
fn provenance_edges_cover_every_matched_completion() {
    let log = InMemoryActionLog::new();
    let matched = [RecordId::new("a"), RecordId::new("b")];
    let sync = SyncName::new("S");
    log.record_sync_edges(&matched, &sync, &RecordId::new("i1")).unwrap();

    for completion in &matched {
        let edges = log.firings_for_completion(completion).unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].sync, sync);
        assert_eq!(edges[0].invocation, RecordId::new("i1"));
    }
    assert!(log.firings_for_completion(&RecordId::new("c")).unwrap().is_empty());
}

// ============================================================================
// SECTION: Wire Export
// ============================================================================

#[test]
fn export_produces_self_describing_records() {
    let log = InMemoryActionLog::new();
    log.append_completion(
        ok_completion("c1", "U", "create", "f", &[("user", json!("alice"))]),
        None,
    )
    .unwrap();

    let exported = log.export_flow(&FlowId::new("f")).unwrap();
    assert_eq!(exported.len(), 1);
    let record = &exported[0];
    assert_eq!(record.get("id"), Some(&json!("c1")));
    assert_eq!(record.get("kind"), Some(&json!("completion")));
    assert_eq!(record.get("concept"), Some(&json!("U")));
    assert_eq!(record.get("variant"), Some(&json!("ok")));
    assert_eq!(record.pointer("/output/user"), Some(&json!("alice")));
    assert_eq!(record.get("flow"), Some(&json!("f")));
}
