// crates/weft-core/tests/matcher_unit.rs
// ============================================================================
// Module: Matcher Unit Tests
// Description: Binding enumeration, unification, and deduplication.
// Purpose: Validate trigger inclusion, consistency, and determinism.
// ============================================================================

//! Matcher unit tests over scripted flow histories.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use std::collections::BTreeSet;

use common::ok_completion;
use common::out_lit;
use common::out_var;
use common::then_vars;
use common::when_ok;
use serde_json::json;
use weft_core::FieldMatch;
use weft_core::FieldPattern;
use weft_core::SyncName;
use weft_core::SyncSpec;
use weft_core::runtime::compile;
use weft_core::runtime::match_sync;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Compiles a two-pattern AND sync binding `v` across A/x and B/y.
fn two_pattern_sync() -> weft_core::CompiledSync {
    compile(SyncSpec {
        name: SyncName::new("pair"),
        annotations: BTreeSet::new(),
        when: vec![
            when_ok("A", "x", vec![out_var("v", "v")]),
            when_ok("B", "y", vec![out_var("v", "v")]),
        ],
        where_entries: Vec::new(),
        then: vec![then_vars("C", "z", &[("v", "v")])],
    })
    .unwrap()
}

// ============================================================================
// SECTION: Trigger Inclusion
// ============================================================================

#[test]
fn combinations_without_the_trigger_are_filtered() {
    let sync = two_pattern_sync();
    let a1 = ok_completion("a1", "A", "x", "f", &[("v", json!(1))]);
    let b1 = ok_completion("b1", "B", "y", "f", &[("v", json!(1))]);
    let a2 = ok_completion("a2", "A", "x", "f", &[("v", json!(1))]);
    let flow = vec![a1.clone(), b1.clone(), a2.clone()];

    // Triggered by a2: only combinations containing a2 survive.
    let bindings = match_sync(&sync, &flow, &a2);
    assert_eq!(bindings.len(), 1);
    assert_eq!(bindings[0].matched(), &[a2.id.clone(), b1.id.clone()]);
}

#[test]
fn missing_candidates_for_any_pattern_yield_no_match() {
    let sync = two_pattern_sync();
    let a1 = ok_completion("a1", "A", "x", "f", &[("v", json!(1))]);
    let flow = vec![a1.clone()];
    assert!(match_sync(&sync, &flow, &a1).is_empty());
}

// ============================================================================
// SECTION: Unification
// ============================================================================

#[test]
fn inconsistent_variable_values_fail_unification() {
    let sync = two_pattern_sync();
    let a1 = ok_completion("a1", "A", "x", "f", &[("v", json!(1))]);
    let b1 = ok_completion("b1", "B", "y", "f", &[("v", json!(2))]);
    let flow = vec![a1, b1.clone()];
    assert!(match_sync(&sync, &flow, &b1).is_empty());
}

#[test]
fn absent_fields_fail_variable_patterns() {
    let sync = two_pattern_sync();
    let a1 = ok_completion("a1", "A", "x", "f", &[]);
    let b1 = ok_completion("b1", "B", "y", "f", &[("v", json!(1))]);
    let flow = vec![a1, b1.clone()];
    assert!(match_sync(&sync, &flow, &b1).is_empty());
}

#[test]
fn literal_patterns_require_structural_equality() {
    let sync = compile(SyncSpec {
        name: SyncName::new("lit"),
        annotations: BTreeSet::new(),
        when: vec![when_ok("A", "x", vec![out_lit("v", json!({"n": 1}))])],
        where_entries: Vec::new(),
        then: vec![then_vars("C", "z", &[])],
    })
    .unwrap();

    let matching = ok_completion("a1", "A", "x", "f", &[("v", json!({"n": 1}))]);
    let differing = ok_completion("a2", "A", "x", "f", &[("v", json!({"n": 2}))]);
    let flow = vec![matching.clone(), differing.clone()];

    assert_eq!(match_sync(&sync, &flow, &matching).len(), 1);
    assert!(match_sync(&sync, &flow, &differing).is_empty());
}

#[test]
fn wildcard_patterns_accept_absent_fields() {
    let sync = compile(SyncSpec {
        name: SyncName::new("wild"),
        annotations: BTreeSet::new(),
        when: vec![when_ok("A", "x", vec![FieldPattern::new("v", FieldMatch::Wildcard)])],
        where_entries: Vec::new(),
        then: vec![then_vars("C", "z", &[])],
    })
    .unwrap();

    let bare = ok_completion("a1", "A", "x", "f", &[]);
    let flow = vec![bare.clone()];
    assert_eq!(match_sync(&sync, &flow, &bare).len(), 1);
}

#[test]
fn variant_mismatch_excludes_candidates() {
    let sync = two_pattern_sync();
    let mut failed = ok_completion("a1", "A", "x", "f", &[("v", json!(1))]);
    failed.variant = Some("error".to_string());
    let b1 = ok_completion("b1", "B", "y", "f", &[("v", json!(1))]);
    let flow = vec![failed, b1.clone()];
    assert!(match_sync(&sync, &flow, &b1).is_empty());
}

// ============================================================================
// SECTION: Deduplication and Determinism
// ============================================================================

#[test]
fn bindings_deduplicate_by_sorted_matched_set() {
    // A single-pattern sync triggered by its own completion can only match
    // once even when the flow holds several candidates.
    let sync = compile(SyncSpec {
        name: SyncName::new("single"),
        annotations: BTreeSet::new(),
        when: vec![when_ok("A", "x", vec![out_var("v", "v")])],
        where_entries: Vec::new(),
        then: vec![then_vars("C", "z", &[("v", "v")])],
    })
    .unwrap();

    let a1 = ok_completion("a1", "A", "x", "f", &[("v", json!(1))]);
    let a2 = ok_completion("a2", "A", "x", "f", &[("v", json!(1))]);
    let flow = vec![a1, a2.clone()];
    let bindings = match_sync(&sync, &flow, &a2);
    assert_eq!(bindings.len(), 1);
    assert_eq!(bindings[0].matched(), &[a2.id.clone()]);
}

#[test]
fn matcher_is_deterministic_for_fixed_inputs() {
    let sync = two_pattern_sync();
    let a1 = ok_completion("a1", "A", "x", "f", &[("v", json!(1))]);
    let a2 = ok_completion("a2", "A", "x", "f", &[("v", json!(1))]);
    let b1 = ok_completion("b1", "B", "y", "f", &[("v", json!(1))]);
    let flow = vec![a1, a2, b1.clone()];

    let first = match_sync(&sync, &flow, &b1);
    let second = match_sync(&sync, &flow, &b1);
    assert_eq!(first, second);
    assert_eq!(first.len(), 2, "one binding per A candidate");

    let keys: BTreeSet<Vec<weft_core::RecordId>> =
        first.iter().map(weft_core::Binding::sorted_matched).collect();
    assert_eq!(keys.len(), first.len(), "sorted matched sets are distinct");
}
