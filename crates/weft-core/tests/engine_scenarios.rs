// crates/weft-core/tests/engine_scenarios.rs
// ============================================================================
// Module: Engine Scenario Tests
// Description: End-to-end firing scenarios over the engine façade.
// Purpose: Validate single-trigger, multi-pattern, guard, degradation, and
// hot-reload behavior.
// ============================================================================

//! End-to-end synchronization scenarios.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use common::RecordingEvents;
use common::ScriptedTransport;
use common::fields;
use common::ok_completion;
use common::out_var;
use common::then_vars;
use common::when_ok;
use serde_json::json;
use tokio::sync::Semaphore;
use weft_core::ActionRecord;
use weft_core::ConceptRegistry;
use weft_core::ConceptTransport;
use weft_core::ConceptUri;
use weft_core::Engine;
use weft_core::Fields;
use weft_core::FlowId;
use weft_core::HealthStatus;
use weft_core::LogicalClock;
use weft_core::QueryBinding;
use weft_core::QueryMode;
use weft_core::QueryRequest;
use weft_core::RecordKind;
use weft_core::SyncName;
use weft_core::SyncSpec;
use weft_core::TransportError;
use weft_core::WhereEntry;

// ============================================================================
// SECTION: Spec Fixtures
// ============================================================================

/// `S1: when U/create -> ok(user:$u) then P/init(user=$u)`.
fn sync_s1() -> SyncSpec {
    SyncSpec {
        name: SyncName::new("S1"),
        annotations: BTreeSet::new(),
        when: vec![when_ok("U", "create", vec![out_var("user", "u")])],
        where_entries: Vec::new(),
        then: vec![then_vars("P", "init", &[("user", "u")])],
    }
}

/// `S2: when A/x -> ok(v:$v), B/y -> ok(v:$v) then C/z(v=$v)`.
fn sync_s2() -> SyncSpec {
    SyncSpec {
        name: SyncName::new("S2"),
        annotations: BTreeSet::new(),
        when: vec![
            when_ok("A", "x", vec![out_var("v", "v")]),
            when_ok("B", "y", vec![out_var("v", "v")]),
        ],
        where_entries: Vec::new(),
        then: vec![then_vars("C", "z", &[("v", "v")])],
    }
}

/// `S5: when A/x -> ok(u:$u) where query P{user=$u}->(name:$n) then L/log(name=$n)`.
fn sync_s5() -> SyncSpec {
    SyncSpec {
        name: SyncName::new("S5"),
        annotations: BTreeSet::new(),
        when: vec![when_ok("A", "x", vec![out_var("u", "u")])],
        where_entries: vec![WhereEntry::Query {
            concept: ConceptUri::new("P"),
            relation: Some("user".to_string()),
            bindings: vec![QueryBinding::new("user", "u"), QueryBinding::new("name", "n")],
        }],
        then: vec![then_vars("L", "log", &[("name", "n")])],
    }
}

/// Builds an engine over a fresh registry with a deterministic clock.
fn engine_with(registry: Arc<ConceptRegistry>, events: Arc<RecordingEvents>) -> Engine {
    Engine::builder()
        .registry(registry)
        .clock(Arc::new(LogicalClock::new()))
        .events(events)
        .build()
}

// ============================================================================
// SECTION: S1 Single Trigger
// ============================================================================

#[tokio::test]
async fn s1_single_trigger_no_where() {
    let engine = engine_with(Arc::new(ConceptRegistry::new()), Arc::new(RecordingEvents::new()));
    engine.reload_syncs(vec![sync_s1()]).unwrap();

    let trigger = ok_completion("c1", "U", "create", "f1", &[("user", json!("alice"))]);
    let produced = engine.on_completion(trigger, None).await.unwrap();

    assert_eq!(produced.len(), 1);
    let invocation = &produced[0];
    assert_eq!(invocation.kind, RecordKind::Invocation);
    assert_eq!(invocation.concept, ConceptUri::new("P"));
    assert_eq!(invocation.action, "init");
    assert_eq!(invocation.input.get("user"), Some(&json!("alice")));
    assert_eq!(invocation.flow, FlowId::new("f1"));
    assert_eq!(invocation.sync, Some(SyncName::new("S1")));
    assert_eq!(invocation.parent.as_ref().map(weft_core::RecordId::as_str), Some("c1"));

    let records = engine.log().records_for_flow(&FlowId::new("f1")).unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].kind, RecordKind::Completion);
    assert_eq!(records[1].kind, RecordKind::Invocation);
}

// ============================================================================
// SECTION: S2/S3 Multi-Pattern
// ============================================================================

#[tokio::test]
async fn s2_multi_pattern_and_fires_once_after_second_completion() {
    let engine = engine_with(Arc::new(ConceptRegistry::new()), Arc::new(RecordingEvents::new()));
    engine.reload_syncs(vec![sync_s2()]).unwrap();

    let first = ok_completion("a1", "A", "x", "f2", &[("v", json!(7))]);
    let produced = engine.on_completion(first, None).await.unwrap();
    assert!(produced.is_empty(), "half-match must not fire");

    let second = ok_completion("b1", "B", "y", "f2", &[("v", json!(7))]);
    let produced = engine.on_completion(second, None).await.unwrap();
    assert_eq!(produced.len(), 1);
    assert_eq!(produced[0].concept, ConceptUri::new("C"));
    assert_eq!(produced[0].input.get("v"), Some(&json!(7)));
}

#[tokio::test]
async fn s3_variable_inequality_yields_no_binding() {
    let engine = engine_with(Arc::new(ConceptRegistry::new()), Arc::new(RecordingEvents::new()));
    engine.reload_syncs(vec![sync_s2()]).unwrap();

    let first = ok_completion("a1", "A", "x", "f3", &[("v", json!(7))]);
    engine.on_completion(first, None).await.unwrap();
    let second = ok_completion("b1", "B", "y", "f3", &[("v", json!(8))]);
    let produced = engine.on_completion(second, None).await.unwrap();
    assert!(produced.is_empty());
}

// ============================================================================
// SECTION: S4 Firing Guard
// ============================================================================

#[tokio::test]
async fn s4_redelivery_of_same_completion_does_not_refire() {
    let events = Arc::new(RecordingEvents::new());
    let engine = engine_with(Arc::new(ConceptRegistry::new()), Arc::clone(&events));
    engine.reload_syncs(vec![sync_s2()]).unwrap();

    engine
        .on_completion(ok_completion("a1", "A", "x", "f4", &[("v", json!(7))]), None)
        .await
        .unwrap();
    let second = ok_completion("b1", "B", "y", "f4", &[("v", json!(7))]);
    let produced = engine.on_completion(second.clone(), None).await.unwrap();
    assert_eq!(produced.len(), 1);

    let redelivered = engine.on_completion(second, None).await.unwrap();
    assert!(redelivered.is_empty());
    assert!(events.labels().iter().any(|label| label == "suppressed:S2"));

    let invocations = engine
        .log()
        .records_for_flow(&FlowId::new("f4"))
        .unwrap()
        .into_iter()
        .filter(|record| record.kind == RecordKind::Invocation)
        .count();
    assert_eq!(invocations, 1);
}

// ============================================================================
// SECTION: S5 Degradation
// ============================================================================

#[tokio::test]
async fn s5_deregistered_query_concept_degrades_sync() {
    let events = Arc::new(RecordingEvents::new());
    let registry = Arc::new(ConceptRegistry::new());
    let engine = engine_with(Arc::clone(&registry), Arc::clone(&events));

    registry
        .register(
            ConceptUri::new("P"),
            Arc::new(ScriptedTransport::with_rows(
                "user",
                vec![fields(&[("user", json!("bob")), ("name", json!("Bob"))])],
            )),
            BTreeSet::new(),
            QueryMode::Lite,
        )
        .unwrap();
    engine.reload_syncs(vec![sync_s5()]).unwrap();
    registry.deregister(&ConceptUri::new("P"));

    assert_eq!(engine.degraded_syncs(), BTreeSet::from([SyncName::new("S5")]));
    assert!(events.labels().iter().any(|label| label == "degraded:S5:P"));

    let trigger = ok_completion("a1", "A", "x", "f5", &[("u", json!("bob"))]);
    let produced = engine.on_completion(trigger, None).await.unwrap();
    assert!(produced.is_empty());
    assert!(events.labels().iter().any(|label| label == "skipped:S5"));
}

#[tokio::test]
async fn s5_unregistered_query_concept_drops_binding() {
    let events = Arc::new(RecordingEvents::new());
    let engine = engine_with(Arc::new(ConceptRegistry::new()), Arc::clone(&events));
    engine.reload_syncs(vec![sync_s5()]).unwrap();

    let trigger = ok_completion("a1", "A", "x", "f5b", &[("u", json!("bob"))]);
    let produced = engine.on_completion(trigger, None).await.unwrap();
    assert!(produced.is_empty());
    assert!(events.labels().iter().any(|label| label == "query-dropped:S5:P"));
}

#[tokio::test]
async fn degradation_is_idempotent_across_reregistration() {
    let registry = Arc::new(ConceptRegistry::new());
    let engine = engine_with(Arc::clone(&registry), Arc::new(RecordingEvents::new()));

    let make_transport = || {
        Arc::new(ScriptedTransport::with_rows(
            "user",
            vec![fields(&[("user", json!("bob")), ("name", json!("Bob"))])],
        ))
    };
    registry
        .register(ConceptUri::new("P"), make_transport(), BTreeSet::new(), QueryMode::Lite)
        .unwrap();
    engine.reload_syncs(vec![sync_s5()]).unwrap();

    registry.deregister(&ConceptUri::new("P"));
    assert!(!engine.degraded_syncs().is_empty());
    registry
        .register(ConceptUri::new("P"), make_transport(), BTreeSet::new(), QueryMode::Lite)
        .unwrap();
    assert!(engine.degraded_syncs().is_empty());

    let trigger = ok_completion("a1", "A", "x", "f5c", &[("u", json!("bob"))]);
    let produced = engine.on_completion(trigger, None).await.unwrap();
    assert_eq!(produced.len(), 1);
    assert_eq!(produced[0].input.get("name"), Some(&json!("Bob")));
}

// ============================================================================
// SECTION: S6 Hot Reload Isolation
// ============================================================================

/// Transport whose queries block until released, to hold a firing in the
/// where evaluator across a reload.
struct GatedTransport {
    /// Signals that a query has started.
    started: Semaphore,
    /// Releases blocked queries.
    release: Semaphore,
}

impl GatedTransport {
    /// Creates a gated transport with no permits issued.
    fn new() -> Self {
        Self {
            started: Semaphore::new(0),
            release: Semaphore::new(0),
        }
    }
}

#[async_trait]
impl ConceptTransport for GatedTransport {
    async fn invoke(&self, invocation: &ActionRecord) -> Result<ActionRecord, TransportError> {
        Err(TransportError::Invoke(format!("not scripted: {}", invocation.action)))
    }

    async fn query(&self, _request: &QueryRequest) -> Result<Vec<Fields>, TransportError> {
        self.started.add_permits(1);
        let permit =
            self.release.acquire().await.map_err(|err| TransportError::Query(err.to_string()))?;
        permit.forget();
        Ok(vec![fields(&[("user", json!("bob")), ("name", json!("Bob"))])])
    }

    async fn health(&self) -> HealthStatus {
        HealthStatus::up()
    }
}

#[tokio::test]
async fn s6_inflight_firing_completes_against_old_sync_set() {
    let registry = Arc::new(ConceptRegistry::new());
    let engine = engine_with(Arc::clone(&registry), Arc::new(RecordingEvents::new()));

    let gate = Arc::new(GatedTransport::new());
    registry
        .register(
            ConceptUri::new("P"),
            Arc::clone(&gate) as Arc<dyn ConceptTransport>,
            BTreeSet::new(),
            QueryMode::Lite,
        )
        .unwrap();
    engine.reload_syncs(vec![sync_s5()]).unwrap();

    let inflight = {
        let engine = engine.clone();
        tokio::spawn(async move {
            let trigger = ok_completion("a1", "A", "x", "f6", &[("u", json!("bob"))]);
            engine.on_completion(trigger, None).await
        })
    };
    gate.started.acquire().await.unwrap().forget();

    // Reload with a variant of S5 that targets a different then concept.
    let mut replacement = sync_s5();
    replacement.then = vec![then_vars("M", "note", &[("name", "n")])];
    engine.reload_syncs(vec![replacement]).unwrap();

    gate.release.add_permits(1);
    let produced = inflight.await.unwrap().unwrap();
    assert_eq!(produced.len(), 1);
    assert_eq!(produced[0].concept, ConceptUri::new("L"), "in-flight firing keeps the old then");

    // A fresh flow uses the reloaded sync set.
    gate.release.add_permits(1);
    let trigger = ok_completion("a2", "A", "x", "f7", &[("u", json!("bob"))]);
    let produced = engine.on_completion(trigger, None).await.unwrap();
    assert_eq!(produced.len(), 1);
    assert_eq!(produced[0].concept, ConceptUri::new("M"));
}

// ============================================================================
// SECTION: Flow Closure and Dispatch
// ============================================================================

#[tokio::test]
async fn produced_invocations_stay_in_the_trigger_flow() {
    let engine = engine_with(Arc::new(ConceptRegistry::new()), Arc::new(RecordingEvents::new()));
    engine.reload_syncs(vec![sync_s1(), sync_s2()]).unwrap();

    let trigger = ok_completion("c9", "U", "create", "f9", &[("user", json!("ada"))]);
    let produced = engine.on_completion(trigger, None).await.unwrap();
    for invocation in &produced {
        assert_eq!(invocation.flow, FlowId::new("f9"));
        assert_eq!(invocation.parent.as_ref().map(weft_core::RecordId::as_str), Some("c9"));
    }
}

#[tokio::test]
async fn drive_dispatches_through_the_registry_until_quiescent() {
    let registry = Arc::new(ConceptRegistry::new());
    let engine = engine_with(Arc::clone(&registry), Arc::new(RecordingEvents::new()));
    registry
        .register(
            ConceptUri::new("P"),
            Arc::new(ScriptedTransport::new()),
            BTreeSet::new(),
            QueryMode::Lite,
        )
        .unwrap();
    engine.reload_syncs(vec![sync_s1()]).unwrap();

    let trigger = ok_completion("c1", "U", "create", "f10", &[("user", json!("alice"))]);
    let produced = engine.drive(trigger, None).await.unwrap();
    assert_eq!(produced.len(), 1);

    // The dispatched P/init completion lands in the log alongside the rest
    // of the flow.
    let records = engine.log().records_for_flow(&FlowId::new("f10")).unwrap();
    let completions =
        records.iter().filter(|record| record.kind == RecordKind::Completion).count();
    assert_eq!(completions, 2);
}
