// crates/weft-core/tests/common/mod.rs
// ============================================================================
// Module: Weft Core Test Fixtures
// Description: Shared builders, scripted transports, and event recorders.
// Purpose: Keep scenario and unit tests focused on behavior under test.
// ============================================================================

//! Shared fixtures for weft-core integration tests.

#![allow(
    dead_code,
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only fixtures; not every test target uses every helper."
)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use serde_json::Value;
use weft_core::ActionRecord;
use weft_core::ConceptMetadata;
use weft_core::ConceptTransport;
use weft_core::ConceptUri;
use weft_core::EngineEvents;
use weft_core::FieldMatch;
use weft_core::FieldPattern;
use weft_core::Fields;
use weft_core::FlowId;
use weft_core::HealthStatus;
use weft_core::QueryRequest;
use weft_core::RecordId;
use weft_core::SyncName;
use weft_core::ThenAction;
use weft_core::ThenField;
use weft_core::ThenValue;
use weft_core::TransportError;
use weft_core::WhenPattern;

// ============================================================================
// SECTION: Builders
// ============================================================================

/// Builds a field map from string pairs.
pub fn fields(pairs: &[(&str, Value)]) -> Fields {
    pairs.iter().map(|(name, value)| ((*name).to_string(), value.clone())).collect()
}

/// Builds an output field pattern binding a variable.
pub fn out_var(name: &str, variable: &str) -> FieldPattern {
    FieldPattern::new(name, FieldMatch::Variable(variable.to_string()))
}

/// Builds an output field pattern requiring a literal.
pub fn out_lit(name: &str, value: Value) -> FieldPattern {
    FieldPattern::new(name, FieldMatch::Literal(value))
}

/// Builds a when pattern over `ok` completions with output matches only.
pub fn when_ok(concept: &str, action: &str, outputs: Vec<FieldPattern>) -> WhenPattern {
    WhenPattern {
        concept: ConceptUri::new(concept),
        action: action.to_string(),
        variant: Some("ok".to_string()),
        input_fields: Vec::new(),
        output_fields: outputs,
    }
}

/// Builds a then action with variable-valued fields.
pub fn then_vars(concept: &str, action: &str, fields: &[(&str, &str)]) -> ThenAction {
    ThenAction {
        concept: ConceptUri::new(concept),
        action: action.to_string(),
        fields: fields
            .iter()
            .map(|(name, variable)| {
                ThenField::new(*name, ThenValue::Variable((*variable).to_string()))
            })
            .collect(),
    }
}

/// Builds an `ok` completion with the given output fields.
pub fn ok_completion(
    id: &str,
    concept: &str,
    action: &str,
    flow: &str,
    output: &[(&str, Value)],
) -> ActionRecord {
    ActionRecord::completion(
        RecordId::new(id),
        ConceptUri::new(concept),
        action,
        Fields::new(),
        "ok",
        fields(output),
        FlowId::new(flow),
    )
}

// ============================================================================
// SECTION: Scripted Transport
// ============================================================================

/// Transport fixture serving scripted relation rows and echo invocations.
pub struct ScriptedTransport {
    /// Rows served per relation name.
    rows: Mutex<BTreeMap<String, Vec<Fields>>>,
    /// Health flag returned by probes.
    available: AtomicBool,
    /// Queries observed, for assertions on filter args.
    queries: Mutex<Vec<QueryRequest>>,
    /// Metadata advertised to the registry, when set.
    metadata: Option<ConceptMetadata>,
    /// When set, rows are served unfiltered, ignoring query args.
    ignore_args: bool,
}

impl ScriptedTransport {
    /// Creates a healthy transport with no rows.
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(BTreeMap::new()),
            available: AtomicBool::new(true),
            queries: Mutex::new(Vec::new()),
            metadata: None,
            ignore_args: false,
        }
    }

    /// Creates a healthy transport serving rows for one relation.
    pub fn with_rows(relation: &str, rows: Vec<Fields>) -> Self {
        let transport = Self::new();
        transport.rows.lock().unwrap().insert(relation.to_string(), rows);
        transport
    }

    /// Creates a transport serving rows unfiltered, ignoring query args.
    pub fn ignoring_args(relation: &str, rows: Vec<Fields>) -> Self {
        let mut transport = Self::with_rows(relation, rows);
        transport.ignore_args = true;
        transport
    }

    /// Sets the advertised metadata.
    pub fn with_metadata(mut self, metadata: ConceptMetadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Flips the health flag.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    /// Returns the queries observed so far.
    pub fn observed_queries(&self) -> Vec<QueryRequest> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl ConceptTransport for ScriptedTransport {
    async fn invoke(&self, invocation: &ActionRecord) -> Result<ActionRecord, TransportError> {
        let mut completion = ActionRecord::completion(
            invocation.id.clone(),
            invocation.concept.clone(),
            invocation.action.clone(),
            invocation.input.clone(),
            "ok",
            invocation.input.clone(),
            invocation.flow.clone(),
        );
        completion.timestamp = invocation.timestamp;
        Ok(completion)
    }

    async fn query(&self, request: &QueryRequest) -> Result<Vec<Fields>, TransportError> {
        self.queries.lock().unwrap().push(request.clone());
        let rows = self.rows.lock().unwrap();
        let Some(relation_rows) = rows.get(&request.relation) else {
            return Ok(Vec::new());
        };
        if self.ignore_args {
            return Ok(relation_rows.clone());
        }
        Ok(relation_rows
            .iter()
            .filter(|row| {
                request.args.iter().all(|(field, value)| row.get(field) == Some(value))
            })
            .cloned()
            .collect())
    }

    async fn health(&self) -> HealthStatus {
        if self.available.load(Ordering::SeqCst) {
            HealthStatus::up()
        } else {
            HealthStatus::down()
        }
    }

    fn metadata(&self) -> Option<ConceptMetadata> {
        self.metadata.clone()
    }
}

// ============================================================================
// SECTION: Event Recorder
// ============================================================================

/// Event sink recording one label per event for assertions.
#[derive(Default)]
pub struct RecordingEvents {
    /// Recorded event labels.
    labels: Mutex<Vec<String>>,
}

impl RecordingEvents {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the recorded labels.
    pub fn labels(&self) -> Vec<String> {
        self.labels.lock().unwrap().clone()
    }

    /// Records one label.
    fn record(&self, label: String) {
        self.labels.lock().unwrap().push(label);
    }
}

impl EngineEvents for RecordingEvents {
    fn sync_degraded(&self, sync: &SyncName, concept: &ConceptUri) {
        self.record(format!("degraded:{sync}:{concept}"));
    }

    fn sync_restored(&self, sync: &SyncName) {
        self.record(format!("restored:{sync}"));
    }

    fn degraded_sync_skipped(&self, sync: &SyncName) {
        self.record(format!("skipped:{sync}"));
    }

    fn firing_suppressed(&self, sync: &SyncName, _matched: &[RecordId]) {
        self.record(format!("suppressed:{sync}"));
    }

    fn query_binding_dropped(&self, sync: &SyncName, concept: &ConceptUri) {
        self.record(format!("query-dropped:{sync}:{concept}"));
    }

    fn template_unresolved(&self, sync: &SyncName, field: &str, _literal: &str) {
        self.record(format!("unresolved:{sync}:{field}"));
    }

    fn sync_fired(&self, sync: &SyncName, invocations: usize) {
        self.record(format!("fired:{sync}:{invocations}"));
    }
}

/// Shorthand for an `Arc`-wrapped scripted transport.
pub fn scripted() -> Arc<ScriptedTransport> {
    Arc::new(ScriptedTransport::new())
}
