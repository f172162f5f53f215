// crates/weft-transport/src/local.rs
// ============================================================================
// Module: Local Concept Transport
// Description: In-process transport over a handler and its storage.
// Purpose: Adapt concept handlers to the engine's transport interface.
// Dependencies: weft-core, crate::handler, async-trait, serde_json
// ============================================================================

//! ## Overview
//! The local transport dispatches invocations to an in-process handler and
//! serves lite-mode relation queries straight from the handler's storage.
//! Completions mirror the invocation's `id`, `flow`, and `input`; query rows
//! carry the storage key under the reserved `__key` field so syncs can bind
//! row identities.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use weft_core::ActionRecord;
use weft_core::ConceptMetadata;
use weft_core::ConceptTransport;
use weft_core::Fields;
use weft_core::HealthStatus;
use weft_core::QUERY_KEY_FIELD;
use weft_core::QueryRequest;
use weft_core::TransportError;

use crate::handler::ConceptHandler;
use crate::handler::ConceptStorage;
use crate::handler::HandlerError;

// ============================================================================
// SECTION: Local Transport
// ============================================================================

/// In-process transport over one concept handler.
///
/// # Invariants
/// - Completions mirror the invocation's `id`, `flow`, and `input`.
/// - Queries read the handler's storage; rows expose their key under
///   [`QUERY_KEY_FIELD`].
pub struct LocalTransport {
    /// Concept handler dispatched to.
    handler: Arc<dyn ConceptHandler>,
    /// Storage the handler owns.
    storage: Arc<dyn ConceptStorage>,
}

impl LocalTransport {
    /// Creates a transport over a handler and its storage.
    #[must_use]
    pub fn new(handler: Arc<dyn ConceptHandler>, storage: Arc<dyn ConceptStorage>) -> Self {
        Self {
            handler,
            storage,
        }
    }

    /// Returns the storage, for host-side seeding and inspection.
    #[must_use]
    pub fn storage(&self) -> Arc<dyn ConceptStorage> {
        Arc::clone(&self.storage)
    }
}

impl From<HandlerError> for TransportError {
    fn from(err: HandlerError) -> Self {
        Self::Invoke(err.to_string())
    }
}

#[async_trait]
impl ConceptTransport for LocalTransport {
    async fn invoke(&self, invocation: &ActionRecord) -> Result<ActionRecord, TransportError> {
        let result = self
            .handler
            .handle(&invocation.action, &invocation.input, self.storage.as_ref())
            .await?;
        let mut completion = ActionRecord::completion(
            invocation.id.clone(),
            invocation.concept.clone(),
            invocation.action.clone(),
            invocation.input.clone(),
            result.variant,
            result.output,
            invocation.flow.clone(),
        );
        completion.timestamp = invocation.timestamp;
        Ok(completion)
    }

    async fn query(&self, request: &QueryRequest) -> Result<Vec<Fields>, TransportError> {
        let matches = self
            .storage
            .find(&request.relation, &request.args)
            .map_err(|err| TransportError::Query(err.to_string()))?;
        Ok(matches.into_iter().map(|(key, document)| row_from_document(&key, document)).collect())
    }

    async fn health(&self) -> HealthStatus {
        HealthStatus::up()
    }

    fn metadata(&self) -> Option<ConceptMetadata> {
        Some(self.handler.metadata())
    }
}

// ============================================================================
// SECTION: Rows
// ============================================================================

/// Flattens a stored document into a query row carrying its key.
///
/// Non-object documents surface under a single `value` field.
fn row_from_document(key: &str, document: Value) -> Fields {
    let mut row = match document {
        Value::Object(map) => map.into_iter().collect(),
        other => {
            let mut row = Fields::new();
            row.insert("value".to_string(), other);
            row
        }
    };
    row.insert(QUERY_KEY_FIELD.to_string(), Value::String(key.to_string()));
    row
}
