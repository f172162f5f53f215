// crates/weft-cli/src/concepts.rs
// ============================================================================
// Module: Built-in CLI Concepts
// Description: Echo and table handlers resolvable from manifests.
// Purpose: Give local deployments working concepts without custom code.
// Dependencies: weft-core, weft-transport, async-trait, serde_json
// ============================================================================

//! ## Overview
//! Manifests declare local transports by handler name; this module resolves
//! the built-in names. `echo` completes every action with its own input.
//! `table` is a keyed document concept: `put`, `get`, and `delete` over one
//! collection, which also serves lite-mode relation queries.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use serde_json::json;
use weft_core::ConceptMetadata;
use weft_core::Fields;
use weft_core::RecordId;
use weft_transport::ConceptHandler;
use weft_transport::ConceptStorage;
use weft_transport::HandlerError;
use weft_transport::HandlerResult;
use weft_transport::LocalTransport;
use weft_transport::MemoryStorage;

// ============================================================================
// SECTION: Handler Resolution
// ============================================================================

/// Resolves a built-in handler name into a local transport.
///
/// The `table` handler stores documents under the given collection, which
/// is also the relation its queries serve.
pub fn resolve_builtin(handler: &str, collection: &str) -> Option<LocalTransport> {
    let storage = Arc::new(MemoryStorage::new());
    match handler {
        "echo" => Some(LocalTransport::new(Arc::new(EchoConcept), storage)),
        "table" => Some(LocalTransport::new(
            Arc::new(TableConcept {
                collection: collection.to_string(),
            }),
            storage,
        )),
        _ => None,
    }
}

// ============================================================================
// SECTION: Echo Concept
// ============================================================================

/// Concept completing every action with its own input.
struct EchoConcept;

#[async_trait]
impl ConceptHandler for EchoConcept {
    fn metadata(&self) -> ConceptMetadata {
        ConceptMetadata {
            name: "echo".to_string(),
            input_kind: "record".to_string(),
            output_kind: "variant".to_string(),
            capabilities: BTreeSet::from(["echo".to_string()]),
        }
    }

    async fn handle(
        &self,
        _action: &str,
        input: &Fields,
        _storage: &dyn ConceptStorage,
    ) -> Result<HandlerResult, HandlerError> {
        Ok(HandlerResult::ok(input.clone()))
    }
}

// ============================================================================
// SECTION: Table Concept
// ============================================================================

/// Keyed document concept over one storage collection.
struct TableConcept {
    /// Collection documents are stored under.
    collection: String,
}

#[async_trait]
impl ConceptHandler for TableConcept {
    fn metadata(&self) -> ConceptMetadata {
        ConceptMetadata {
            name: "table".to_string(),
            input_kind: "record".to_string(),
            output_kind: "variant".to_string(),
            capabilities: BTreeSet::from([
                "put".to_string(),
                "get".to_string(),
                "delete".to_string(),
            ]),
        }
    }

    async fn handle(
        &self,
        action: &str,
        input: &Fields,
        storage: &dyn ConceptStorage,
    ) -> Result<HandlerResult, HandlerError> {
        match action {
            "put" => {
                let key = match input.get("key") {
                    Some(Value::String(key)) => key.clone(),
                    Some(_) => {
                        return Err(HandlerError::InvalidInput("key must be a string".into()));
                    }
                    None => RecordId::fresh().as_str().to_string(),
                };
                let document = Value::Object(input.iter().map(|(name, value)| {
                    (name.clone(), value.clone())
                }).collect());
                storage.put(&self.collection, &key, document)?;
                let mut output = Fields::new();
                output.insert("key".to_string(), json!(key));
                Ok(HandlerResult::ok(output))
            }
            "get" => {
                let Some(Value::String(key)) = input.get("key") else {
                    return Err(HandlerError::InvalidInput("key must be a string".into()));
                };
                match storage.get(&self.collection, key)? {
                    Some(document) => {
                        let mut output = Fields::new();
                        output.insert("key".to_string(), json!(key));
                        output.insert("record".to_string(), document);
                        Ok(HandlerResult::ok(output))
                    }
                    None => {
                        let mut output = Fields::new();
                        output.insert("message".to_string(), json!("no such key"));
                        Ok(HandlerResult::variant("notFound", output))
                    }
                }
            }
            "delete" => {
                let Some(Value::String(key)) = input.get("key") else {
                    return Err(HandlerError::InvalidInput("key must be a string".into()));
                };
                storage.delete(&self.collection, key)?;
                let mut output = Fields::new();
                output.insert("key".to_string(), json!(key));
                Ok(HandlerResult::ok(output))
            }
            other => Err(HandlerError::UnknownAction(other.to_string())),
        }
    }
}
