// crates/weft-transport/src/handler.rs
// ============================================================================
// Module: Concept Handlers and Storage
// Description: In-process concept implementations and their document store.
// Purpose: Define the engine-facing handler seam and a keyed storage trait.
// Dependencies: weft-core, async-trait, serde_json, thiserror
// ============================================================================

//! ## Overview
//! A concept handler is an in-process concept implementation: an async
//! action dispatcher keyed by action name over `(input, storage)`, plus a
//! metadata descriptor resolved at install time. Handlers own no transport
//! concerns; [`crate::LocalTransport`] adapts a handler and its storage to
//! the engine's transport interface.
//!
//! Storage is a keyed document store with equality-filtered reads, which is
//! exactly what lite-mode relation queries need.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::PoisonError;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use weft_core::ConceptMetadata;
use weft_core::Fields;

// ============================================================================
// SECTION: Handler Results
// ============================================================================

/// Outcome of one handler action: a variant tag and its output payload.
///
/// # Invariants
/// - `variant` is the discriminant tag (for example `ok` or `notFound`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerResult {
    /// Discriminant tag of the completion.
    pub variant: String,
    /// Output payload fields.
    pub output: Fields,
}

impl HandlerResult {
    /// Builds an `ok` result with the given output fields.
    #[must_use]
    pub fn ok(output: Fields) -> Self {
        Self {
            variant: "ok".to_string(),
            output,
        }
    }

    /// Builds a result with an arbitrary variant tag.
    #[must_use]
    pub fn variant(variant: impl Into<String>, output: Fields) -> Self {
        Self {
            variant: variant.into(),
            output,
        }
    }
}

/// Errors surfaced by concept handlers.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The action name is not part of this concept.
    #[error("unknown action: {0}")]
    UnknownAction(String),
    /// A required input field is missing or has the wrong shape.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// The backing storage failed.
    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),
}

// ============================================================================
// SECTION: Concept Handler
// ============================================================================

/// In-process concept implementation.
///
/// # Invariants
/// - `metadata` is stable for the lifetime of the handler.
/// - `handle` must be safe to call concurrently from multiple firings.
#[async_trait]
pub trait ConceptHandler: Send + Sync {
    /// Returns the descriptor the registry confirms deployments against.
    fn metadata(&self) -> ConceptMetadata;

    /// Dispatches one action by name.
    ///
    /// # Errors
    ///
    /// Returns [`HandlerError`] for unknown actions, invalid inputs, or
    /// storage failures. Domain outcomes such as `notFound` are variants,
    /// not errors.
    async fn handle(
        &self,
        action: &str,
        input: &Fields,
        storage: &dyn ConceptStorage,
    ) -> Result<HandlerResult, HandlerError>;
}

// ============================================================================
// SECTION: Concept Storage
// ============================================================================

/// Errors surfaced by concept storage backends.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The backend failed.
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Keyed document store owned by a concept.
///
/// Collections hold JSON documents under string keys; `find` applies AND
/// equality over top-level document fields.
pub trait ConceptStorage: Send + Sync {
    /// Writes a document under `(collection, key)`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the backend fails.
    fn put(&self, collection: &str, key: &str, value: Value) -> Result<(), StorageError>;

    /// Reads a document by key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the backend fails.
    fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, StorageError>;

    /// Deletes a document by key; absent keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the backend fails.
    fn delete(&self, collection: &str, key: &str) -> Result<(), StorageError>;

    /// Returns `(key, document)` pairs whose documents match every filter
    /// field by equality, in key order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] when the backend fails.
    fn find(&self, collection: &str, filter: &Fields)
    -> Result<Vec<(String, Value)>, StorageError>;
}

/// In-memory concept storage.
///
/// # Invariants
/// - Collections and keys are ordered, so reads are deterministic.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    /// Documents keyed by collection, then key.
    collections: Mutex<BTreeMap<String, BTreeMap<String, Value>>>,
}

impl MemoryStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ConceptStorage for MemoryStorage {
    fn put(&self, collection: &str, key: &str, value: Value) -> Result<(), StorageError> {
        let mut collections = self.collections.lock().unwrap_or_else(PoisonError::into_inner);
        collections.entry(collection.to_string()).or_default().insert(key.to_string(), value);
        Ok(())
    }

    fn get(&self, collection: &str, key: &str) -> Result<Option<Value>, StorageError> {
        let collections = self.collections.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(collections.get(collection).and_then(|documents| documents.get(key)).cloned())
    }

    fn delete(&self, collection: &str, key: &str) -> Result<(), StorageError> {
        let mut collections = self.collections.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(documents) = collections.get_mut(collection) {
            documents.remove(key);
        }
        Ok(())
    }

    fn find(
        &self,
        collection: &str,
        filter: &Fields,
    ) -> Result<Vec<(String, Value)>, StorageError> {
        let collections = self.collections.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(documents) = collections.get(collection) else {
            return Ok(Vec::new());
        };
        Ok(documents
            .iter()
            .filter(|(_, document)| {
                filter.iter().all(|(field, expected)| {
                    document.get(field).is_some_and(|value| value == expected)
                })
            })
            .map(|(key, document)| (key.clone(), document.clone()))
            .collect())
    }
}
