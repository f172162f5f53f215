// crates/weft-core/src/log/mod.rs
// ============================================================================
// Module: Weft Action Log
// Description: Append-only provenance log interface and sync-firing edges.
// Purpose: Define the log contract shared by in-memory and durable backends.
// Dependencies: crate::core, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The action log is the append-only record of every invocation and
//! completion, with parent edges and sync-firing edges. It is the sole
//! linearization point for records within one engine. Two edge indices are
//! kept: sorted matched-id tuple to sync names (the firing guard), and
//! completion id to `(sync, invocation)` pairs (provenance walks).

// ============================================================================
// SECTION: Modules
// ============================================================================

/// In-memory log backend.
pub mod memory;

pub use memory::InMemoryActionLog;

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::core::ActionRecord;
use crate::core::FlowId;
use crate::core::RecordId;
use crate::core::SyncName;

// ============================================================================
// SECTION: Sync Edges
// ============================================================================

/// Provenance edge from a matched completion to a derived invocation.
///
/// # Invariants
/// - One edge exists per `(completion, sync, invocation)` triple.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SyncEdge {
    /// Sync whose firing produced the invocation.
    pub sync: SyncName,
    /// Derived invocation identifier.
    pub invocation: RecordId,
}

// ============================================================================
// SECTION: Log Errors
// ============================================================================

/// Errors surfaced by action-log backends.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - The in-memory backend returns only `DuplicateRecord` and `KindMismatch`;
///   `Backend` is reserved for durable stores.
#[derive(Debug, Error)]
pub enum LogError {
    /// A record with this `(flow, id, kind)` already exists.
    #[error("duplicate record in flow {flow}: {id}")]
    DuplicateRecord {
        /// Flow of the rejected record.
        flow: FlowId,
        /// Identifier of the rejected record.
        id: RecordId,
    },
    /// The record kind does not match the append operation.
    #[error("record kind mismatch: expected {expected}")]
    KindMismatch {
        /// Expected kind label.
        expected: &'static str,
    },
    /// The durable backend is unavailable or corrupted.
    #[error("log backend failure: {0}")]
    Backend(String),
    /// Record serialization failed during export.
    #[error("log export failure: {0}")]
    Export(String),
}

// ============================================================================
// SECTION: Action Log Trait
// ============================================================================

/// Append-only provenance log.
///
/// # Invariants
/// - Records never mutate after append.
/// - `completions_for_flow` and `records_for_flow` preserve append order.
/// - `record_sync_firing` is idempotent on repeated identical calls.
/// - `has_fired` keys on the sorted id tuple, so match order is irrelevant.
pub trait ActionLog: Send + Sync {
    /// Appends a completion, stamping the parent edge.
    ///
    /// Re-delivery of a completion already stored under the same
    /// `(flow, id)` is harmless: the stored record is returned unchanged
    /// and nothing is appended.
    ///
    /// # Errors
    ///
    /// Returns [`LogError`] when the record is not a completion or the
    /// backend fails.
    fn append_completion(
        &self,
        completion: ActionRecord,
        parent: Option<RecordId>,
    ) -> Result<ActionRecord, LogError>;

    /// Appends an invocation, stamping the parent edge.
    ///
    /// # Errors
    ///
    /// Returns [`LogError`] when the record is not an invocation, collides
    /// with an existing `(flow, id)` invocation, or the backend fails.
    fn append_invocation(
        &self,
        invocation: ActionRecord,
        parent: Option<RecordId>,
    ) -> Result<ActionRecord, LogError>;

    /// Returns the flow's completions in append order.
    ///
    /// # Errors
    ///
    /// Returns [`LogError`] when the backend fails.
    fn completions_for_flow(&self, flow: &FlowId) -> Result<Vec<ActionRecord>, LogError>;

    /// Returns all of the flow's records in append order.
    ///
    /// # Errors
    ///
    /// Returns [`LogError`] when the backend fails.
    fn records_for_flow(&self, flow: &FlowId) -> Result<Vec<ActionRecord>, LogError>;

    /// Records that a sync has fired for exactly this matched set.
    ///
    /// # Errors
    ///
    /// Returns [`LogError`] when the backend fails.
    fn record_sync_firing(&self, matched: &[RecordId], sync: &SyncName) -> Result<(), LogError>;

    /// Returns true when the sync has fired for this matched set.
    ///
    /// # Errors
    ///
    /// Returns [`LogError`] when the backend fails.
    fn has_fired(&self, matched: &[RecordId], sync: &SyncName) -> Result<bool, LogError>;

    /// Records provenance edges from every matched completion to a derived
    /// invocation.
    ///
    /// # Errors
    ///
    /// Returns [`LogError`] when the backend fails.
    fn record_sync_edges(
        &self,
        matched: &[RecordId],
        sync: &SyncName,
        invocation: &RecordId,
    ) -> Result<(), LogError>;

    /// Returns the provenance edges rooted at a completion.
    ///
    /// # Errors
    ///
    /// Returns [`LogError`] when the backend fails.
    fn firings_for_completion(&self, completion: &RecordId) -> Result<Vec<SyncEdge>, LogError>;

    /// Exports the flow's records in self-describing wire form, append order.
    ///
    /// # Errors
    ///
    /// Returns [`LogError`] when the backend fails or a record cannot be
    /// serialized.
    fn export_flow(&self, flow: &FlowId) -> Result<Vec<Value>, LogError> {
        let mut out = Vec::new();
        for record in self.records_for_flow(flow)? {
            out.push(record.to_wire().map_err(|err| LogError::Export(err.to_string()))?);
        }
        Ok(out)
    }
}

// ============================================================================
// SECTION: Guard Keys
// ============================================================================

/// Builds the firing-guard key: matched ids sorted and joined.
///
/// Sorting makes the key independent of pattern order.
#[must_use]
pub fn guard_key(matched: &[RecordId]) -> String {
    let mut ids: Vec<&str> = matched.iter().map(RecordId::as_str).collect();
    ids.sort_unstable();
    ids.join("+")
}
