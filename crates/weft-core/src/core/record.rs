// crates/weft-core/src/core/record.rs
// ============================================================================
// Module: Weft Action Records
// Description: Invocation and completion records and their field payloads.
// Purpose: Define the atomic unit stored in the action log.
// Dependencies: crate::core::{identifiers, time}, serde, serde_json
// ============================================================================

//! ## Overview
//! An action record is the atomic unit in the action log: either the record
//! of a requested action call (invocation) or of its completed outcome
//! (completion). Field payloads are dynamic maps of tagged values; equality
//! over fields is structural. Records never mutate after append.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

use crate::core::identifiers::ConceptUri;
use crate::core::identifiers::FlowId;
use crate::core::identifiers::RecordId;
use crate::core::identifiers::SyncName;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Field Payloads
// ============================================================================

/// Dynamic field payload: field name to tagged value.
///
/// Ordering is deterministic so serialized records are stable.
pub type Fields = BTreeMap<String, Value>;

// ============================================================================
// SECTION: Record Kind
// ============================================================================

/// Kind of an action record.
///
/// # Invariants
/// - Variants are stable for serialization and provenance queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// A requested, not yet completed, action call.
    Invocation,
    /// The completed outcome of an action call.
    Completion,
}

// ============================================================================
// SECTION: Action Record
// ============================================================================

/// Atomic unit in the action log.
///
/// # Invariants
/// - A completion's `id` equals the `id` of the invocation it completes.
/// - `(flow, id)` is unique per kind within one engine.
/// - `variant` and `output` are present only on completions; `sync` only on
///   invocations produced by a sync firing.
/// - Records never mutate after append.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Record identifier.
    pub id: RecordId,
    /// Record kind.
    pub kind: RecordKind,
    /// Concept the action belongs to.
    pub concept: ConceptUri,
    /// Action name.
    pub action: String,
    /// Input payload.
    pub input: Fields,
    /// Completion variant tag (completions only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
    /// Output payload (completions only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<Fields>,
    /// Flow identifier.
    pub flow: FlowId,
    /// Record that caused this one to exist.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent: Option<RecordId>,
    /// Name of the sync that produced this invocation, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync: Option<SyncName>,
    /// Timestamp assigned from the engine clock.
    pub timestamp: Timestamp,
    /// Emission diagnostic, such as an unresolved template reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl ActionRecord {
    /// Creates an invocation record.
    #[must_use]
    pub fn invocation(
        id: RecordId,
        concept: ConceptUri,
        action: impl Into<String>,
        input: Fields,
        flow: FlowId,
    ) -> Self {
        Self {
            id,
            kind: RecordKind::Invocation,
            concept,
            action: action.into(),
            input,
            variant: None,
            output: None,
            flow,
            parent: None,
            sync: None,
            timestamp: Timestamp::Logical(0),
            diagnostic: None,
        }
    }

    /// Creates a completion record.
    ///
    /// The identifier must equal the identifier of the invocation it
    /// completes, when one exists.
    #[must_use]
    pub fn completion(
        id: RecordId,
        concept: ConceptUri,
        action: impl Into<String>,
        input: Fields,
        variant: impl Into<String>,
        output: Fields,
        flow: FlowId,
    ) -> Self {
        Self {
            id,
            kind: RecordKind::Completion,
            concept,
            action: action.into(),
            input,
            variant: Some(variant.into()),
            output: Some(output),
            flow,
            parent: None,
            sync: None,
            timestamp: Timestamp::Logical(0),
            diagnostic: None,
        }
    }

    /// Returns true when the record is a completion.
    #[must_use]
    pub const fn is_completion(&self) -> bool {
        matches!(self.kind, RecordKind::Completion)
    }

    /// Returns an output field value when present.
    #[must_use]
    pub fn output_field(&self, name: &str) -> Option<&Value> {
        self.output.as_ref().and_then(|fields| fields.get(name))
    }

    /// Returns an input field value when present.
    #[must_use]
    pub fn input_field(&self, name: &str) -> Option<&Value> {
        self.input.get(name)
    }

    /// Serializes the record into its self-describing wire form.
    ///
    /// Consumers read fields by name; no ordering is promised beyond the
    /// deterministic map ordering of the payloads.
    ///
    /// # Errors
    ///
    /// Returns a serialization error when the record cannot be encoded.
    pub fn to_wire(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
