// crates/weft-core/src/log/memory.rs
// ============================================================================
// Module: In-Memory Action Log
// Description: Default log backend for single-process engines.
// Purpose: Append-only records and sync edges with no durable backend.
// Dependencies: crate::core, crate::log
// ============================================================================

//! ## Overview
//! The in-memory log never fails on append and keeps both edge indices in
//! process memory. Mutations take a short internal lock; the lock is the
//! linearization point for records within one engine and is never held
//! across a suspension.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Mutex;
use std::sync::PoisonError;

use crate::core::ActionRecord;
use crate::core::FlowId;
use crate::core::RecordId;
use crate::core::RecordKind;
use crate::core::SyncName;
use crate::log::ActionLog;
use crate::log::LogError;
use crate::log::SyncEdge;
use crate::log::guard_key;

// ============================================================================
// SECTION: Log State
// ============================================================================

/// Mutable log state behind the lock.
#[derive(Debug, Default)]
struct LogState {
    /// Records per flow, in append order.
    flows: BTreeMap<FlowId, Vec<ActionRecord>>,
    /// Occupied `(flow, id, kind)` slots for uniqueness checks.
    occupied: BTreeSet<(FlowId, RecordId, RecordKind)>,
    /// Firing-guard index: sorted matched-id key to sync names.
    fired: BTreeMap<String, BTreeSet<SyncName>>,
    /// Provenance index: completion id to firing edges.
    provenance: BTreeMap<RecordId, BTreeSet<SyncEdge>>,
}

/// In-memory action log.
///
/// # Invariants
/// - Append order per flow is the observation order of the engine.
/// - Uniqueness of `(flow, id)` is enforced per record kind.
#[derive(Debug, Default)]
pub struct InMemoryActionLog {
    /// Log state; the lock is held only for short, synchronous sections.
    state: Mutex<LogState>,
}

impl InMemoryActionLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a record after kind and uniqueness checks.
    ///
    /// Duplicate completions are returned as stored; duplicate invocations
    /// are rejected.
    fn append(
        &self,
        mut record: ActionRecord,
        parent: Option<RecordId>,
        expected: RecordKind,
        expected_label: &'static str,
    ) -> Result<ActionRecord, LogError> {
        if record.kind != expected {
            return Err(LogError::KindMismatch {
                expected: expected_label,
            });
        }
        record.parent = parent;
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = (record.flow.clone(), record.id.clone(), record.kind);
        if !state.occupied.insert(slot) {
            if record.kind == RecordKind::Completion
                && let Some(stored) = state.flows.get(&record.flow).and_then(|records| {
                    records
                        .iter()
                        .find(|stored| stored.id == record.id && stored.kind == record.kind)
                })
            {
                return Ok(stored.clone());
            }
            return Err(LogError::DuplicateRecord {
                flow: record.flow.clone(),
                id: record.id.clone(),
            });
        }
        state.flows.entry(record.flow.clone()).or_default().push(record.clone());
        Ok(record)
    }
}

impl ActionLog for InMemoryActionLog {
    fn append_completion(
        &self,
        completion: ActionRecord,
        parent: Option<RecordId>,
    ) -> Result<ActionRecord, LogError> {
        self.append(completion, parent, RecordKind::Completion, "completion")
    }

    fn append_invocation(
        &self,
        invocation: ActionRecord,
        parent: Option<RecordId>,
    ) -> Result<ActionRecord, LogError> {
        self.append(invocation, parent, RecordKind::Invocation, "invocation")
    }

    fn completions_for_flow(&self, flow: &FlowId) -> Result<Vec<ActionRecord>, LogError> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(state
            .flows
            .get(flow)
            .map(|records| {
                records.iter().filter(|record| record.is_completion()).cloned().collect()
            })
            .unwrap_or_default())
    }

    fn records_for_flow(&self, flow: &FlowId) -> Result<Vec<ActionRecord>, LogError> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(state.flows.get(flow).cloned().unwrap_or_default())
    }

    fn record_sync_firing(&self, matched: &[RecordId], sync: &SyncName) -> Result<(), LogError> {
        let key = guard_key(matched);
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.fired.entry(key).or_default().insert(sync.clone());
        Ok(())
    }

    fn has_fired(&self, matched: &[RecordId], sync: &SyncName) -> Result<bool, LogError> {
        let key = guard_key(matched);
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(state.fired.get(&key).is_some_and(|names| names.contains(sync)))
    }

    fn record_sync_edges(
        &self,
        matched: &[RecordId],
        sync: &SyncName,
        invocation: &RecordId,
    ) -> Result<(), LogError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        for completion in matched {
            state.provenance.entry(completion.clone()).or_default().insert(SyncEdge {
                sync: sync.clone(),
                invocation: invocation.clone(),
            });
        }
        Ok(())
    }

    fn firings_for_completion(&self, completion: &RecordId) -> Result<Vec<SyncEdge>, LogError> {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(state
            .provenance
            .get(completion)
            .map(|edges| edges.iter().cloned().collect())
            .unwrap_or_default())
    }
}
