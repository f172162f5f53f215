// crates/weft-core/src/runtime/index.rs
// ============================================================================
// Module: Weft Sync Index
// Description: Trigger-pattern index over installed syncs.
// Purpose: Map (concept, action) keys to candidate syncs for a completion.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! The index maps `(concept, action)` keys to the syncs whose `when` clause
//! references them. The engine replaces the whole index atomically on hot
//! reload; in-flight matches keep the `Arc` they captured at entry.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::CompiledSync;
use crate::core::ConceptUri;

// ============================================================================
// SECTION: Sync Index
// ============================================================================

/// Immutable trigger index over one installed sync set.
///
/// # Invariants
/// - Built once from the compiled set; never mutated in place.
/// - A sync watching the same `(concept, action)` through several patterns
///   appears once per key.
#[derive(Debug, Default)]
pub struct SyncIndex {
    /// Candidate syncs keyed by trigger `(concept, action)`.
    by_trigger: BTreeMap<(ConceptUri, String), Vec<Arc<CompiledSync>>>,
    /// The full installed set, in install order.
    installed: Vec<Arc<CompiledSync>>,
}

impl SyncIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the index by scanning each sync's `when` patterns.
    #[must_use]
    pub fn build(syncs: Vec<Arc<CompiledSync>>) -> Self {
        let mut by_trigger: BTreeMap<(ConceptUri, String), Vec<Arc<CompiledSync>>> =
            BTreeMap::new();
        for sync in &syncs {
            for pattern in &sync.when {
                let key = (pattern.concept.clone(), pattern.action.clone());
                let entry = by_trigger.entry(key).or_default();
                if !entry.iter().any(|candidate| candidate.name == sync.name) {
                    entry.push(Arc::clone(sync));
                }
            }
        }
        Self {
            by_trigger,
            installed: syncs,
        }
    }

    /// Returns the candidate syncs for a completion key.
    #[must_use]
    pub fn syncs_for(&self, concept: &ConceptUri, action: &str) -> &[Arc<CompiledSync>] {
        self.by_trigger
            .get(&(concept.clone(), action.to_string()))
            .map_or(&[], Vec::as_slice)
    }

    /// Returns the full installed set in install order.
    #[must_use]
    pub fn installed(&self) -> &[Arc<CompiledSync>] {
        &self.installed
    }

    /// Returns the number of installed syncs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.installed.len()
    }

    /// Returns true when no syncs are installed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.installed.is_empty()
    }
}
