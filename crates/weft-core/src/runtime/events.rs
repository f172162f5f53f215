// crates/weft-core/src/runtime/events.rs
// ============================================================================
// Module: Weft Engine Events
// Description: Observability hooks for sync firing and degradation.
// Purpose: Provide engine event sinks without hard dependencies.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! This module exposes a thin event interface for engine observability. It
//! is intentionally dependency-light so deployments can plug in their own
//! logging or metrics pipeline without redesign. Degradation warnings,
//! guard suppressions, dropped query bindings, and unresolved templates all
//! surface here; the engine itself never writes to any output stream.

// ============================================================================
// SECTION: Imports
// ============================================================================

use crate::core::ConceptUri;
use crate::core::RecordId;
use crate::core::SyncName;

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Event sink for engine observability.
pub trait EngineEvents: Send + Sync {
    /// A sync entered the degraded state because a referenced concept
    /// became unavailable.
    fn sync_degraded(&self, sync: &SyncName, concept: &ConceptUri);

    /// A previously degraded sync returned to the active state.
    fn sync_restored(&self, sync: &SyncName);

    /// A degraded sync was skipped during candidate evaluation.
    fn degraded_sync_skipped(&self, sync: &SyncName);

    /// The firing guard suppressed a repeat firing for a matched set.
    fn firing_suppressed(&self, sync: &SyncName, matched: &[RecordId]);

    /// A where-query dropped a binding because its concept was unreachable.
    fn query_binding_dropped(&self, sync: &SyncName, concept: &ConceptUri);

    /// An emitted invocation kept an unresolved `{{var}}` template.
    fn template_unresolved(&self, sync: &SyncName, field: &str, literal: &str);

    /// A sync firing produced this many invocations.
    fn sync_fired(&self, sync: &SyncName, invocations: usize);
}

/// No-op event sink.
///
/// # Invariants
/// - Events are intentionally discarded.
#[derive(Debug, Default)]
pub struct NoopEvents;

impl EngineEvents for NoopEvents {
    fn sync_degraded(&self, _sync: &SyncName, _concept: &ConceptUri) {}

    fn sync_restored(&self, _sync: &SyncName) {}

    fn degraded_sync_skipped(&self, _sync: &SyncName) {}

    fn firing_suppressed(&self, _sync: &SyncName, _matched: &[RecordId]) {}

    fn query_binding_dropped(&self, _sync: &SyncName, _concept: &ConceptUri) {}

    fn template_unresolved(&self, _sync: &SyncName, _field: &str, _literal: &str) {}

    fn sync_fired(&self, _sync: &SyncName, _invocations: usize) {}
}
