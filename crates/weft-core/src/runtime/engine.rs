// crates/weft-core/src/runtime/engine.rs
// ============================================================================
// Module: Weft Engine Façade
// Description: Completion handling, firing guard, degradation, hot reload.
// Purpose: Orchestrate matching, where evaluation, and emission per firing.
// Dependencies: crate::{core, interfaces, log}, crate::runtime submodules
// ============================================================================

//! ## Overview
//! The engine façade ties the subsystems together. `on_completion` appends
//! the completion, looks up candidate syncs in the captured index, applies
//! the firing guard per binding, evaluates where and then, and appends the
//! derived invocations. The guard edge is recorded *before* where/then
//! evaluation so an asynchronous where clause cannot re-enter the same
//! firing. Index, degraded set, and unavailable set are mutated only under
//! short internal locks, never across a suspension.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::RwLock;

use thiserror::Error;

use crate::core::ActionRecord;
use crate::core::CompiledSync;
use crate::core::ConceptUri;
use crate::core::EngineClock;
use crate::core::RecordId;
use crate::core::RecordKind;
use crate::core::SyncName;
use crate::core::SyncSpec;
use crate::core::SystemClock;
use crate::log::ActionLog;
use crate::log::InMemoryActionLog;
use crate::log::LogError;
use crate::runtime::compiler;
use crate::runtime::compiler::CompileError;
use crate::runtime::emitter::emit_invocations;
use crate::runtime::events::EngineEvents;
use crate::runtime::events::NoopEvents;
use crate::runtime::index::SyncIndex;
use crate::runtime::matcher::match_sync;
use crate::runtime::registry::AvailabilityListener;
use crate::runtime::registry::ConceptRegistry;
use crate::runtime::where_eval::evaluate_where;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default bound on invocations dispatched by one [`Engine::drive`] call.
pub const DEFAULT_DISPATCH_LIMIT: usize = 256;

// ============================================================================
// SECTION: Engine Errors
// ============================================================================

/// Errors surfaced by the engine façade.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Environmental conditions (remote unavailability) never appear here;
///   they degrade instead.
#[derive(Debug, Error)]
pub enum EngineError {
    /// The action log failed; fatal for the current invocation.
    #[error("action log failure: {0}")]
    Log(#[from] LogError),
    /// `on_completion` was handed a record that is not a completion.
    #[error("on_completion requires a completion record")]
    NotACompletion,
}

// ============================================================================
// SECTION: Engine Builder
// ============================================================================

/// Builder for an engine.
///
/// # Invariants
/// - A registry is always attached; log, clock, and events fall back to
///   in-memory and no-op defaults.
pub struct EngineBuilder {
    /// Action log backend.
    log: Option<Arc<dyn ActionLog>>,
    /// Concept registry shared with the deployment.
    registry: Option<Arc<ConceptRegistry>>,
    /// Engine clock.
    clock: Arc<dyn EngineClock>,
    /// Event sink.
    events: Arc<dyn EngineEvents>,
    /// Bound on invocations dispatched by one `drive` call.
    dispatch_limit: usize,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self {
            log: None,
            registry: None,
            clock: Arc::new(SystemClock::new()),
            events: Arc::new(NoopEvents),
            dispatch_limit: DEFAULT_DISPATCH_LIMIT,
        }
    }
}

impl EngineBuilder {
    /// Sets the action log backend.
    #[must_use]
    pub fn log(mut self, log: Arc<dyn ActionLog>) -> Self {
        self.log = Some(log);
        self
    }

    /// Sets the shared concept registry.
    #[must_use]
    pub fn registry(mut self, registry: Arc<ConceptRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Sets the engine clock.
    #[must_use]
    pub fn clock(mut self, clock: Arc<dyn EngineClock>) -> Self {
        self.clock = clock;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn events(mut self, events: Arc<dyn EngineEvents>) -> Self {
        self.events = events;
        self
    }

    /// Sets the bound on invocations dispatched by one `drive` call.
    #[must_use]
    pub const fn dispatch_limit(mut self, limit: usize) -> Self {
        self.dispatch_limit = limit;
        self
    }

    /// Builds the engine and subscribes it to registry availability.
    #[must_use]
    pub fn build(self) -> Engine {
        let registry = self.registry.unwrap_or_default();
        let shared = Arc::new(EngineShared {
            log: self.log.unwrap_or_else(|| Arc::new(InMemoryActionLog::new())),
            registry: Arc::clone(&registry),
            clock: self.clock,
            events: self.events,
            index: RwLock::new(Arc::new(SyncIndex::new())),
            unavailable: Mutex::new(registry.unavailable_snapshot()),
            degraded: Mutex::new(BTreeSet::new()),
            dispatch_limit: self.dispatch_limit,
        });
        registry.subscribe(Arc::clone(&shared) as Arc<dyn AvailabilityListener>);
        Engine {
            shared,
        }
    }
}

// ============================================================================
// SECTION: Engine State
// ============================================================================

/// State shared between engine handles and the registry subscription.
struct EngineShared {
    /// Action log backend.
    log: Arc<dyn ActionLog>,
    /// Concept registry shared with the deployment.
    registry: Arc<ConceptRegistry>,
    /// Engine clock.
    clock: Arc<dyn EngineClock>,
    /// Event sink.
    events: Arc<dyn EngineEvents>,
    /// Current sync index; swapped atomically on reload.
    index: RwLock<Arc<SyncIndex>>,
    /// Concepts known to be unavailable.
    unavailable: Mutex<BTreeSet<ConceptUri>>,
    /// Names of currently degraded syncs.
    degraded: Mutex<BTreeSet<SyncName>>,
    /// Bound on invocations dispatched by one `drive` call.
    dispatch_limit: usize,
}

impl EngineShared {
    /// Returns the current index handle.
    fn current_index(&self) -> Arc<SyncIndex> {
        Arc::clone(&self.index.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Recomputes the degraded set from the unavailable-concept set,
    /// emitting transition events.
    fn recompute_degraded(&self) {
        let index = self.current_index();
        let unavailable = {
            let guard = self.unavailable.lock().unwrap_or_else(PoisonError::into_inner);
            guard.clone()
        };
        let mut next = BTreeSet::new();
        let mut newly_degraded = Vec::new();
        for sync in index.installed() {
            if let Some(concept) =
                sync.referenced_concepts.iter().find(|concept| unavailable.contains(*concept))
            {
                next.insert(sync.name.clone());
                newly_degraded.push((sync.name.clone(), concept.clone()));
            }
        }
        let restored: Vec<SyncName> = {
            let mut degraded = self.degraded.lock().unwrap_or_else(PoisonError::into_inner);
            newly_degraded.retain(|(name, _)| !degraded.contains(name));
            let restored =
                degraded.iter().filter(|name| !next.contains(*name)).cloned().collect();
            *degraded = next;
            restored
        };
        for (name, concept) in &newly_degraded {
            self.events.sync_degraded(name, concept);
        }
        for name in &restored {
            self.events.sync_restored(name);
        }
    }

    /// Returns true when the sync is currently degraded.
    fn is_degraded(&self, sync: &SyncName) -> bool {
        self.degraded.lock().unwrap_or_else(PoisonError::into_inner).contains(sync)
    }
}

impl AvailabilityListener for EngineShared {
    fn availability_changed(&self, uri: &ConceptUri, available: bool) {
        {
            let mut unavailable =
                self.unavailable.lock().unwrap_or_else(PoisonError::into_inner);
            if available {
                unavailable.remove(uri);
            } else {
                unavailable.insert(uri.clone());
            }
        }
        self.recompute_degraded();
    }
}

// ============================================================================
// SECTION: Engine Façade
// ============================================================================

/// Synchronization engine handle.
///
/// Handles are cheap to clone and share one engine state.
#[derive(Clone)]
pub struct Engine {
    /// Shared engine state.
    shared: Arc<EngineShared>,
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine").finish_non_exhaustive()
    }
}

impl Engine {
    /// Returns a builder for an engine.
    #[must_use]
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Replaces the installed sync set atomically.
    ///
    /// In-flight firings finish against the sync set they captured at
    /// entry. The degraded set is cleared and re-evaluated against the
    /// current registry.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError`] without installing anything when any sync
    /// fails validation.
    pub fn reload_syncs(&self, specs: Vec<SyncSpec>) -> Result<(), CompileError> {
        let compiled = compiler::compile_all(specs)?;
        let next = Arc::new(SyncIndex::build(compiled));
        {
            let mut index = self.shared.index.write().unwrap_or_else(PoisonError::into_inner);
            *index = next;
        }
        {
            let mut unavailable =
                self.shared.unavailable.lock().unwrap_or_else(PoisonError::into_inner);
            *unavailable = self.shared.registry.unavailable_snapshot();
        }
        {
            let mut degraded =
                self.shared.degraded.lock().unwrap_or_else(PoisonError::into_inner);
            degraded.clear();
        }
        self.shared.recompute_degraded();
        Ok(())
    }

    /// Returns the installed syncs in install order.
    #[must_use]
    pub fn syncs(&self) -> Vec<Arc<CompiledSync>> {
        self.shared.current_index().installed().to_vec()
    }

    /// Returns the names of currently degraded syncs.
    #[must_use]
    pub fn degraded_syncs(&self) -> BTreeSet<SyncName> {
        self.shared.degraded.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Returns the action log backend.
    #[must_use]
    pub fn log(&self) -> Arc<dyn ActionLog> {
        Arc::clone(&self.shared.log)
    }

    /// Returns the shared concept registry.
    #[must_use]
    pub fn registry(&self) -> Arc<ConceptRegistry> {
        Arc::clone(&self.shared.registry)
    }

    /// Feeds one completion through the engine and returns the derived
    /// invocations, already appended to the log.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] when the record is not a completion or the
    /// log backend fails. Remote unavailability never errors; it degrades.
    pub async fn on_completion(
        &self,
        completion: ActionRecord,
        parent: Option<RecordId>,
    ) -> Result<Vec<ActionRecord>, EngineError> {
        if completion.kind != RecordKind::Completion {
            return Err(EngineError::NotACompletion);
        }
        let mut completion = completion;
        completion.timestamp = self.shared.clock.now();
        let completion = self.shared.log.append_completion(completion, parent)?;

        let index = self.shared.current_index();
        let candidates = index.syncs_for(&completion.concept, &completion.action).to_vec();
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let flow_completions = self.shared.log.completions_for_flow(&completion.flow)?;

        let mut produced = Vec::new();
        for sync in candidates {
            if self.shared.is_degraded(&sync.name) {
                self.shared.events.degraded_sync_skipped(&sync.name);
                continue;
            }
            let invocations = self.fire_sync(&sync, &flow_completions, &completion).await?;
            produced.extend(invocations);
        }
        Ok(produced)
    }

    /// Matches one sync against the flow and fires every guarded binding.
    async fn fire_sync(
        &self,
        sync: &Arc<CompiledSync>,
        flow_completions: &[ActionRecord],
        trigger: &ActionRecord,
    ) -> Result<Vec<ActionRecord>, EngineError> {
        let mut armed = Vec::new();
        for binding in match_sync(sync, flow_completions, trigger) {
            if self.shared.log.has_fired(binding.matched(), &sync.name)? {
                self.shared.events.firing_suppressed(&sync.name, binding.matched());
                continue;
            }
            // Record the guard edge before where/then evaluation so an
            // asynchronous where clause cannot re-enter this firing.
            self.shared.log.record_sync_firing(binding.matched(), &sync.name)?;
            armed.push(binding);
        }
        if armed.is_empty() {
            return Ok(Vec::new());
        }

        let extended =
            evaluate_where(sync, armed, &self.shared.registry, self.shared.events.as_ref())
                .await;

        let mut produced = Vec::new();
        for binding in &extended {
            for invocation in emit_invocations(
                sync,
                binding,
                trigger,
                self.shared.clock.as_ref(),
                self.shared.events.as_ref(),
            ) {
                let record =
                    self.shared.log.append_invocation(invocation, Some(trigger.id.clone()))?;
                self.shared.log.record_sync_edges(binding.matched(), &sync.name, &record.id)?;
                produced.push(record);
            }
        }
        self.shared.events.sync_fired(&sync.name, produced.len());
        Ok(produced)
    }

    /// Feeds a completion through the engine and dispatches the derived
    /// invocations through the registry until the flow quiesces.
    ///
    /// Invocations whose concept cannot be resolved, or whose dispatch
    /// fails, are left pending in the log; dispatch failure is
    /// environmental. At most `dispatch_limit` invocations are dispatched.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] under the same conditions as
    /// [`Engine::on_completion`].
    pub async fn drive(
        &self,
        completion: ActionRecord,
        parent: Option<RecordId>,
    ) -> Result<Vec<ActionRecord>, EngineError> {
        let mut all = Vec::new();
        let mut pending = VecDeque::new();
        for invocation in self.on_completion(completion, parent).await? {
            all.push(invocation.clone());
            pending.push_back(invocation);
        }

        let mut dispatched = 0_usize;
        while let Some(invocation) = pending.pop_front() {
            if dispatched >= self.shared.dispatch_limit {
                break;
            }
            dispatched += 1;
            let Some(transport) = self.shared.registry.resolve(&invocation.concept) else {
                continue;
            };
            let Ok(completion) = transport.invoke(&invocation).await else {
                continue;
            };
            for derived in
                self.on_completion(completion, Some(invocation.id.clone())).await?
            {
                all.push(derived.clone());
                pending.push_back(derived);
            }
        }
        Ok(all)
    }
}
