// crates/weft-core/src/runtime/mod.rs
// ============================================================================
// Module: Weft Runtime
// Description: Compiler, index, matcher, registry, evaluation, and engine.
// Purpose: House the firing pipeline around the core data model.
// Dependencies: crate submodules
// ============================================================================

//! ## Overview
//! The runtime drives a completion through the firing pipeline: index
//! lookup, matching, the firing guard, where evaluation, and emission, all
//! orchestrated by the engine façade.

/// Sync validation and normalization.
pub mod compiler;
/// Derived-invocation production.
pub mod emitter;
/// Engine façade and firing guard.
pub mod engine;
/// Engine observability hooks.
pub mod events;
/// Trigger-pattern index.
pub mod index;
/// Binding enumeration.
pub mod matcher;
/// Concept registry and availability tracking.
pub mod registry;
/// Where-entry evaluation.
pub mod where_eval;

pub use compiler::CompileError;
pub use compiler::compile;
pub use compiler::compile_all;
pub use emitter::emit_invocations;
pub use engine::DEFAULT_DISPATCH_LIMIT;
pub use engine::Engine;
pub use engine::EngineBuilder;
pub use engine::EngineError;
pub use events::EngineEvents;
pub use events::NoopEvents;
pub use index::SyncIndex;
pub use matcher::match_sync;
pub use registry::AvailabilityListener;
pub use registry::ConceptRegistry;
pub use registry::DeploymentHandle;
pub use registry::RegistryError;
pub use where_eval::evaluate_where;
