// crates/weft-core/src/lib.rs
// ============================================================================
// Module: Weft Core
// Description: Synchronization engine for concept-oriented deployments.
// Purpose: Index syncs, match completions, evaluate where clauses, emit
// derived invocations, and keep the provenance action log.
// Dependencies: async-trait, serde, serde_json, thiserror, time, uuid
// ============================================================================

//! ## Overview
//! Weft runs the synchronization layer of a concept-oriented deployment.
//! Concepts expose typed actions and state behind transports; syncs are
//! `when / where / then` rules chaining observed completions into derived
//! invocations. This crate holds the engine core: the data model, the
//! append-only action log, the concept registry, the sync compiler and
//! index, the matcher, the where evaluator, the then emitter, and the
//! engine façade with its firing guard, degradation tracking, and hot
//! reload.
//!
//! Correctness errors propagate; environmental conditions (an unreachable
//! concept, a failed or timed-out query) degrade gracefully and stay
//! observable through the degraded sync set, the action log, and the
//! engine event sink.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Core data model: identifiers, time, records, syncs.
pub mod core;
/// Contract surfaces between the engine and concept hosts.
pub mod interfaces;
/// Append-only provenance log.
pub mod log;
/// Firing pipeline and engine façade.
pub mod runtime;

// ============================================================================
// SECTION: Re-exports
// ============================================================================

pub use crate::core::ActionRecord;
pub use crate::core::Binding;
pub use crate::core::BindExpr;
pub use crate::core::BindingPredicate;
pub use crate::core::CompiledSync;
pub use crate::core::ConceptUri;
pub use crate::core::DeploymentId;
pub use crate::core::EngineClock;
pub use crate::core::FieldMatch;
pub use crate::core::FieldPattern;
pub use crate::core::Fields;
pub use crate::core::FilterPredicate;
pub use crate::core::FlowId;
pub use crate::core::LogicalClock;
pub use crate::core::QUERY_KEY_FIELD;
pub use crate::core::QueryBinding;
pub use crate::core::RecordId;
pub use crate::core::RecordKind;
pub use crate::core::SyncName;
pub use crate::core::SyncSpec;
pub use crate::core::SystemClock;
pub use crate::core::ThenAction;
pub use crate::core::ThenField;
pub use crate::core::ThenValue;
pub use crate::core::Timestamp;
pub use crate::core::WhenPattern;
pub use crate::core::WhereEntry;
pub use crate::interfaces::ConceptMetadata;
pub use crate::interfaces::ConceptTransport;
pub use crate::interfaces::HealthStatus;
pub use crate::interfaces::QueryMode;
pub use crate::interfaces::QueryRequest;
pub use crate::interfaces::TransportError;
pub use crate::log::ActionLog;
pub use crate::log::InMemoryActionLog;
pub use crate::log::LogError;
pub use crate::log::SyncEdge;
pub use crate::runtime::CompileError;
pub use crate::runtime::ConceptRegistry;
pub use crate::runtime::DeploymentHandle;
pub use crate::runtime::Engine;
pub use crate::runtime::EngineBuilder;
pub use crate::runtime::EngineError;
pub use crate::runtime::EngineEvents;
pub use crate::runtime::NoopEvents;
pub use crate::runtime::RegistryError;
pub use crate::runtime::SyncIndex;
