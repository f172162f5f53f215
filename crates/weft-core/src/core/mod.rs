// crates/weft-core/src/core/mod.rs
// ============================================================================
// Module: Weft Core Data Model
// Description: Identifiers, time, records, and sync structures.
// Purpose: Re-export the canonical data model used across the engine.
// Dependencies: crate submodules
// ============================================================================

//! ## Overview
//! The core data model: opaque identifiers, the timestamp model, action
//! records, and the parsed/compiled sync structures.

/// Canonical opaque identifiers.
pub mod identifiers;
/// Action records and field payloads.
pub mod record;
/// Parsed and compiled sync structures.
pub mod sync;
/// Timestamps and engine clocks.
pub mod time;

pub use identifiers::ConceptUri;
pub use identifiers::DeploymentId;
pub use identifiers::FlowId;
pub use identifiers::RecordId;
pub use identifiers::SyncName;
pub use record::ActionRecord;
pub use record::Fields;
pub use record::RecordKind;
pub use sync::Binding;
pub use sync::BindExpr;
pub use sync::BindingPredicate;
pub use sync::CompiledSync;
pub use sync::FieldMatch;
pub use sync::FieldPattern;
pub use sync::FilterPredicate;
pub use sync::QUERY_KEY_FIELD;
pub use sync::QueryBinding;
pub use sync::SyncSpec;
pub use sync::ThenAction;
pub use sync::ThenField;
pub use sync::ThenValue;
pub use sync::WhenPattern;
pub use sync::WhereEntry;
pub use time::EngineClock;
pub use time::LogicalClock;
pub use time::SystemClock;
pub use time::Timestamp;
