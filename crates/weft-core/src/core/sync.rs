// crates/weft-core/src/core/sync.rs
// ============================================================================
// Module: Weft Sync Model
// Description: Parsed and compiled synchronization rules and bindings.
// Purpose: Define the when/where/then structures consumed by the engine.
// Dependencies: crate::core::{identifiers, record}, serde_json
// ============================================================================

//! ## Overview
//! A sync is a `when / where / then` rule: `when` patterns select completions,
//! `where` entries expand candidate bindings, and `then` actions produce
//! derived invocations. The engine accepts already-parsed [`SyncSpec`] values
//! and installs only their validated, normalized [`CompiledSync`] form.
//! Compiled syncs are immutable and shared by reference between the index and
//! any in-flight match.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::core::identifiers::ConceptUri;
use crate::core::identifiers::RecordId;
use crate::core::identifiers::SyncName;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Reserved query-binding field naming the row key of the target relation.
pub const QUERY_KEY_FIELD: &str = "__key";

// ============================================================================
// SECTION: When Patterns
// ============================================================================

/// Match form for a single pattern field.
///
/// # Invariants
/// - `Literal` comparison is structural equality over tagged values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldMatch {
    /// Accept any value, including an absent field.
    Wildcard,
    /// Accept exactly this value.
    Literal(Value),
    /// Bind the field value to a variable, or require equality with an
    /// earlier binding of the same variable.
    Variable(String),
}

/// A named field with its match form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPattern {
    /// Field name in the completion payload.
    pub name: String,
    /// Match form applied to the field value.
    pub value: FieldMatch,
}

impl FieldPattern {
    /// Creates a field pattern.
    #[must_use]
    pub fn new(name: impl Into<String>, value: FieldMatch) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// One `when` pattern: a completion selector for a concept action.
///
/// # Invariants
/// - `variant` of `None` matches any completion variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WhenPattern {
    /// Concept whose completions this pattern watches.
    pub concept: ConceptUri,
    /// Action name within the concept.
    pub action: String,
    /// Completion variant tag this pattern requires, when set.
    pub variant: Option<String>,
    /// Match forms over the completion input payload.
    pub input_fields: Vec<FieldPattern>,
    /// Match forms over the completion output payload.
    pub output_fields: Vec<FieldPattern>,
}

// ============================================================================
// SECTION: Where Entries
// ============================================================================

/// Expression form for a `bind` where-entry.
///
/// The set of expressions is closed: richer expression evaluation is an
/// extension point, and unknown forms are unrepresentable rather than
/// interpreted as literal text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BindExpr {
    /// Bind a fresh 128-bit identifier.
    FreshId,
    /// Bind this literal value.
    Literal(Value),
}

/// One variable-to-field pairing in a query where-entry.
///
/// # Invariants
/// - A `field` of [`QUERY_KEY_FIELD`] names the row key of the relation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryBinding {
    /// Relation field name.
    pub field: String,
    /// Sync variable name.
    pub variable: String,
}

impl QueryBinding {
    /// Creates a query binding.
    #[must_use]
    pub fn new(field: impl Into<String>, variable: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            variable: variable.into(),
        }
    }
}

/// Predicate evaluated over a candidate binding by a filter where-entry.
pub trait BindingPredicate: Send + Sync {
    /// Returns true when the binding should be kept.
    fn eval(&self, binding: &Binding) -> bool;
}

impl<F> BindingPredicate for F
where
    F: Fn(&Binding) -> bool + Send + Sync,
{
    fn eval(&self, binding: &Binding) -> bool {
        self(binding)
    }
}

/// Shared handle to a filter predicate.
///
/// # Invariants
/// - Predicates are pure with respect to engine state; they observe only the
///   binding handed to them.
#[derive(Clone)]
pub struct FilterPredicate(Arc<dyn BindingPredicate>);

impl FilterPredicate {
    /// Wraps a predicate.
    #[must_use]
    pub fn new(predicate: impl BindingPredicate + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    /// Evaluates the predicate over a binding.
    #[must_use]
    pub fn eval(&self, binding: &Binding) -> bool {
        self.0.eval(binding)
    }
}

impl fmt::Debug for FilterPredicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("FilterPredicate(..)")
    }
}

/// One `where` entry, applied sequentially to the binding set.
#[derive(Debug, Clone)]
pub enum WhereEntry {
    /// Extend every binding with a computed value.
    Bind {
        /// Variable name to bind.
        name: String,
        /// Expression producing the value.
        expr: BindExpr,
    },
    /// Expand every binding by rows of a concept relation.
    Query {
        /// Concept whose state is queried.
        concept: ConceptUri,
        /// Relation name; `None` engages the legacy URI-derived fallback.
        relation: Option<String>,
        /// Variable-to-field pairings.
        bindings: Vec<QueryBinding>,
    },
    /// Keep only bindings satisfying the predicate.
    Filter {
        /// Predicate over the candidate binding.
        predicate: FilterPredicate,
    },
}

// ============================================================================
// SECTION: Then Actions
// ============================================================================

/// Value form for a `then` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThenValue {
    /// Look the value up in the binding.
    Variable(String),
    /// Use this literal; string literals may carry `{{var}}` templates.
    Literal(Value),
}

/// A named field of a derived invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThenField {
    /// Field name in the invocation input.
    pub name: String,
    /// Value form resolved against the binding.
    pub value: ThenValue,
}

impl ThenField {
    /// Creates a then field.
    #[must_use]
    pub fn new(name: impl Into<String>, value: ThenValue) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// One `then` action: a derived invocation template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThenAction {
    /// Concept to invoke.
    pub concept: ConceptUri,
    /// Action name within the concept.
    pub action: String,
    /// Input fields of the derived invocation.
    pub fields: Vec<ThenField>,
}

// ============================================================================
// SECTION: Sync Spec
// ============================================================================

/// A parsed synchronization rule, prior to compilation.
///
/// # Invariants
/// - Parsing sync source text is out of scope; specs arrive already parsed.
#[derive(Debug, Clone)]
pub struct SyncSpec {
    /// Unique sync name.
    pub name: SyncName,
    /// Annotations such as `eager` or `eventual`.
    pub annotations: BTreeSet<String>,
    /// Ordered trigger patterns.
    pub when: Vec<WhenPattern>,
    /// Ordered binding-set transformations.
    pub where_entries: Vec<WhereEntry>,
    /// Ordered derived-invocation templates.
    pub then: Vec<ThenAction>,
}

// ============================================================================
// SECTION: Compiled Sync
// ============================================================================

/// A validated sync in normalized internal form.
///
/// # Invariants
/// - Immutable once installed; shared by reference (`Arc`).
/// - `bound_variables` covers every variable referenced by `then`.
/// - `referenced_concepts` covers `when`, query, and `then` concepts.
#[derive(Debug, Clone)]
pub struct CompiledSync {
    /// Unique sync name.
    pub name: SyncName,
    /// Annotations such as `eager` or `eventual`.
    pub annotations: BTreeSet<String>,
    /// Ordered trigger patterns.
    pub when: Vec<WhenPattern>,
    /// Ordered binding-set transformations.
    pub where_entries: Vec<WhereEntry>,
    /// Ordered derived-invocation templates.
    pub then: Vec<ThenAction>,
    /// Variables bound by `when`, `bind`, and query entries.
    pub bound_variables: BTreeSet<String>,
    /// Concepts this sync references, for degradation tracking.
    pub referenced_concepts: BTreeSet<ConceptUri>,
}

impl CompiledSync {
    /// Returns true when the sync carries the annotation.
    #[must_use]
    pub fn has_annotation(&self, annotation: &str) -> bool {
        self.annotations.contains(annotation)
    }
}

// ============================================================================
// SECTION: Binding
// ============================================================================

/// A mapping from variable names to values, carrying the matched completion
/// identifiers of the firing it belongs to.
///
/// # Invariants
/// - `matched` lists completion ids in pattern order.
/// - A variable, once bound, never changes value within the binding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Binding {
    /// Bound variable values.
    values: BTreeMap<String, Value>,
    /// Matched completion identifiers in pattern order.
    matched: Vec<RecordId>,
}

impl Binding {
    /// Creates an empty binding.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value bound to a variable, when present.
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Returns true when the variable is bound.
    #[must_use]
    pub fn is_bound(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Binds a variable.
    ///
    /// Returns false and leaves the binding unchanged when the variable is
    /// already bound to a different value.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) -> bool {
        let name = name.into();
        match self.values.get(&name) {
            Some(existing) => *existing == value,
            None => {
                self.values.insert(name, value);
                true
            }
        }
    }

    /// Returns the bound variables in deterministic order.
    #[must_use]
    pub fn values(&self) -> &BTreeMap<String, Value> {
        &self.values
    }

    /// Appends a matched completion identifier.
    pub fn push_matched(&mut self, id: RecordId) {
        self.matched.push(id);
    }

    /// Returns the matched completion identifiers in pattern order.
    #[must_use]
    pub fn matched(&self) -> &[RecordId] {
        &self.matched
    }

    /// Returns the matched identifiers sorted, the firing-guard key form.
    #[must_use]
    pub fn sorted_matched(&self) -> Vec<RecordId> {
        let mut ids = self.matched.clone();
        ids.sort();
        ids
    }
}
