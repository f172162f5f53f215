// crates/weft-core/src/runtime/where_eval.rs
// ============================================================================
// Module: Weft Where Evaluator
// Description: Sequential binding-set expansion over where entries.
// Purpose: Extend bindings with computed values and concept-state rows.
// Dependencies: crate::core, crate::interfaces, crate::runtime::{events, registry}
// ============================================================================

//! ## Overview
//! Where evaluation transforms the binding set entry by entry. Bind entries
//! extend every binding with a computed value; query entries expand bindings
//! by rows read from remote concept state; filter entries prune. Remote
//! failure is environmental, never an error: an unreachable concept or a
//! failed query drops the affected bindings and surfaces as an engine event.
//! Query calls are the engine's suspension points; no engine lock is held
//! across them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;
use uuid::Uuid;

use crate::core::Binding;
use crate::core::BindExpr;
use crate::core::CompiledSync;
use crate::core::ConceptUri;
use crate::core::Fields;
use crate::core::QUERY_KEY_FIELD;
use crate::core::QueryBinding;
use crate::core::WhereEntry;
use crate::interfaces::QueryRequest;
use crate::runtime::events::EngineEvents;
use crate::runtime::registry::ConceptRegistry;

// ============================================================================
// SECTION: Evaluation
// ============================================================================

/// Applies the sync's where entries to a binding set, in order.
pub async fn evaluate_where(
    sync: &CompiledSync,
    bindings: Vec<Binding>,
    registry: &ConceptRegistry,
    events: &dyn EngineEvents,
) -> Vec<Binding> {
    let mut current = bindings;
    for entry in &sync.where_entries {
        if current.is_empty() {
            break;
        }
        current = match entry {
            WhereEntry::Bind {
                name,
                expr,
            } => apply_bind(current, name, expr),
            WhereEntry::Query {
                concept,
                relation,
                bindings: pairings,
            } => {
                apply_query(sync, current, concept, relation.as_deref(), pairings, registry, events)
                    .await
            }
            WhereEntry::Filter {
                predicate,
            } => current.into_iter().filter(|binding| predicate.eval(binding)).collect(),
        };
    }
    current
}

/// Extends every binding with a computed value.
///
/// A binding already holding a different value for the name is dropped,
/// keeping bindings internally consistent.
fn apply_bind(bindings: Vec<Binding>, name: &str, expr: &BindExpr) -> Vec<Binding> {
    bindings
        .into_iter()
        .filter_map(|mut binding| {
            let value = match expr {
                BindExpr::FreshId => Value::String(Uuid::new_v4().to_string()),
                BindExpr::Literal(value) => value.clone(),
            };
            binding.bind(name.to_string(), value).then_some(binding)
        })
        .collect()
}

/// Expands every binding by rows of a concept relation.
async fn apply_query(
    sync: &CompiledSync,
    bindings: Vec<Binding>,
    concept: &ConceptUri,
    relation: Option<&str>,
    pairings: &[QueryBinding],
    registry: &ConceptRegistry,
    events: &dyn EngineEvents,
) -> Vec<Binding> {
    let Some(transport) = registry.resolve(concept) else {
        events.query_binding_dropped(&sync.name, concept);
        return Vec::new();
    };
    let relation = relation.map_or_else(|| concept.relation_hint(), str::to_string);

    let mut next = Vec::new();
    for binding in bindings {
        let args = filter_args(&binding, pairings);
        let request = QueryRequest {
            relation: relation.clone(),
            args,
        };
        let rows = match transport.query(&request).await {
            Ok(rows) => rows,
            Err(_) => {
                events.query_binding_dropped(&sync.name, concept);
                continue;
            }
        };
        extend_with_rows(&binding, pairings, rows, &mut next);
    }
    next
}

/// Builds the equality filters for a query: pairings whose variable is
/// already bound.
fn filter_args(binding: &Binding, pairings: &[QueryBinding]) -> Fields {
    let mut args = Fields::new();
    for pairing in pairings {
        if pairing.field == QUERY_KEY_FIELD {
            continue;
        }
        if let Some(value) = binding.value(&pairing.variable) {
            args.insert(pairing.field.clone(), value.clone());
        }
    }
    args
}

/// Extends one binding by each returned row.
///
/// A row missing a result field, or contradicting an already-bound
/// variable, is discarded.
fn extend_with_rows(
    binding: &Binding,
    pairings: &[QueryBinding],
    rows: Vec<Fields>,
    out: &mut Vec<Binding>,
) {
    'row: for row in rows {
        let mut extended = binding.clone();
        for pairing in pairings {
            match row.get(&pairing.field) {
                Some(value) => {
                    if !extended.bind(pairing.variable.clone(), value.clone()) {
                        continue 'row;
                    }
                }
                None => {
                    if !binding.is_bound(&pairing.variable) {
                        continue 'row;
                    }
                }
            }
        }
        out.push(extended);
    }
}
