// crates/weft-core/src/runtime/matcher.rs
// ============================================================================
// Module: Weft Matcher
// Description: Binding enumeration over a flow's completion history.
// Purpose: Find every consistent assignment of completions to when patterns.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! The matcher is pure and synchronous. For a triggering completion it
//! enumerates the Cartesian product of per-pattern candidate completions,
//! keeps only combinations that include the trigger, unifies pattern fields
//! into one consistent binding per combination, and deduplicates results by
//! their sorted matched-id tuple. Bindings are independent firings with no
//! user-visible ordering between them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use serde_json::Value;

use crate::core::ActionRecord;
use crate::core::Binding;
use crate::core::CompiledSync;
use crate::core::FieldMatch;
use crate::core::FieldPattern;
use crate::core::RecordId;
use crate::core::WhenPattern;

// ============================================================================
// SECTION: Matching
// ============================================================================

/// Enumerates every consistent binding of the sync's `when` patterns over
/// the flow's completions, restricted to combinations that include the
/// triggering completion.
#[must_use]
pub fn match_sync(
    sync: &CompiledSync,
    flow_completions: &[ActionRecord],
    trigger: &ActionRecord,
) -> Vec<Binding> {
    let candidates: Vec<Vec<&ActionRecord>> = sync
        .when
        .iter()
        .map(|pattern| pattern_candidates(pattern, flow_completions))
        .collect();
    if candidates.iter().any(Vec::is_empty) {
        return Vec::new();
    }

    let mut seen: BTreeSet<Vec<RecordId>> = BTreeSet::new();
    let mut bindings = Vec::new();
    let mut indices = vec![0_usize; candidates.len()];
    loop {
        let combination: Vec<&ActionRecord> = indices
            .iter()
            .zip(candidates.iter())
            .filter_map(|(slot, list)| list.get(*slot).copied())
            .collect();
        if combination.len() == indices.len()
            && combination.iter().any(|record| record.id == trigger.id)
            && let Some(binding) = unify(&sync.when, &combination)
            && seen.insert(binding.sorted_matched())
        {
            bindings.push(binding);
        }
        if !advance(&mut indices, &candidates) {
            break;
        }
    }
    bindings
}

/// Collects the completions matching one pattern's `(concept, action)` key
/// and variant requirement, in flow order.
fn pattern_candidates<'flow>(
    pattern: &WhenPattern,
    flow_completions: &'flow [ActionRecord],
) -> Vec<&'flow ActionRecord> {
    flow_completions
        .iter()
        .filter(|record| {
            record.is_completion()
                && record.concept == pattern.concept
                && record.action == pattern.action
                && pattern
                    .variant
                    .as_ref()
                    .is_none_or(|variant| record.variant.as_ref() == Some(variant))
        })
        .collect()
}

/// Advances the odometer over candidate lists; false when exhausted.
fn advance(indices: &mut [usize], candidates: &[Vec<&ActionRecord>]) -> bool {
    for (slot, list) in indices.iter_mut().zip(candidates.iter()).rev() {
        *slot += 1;
        if *slot < list.len() {
            return true;
        }
        *slot = 0;
    }
    false
}

/// Attempts to build one consistent binding from an assignment of
/// completions to patterns.
fn unify(patterns: &[WhenPattern], combination: &[&ActionRecord]) -> Option<Binding> {
    let mut binding = Binding::new();
    for (pattern, completion) in patterns.iter().zip(combination.iter()) {
        for field in &pattern.input_fields {
            unify_field(&mut binding, field, completion.input_field(&field.name))?;
        }
        for field in &pattern.output_fields {
            unify_field(&mut binding, field, completion.output_field(&field.name))?;
        }
    }
    for completion in combination {
        binding.push_matched(completion.id.clone());
    }
    Some(binding)
}

/// Unifies one field against its match form.
///
/// An absent field is a match failure for literal and variable patterns.
fn unify_field(
    binding: &mut Binding,
    pattern: &FieldPattern,
    value: Option<&Value>,
) -> Option<()> {
    match &pattern.value {
        FieldMatch::Wildcard => Some(()),
        FieldMatch::Literal(expected) => {
            if value == Some(expected) {
                Some(())
            } else {
                None
            }
        }
        FieldMatch::Variable(name) => {
            let value = value?;
            if binding.bind(name.clone(), value.clone()) {
                Some(())
            } else {
                None
            }
        }
    }
}
