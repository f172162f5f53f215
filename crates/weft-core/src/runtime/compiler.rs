// crates/weft-core/src/runtime/compiler.rs
// ============================================================================
// Module: Weft Sync Compiler
// Description: Validation and normalization of parsed syncs.
// Purpose: Reject malformed syncs before install; compute compiled form.
// Dependencies: crate::core, thiserror
// ============================================================================

//! ## Overview
//! The compiler checks variable flow and structural completeness of a parsed
//! sync and produces the normalized [`CompiledSync`] form. Unbound variable
//! references are hard diagnostics, never warnings; unused bindings are
//! silently permitted. Installation is all-or-nothing: one bad sync rejects
//! the whole set.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;

use crate::core::CompiledSync;
use crate::core::ConceptUri;
use crate::core::FieldMatch;
use crate::core::SyncName;
use crate::core::SyncSpec;
use crate::core::ThenValue;
use crate::core::WhenPattern;
use crate::core::WhereEntry;

// ============================================================================
// SECTION: Compile Errors
// ============================================================================

/// Sync validation diagnostics.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - Any diagnostic aborts the install of the whole sync set.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CompileError {
    /// The sync has no name.
    #[error("sync name is empty")]
    EmptyName,
    /// The sync has an empty `when` clause.
    #[error("sync {sync}: when clause is empty")]
    EmptyWhen {
        /// Offending sync.
        sync: SyncName,
    },
    /// The sync has an empty `then` clause.
    #[error("sync {sync}: then clause is empty")]
    EmptyThen {
        /// Offending sync.
        sync: SyncName,
    },
    /// A `then` field references a variable no entry binds.
    #[error("sync {sync}: unbound variable {variable} referenced by then {concept}/{action}")]
    UnboundVariable {
        /// Offending sync.
        sync: SyncName,
        /// Unbound variable name.
        variable: String,
        /// Target concept of the referencing action.
        concept: ConceptUri,
        /// Target action of the referencing field.
        action: String,
    },
    /// Two syncs in one install share a name.
    #[error("duplicate sync name: {sync}")]
    DuplicateName {
        /// Duplicated sync name.
        sync: SyncName,
    },
}

// ============================================================================
// SECTION: Compilation
// ============================================================================

/// Compiles one parsed sync into its normalized form.
///
/// # Errors
///
/// Returns [`CompileError`] when the sync is structurally incomplete or
/// references an unbound variable.
pub fn compile(spec: SyncSpec) -> Result<CompiledSync, CompileError> {
    if spec.name.is_empty() {
        return Err(CompileError::EmptyName);
    }
    if spec.when.is_empty() {
        return Err(CompileError::EmptyWhen {
            sync: spec.name,
        });
    }
    if spec.then.is_empty() {
        return Err(CompileError::EmptyThen {
            sync: spec.name,
        });
    }

    let bound_variables = bound_variables(&spec);
    for action in &spec.then {
        for field in &action.fields {
            if let ThenValue::Variable(variable) = &field.value
                && !bound_variables.contains(variable)
            {
                return Err(CompileError::UnboundVariable {
                    sync: spec.name.clone(),
                    variable: variable.clone(),
                    concept: action.concept.clone(),
                    action: action.action.clone(),
                });
            }
        }
    }

    let referenced_concepts = referenced_concepts(&spec);
    Ok(CompiledSync {
        name: spec.name,
        annotations: spec.annotations,
        when: spec.when,
        where_entries: spec.where_entries,
        then: spec.then,
        bound_variables,
        referenced_concepts,
    })
}

/// Compiles a whole sync set with no partial install.
///
/// # Errors
///
/// Returns the first [`CompileError`], including duplicate names across the
/// set.
pub fn compile_all(specs: Vec<SyncSpec>) -> Result<Vec<Arc<CompiledSync>>, CompileError> {
    let mut seen = BTreeSet::new();
    let mut compiled = Vec::with_capacity(specs.len());
    for spec in specs {
        let sync = compile(spec)?;
        if !seen.insert(sync.name.clone()) {
            return Err(CompileError::DuplicateName {
                sync: sync.name,
            });
        }
        compiled.push(Arc::new(sync));
    }
    Ok(compiled)
}

// ============================================================================
// SECTION: Variable Flow
// ============================================================================

/// Collects the set of variables the sync binds: `when` pattern variables,
/// `bind` names, and query-binding variables.
fn bound_variables(spec: &SyncSpec) -> BTreeSet<String> {
    let mut bound = BTreeSet::new();
    for pattern in &spec.when {
        collect_pattern_variables(pattern, &mut bound);
    }
    for entry in &spec.where_entries {
        match entry {
            WhereEntry::Bind {
                name, ..
            } => {
                bound.insert(name.clone());
            }
            WhereEntry::Query {
                bindings, ..
            } => {
                for binding in bindings {
                    bound.insert(binding.variable.clone());
                }
            }
            WhereEntry::Filter {
                ..
            } => {}
        }
    }
    bound
}

/// Collects variables from one pattern's input and output fields.
fn collect_pattern_variables(pattern: &WhenPattern, bound: &mut BTreeSet<String>) {
    for field in pattern.input_fields.iter().chain(pattern.output_fields.iter()) {
        if let FieldMatch::Variable(name) = &field.value {
            bound.insert(name.clone());
        }
    }
}

/// Collects every concept the sync references, for degradation tracking.
fn referenced_concepts(spec: &SyncSpec) -> BTreeSet<ConceptUri> {
    let mut concepts = BTreeSet::new();
    for pattern in &spec.when {
        concepts.insert(pattern.concept.clone());
    }
    for entry in &spec.where_entries {
        if let WhereEntry::Query {
            concept, ..
        } = entry
        {
            concepts.insert(concept.clone());
        }
    }
    for action in &spec.then {
        concepts.insert(action.concept.clone());
    }
    concepts
}
