// crates/weft-core/src/runtime/emitter.rs
// ============================================================================
// Module: Weft Then Emitter
// Description: Derived-invocation production from extended bindings.
// Purpose: Resolve then-action fields and stamp provenance metadata.
// Dependencies: crate::core, crate::runtime::events
// ============================================================================

//! ## Overview
//! For each fully extended binding and each then action, the emitter builds
//! one invocation: variable references look values up in the binding, and
//! string literals are scanned for `{{var}}` templates. An unresolved
//! template keeps its literal text and records a diagnostic on the record,
//! so an operator can see the dangling reference in the log instead of
//! losing the invocation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde_json::Value;

use crate::core::ActionRecord;
use crate::core::Binding;
use crate::core::CompiledSync;
use crate::core::EngineClock;
use crate::core::Fields;
use crate::core::RecordId;
use crate::core::ThenValue;
use crate::runtime::events::EngineEvents;

// ============================================================================
// SECTION: Emission
// ============================================================================

/// Produces the invocations for one binding across the sync's then actions.
///
/// Invocations carry the trigger's flow, the firing sync's name, and a
/// timestamp from the engine clock. The parent edge is stamped by the log
/// append.
#[must_use]
pub fn emit_invocations(
    sync: &CompiledSync,
    binding: &Binding,
    trigger: &ActionRecord,
    clock: &dyn EngineClock,
    events: &dyn EngineEvents,
) -> Vec<ActionRecord> {
    let mut invocations = Vec::with_capacity(sync.then.len());
    for action in &sync.then {
        let mut input = Fields::new();
        let mut diagnostics = Vec::new();
        for field in &action.fields {
            let value = match &field.value {
                ThenValue::Variable(name) => match binding.value(name) {
                    Some(value) => value.clone(),
                    None => {
                        diagnostics.push(format!("unbound variable {name} in field {}", field.name));
                        Value::Null
                    }
                },
                ThenValue::Literal(Value::String(text)) => {
                    let before = diagnostics.len();
                    let rendered = render_template(text, binding, &mut diagnostics);
                    if diagnostics.len() > before {
                        events.template_unresolved(&sync.name, &field.name, text);
                    }
                    Value::String(rendered)
                }
                ThenValue::Literal(value) => value.clone(),
            };
            input.insert(field.name.clone(), value);
        }

        let mut invocation = ActionRecord::invocation(
            RecordId::fresh(),
            action.concept.clone(),
            action.action.clone(),
            input,
            trigger.flow.clone(),
        );
        invocation.sync = Some(sync.name.clone());
        invocation.timestamp = clock.now();
        if !diagnostics.is_empty() {
            invocation.diagnostic = Some(diagnostics.join("; "));
        }
        invocations.push(invocation);
    }
    invocations
}

// ============================================================================
// SECTION: Templates
// ============================================================================

/// Renders `{{var}}` markers in a string literal from the binding.
///
/// Unresolved markers are kept verbatim and reported as diagnostics. String
/// values substitute as-is; other values substitute in their JSON form.
fn render_template(text: &str, binding: &Binding, diagnostics: &mut Vec<String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("{{") {
        let (head, tail) = rest.split_at(start);
        out.push_str(head);
        let tail = &tail[2..];
        let Some(end) = tail.find("}}") else {
            out.push_str("{{");
            rest = tail;
            break;
        };
        let (raw_name, remainder) = tail.split_at(end);
        let name = raw_name.trim();
        match binding.value(name) {
            Some(Value::String(value)) => out.push_str(value),
            Some(value) => out.push_str(&value.to_string()),
            None => {
                out.push_str("{{");
                out.push_str(raw_name);
                out.push_str("}}");
                diagnostics.push(format!("unresolved template variable {name}"));
            }
        }
        rest = &remainder[2..];
    }
    out.push_str(rest);
    out
}
