// crates/weft-config/src/manifest.rs
// ============================================================================
// Module: Deployment Manifest Model
// Description: Authored manifest types and lowering to core sync specs.
// Purpose: Keep authoring ergonomic while installing only validated specs.
// Dependencies: crate, weft-core, serde, serde_json
// ============================================================================

//! ## Overview
//! Manifest types mirror the core sync model in a TOML-friendly shape:
//! field matches and then-values are small untagged records (`{ var = .. }`,
//! `{ lit = .. }`, `{ any = true }`), where entries are tagged by `kind`.
//! Filter where-entries are code, not data, and have no authored form.
//! `validate` compiles every sync through the core compiler so diagnostics
//! surface before anything is installed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use weft_core::BindExpr;
use weft_core::ConceptUri;
use weft_core::FieldMatch;
use weft_core::FieldPattern;
use weft_core::QueryBinding;
use weft_core::QueryMode;
use weft_core::SyncName;
use weft_core::SyncSpec;
use weft_core::ThenAction;
use weft_core::ThenField;
use weft_core::ThenValue;
use weft_core::WhenPattern;
use weft_core::WhereEntry;
use weft_core::runtime::compile_all;

use crate::ConfigError;

// ============================================================================
// SECTION: Manifest Root
// ============================================================================

/// A deployment manifest: engine settings, concept deployments, and syncs.
///
/// # Invariants
/// - Concept URIs are unique after validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentManifest {
    /// Engine settings.
    #[serde(default)]
    pub engine: EngineSection,
    /// Concept deployments to register.
    #[serde(default)]
    pub concepts: Vec<ConceptEntry>,
    /// Syncs to install.
    #[serde(default)]
    pub syncs: Vec<SyncForm>,
}

impl DeploymentManifest {
    /// Validates the manifest and compiles its sync set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on duplicate or empty concept URIs, or when
    /// any sync fails compilation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut seen = BTreeSet::new();
        for concept in &self.concepts {
            if concept.uri.is_empty() {
                return Err(ConfigError::Validation("concept uri is empty".to_string()));
            }
            if !seen.insert(concept.uri.clone()) {
                return Err(ConfigError::Validation(format!(
                    "duplicate concept uri: {}",
                    concept.uri
                )));
            }
        }
        compile_all(self.sync_specs()?)?;
        Ok(())
    }

    /// Lowers the authored syncs into core sync specs.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] when an authored entry is
    /// internally inconsistent (for example a bind with both a literal and
    /// `fresh_id`).
    pub fn sync_specs(&self) -> Result<Vec<SyncSpec>, ConfigError> {
        self.syncs.iter().map(SyncForm::to_spec).collect()
    }
}

// ============================================================================
// SECTION: Engine Section
// ============================================================================

/// Engine settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSection {
    /// Action log backend.
    #[serde(default)]
    pub log: LogBackend,
    /// Bound on invocations dispatched by one drive call.
    #[serde(default = "default_dispatch_limit")]
    pub dispatch_limit: usize,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            log: LogBackend::default(),
            dispatch_limit: default_dispatch_limit(),
        }
    }
}

/// Default dispatch bound, shared with the engine.
const fn default_dispatch_limit() -> usize {
    weft_core::runtime::DEFAULT_DISPATCH_LIMIT
}

/// Action log backend selection.
///
/// # Invariants
/// - Variants are stable for manifest compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum LogBackend {
    /// In-memory log (single-process engines).
    #[default]
    Memory,
    /// Durable SQLite log (serverless engines).
    Sqlite {
        /// Database file path.
        path: std::path::PathBuf,
    },
}

// ============================================================================
// SECTION: Concept Deployments
// ============================================================================

/// Query dialect declared for a concept deployment.
///
/// # Invariants
/// - Variants mirror [`QueryMode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryModeForm {
    /// Full graph query surface.
    Graphql,
    /// Equality-filtered relation reads.
    #[default]
    Lite,
}

impl From<QueryModeForm> for QueryMode {
    fn from(form: QueryModeForm) -> Self {
        match form {
            QueryModeForm::Graphql => Self::Graphql,
            QueryModeForm::Lite => Self::Lite,
        }
    }
}

/// Transport declaration for a concept deployment.
///
/// # Invariants
/// - Variants are stable for manifest compatibility.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TransportForm {
    /// In-process handler, resolved by name from the host's handler set.
    Local {
        /// Handler name the host resolves at startup.
        handler: String,
    },
    /// Remote concept host over HTTP.
    Http {
        /// Base URL of the concept host.
        base_url: String,
        /// Allow cleartext HTTP (disabled by default).
        #[serde(default)]
        allow_http: bool,
    },
}

/// One concept deployment entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptEntry {
    /// Concept URI.
    pub uri: String,
    /// Transport declaration.
    pub transport: TransportForm,
    /// Declared capability set, confirmed against handler metadata.
    #[serde(default)]
    pub capabilities: Vec<String>,
    /// Declared query dialect.
    #[serde(default)]
    pub query_mode: QueryModeForm,
}

// ============================================================================
// SECTION: Sync Authoring Forms
// ============================================================================

/// Authored field match: `{ var = .. }`, `{ lit = .. }`, or `{ any = true }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MatchForm {
    /// Bind or require equality with a variable.
    Var {
        /// Variable name.
        var: String,
    },
    /// Require exactly this literal.
    Lit {
        /// Literal value.
        lit: Value,
    },
    /// Accept any value.
    Any {
        /// Present for TOML syntax; the value is ignored.
        any: bool,
    },
}

impl From<&MatchForm> for FieldMatch {
    fn from(form: &MatchForm) -> Self {
        match form {
            MatchForm::Var {
                var,
            } => Self::Variable(var.clone()),
            MatchForm::Lit {
                lit,
            } => Self::Literal(lit.clone()),
            MatchForm::Any {
                ..
            } => Self::Wildcard,
        }
    }
}

/// Authored then-field value: `{ var = .. }` or `{ lit = .. }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueForm {
    /// Look the value up in the binding.
    Var {
        /// Variable name.
        var: String,
    },
    /// Use this literal; strings may carry `{{var}}` templates.
    Lit {
        /// Literal value.
        lit: Value,
    },
}

impl From<&ValueForm> for ThenValue {
    fn from(form: &ValueForm) -> Self {
        match form {
            ValueForm::Var {
                var,
            } => Self::Variable(var.clone()),
            ValueForm::Lit {
                lit,
            } => Self::Literal(lit.clone()),
        }
    }
}

/// One authored when pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhenForm {
    /// Concept whose completions the pattern watches.
    pub concept: String,
    /// Action name.
    pub action: String,
    /// Required completion variant; omit to match any.
    #[serde(default)]
    pub variant: Option<String>,
    /// Matches over input fields.
    #[serde(default)]
    pub input: BTreeMap<String, MatchForm>,
    /// Matches over output fields.
    #[serde(default)]
    pub output: BTreeMap<String, MatchForm>,
}

/// One authored bind expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindForm {
    /// Variable name to bind.
    pub name: String,
    /// Bind a fresh identifier instead of a literal.
    #[serde(default)]
    pub fresh_id: bool,
    /// Literal value to bind.
    #[serde(default)]
    pub value: Option<Value>,
}

/// One authored where entry, tagged by `kind`.
///
/// Filter entries are programmatic and have no authored form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WhereForm {
    /// Extend bindings with a computed value.
    Bind(BindForm),
    /// Expand bindings by rows of a concept relation.
    Query {
        /// Concept whose state is queried.
        concept: String,
        /// Relation name; omit to use the legacy URI-derived fallback.
        #[serde(default)]
        relation: Option<String>,
        /// Relation field to sync variable pairings.
        bindings: BTreeMap<String, String>,
    },
}

/// One authored then action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThenForm {
    /// Concept to invoke.
    pub concept: String,
    /// Action name.
    pub action: String,
    /// Invocation input fields.
    #[serde(default)]
    pub fields: BTreeMap<String, ValueForm>,
}

/// One authored sync.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncForm {
    /// Sync name, unique within the manifest.
    pub name: String,
    /// Annotations such as `eager` or `eventual`.
    #[serde(default)]
    pub annotations: Vec<String>,
    /// Trigger patterns.
    #[serde(default)]
    pub when: Vec<WhenForm>,
    /// Where entries.
    #[serde(default, rename = "where")]
    pub where_entries: Vec<WhereForm>,
    /// Derived-invocation templates.
    #[serde(default)]
    pub then: Vec<ThenForm>,
}

impl SyncForm {
    /// Lowers the authored sync into a core sync spec.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] when a bind entry declares both
    /// a literal and `fresh_id`, or neither.
    pub fn to_spec(&self) -> Result<SyncSpec, ConfigError> {
        let when = self
            .when
            .iter()
            .map(|form| WhenPattern {
                concept: ConceptUri::new(&form.concept),
                action: form.action.clone(),
                variant: form.variant.clone(),
                input_fields: field_patterns(&form.input),
                output_fields: field_patterns(&form.output),
            })
            .collect();

        let mut where_entries = Vec::with_capacity(self.where_entries.len());
        for entry in &self.where_entries {
            where_entries.push(match entry {
                WhereForm::Bind(bind) => WhereEntry::Bind {
                    name: bind.name.clone(),
                    expr: bind_expr(&self.name, bind)?,
                },
                WhereForm::Query {
                    concept,
                    relation,
                    bindings,
                } => WhereEntry::Query {
                    concept: ConceptUri::new(concept),
                    relation: relation.clone(),
                    bindings: bindings
                        .iter()
                        .map(|(field, variable)| QueryBinding::new(field, variable))
                        .collect(),
                },
            });
        }

        let then = self
            .then
            .iter()
            .map(|form| ThenAction {
                concept: ConceptUri::new(&form.concept),
                action: form.action.clone(),
                fields: form
                    .fields
                    .iter()
                    .map(|(name, value)| ThenField::new(name, ThenValue::from(value)))
                    .collect(),
            })
            .collect();

        Ok(SyncSpec {
            name: SyncName::new(&self.name),
            annotations: self.annotations.iter().cloned().collect(),
            when,
            where_entries,
            then,
        })
    }
}

/// Lowers a match-form map into field patterns, in field order.
fn field_patterns(forms: &BTreeMap<String, MatchForm>) -> Vec<FieldPattern> {
    forms.iter().map(|(name, form)| FieldPattern::new(name, FieldMatch::from(form))).collect()
}

/// Resolves an authored bind into its closed expression form.
fn bind_expr(sync: &str, bind: &BindForm) -> Result<BindExpr, ConfigError> {
    match (&bind.value, bind.fresh_id) {
        (None, true) => Ok(BindExpr::FreshId),
        (Some(value), false) => Ok(BindExpr::Literal(value.clone())),
        (Some(_), true) => Err(ConfigError::Validation(format!(
            "sync {sync}: bind {} declares both fresh_id and a value",
            bind.name
        ))),
        (None, false) => Err(ConfigError::Validation(format!(
            "sync {sync}: bind {} declares neither fresh_id nor a value",
            bind.name
        ))),
    }
}
