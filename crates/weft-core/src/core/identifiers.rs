// crates/weft-core/src/core/identifiers.rs
// ============================================================================
// Module: Weft Identifiers
// Description: Canonical opaque identifiers for concepts, flows, and records.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde, uuid
// ============================================================================

//! ## Overview
//! This module defines the canonical identifiers used throughout Weft.
//! Identifiers are opaque strings and serialize transparently on the wire.
//! Equality is case-sensitive byte equality. Fresh identifiers are 128-bit
//! UUID v4 values rendered in their canonical hyphenated form.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

// ============================================================================
// SECTION: Concept URI
// ============================================================================

/// Concept identifier (for example `app/users`).
///
/// # Invariants
/// - Opaque UTF-8 string; no normalization or validation is applied by this type.
/// - Equality is case-sensitive byte equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConceptUri(String);

impl ConceptUri {
    /// Creates a new concept URI.
    #[must_use]
    pub fn new(uri: impl Into<String>) -> Self {
        Self(uri.into())
    }

    /// Returns the URI as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the legacy relation hint: the final path segment, lowercased.
    ///
    /// Sync authors should state relations explicitly; this hint exists for
    /// query entries that omit one.
    #[must_use]
    pub fn relation_hint(&self) -> String {
        self.0.rsplit('/').next().unwrap_or(&self.0).to_ascii_lowercase()
    }
}

impl fmt::Display for ConceptUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for ConceptUri {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ConceptUri {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Flow Identifier
// ============================================================================

/// Stable identifier shared by all records causally derived from a single
/// externally initiated action.
///
/// # Invariants
/// - Opaque UTF-8 string; propagates unchanged through derived records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FlowId(String);

impl FlowId {
    /// Creates a new flow identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mints a fresh 128-bit flow identifier.
    #[must_use]
    pub fn fresh() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FlowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for FlowId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for FlowId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Record Identifier
// ============================================================================

/// Identifier for an action record.
///
/// # Invariants
/// - Opaque UTF-8 string; a completion shares the identifier of the
///   invocation it completes.
/// - `(flow, id)` is unique per record kind within one engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    /// Creates a new record identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mints a fresh 128-bit record identifier.
    #[must_use]
    pub fn fresh() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for RecordId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RecordId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Sync Name
// ============================================================================

/// Name of a synchronization rule.
///
/// # Invariants
/// - Opaque UTF-8 string; unique within one installed sync set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SyncName(String);

impl SyncName {
    /// Creates a new sync name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true when the name is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for SyncName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for SyncName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for SyncName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Deployment Identifier
// ============================================================================

/// Identifier issued by the concept registry for a registered deployment.
///
/// # Invariants
/// - Opaque UTF-8 string; fresh per registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeploymentId(String);

impl DeploymentId {
    /// Creates a new deployment identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mints a fresh deployment identifier.
    #[must_use]
    pub fn fresh() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeploymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
