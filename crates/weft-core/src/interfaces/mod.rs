// crates/weft-core/src/interfaces/mod.rs
// ============================================================================
// Module: Weft Interfaces
// Description: Transport-agnostic interfaces for concept dispatch and queries.
// Purpose: Define the contract surfaces between the engine and concept hosts.
// Dependencies: crate::core, async-trait, serde, thiserror
// ============================================================================

//! ## Overview
//! A concept is reached through a transport: an object-safe async dispatcher
//! exposing `invoke`, `query`, and `health`. Transports are owned by the
//! registry and must be safe to call concurrently from multiple firings.
//! Implementations fail closed: a transport that cannot answer reports an
//! error rather than fabricating a result.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::ActionRecord;
use crate::core::Fields;

// ============================================================================
// SECTION: Query Mode
// ============================================================================

/// Query dialect advertised by a concept deployment, for routing decisions.
///
/// # Invariants
/// - Variants are stable for serialization and manifest matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryMode {
    /// Full graph query surface.
    Graphql,
    /// Equality-filtered relation reads.
    Lite,
}

// ============================================================================
// SECTION: Query Request
// ============================================================================

/// Concept-state query request.
///
/// # Invariants
/// - `args` semantics are AND over field equality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    /// Relation to read.
    pub relation: String,
    /// Equality filters over relation fields.
    pub args: Fields,
}

// ============================================================================
// SECTION: Health
// ============================================================================

/// Best-effort health report from a transport probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Whether the concept is reachable and serving.
    pub available: bool,
    /// Probe latency in milliseconds, when measured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl HealthStatus {
    /// Returns a healthy status without a latency measurement.
    #[must_use]
    pub const fn up() -> Self {
        Self {
            available: true,
            latency_ms: None,
        }
    }

    /// Returns an unhealthy status.
    #[must_use]
    pub const fn down() -> Self {
        Self {
            available: false,
            latency_ms: None,
        }
    }
}

// ============================================================================
// SECTION: Concept Metadata
// ============================================================================

/// Descriptor advertised by a concept handler at install time.
///
/// The registry uses it to confirm that a deployment's declared capabilities
/// match what the handler actually provides.
///
/// # Invariants
/// - `capabilities` is the complete capability set of the handler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptMetadata {
    /// Concept name as the handler knows itself.
    pub name: String,
    /// Input payload kind descriptor.
    pub input_kind: String,
    /// Output payload kind descriptor.
    pub output_kind: String,
    /// Capabilities the handler provides.
    pub capabilities: BTreeSet<String>,
}

// ============================================================================
// SECTION: Transport Errors
// ============================================================================

/// Errors surfaced by concept transports.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The concept is unreachable.
    #[error("concept unavailable: {0}")]
    Unavailable(String),
    /// Invocation dispatch failed.
    #[error("invoke failed: {0}")]
    Invoke(String),
    /// Concept-state query failed.
    #[error("query failed: {0}")]
    Query(String),
}

// ============================================================================
// SECTION: Concept Transport
// ============================================================================

/// Object-safe async dispatcher for one concept deployment.
///
/// # Invariants
/// - `invoke` returns a completion whose `id`, `flow`, and `input` mirror
///   the invocation.
/// - Implementations are safe to call concurrently from multiple firings.
#[async_trait]
pub trait ConceptTransport: Send + Sync {
    /// Dispatches an invocation and returns its completion.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the concept cannot be reached or the
    /// handler fails.
    async fn invoke(&self, invocation: &ActionRecord) -> Result<ActionRecord, TransportError>;

    /// Reads rows of a concept relation, AND-filtered by `args` equality.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the concept cannot be reached or the
    /// relation cannot be read.
    async fn query(&self, request: &QueryRequest) -> Result<Vec<Fields>, TransportError>;

    /// Probes transport health, best effort.
    async fn health(&self) -> HealthStatus;

    /// Returns the handler-advertised metadata, when the transport can
    /// reach it locally.
    fn metadata(&self) -> Option<ConceptMetadata> {
        None
    }
}
