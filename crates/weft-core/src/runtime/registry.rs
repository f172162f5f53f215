// crates/weft-core/src/runtime/registry.rs
// ============================================================================
// Module: Weft Concept Registry
// Description: Deployment handles, availability tracking, and notifications.
// Purpose: Resolve concept URIs to transports and report availability moves.
// Dependencies: crate::core, crate::interfaces, thiserror
// ============================================================================

//! ## Overview
//! The registry maps each concept URI to exactly one deployment handle:
//! transport, availability flag, capability set, and query mode. Duplicate
//! registration fails; deregistration is idempotent. Callers must treat an
//! unresolved transport and `available = false` identically, so `resolve`
//! returns `None` for both. Availability transitions notify subscribed
//! listeners, which is how the engine re-evaluates its degraded sync set.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;

use thiserror::Error;

use crate::core::ConceptUri;
use crate::core::DeploymentId;
use crate::interfaces::ConceptTransport;
use crate::interfaces::QueryMode;

// ============================================================================
// SECTION: Registry Errors
// ============================================================================

/// Errors surfaced by registry operations.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The URI is already registered.
    #[error("duplicate concept registration: {0}")]
    Duplicate(ConceptUri),
    /// A declared capability is not advertised by the handler metadata.
    #[error("unknown capability {capability} declared for {uri}")]
    UnknownCapability {
        /// Concept whose registration was rejected.
        uri: ConceptUri,
        /// Capability missing from the handler's advertised set.
        capability: String,
    },
}

// ============================================================================
// SECTION: Deployment Handles
// ============================================================================

/// One registered concept deployment.
///
/// # Invariants
/// - `uri` is unique within the registry.
/// - `available` reflects the last registration or heartbeat outcome.
#[derive(Clone)]
pub struct DeploymentHandle {
    /// Registry-issued deployment identifier.
    pub deployment_id: DeploymentId,
    /// Concept URI.
    pub uri: ConceptUri,
    /// Transport reaching the deployment.
    pub transport: Arc<dyn ConceptTransport>,
    /// Whether the deployment is currently available.
    pub available: bool,
    /// Capabilities declared at registration.
    pub capabilities: BTreeSet<String>,
    /// Query dialect advertised for routing decisions.
    pub query_mode: QueryMode,
}

impl std::fmt::Debug for DeploymentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeploymentHandle")
            .field("deployment_id", &self.deployment_id)
            .field("uri", &self.uri)
            .field("available", &self.available)
            .field("capabilities", &self.capabilities)
            .field("query_mode", &self.query_mode)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Availability Listeners
// ============================================================================

/// Observer of concept availability transitions.
pub trait AvailabilityListener: Send + Sync {
    /// Called after a concept's availability changes, including on
    /// registration (`true`) and deregistration (`false`).
    fn availability_changed(&self, uri: &ConceptUri, available: bool);
}

// ============================================================================
// SECTION: Concept Registry
// ============================================================================

/// Concept registry shared across the engines of a deployment.
///
/// # Invariants
/// - Each URI maps to at most one handle.
/// - Listeners observe every availability transition in occurrence order.
#[derive(Default)]
pub struct ConceptRegistry {
    /// Handles keyed by concept URI.
    handles: Mutex<BTreeMap<ConceptUri, DeploymentHandle>>,
    /// Subscribed availability listeners.
    listeners: Mutex<Vec<Arc<dyn AvailabilityListener>>>,
}

impl ConceptRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes a listener to availability transitions.
    pub fn subscribe(&self, listener: Arc<dyn AvailabilityListener>) {
        self.listeners.lock().unwrap_or_else(PoisonError::into_inner).push(listener);
    }

    /// Registers a concept deployment.
    ///
    /// When the transport can reach handler metadata, every declared
    /// capability must appear in the advertised set.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] when the URI is taken and
    /// [`RegistryError::UnknownCapability`] when a declared capability is
    /// not advertised.
    pub fn register(
        &self,
        uri: ConceptUri,
        transport: Arc<dyn ConceptTransport>,
        capabilities: BTreeSet<String>,
        query_mode: QueryMode,
    ) -> Result<DeploymentId, RegistryError> {
        if let Some(metadata) = transport.metadata() {
            for capability in &capabilities {
                if !metadata.capabilities.contains(capability) {
                    return Err(RegistryError::UnknownCapability {
                        uri,
                        capability: capability.clone(),
                    });
                }
            }
        }

        let deployment_id = DeploymentId::fresh();
        {
            let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
            if handles.contains_key(&uri) {
                return Err(RegistryError::Duplicate(uri));
            }
            handles.insert(
                uri.clone(),
                DeploymentHandle {
                    deployment_id: deployment_id.clone(),
                    uri: uri.clone(),
                    transport,
                    available: true,
                    capabilities,
                    query_mode,
                },
            );
        }
        self.notify(&uri, true);
        Ok(deployment_id)
    }

    /// Deregisters a concept deployment; idempotent.
    pub fn deregister(&self, uri: &ConceptUri) {
        let removed = {
            let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
            handles.remove(uri).is_some()
        };
        if removed {
            self.notify(uri, false);
        }
    }

    /// Resolves a URI to its transport.
    ///
    /// Returns `None` when the concept is unregistered or marked
    /// unavailable; callers must treat both identically.
    #[must_use]
    pub fn resolve(&self, uri: &ConceptUri) -> Option<Arc<dyn ConceptTransport>> {
        let handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles
            .get(uri)
            .filter(|handle| handle.available)
            .map(|handle| Arc::clone(&handle.transport))
    }

    /// Probes the deployment's health and updates availability.
    ///
    /// Returns the availability after the probe; `false` for an unknown URI.
    pub async fn heartbeat(&self, uri: &ConceptUri) -> bool {
        let transport = {
            let handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
            handles.get(uri).map(|handle| Arc::clone(&handle.transport))
        };
        let Some(transport) = transport else {
            return false;
        };
        let status = transport.health().await;
        let transitioned = {
            let mut handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
            match handles.get_mut(uri) {
                Some(handle) if handle.available != status.available => {
                    handle.available = status.available;
                    true
                }
                _ => false,
            }
        };
        if transitioned {
            self.notify(uri, status.available);
        }
        status.available
    }

    /// Returns a snapshot of every handle, for inspection surfaces.
    #[must_use]
    pub fn handles(&self) -> Vec<DeploymentHandle> {
        let handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.values().cloned().collect()
    }

    /// Returns the URIs currently registered but unavailable.
    #[must_use]
    pub fn unavailable_snapshot(&self) -> BTreeSet<ConceptUri> {
        let handles = self.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles
            .values()
            .filter(|handle| !handle.available)
            .map(|handle| handle.uri.clone())
            .collect()
    }

    /// Notifies every listener of a transition.
    fn notify(&self, uri: &ConceptUri, available: bool) {
        let listeners = {
            let guard = self.listeners.lock().unwrap_or_else(PoisonError::into_inner);
            guard.clone()
        };
        for listener in listeners {
            listener.availability_changed(uri, available);
        }
    }
}
