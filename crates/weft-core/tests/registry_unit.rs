// crates/weft-core/tests/registry_unit.rs
// ============================================================================
// Module: Concept Registry Unit Tests
// Description: Registration, resolution, heartbeats, and notifications.
// Purpose: Validate availability semantics the engine depends on.
// ============================================================================

//! Concept registry tests.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;

use common::ScriptedTransport;
use weft_core::ConceptMetadata;
use weft_core::ConceptRegistry;
use weft_core::ConceptUri;
use weft_core::QueryMode;
use weft_core::RegistryError;
use weft_core::runtime::AvailabilityListener;

// ============================================================================
// SECTION: Fixtures
// ============================================================================

/// Listener recording `(uri, available)` transitions.
#[derive(Default)]
struct RecordingListener {
    /// Observed transitions.
    transitions: Mutex<Vec<(ConceptUri, bool)>>,
}

impl RecordingListener {
    /// Returns the observed transitions.
    fn transitions(&self) -> Vec<(ConceptUri, bool)> {
        self.transitions.lock().unwrap().clone()
    }
}

impl AvailabilityListener for RecordingListener {
    fn availability_changed(&self, uri: &ConceptUri, available: bool) {
        self.transitions.lock().unwrap().push((uri.clone(), available));
    }
}

/// Registers a scripted transport under the URI.
fn register_scripted(registry: &ConceptRegistry, uri: &str) -> Arc<ScriptedTransport> {
    let transport = Arc::new(ScriptedTransport::new());
    registry
        .register(
            ConceptUri::new(uri),
            Arc::clone(&transport) as Arc<dyn weft_core::ConceptTransport>,
            BTreeSet::new(),
            QueryMode::Lite,
        )
        .unwrap();
    transport
}

// ============================================================================
// SECTION: Registration
// ============================================================================

#[test]
fn duplicate_registration_is_rejected() {
    let registry = ConceptRegistry::new();
    register_scripted(&registry, "app/users");
    let result = registry.register(
        ConceptUri::new("app/users"),
        Arc::new(ScriptedTransport::new()),
        BTreeSet::new(),
        QueryMode::Lite,
    );
    assert!(matches!(result, Err(RegistryError::Duplicate(_))));
}

#[test]
fn deregistration_is_idempotent() {
    let registry = ConceptRegistry::new();
    register_scripted(&registry, "app/users");
    registry.deregister(&ConceptUri::new("app/users"));
    registry.deregister(&ConceptUri::new("app/users"));
    assert!(registry.resolve(&ConceptUri::new("app/users")).is_none());
}

#[test]
fn declared_capabilities_are_confirmed_against_metadata() {
    let registry = ConceptRegistry::new();
    let metadata = ConceptMetadata {
        name: "users".to_string(),
        input_kind: "record".to_string(),
        output_kind: "variant".to_string(),
        capabilities: BTreeSet::from(["create".to_string()]),
    };
    let transport = Arc::new(ScriptedTransport::new().with_metadata(metadata));

    let result = registry.register(
        ConceptUri::new("app/users"),
        Arc::clone(&transport) as Arc<dyn weft_core::ConceptTransport>,
        BTreeSet::from(["create".to_string(), "archive".to_string()]),
        QueryMode::Lite,
    );
    assert!(matches!(
        result,
        Err(RegistryError::UnknownCapability { ref capability, .. }) if capability == "archive"
    ));

    // A declared subset of the advertised set is accepted.
    registry
        .register(
            ConceptUri::new("app/users"),
            transport,
            BTreeSet::from(["create".to_string()]),
            QueryMode::Lite,
        )
        .unwrap();
}

// ============================================================================
// SECTION: Resolution and Heartbeats
// ============================================================================

#[tokio::test]
async fn heartbeat_failure_makes_resolution_fail() {
    let registry = ConceptRegistry::new();
    let transport = register_scripted(&registry, "app/users");
    assert!(registry.resolve(&ConceptUri::new("app/users")).is_some());

    transport.set_available(false);
    assert!(!registry.heartbeat(&ConceptUri::new("app/users")).await);
    // An unavailable handle resolves like an unregistered one.
    assert!(registry.resolve(&ConceptUri::new("app/users")).is_none());
    assert_eq!(
        registry.unavailable_snapshot(),
        BTreeSet::from([ConceptUri::new("app/users")])
    );

    transport.set_available(true);
    assert!(registry.heartbeat(&ConceptUri::new("app/users")).await);
    assert!(registry.resolve(&ConceptUri::new("app/users")).is_some());
}

#[tokio::test]
async fn heartbeat_for_unknown_uri_reports_unavailable() {
    let registry = ConceptRegistry::new();
    assert!(!registry.heartbeat(&ConceptUri::new("missing")).await);
}

// ============================================================================
// SECTION: Notifications
// ============================================================================

#[tokio::test]
async fn listeners_observe_every_transition_in_order() {
    let registry = ConceptRegistry::new();
    let listener = Arc::new(RecordingListener::default());
    registry.subscribe(Arc::clone(&listener) as Arc<dyn AvailabilityListener>);

    let transport = register_scripted(&registry, "app/users");
    transport.set_available(false);
    registry.heartbeat(&ConceptUri::new("app/users")).await;
    // A repeated probe without a transition stays silent.
    registry.heartbeat(&ConceptUri::new("app/users")).await;
    registry.deregister(&ConceptUri::new("app/users"));

    let uri = ConceptUri::new("app/users");
    assert_eq!(
        listener.transitions(),
        vec![(uri.clone(), true), (uri.clone(), false), (uri, false)]
    );
}
