// crates/weft-transport/src/lib.rs
// ============================================================================
// Module: Weft Transport
// Description: Concept transports for in-process and HTTP deployments.
// Purpose: Connect concept implementations to the synchronization engine.
// Dependencies: weft-core, async-trait, reqwest, serde_json, url
// ============================================================================

//! ## Overview
//! Transports adapt concept hosts to the engine's dispatch interface. The
//! local transport runs a handler in process against a keyed document
//! store; the HTTP transport reaches a remote host with strict timeouts and
//! response limits. Both mirror the invocation's `id`, `flow`, and `input`
//! into the completion, as the engine requires.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Concept handlers and their document storage.
pub mod handler;
/// HTTP transport.
pub mod http;
/// In-process transport.
pub mod local;

pub use handler::ConceptHandler;
pub use handler::ConceptStorage;
pub use handler::HandlerError;
pub use handler::HandlerResult;
pub use handler::MemoryStorage;
pub use handler::StorageError;
pub use http::HttpTransport;
pub use http::HttpTransportConfig;
pub use local::LocalTransport;
