// crates/weft-store-sqlite/src/lib.rs
// ============================================================================
// Module: Weft SQLite Store
// Description: Durable action log for serverless engine deployments.
// Purpose: Persist records and sync edges across engine restarts.
// Dependencies: weft-core, rusqlite, serde_json
// ============================================================================

//! ## Overview
//! Engines that cannot hold the action log in process memory (serverless
//! deployments, restart-tolerant hosts) use this crate's `SQLite` backend.
//! The engine treats a backend failure as fatal for the invocation being
//! processed; everything already committed stays readable.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// SQLite-backed action log.
pub mod store;

pub use store::SqliteActionLog;
pub use store::SqliteLogConfig;
pub use store::SqliteLogError;
pub use store::SqliteLogMode;
