// crates/weft-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Action Log
// Description: Durable ActionLog backed by SQLite WAL.
// Purpose: Persist records and sync edges for serverless engines.
// Dependencies: weft-core, rusqlite, serde_json, thiserror
// ============================================================================

//! ## Overview
//! This module implements a durable [`ActionLog`] using `SQLite`. Records
//! are stored as self-describing JSON snapshots in an append-only table;
//! loads fail closed on corruption or schema mismatch. A backend failure
//! surfaces as [`LogError::Backend`], which the engine treats as fatal for
//! the current invocation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::sync::Mutex;
use std::sync::PoisonError;

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::params;
use thiserror::Error;
use weft_core::ActionRecord;
use weft_core::FlowId;
use weft_core::RecordId;
use weft_core::RecordKind;
use weft_core::SyncName;
use weft_core::log::ActionLog;
use weft_core::log::LogError;
use weft_core::log::SyncEdge;
use weft_core::log::guard_key;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the log.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
///
/// # Invariants
/// - Values map 1:1 to `SQLite` `journal_mode` pragma settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SqliteLogMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode (legacy).
    Delete,
}

impl SqliteLogMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// Configuration for the `SQLite` action log.
///
/// # Invariants
/// - `path` must resolve to a file path (not a directory).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqliteLogConfig {
    /// Database file path.
    pub path: std::path::PathBuf,
    /// Journal mode.
    pub mode: SqliteLogMode,
    /// Busy timeout in milliseconds.
    pub busy_timeout_ms: u64,
}

impl SqliteLogConfig {
    /// Creates a config for a database path with default pragmas.
    #[must_use]
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            mode: SqliteLogMode::default(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

// ============================================================================
// SECTION: Store Errors
// ============================================================================

/// Errors raised while opening the store.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum SqliteLogError {
    /// Database open or pragma failure.
    #[error("sqlite open failure: {0}")]
    Open(String),
    /// Stored schema version does not match this build.
    #[error("sqlite schema version mismatch: found {found}, expected {expected}")]
    VersionMismatch {
        /// Version found in the database.
        found: i64,
        /// Version this build expects.
        expected: i64,
    },
}

// ============================================================================
// SECTION: SQLite Action Log
// ============================================================================

/// Durable action log backed by `SQLite`.
///
/// # Invariants
/// - Records are append-only; `seq` preserves append order per flow.
/// - `(flow, record_id, kind)` is unique.
pub struct SqliteActionLog {
    /// Database connection; short, synchronous critical sections only.
    connection: Mutex<Connection>,
}

impl SqliteActionLog {
    /// Opens (or creates) the log database and verifies the schema.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteLogError`] when the database cannot be opened or its
    /// schema version does not match.
    pub fn open(config: &SqliteLogConfig) -> Result<Self, SqliteLogError> {
        let connection = Connection::open(&config.path)
            .map_err(|err| SqliteLogError::Open(err.to_string()))?;
        connection
            .pragma_update(None, "journal_mode", config.mode.pragma_value())
            .map_err(|err| SqliteLogError::Open(err.to_string()))?;
        connection
            .pragma_update(None, "busy_timeout", config.busy_timeout_ms.to_string())
            .map_err(|err| SqliteLogError::Open(err.to_string()))?;
        init_schema(&connection)?;
        Ok(Self {
            connection: Mutex::new(connection),
        })
    }

    /// Runs one operation over the locked connection, mapping errors.
    fn with_connection<T>(
        &self,
        operation: impl FnOnce(&Connection) -> Result<T, rusqlite::Error>,
    ) -> Result<T, LogError> {
        let connection = self.connection.lock().unwrap_or_else(PoisonError::into_inner);
        operation(&connection).map_err(|err| LogError::Backend(err.to_string()))
    }

    /// Loads the stored record under `(flow, id, kind)`, when present.
    fn stored_record(
        &self,
        flow: &FlowId,
        id: &RecordId,
        kind: &str,
    ) -> Result<Option<ActionRecord>, LogError> {
        let body: Option<String> = self.with_connection(|connection| {
            connection
                .query_row(
                    "SELECT body FROM records WHERE flow = ?1 AND record_id = ?2 AND kind = ?3",
                    params![flow.as_str(), id.as_str(), kind],
                    |row| row.get(0),
                )
                .optional()
        })?;
        body.map(|body| decode_record(&body)).transpose()
    }

    /// Appends one record after kind and uniqueness checks.
    fn append(
        &self,
        mut record: ActionRecord,
        parent: Option<RecordId>,
        expected: RecordKind,
        expected_label: &'static str,
    ) -> Result<ActionRecord, LogError> {
        if record.kind != expected {
            return Err(LogError::KindMismatch {
                expected: expected_label,
            });
        }
        record.parent = parent;
        if let Some(stored) = self.stored_record(&record.flow, &record.id, expected_label)? {
            if expected == RecordKind::Completion {
                return Ok(stored);
            }
            return Err(LogError::DuplicateRecord {
                flow: record.flow.clone(),
                id: record.id.clone(),
            });
        }
        let body = serde_json::to_string(&record)
            .map_err(|err| LogError::Backend(err.to_string()))?;
        self.with_connection(|connection| {
            connection.execute(
                "INSERT INTO records (flow, record_id, kind, body) VALUES (?1, ?2, ?3, ?4)",
                params![record.flow.as_str(), record.id.as_str(), expected_label, body],
            )
        })?;
        Ok(record)
    }

    /// Reads a flow's records in append order, optionally completions only.
    fn flow_records(
        &self,
        flow: &FlowId,
        completions_only: bool,
    ) -> Result<Vec<ActionRecord>, LogError> {
        let bodies: Vec<String> = self.with_connection(|connection| {
            let sql = if completions_only {
                "SELECT body FROM records WHERE flow = ?1 AND kind = 'completion' ORDER BY seq"
            } else {
                "SELECT body FROM records WHERE flow = ?1 ORDER BY seq"
            };
            let mut statement = connection.prepare(sql)?;
            let rows = statement.query_map(params![flow.as_str()], |row| row.get(0))?;
            rows.collect()
        })?;
        bodies.iter().map(|body| decode_record(body)).collect()
    }
}

impl ActionLog for SqliteActionLog {
    fn append_completion(
        &self,
        completion: ActionRecord,
        parent: Option<RecordId>,
    ) -> Result<ActionRecord, LogError> {
        self.append(completion, parent, RecordKind::Completion, "completion")
    }

    fn append_invocation(
        &self,
        invocation: ActionRecord,
        parent: Option<RecordId>,
    ) -> Result<ActionRecord, LogError> {
        self.append(invocation, parent, RecordKind::Invocation, "invocation")
    }

    fn completions_for_flow(&self, flow: &FlowId) -> Result<Vec<ActionRecord>, LogError> {
        self.flow_records(flow, true)
    }

    fn records_for_flow(&self, flow: &FlowId) -> Result<Vec<ActionRecord>, LogError> {
        self.flow_records(flow, false)
    }

    fn record_sync_firing(&self, matched: &[RecordId], sync: &SyncName) -> Result<(), LogError> {
        let key = guard_key(matched);
        self.with_connection(|connection| {
            connection.execute(
                "INSERT OR IGNORE INTO sync_firings (guard_key, sync_name) VALUES (?1, ?2)",
                params![key, sync.as_str()],
            )
        })?;
        Ok(())
    }

    fn has_fired(&self, matched: &[RecordId], sync: &SyncName) -> Result<bool, LogError> {
        let key = guard_key(matched);
        let found: Option<i64> = self.with_connection(|connection| {
            connection
                .query_row(
                    "SELECT 1 FROM sync_firings WHERE guard_key = ?1 AND sync_name = ?2",
                    params![key, sync.as_str()],
                    |row| row.get(0),
                )
                .optional()
        })?;
        Ok(found.is_some())
    }

    fn record_sync_edges(
        &self,
        matched: &[RecordId],
        sync: &SyncName,
        invocation: &RecordId,
    ) -> Result<(), LogError> {
        for completion in matched {
            self.with_connection(|connection| {
                connection.execute(
                    "INSERT OR IGNORE INTO sync_edges (completion_id, sync_name, invocation_id) \
                     VALUES (?1, ?2, ?3)",
                    params![completion.as_str(), sync.as_str(), invocation.as_str()],
                )
            })?;
        }
        Ok(())
    }

    fn firings_for_completion(&self, completion: &RecordId) -> Result<Vec<SyncEdge>, LogError> {
        let pairs: Vec<(String, String)> = self.with_connection(|connection| {
            let mut statement = connection.prepare(
                "SELECT sync_name, invocation_id FROM sync_edges \
                 WHERE completion_id = ?1 ORDER BY sync_name, invocation_id",
            )?;
            let rows = statement
                .query_map(params![completion.as_str()], |row| {
                    Ok((row.get(0)?, row.get(1)?))
                })?;
            rows.collect()
        })?;
        Ok(pairs
            .into_iter()
            .map(|(sync, invocation)| SyncEdge {
                sync: SyncName::new(sync),
                invocation: RecordId::new(invocation),
            })
            .collect())
    }
}

// ============================================================================
// SECTION: Schema
// ============================================================================

/// Creates tables and verifies the schema version.
fn init_schema(connection: &Connection) -> Result<(), SqliteLogError> {
    connection
        .execute_batch(
            "CREATE TABLE IF NOT EXISTS schema_info (version INTEGER NOT NULL);
             CREATE TABLE IF NOT EXISTS records (
                 seq INTEGER PRIMARY KEY AUTOINCREMENT,
                 flow TEXT NOT NULL,
                 record_id TEXT NOT NULL,
                 kind TEXT NOT NULL,
                 body TEXT NOT NULL,
                 UNIQUE (flow, record_id, kind)
             );
             CREATE INDEX IF NOT EXISTS idx_records_flow ON records (flow, seq);
             CREATE TABLE IF NOT EXISTS sync_firings (
                 guard_key TEXT NOT NULL,
                 sync_name TEXT NOT NULL,
                 PRIMARY KEY (guard_key, sync_name)
             );
             CREATE TABLE IF NOT EXISTS sync_edges (
                 completion_id TEXT NOT NULL,
                 sync_name TEXT NOT NULL,
                 invocation_id TEXT NOT NULL,
                 PRIMARY KEY (completion_id, sync_name, invocation_id)
             );",
        )
        .map_err(|err| SqliteLogError::Open(err.to_string()))?;

    let found: Option<i64> = connection
        .query_row("SELECT version FROM schema_info LIMIT 1", [], |row| row.get(0))
        .optional()
        .map_err(|err| SqliteLogError::Open(err.to_string()))?;
    match found {
        Some(version) if version == SCHEMA_VERSION => Ok(()),
        Some(version) => Err(SqliteLogError::VersionMismatch {
            found: version,
            expected: SCHEMA_VERSION,
        }),
        None => {
            connection
                .execute("INSERT INTO schema_info (version) VALUES (?1)", params![
                    SCHEMA_VERSION
                ])
                .map_err(|err| SqliteLogError::Open(err.to_string()))?;
            Ok(())
        }
    }
}

/// Decodes a stored record body, failing closed on corruption.
fn decode_record(body: &str) -> Result<ActionRecord, LogError> {
    serde_json::from_str(body)
        .map_err(|err| LogError::Backend(format!("corrupt record body: {err}")))
}
