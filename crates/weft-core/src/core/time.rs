// crates/weft-core/src/core/time.rs
// ============================================================================
// Module: Weft Time Model
// Description: Canonical timestamp representation and engine clocks.
// Purpose: Provide monotonic, replayable time values for action records.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Action records carry explicit timestamps assigned by the engine clock.
//! The system clock reads wall-clock time but clamps it to be monotonic
//! non-decreasing within one engine; the logical clock is a deterministic
//! counter for tests and replay.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::atomic::AtomicI64;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// Canonical timestamp carried by action records.
///
/// # Invariants
/// - Values are assigned by an [`EngineClock`]; the core never reads
///   wall-clock time outside a clock implementation.
/// - Within one engine, assigned values are monotonic non-decreasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Timestamp {
    /// Unix epoch milliseconds.
    UnixMillis(i64),
    /// Monotonic logical time value.
    Logical(u64),
}

impl Timestamp {
    /// Returns the timestamp as unix milliseconds when available.
    #[must_use]
    pub const fn as_unix_millis(&self) -> Option<i64> {
        match self {
            Self::UnixMillis(value) => Some(*value),
            Self::Logical(_) => None,
        }
    }

    /// Returns the timestamp as logical time when available.
    #[must_use]
    pub const fn as_logical(&self) -> Option<u64> {
        match self {
            Self::UnixMillis(_) => None,
            Self::Logical(value) => Some(*value),
        }
    }
}

// ============================================================================
// SECTION: Engine Clock
// ============================================================================

/// Clock used by the engine to stamp appended records.
pub trait EngineClock: Send + Sync {
    /// Returns the current timestamp.
    ///
    /// Successive calls must return non-decreasing values.
    fn now(&self) -> Timestamp;
}

/// Wall-clock engine clock with a monotonic floor.
///
/// # Invariants
/// - Returned values never decrease, even if the underlying wall clock does.
#[derive(Debug, Default)]
pub struct SystemClock {
    /// Last value handed out, in unix milliseconds.
    floor: AtomicI64,
}

impl SystemClock {
    /// Creates a new system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl EngineClock for SystemClock {
    fn now(&self) -> Timestamp {
        let nanos = OffsetDateTime::now_utc().unix_timestamp_nanos();
        let millis = i64::try_from(nanos / 1_000_000).unwrap_or(i64::MAX);
        let clamped = self.floor.fetch_max(millis, Ordering::AcqRel).max(millis);
        Timestamp::UnixMillis(clamped)
    }
}

/// Deterministic counter clock for tests and replay.
///
/// # Invariants
/// - Each call returns the next logical tick, starting at 1.
#[derive(Debug, Default)]
pub struct LogicalClock {
    /// Tick counter.
    ticks: AtomicU64,
}

impl LogicalClock {
    /// Creates a new logical clock starting at tick 1.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl EngineClock for LogicalClock {
    fn now(&self) -> Timestamp {
        Timestamp::Logical(self.ticks.fetch_add(1, Ordering::AcqRel) + 1)
    }
}
