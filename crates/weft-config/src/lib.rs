// crates/weft-config/src/lib.rs
// ============================================================================
// Module: Weft Config
// Description: Deployment manifest model, load guards, and validation.
// Purpose: Turn authored TOML manifests into validated engine inputs.
// Dependencies: weft-core, serde, serde_json, thiserror, toml
// ============================================================================

//! ## Overview
//! A deployment manifest declares the engine's log backend, the concept
//! deployments to register, and the sync set to install. Loading is strict
//! and fail-closed: bounded file size, UTF-8 only, bounded path shapes.
//! Validation compiles every authored sync through the core compiler, so a
//! manifest that loads cleanly installs cleanly.

// ============================================================================
// SECTION: Modules
// ============================================================================

/// Manifest data model and lowering to core sync specs.
pub mod manifest;

pub use manifest::BindForm;
pub use manifest::ConceptEntry;
pub use manifest::DeploymentManifest;
pub use manifest::EngineSection;
pub use manifest::LogBackend;
pub use manifest::MatchForm;
pub use manifest::QueryModeForm;
pub use manifest::SyncForm;
pub use manifest::ThenForm;
pub use manifest::TransportForm;
pub use manifest::ValueForm;
pub use manifest::WhenForm;
pub use manifest::WhereForm;

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;

use thiserror::Error;
use weft_core::CompileError;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum manifest file size accepted by the loader.
pub const MAX_MANIFEST_BYTES: u64 = 1024 * 1024;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;

// ============================================================================
// SECTION: Config Errors
// ============================================================================

/// Errors surfaced while loading or validating a manifest.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Manifest path exceeds the maximum length.
    #[error("manifest path exceeds max length")]
    PathTooLong,
    /// A manifest path component exceeds the maximum length.
    #[error("manifest path component too long")]
    PathComponentTooLong,
    /// Manifest file I/O failure.
    #[error("manifest io failure: {0}")]
    Io(String),
    /// Manifest file exceeds the size limit.
    #[error("manifest file exceeds size limit ({actual} > {limit} bytes)")]
    TooLarge {
        /// Actual file size in bytes.
        actual: u64,
        /// Configured size limit in bytes.
        limit: u64,
    },
    /// Manifest file is not valid UTF-8.
    #[error("manifest file must be utf-8")]
    NotUtf8,
    /// Manifest failed to parse as TOML.
    #[error("manifest parse failure: {0}")]
    Parse(String),
    /// Manifest content failed validation.
    #[error("manifest validation failure: {0}")]
    Validation(String),
    /// An authored sync failed compilation.
    #[error("sync validation failure: {0}")]
    Sync(#[from] CompileError),
}

// ============================================================================
// SECTION: Loading
// ============================================================================

/// Reads a manifest file under the loader guards and parses it.
///
/// # Errors
///
/// Returns [`ConfigError`] when the path shape, size, encoding, or TOML
/// content is rejected.
pub fn load(path: &Path) -> Result<DeploymentManifest, ConfigError> {
    check_path_shape(path)?;
    let metadata = std::fs::metadata(path).map_err(|err| ConfigError::Io(err.to_string()))?;
    if metadata.len() > MAX_MANIFEST_BYTES {
        return Err(ConfigError::TooLarge {
            actual: metadata.len(),
            limit: MAX_MANIFEST_BYTES,
        });
    }
    let bytes = std::fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
    let text = String::from_utf8(bytes).map_err(|_| ConfigError::NotUtf8)?;
    parse(&text)
}

/// Parses manifest TOML text.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] when the text is not a valid manifest.
pub fn parse(text: &str) -> Result<DeploymentManifest, ConfigError> {
    toml::from_str(text).map_err(|err| ConfigError::Parse(err.to_string()))
}

/// Rejects oversized paths and path components before touching the
/// filesystem.
fn check_path_shape(path: &Path) -> Result<(), ConfigError> {
    if path.as_os_str().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::PathTooLong);
    }
    for component in path.components() {
        if component.as_os_str().len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::PathComponentTooLong);
        }
    }
    Ok(())
}
