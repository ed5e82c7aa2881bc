//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{RunKind, RunOutcome, RunRecord};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error for '{key}': {message}")]
    Serialization { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// Values are opaque strings (JSON documents in practice) addressed by key.
/// Batch runs are tracked in a separate ledger.
pub trait Storage {
    // ===== Key-Value Store =====

    /// Reads the value stored under `key`
    fn get_value(&self, key: &str) -> StorageResult<Option<String>>;

    /// Writes `value` under `key`, replacing any previous value
    fn put_value(&mut self, key: &str, value: &str) -> StorageResult<()>;

    /// Removes `key`
    ///
    /// # Returns
    ///
    /// True if a value was removed
    fn remove_value(&mut self, key: &str) -> StorageResult<bool>;

    /// Lists every stored key in ascending order
    fn list_keys(&self) -> StorageResult<Vec<String>>;

    // ===== Run Management =====

    /// Records the start of a batch run
    ///
    /// # Arguments
    ///
    /// * `kind` - What the run processes
    /// * `total` - Number of items submitted
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, kind: RunKind, total: u64) -> StorageResult<i64>;

    /// Records how a run ended
    fn finish_run(&mut self, run_id: i64, outcome: &RunOutcome) -> StorageResult<()>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run, if any
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Lists the most recent runs, newest first
    fn list_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>>;
}
