//! Storage module for persisting harvest data
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - A JSON key-value store for videos, comment and translation caches,
//!   histories and usage counters
//! - Batch run tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::HarvestError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Storage handle shared between the session, caches and the quota ledger
pub type SharedStorage = Arc<Mutex<dyn Storage + Send>>;

/// Well-known keys of the key-value store
pub mod keys {
    pub const VIDEOS: &str = "youtube_videos";
    pub const COMMENTS: &str = "youtube_comments";
    pub const TRANSLATION_CACHE: &str = "translation_cache";
    pub const SEARCH_HISTORY: &str = "youtube_search_history";
    pub const VIEW_HISTORY: &str = "youtube_view_history";
    pub const ACTION_HISTORY: &str = "youtube_action_history";
    pub const API_USAGE: &str = "api_usage_stats";
}

/// Initializes or opens a storage database
///
/// # Arguments
///
/// * `path` - Path to the SQLite database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(HarvestError)` - Failed to initialize storage
pub fn open_storage(path: &Path) -> Result<SqliteStorage, HarvestError> {
    SqliteStorage::new(path)
}

/// Wraps a storage backend for sharing across components
pub fn share(storage: impl Storage + Send + 'static) -> SharedStorage {
    Arc::new(Mutex::new(storage))
}

/// Reads and deserializes the JSON document stored under `key`
pub fn load_json<T: DeserializeOwned>(
    storage: &dyn Storage,
    key: &str,
) -> StorageResult<Option<T>> {
    match storage.get_value(key)? {
        Some(raw) => serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| StorageError::Serialization {
                key: key.to_string(),
                message: e.to_string(),
            }),
        None => Ok(None),
    }
}

/// Serializes `value` as JSON and stores it under `key`
pub fn store_json<T: Serialize + ?Sized>(
    storage: &mut dyn Storage,
    key: &str,
    value: &T,
) -> StorageResult<()> {
    let raw = serde_json::to_string(value).map_err(|e| StorageError::Serialization {
        key: key.to_string(),
        message: e.to_string(),
    })?;
    storage.put_value(key, &raw)
}

/// What a batch run processed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Comments,
    Translation,
}

impl RunKind {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Comments => "comments",
            Self::Translation => "translation",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "comments" => Some(Self::Comments),
            "translation" => Some(Self::Translation),
            _ => None,
        }
    }
}

/// Represents a batch run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub kind: RunKind,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub status: RunStatus,
    pub total: u64,
    pub processed: u64,
    pub successful: u64,
    pub failed: u64,
    pub skipped: u64,
    pub error_message: Option<String>,
}

/// Final counters of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunOutcome {
    pub status: RunStatus,
    pub processed: u64,
    pub successful: u64,
    pub failed: u64,
    pub skipped: u64,
    pub error_message: Option<String>,
}

/// Status of a batch run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
