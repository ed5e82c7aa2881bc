//! Configuration module for tube-harvest
//!
//! This module handles loading, parsing, and validating TOML configuration files,
//! and picks the API key to use for the current day.
//!
//! # Example
//!
//! ```no_run
//! use tube_harvest::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! println!("Batch interval: {}ms", config.batch.request_interval);
//! ```

mod keys;
mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BatchConfig, CacheConfig, Config, HistoryConfig, StorageConfig, TranslationConfig,
    WebhookConfig, YoutubeConfig,
};

// Re-export parser functions
pub use keys::{select_api_key, usable_keys};
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate_webhook_url;
