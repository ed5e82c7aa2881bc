//! State module for pacing and tracking external calls
//!
//! # Components
//!
//! - `RunState`: Lifecycle of a batch runner (idle, running, paused, terminal states)
//! - `RateLimiter`: Minimum spacing between calls to one external API
//! - `QuotaLedger`: Persisted daily API usage used for admission checks

mod rate_limiter;
mod run_state;
mod usage;

// Re-export main types
pub use rate_limiter::RateLimiter;
pub use run_state::RunState;
pub use usage::{QuotaLedger, UsageStats};
