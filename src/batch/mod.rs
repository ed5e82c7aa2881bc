//! Paced sequential batches over external APIs
//!
//! # Components
//!
//! - `BatchRunner`: Processes items one at a time with retries, pacing, quota
//!   admission and pause/resume/cancel
//! - `BatchAdapter`: The per-item external call a runner drives
//! - `BatchObserver`: Progress and completion hooks
//! - `CommentAdapter` / `TranslationAdapter`: The two concrete jobs

mod adapter;
mod adapters;
mod observer;
mod runner;

pub use adapter::{BatchAdapter, FetchResult, WorkItem};
pub use adapters::{CommentAdapter, TranslationAdapter, TranslationJob};
pub use observer::{BatchObserver, BatchProgress, LoggingObserver, NoopObserver};
pub use runner::{
    BatchAbort, BatchCounts, BatchRunner, BatchStatus, BatchSummary, RunnerSettings,
};
