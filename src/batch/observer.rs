//! Progress and completion hooks for batch runs

use crate::batch::{BatchSummary, FetchResult};
use crate::HarvestError;

/// Counters reported after each item
///
/// `current` always equals `successful + failed + skipped`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchProgress {
    pub current: usize,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    /// `round(current / total * 100)`
    pub percentage: u8,
    pub item_id: String,
    pub item_label: String,
}

impl BatchProgress {
    pub(crate) fn percentage_of(current: usize, total: usize) -> u8 {
        if total == 0 {
            return 100;
        }
        ((current as f64 / total as f64) * 100.0).round() as u8
    }
}

/// Receives batch events; every hook defaults to doing nothing
pub trait BatchObserver<P>: Send + Sync {
    fn on_progress(&self, _progress: &BatchProgress) {}

    fn on_item_complete(&self, _item_id: &str, _result: &FetchResult<P>) {}

    fn on_complete(&self, _summary: &BatchSummary<P>) {}

    fn on_error(&self, _error: &HarvestError) {}
}

/// Observer that ignores every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl<P> BatchObserver<P> for NoopObserver {}

/// Observer that reports events through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

impl<P> BatchObserver<P> for LoggingObserver {
    fn on_progress(&self, progress: &BatchProgress) {
        tracing::info!(
            "[{}/{}] {}% {} (ok {}, failed {}, skipped {})",
            progress.current,
            progress.total,
            progress.percentage,
            progress.item_label,
            progress.successful,
            progress.failed,
            progress.skipped
        );
    }

    fn on_item_complete(&self, item_id: &str, result: &FetchResult<P>) {
        match result {
            FetchResult::Success(_) => tracing::debug!("{} done", item_id),
            FetchResult::Failure(e) => tracing::warn!("{} failed: {}", item_id, e),
            FetchResult::Skipped(reason) => tracing::debug!("{} skipped: {}", item_id, reason),
        }
    }

    fn on_complete(&self, summary: &BatchSummary<P>) {
        tracing::info!(
            "Batch {} after {:.1}s: {} processed of {} ({} ok, {} failed, {} skipped)",
            if summary.cancelled { "cancelled" } else { "finished" },
            summary.duration.as_secs_f64(),
            summary.processed,
            summary.total,
            summary.successful,
            summary.failed,
            summary.skipped
        );
    }

    fn on_error(&self, error: &HarvestError) {
        tracing::error!("Batch aborted: {}", error);
    }
}
