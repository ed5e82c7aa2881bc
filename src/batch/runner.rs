//! Sequential batch runner
//!
//! Items are processed one at a time in submission order. Between items the
//! runner waits `request-interval`; a failing item is retried up to
//! `max-retries` times. Pause, resume and cancel are flags on a watch
//! channel, so a paused run sleeps on change notification instead of polling.

use crate::batch::{BatchAdapter, BatchObserver, BatchProgress, FetchResult, WorkItem};
use crate::config::BatchConfig;
use crate::state::{QuotaLedger, RunState};
use crate::{FetchError, FetchOutcome, HarvestError, Result};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::watch;

/// Control flags shared between the run loop and its controllers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Flags {
    running: bool,
    paused: bool,
    cancelled: bool,
}

/// Settings that shape one runner's behavior
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub request_interval: Duration,
    pub max_retries: u32,
    pub skip_existing: bool,
    pub continue_on_error: bool,
}

impl From<&BatchConfig> for RunnerSettings {
    fn from(config: &BatchConfig) -> Self {
        Self {
            request_interval: Duration::from_millis(config.request_interval),
            max_retries: config.max_retries,
            skip_existing: config.skip_existing,
            continue_on_error: config.continue_on_error,
        }
    }
}

/// Item counters of one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchCounts {
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// The failure that stopped a run with `continue-on-error` off
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchAbort {
    pub item: String,
    pub error: FetchError,
}

/// Final accounting of one run
#[derive(Debug, Clone)]
pub struct BatchSummary<P> {
    pub total: usize,
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    pub duration: Duration,
    pub started_at: DateTime<Utc>,
    /// One entry per processed item id
    pub results: HashMap<String, FetchResult<P>>,
    pub cancelled: bool,
    /// Set when a failure stopped the run early
    pub aborted: Option<BatchAbort>,
}

impl<P> BatchSummary<P> {
    pub fn counts(&self) -> BatchCounts {
        BatchCounts {
            processed: self.processed,
            successful: self.successful,
            failed: self.failed,
            skipped: self.skipped,
        }
    }

    /// The `BatchAborted` error of an aborted run
    pub fn abort_error(&self) -> Option<HarvestError> {
        self.aborted.as_ref().map(|abort| HarvestError::BatchAborted {
            item: abort.item.clone(),
            source: abort.error.clone(),
            counts: self.counts(),
        })
    }

    /// Turns an aborted summary into its error
    pub fn into_result(self) -> Result<Self> {
        match self.abort_error() {
            Some(error) => Err(error),
            None => Ok(self),
        }
    }
}

/// Point-in-time view of a runner
#[derive(Debug, Clone, PartialEq)]
pub struct BatchStatus {
    pub state: RunState,
    pub total: usize,
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub skipped: usize,
    /// Zero-based index of the item being worked on
    pub current_index: Option<usize>,
    pub current_item: Option<String>,
    pub elapsed: Duration,
    /// Average time per processed item times the items left
    pub estimated_remaining: Option<Duration>,
}

#[derive(Debug, Default)]
struct Tracker {
    state: RunState,
    total: usize,
    processed: usize,
    successful: usize,
    failed: usize,
    skipped: usize,
    current_index: Option<usize>,
    current_item: Option<String>,
    started: Option<Instant>,
}

/// Clears the control flags when a run ends, however it ends
struct RunGuard<'a> {
    runner: &'a BatchRunner,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.runner.control.send_modify(|flags| *flags = Flags::default());
        let mut tracker = self.runner.tracker();
        if tracker.state.is_active() {
            tracker.state = RunState::Cancelled;
        }
        tracker.current_index = None;
        tracker.current_item = None;
    }
}

/// Runs batches of work items through a `BatchAdapter`
pub struct BatchRunner {
    settings: RunnerSettings,
    quota: Option<Arc<QuotaLedger>>,
    control: watch::Sender<Flags>,
    tracker: Mutex<Tracker>,
}

impl BatchRunner {
    pub fn new(settings: RunnerSettings) -> Self {
        let (control, _) = watch::channel(Flags::default());
        Self {
            settings,
            quota: None,
            control,
            tracker: Mutex::new(Tracker::default()),
        }
    }

    pub fn from_config(config: &BatchConfig) -> Self {
        Self::new(RunnerSettings::from(config))
    }

    /// Checks every item's estimated cost against `ledger` before fetching
    pub fn with_quota(mut self, ledger: Arc<QuotaLedger>) -> Self {
        self.quota = Some(ledger);
        self
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    fn tracker(&self) -> std::sync::MutexGuard<'_, Tracker> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Suspends the active run before its next item
    ///
    /// Returns false if no run is active or it is already paused.
    pub fn pause(&self) -> bool {
        let changed = self.control.send_if_modified(|f| {
            if f.running && !f.paused && !f.cancelled {
                f.paused = true;
                true
            } else {
                false
            }
        });
        if changed {
            tracing::info!("Batch paused");
        }
        changed
    }

    /// Resumes a paused run
    pub fn resume(&self) -> bool {
        let changed = self.control.send_if_modified(|f| {
            if f.running && f.paused {
                f.paused = false;
                true
            } else {
                false
            }
        });
        if changed {
            tracing::info!("Batch resumed");
        }
        changed
    }

    /// Stops the active run after the in-flight call completes
    pub fn cancel(&self) -> bool {
        let changed = self.control.send_if_modified(|f| {
            if f.running && !f.cancelled {
                f.cancelled = true;
                f.paused = false;
                true
            } else {
                false
            }
        });
        if changed {
            tracing::info!("Batch cancellation requested");
        }
        changed
    }

    pub fn is_running(&self) -> bool {
        self.control.borrow().running
    }

    pub fn is_paused(&self) -> bool {
        self.control.borrow().paused
    }

    fn is_cancelled(&self) -> bool {
        self.control.borrow().cancelled
    }

    pub fn status(&self) -> BatchStatus {
        let flags = *self.control.borrow();
        let tracker = self.tracker();

        let state = match (flags.running, flags.paused) {
            (true, true) => RunState::Paused,
            (true, false) => RunState::Running,
            (false, _) => tracker.state,
        };
        let elapsed = tracker.started.map(|s| s.elapsed()).unwrap_or_default();
        let estimated_remaining = if flags.running && tracker.processed > 0 {
            let left = tracker.total.saturating_sub(tracker.processed);
            Some(elapsed.mul_f64(left as f64 / tracker.processed as f64))
        } else {
            None
        };

        BatchStatus {
            state,
            total: tracker.total,
            processed: tracker.processed,
            successful: tracker.successful,
            failed: tracker.failed,
            skipped: tracker.skipped,
            current_index: tracker.current_index,
            current_item: tracker.current_item.clone(),
            elapsed,
            estimated_remaining,
        }
    }

    /// Processes `items` in order and returns the run summary
    ///
    /// # Arguments
    ///
    /// * `adapter` - Performs the external call for each item
    /// * `items` - Work items; later duplicates of an id are dropped
    /// * `observer` - Receives progress, per-item and completion events
    ///
    /// # Returns
    ///
    /// * `Ok(BatchSummary)` - The run finished or was cancelled
    /// * `Err(HarvestError::BatchInProgress)` - Another run is active
    /// * `Err(HarvestError::BatchAborted)` - An item failed with
    ///   `continue-on-error` off
    pub async fn run<A: BatchAdapter>(
        &self,
        adapter: &A,
        items: Vec<A::Item>,
        observer: &dyn BatchObserver<A::Output>,
    ) -> Result<BatchSummary<A::Output>> {
        self.execute(adapter, items, observer).await?.into_result()
    }

    /// Like `run`, but an aborted run still returns its partial summary
    ///
    /// The summary holds every item processed up to and including the one
    /// that failed, with `aborted` set.
    pub async fn execute<A: BatchAdapter>(
        &self,
        adapter: &A,
        items: Vec<A::Item>,
        observer: &dyn BatchObserver<A::Output>,
    ) -> Result<BatchSummary<A::Output>> {
        let claimed = self.control.send_if_modified(|f| {
            if f.running {
                false
            } else {
                *f = Flags {
                    running: true,
                    ..Flags::default()
                };
                true
            }
        });
        if !claimed {
            return Err(HarvestError::BatchInProgress);
        }
        let _guard = RunGuard { runner: self };

        let items = dedupe(items);
        let total = items.len();
        let started = Instant::now();
        let started_at = Utc::now();
        {
            let mut tracker = self.tracker();
            *tracker = Tracker {
                state: RunState::Running,
                total,
                started: Some(started),
                ..Tracker::default()
            };
        }
        tracing::info!("Starting batch of {} items", total);

        let mut control = self.control.subscribe();
        let mut results: HashMap<String, FetchResult<A::Output>> = HashMap::with_capacity(total);
        let (mut successful, mut failed, mut skipped) = (0usize, 0usize, 0usize);
        let mut cancelled = false;
        let mut aborted = None;

        for (index, item) in items.iter().enumerate() {
            if self.wait_while_paused(&mut control).await {
                cancelled = true;
                break;
            }

            let id = item.id();
            let label = item.label();
            {
                let mut tracker = self.tracker();
                tracker.current_index = Some(index);
                tracker.current_item = Some(label.clone());
            }

            let mut called = false;
            let result = if self.settings.skip_existing && adapter.is_cached(item) {
                FetchResult::Skipped("result already cached".to_string())
            } else if let Some(err) = self.admit(adapter, item) {
                FetchResult::Failure(err)
            } else {
                called = true;
                match self.fetch_with_retry(adapter, item, &label, &mut control).await {
                    Ok(payload) => FetchResult::Success(payload),
                    Err(e) => FetchResult::Failure(e),
                }
            };

            match &result {
                FetchResult::Success(_) => successful += 1,
                FetchResult::Failure(_) => failed += 1,
                FetchResult::Skipped(_) => skipped += 1,
            }
            let processed = successful + failed + skipped;
            {
                let mut tracker = self.tracker();
                tracker.processed = processed;
                tracker.successful = successful;
                tracker.failed = failed;
                tracker.skipped = skipped;
            }

            observer.on_item_complete(&id, &result);
            observer.on_progress(&BatchProgress {
                current: processed,
                total,
                successful,
                failed,
                skipped,
                percentage: BatchProgress::percentage_of(processed, total),
                item_id: id.clone(),
                item_label: label,
            });

            if let FetchResult::Failure(err) = &result {
                if !self.settings.continue_on_error {
                    aborted = Some(BatchAbort {
                        item: id.clone(),
                        error: err.clone(),
                    });
                }
            }
            results.insert(id, result);
            if aborted.is_some() {
                break;
            }

            let last = index + 1 == total;
            if called && !last && self.pause_between(&mut control).await {
                cancelled = true;
                break;
            }
        }

        let summary = BatchSummary {
            total,
            processed: successful + failed + skipped,
            successful,
            failed,
            skipped,
            duration: started.elapsed(),
            started_at,
            results,
            cancelled,
            aborted,
        };

        if let Some(error) = summary.abort_error() {
            self.tracker().state = RunState::Errored;
            observer.on_error(&error);
        } else {
            self.tracker().state = if cancelled {
                RunState::Cancelled
            } else {
                RunState::Completed
            };
            observer.on_complete(&summary);
        }
        Ok(summary)
    }

    /// Blocks while paused; returns true if the run was cancelled
    async fn wait_while_paused(&self, control: &mut watch::Receiver<Flags>) -> bool {
        match control.wait_for(|f| !f.paused || f.cancelled).await {
            Ok(flags) => flags.cancelled,
            Err(_) => true,
        }
    }

    /// Waits `request-interval`; returns true if cancelled meanwhile
    async fn pause_between(&self, control: &mut watch::Receiver<Flags>) -> bool {
        let interval = self.settings.request_interval;
        if interval.is_zero() {
            return self.is_cancelled();
        }
        let woke_on_cancel = tokio::select! {
            _ = tokio::time::sleep(interval) => false,
            flags = control.wait_for(|f| f.cancelled) => flags.is_ok(),
        };
        woke_on_cancel || self.is_cancelled()
    }

    fn admit<A: BatchAdapter>(&self, adapter: &A, item: &A::Item) -> Option<FetchError> {
        let ledger = self.quota.as_ref()?;
        let cost = adapter.estimated_cost(item);
        if cost == 0 || ledger.has_budget(cost) {
            return None;
        }
        Some(FetchError::QuotaExceeded(format!(
            "{} units needed, {} left today",
            cost,
            ledger.remaining()
        )))
    }

    async fn fetch_with_retry<A: BatchAdapter>(
        &self,
        adapter: &A,
        item: &A::Item,
        label: &str,
        control: &mut watch::Receiver<Flags>,
    ) -> FetchOutcome<A::Output> {
        let attempts = self.settings.max_retries + 1;
        let mut last_error = FetchError::Transport("no attempt made".to_string());

        for attempt in 1..=attempts {
            if attempt > 1 {
                tracing::info!("Retrying {} (attempt {}/{})", label, attempt, attempts);
                if self.pause_between(control).await {
                    break;
                }
            }

            match adapter.fetch(item).await {
                Ok(payload) => return Ok(payload),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    tracing::warn!("Attempt {}/{} for {} failed: {}", attempt, attempts, label, e);
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}

/// Keeps the first occurrence of each item id
fn dedupe<T: WorkItem>(items: Vec<T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.id()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::NoopObserver;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone)]
    struct Job(&'static str);

    impl WorkItem for Job {
        fn id(&self) -> String {
            self.0.to_string()
        }

        fn label(&self) -> String {
            format!("job {}", self.0)
        }
    }

    /// Fails items whose id starts with `bad`
    struct Echo {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl BatchAdapter for Echo {
        type Item = Job;
        type Output = String;

        async fn fetch(&self, item: &Job) -> FetchOutcome<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if item.0.starts_with("bad") {
                Err(FetchError::Api("refused".into()))
            } else {
                Ok(item.0.to_uppercase())
            }
        }

        fn is_cached(&self, item: &Job) -> bool {
            item.0.starts_with("cached")
        }

        fn estimated_cost(&self, _item: &Job) -> u64 {
            5
        }
    }

    fn settings() -> RunnerSettings {
        RunnerSettings {
            request_interval: Duration::ZERO,
            max_retries: 0,
            skip_existing: true,
            continue_on_error: true,
        }
    }

    fn echo() -> Echo {
        Echo {
            calls: AtomicUsize::new(0),
        }
    }

    #[test]
    fn test_dedupe_keeps_first() {
        let ids: Vec<String> = dedupe(vec![Job("a"), Job("b"), Job("a")])
            .iter()
            .map(|j| j.id())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_run_counts_each_outcome() {
        let runner = BatchRunner::new(settings());
        let adapter = echo();
        let summary = runner
            .run(
                &adapter,
                vec![Job("a"), Job("bad"), Job("cached"), Job("a")],
                &NoopObserver,
            )
            .await
            .unwrap();

        assert_eq!(summary.total, 3);
        assert_eq!(summary.processed, 3);
        assert_eq!(summary.successful, 1);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        assert!(!summary.cancelled);
        assert_eq!(summary.results.len(), 3);
        assert_eq!(
            summary.results.get("a"),
            Some(&FetchResult::Success("A".to_string()))
        );
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 2);
        assert_eq!(runner.status().state, RunState::Completed);
        assert!(!runner.is_running());
    }

    #[tokio::test]
    async fn test_non_retryable_errors_stop_retrying() {
        struct Quota(AtomicUsize);

        #[async_trait]
        impl BatchAdapter for Quota {
            type Item = Job;
            type Output = ();

            async fn fetch(&self, _item: &Job) -> FetchOutcome<()> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Err(FetchError::QuotaExceeded("daily".into()))
            }
        }

        let runner = BatchRunner::new(RunnerSettings {
            max_retries: 3,
            ..settings()
        });
        let adapter = Quota(AtomicUsize::new(0));
        let summary = runner.run(&adapter, vec![Job("a")], &NoopObserver).await.unwrap();

        assert_eq!(summary.failed, 1);
        assert_eq!(adapter.0.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_quota_admission_rejects_without_calling() {
        let ledger = Arc::new(QuotaLedger::new(3));
        let runner = BatchRunner::new(settings()).with_quota(ledger);
        let adapter = echo();
        let summary = runner.run(&adapter, vec![Job("a")], &NoopObserver).await.unwrap();

        assert_eq!(summary.failed, 1);
        assert!(matches!(
            summary.results.get("a"),
            Some(FetchResult::Failure(FetchError::QuotaExceeded(_)))
        ));
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_abort_when_not_continuing() {
        let runner = BatchRunner::new(RunnerSettings {
            continue_on_error: false,
            ..settings()
        });
        let adapter = echo();
        let err = runner
            .run(&adapter, vec![Job("bad"), Job("b")], &NoopObserver)
            .await
            .unwrap_err();

        assert!(matches!(err, HarvestError::BatchAborted { ref item, .. } if item == "bad"));
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 1);
        assert_eq!(runner.status().state, RunState::Errored);
        assert!(!runner.is_running());
    }

    #[tokio::test]
    async fn test_execute_keeps_partial_summary_on_abort() {
        let runner = BatchRunner::new(RunnerSettings {
            continue_on_error: false,
            ..settings()
        });
        let adapter = echo();
        let summary = runner
            .execute(&adapter, vec![Job("a"), Job("bad"), Job("c")], &NoopObserver)
            .await
            .unwrap();

        assert_eq!(
            summary.counts(),
            BatchCounts {
                processed: 2,
                successful: 1,
                failed: 1,
                skipped: 0,
            }
        );
        assert_eq!(summary.results.len(), 2);
        assert!(summary.results["bad"].is_failure());
        assert_eq!(summary.aborted.as_ref().map(|a| a.item.as_str()), Some("bad"));
        assert_eq!(runner.status().state, RunState::Errored);

        match summary.into_result() {
            Err(HarvestError::BatchAborted { item, counts, .. }) => {
                assert_eq!(item, "bad");
                assert_eq!(counts.successful, 1);
            }
            other => panic!("expected abort, got {:?}", other.map(|s| s.processed)),
        }
    }

    #[test]
    fn test_controls_are_noops_when_idle() {
        let runner = BatchRunner::new(settings());
        assert!(!runner.pause());
        assert!(!runner.resume());
        assert!(!runner.cancel());
        assert_eq!(runner.status().state, RunState::Idle);
    }

    #[tokio::test]
    async fn test_empty_batch_completes() {
        let runner = BatchRunner::new(settings());
        let summary = runner.run(&echo(), Vec::new(), &NoopObserver).await.unwrap();
        assert_eq!(summary.total, 0);
        assert_eq!(summary.processed, 0);
        assert!(!summary.cancelled);
    }
}
