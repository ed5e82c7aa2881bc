use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tube_harvest::batch::{
    BatchAdapter, BatchObserver, BatchProgress, BatchRunner, NoopObserver, RunnerSettings,
    WorkItem,
};
use tube_harvest::{FetchError, FetchOutcome, FetchResult, HarvestError};

#[derive(Clone)]
struct Job(String);

impl WorkItem for Job {
    fn id(&self) -> String {
        self.0.clone()
    }

    fn label(&self) -> String {
        format!("job {}", self.0)
    }
}

fn jobs(ids: &[&str]) -> Vec<Job> {
    ids.iter().map(|id| Job(id.to_string())).collect()
}

/// Fails every item whose id starts with `bad`, after an optional delay
struct Scripted {
    calls: AtomicUsize,
    delay: Duration,
}

impl Scripted {
    fn new(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BatchAdapter for Scripted {
    type Item = Job;
    type Output = usize;

    async fn fetch(&self, item: &Job) -> FetchOutcome<usize> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if item.0.starts_with("bad") {
            Err(FetchError::Transport("connection reset".to_string()))
        } else {
            Ok(item.0.len())
        }
    }
}

#[derive(Default)]
struct Recorder {
    events: Mutex<Vec<BatchProgress>>,
    errors: AtomicUsize,
}

impl BatchObserver<usize> for Recorder {
    fn on_progress(&self, progress: &BatchProgress) {
        self.events.lock().unwrap().push(progress.clone());
    }

    fn on_error(&self, _error: &HarvestError) {
        self.errors.fetch_add(1, Ordering::SeqCst);
    }
}

fn settings(interval_ms: u64, max_retries: u32) -> RunnerSettings {
    RunnerSettings {
        request_interval: Duration::from_millis(interval_ms),
        max_retries,
        skip_existing: false,
        continue_on_error: true,
    }
}

#[tokio::test]
async fn test_mixed_batch_counts() {
    let runner = BatchRunner::new(settings(0, 0));
    let adapter = Scripted::new(Duration::ZERO);

    let summary = runner
        .run(&adapter, jobs(&["one", "bad", "three"]), &NoopObserver)
        .await
        .expect("run failed");

    assert_eq!(summary.total, 3);
    assert_eq!(summary.successful, 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.skipped, 0);
    assert_eq!(summary.processed, 3);
    assert!(!summary.cancelled);
    assert!(summary.results["bad"].is_failure());
    assert_eq!(summary.results["three"], FetchResult::Success(5));
}

#[tokio::test]
async fn test_failing_item_is_retried() {
    let runner = BatchRunner::new(settings(5, 1));
    let adapter = Scripted::new(Duration::ZERO);

    let summary = runner
        .run(&adapter, jobs(&["bad"]), &NoopObserver)
        .await
        .expect("run failed");

    // One attempt plus one retry
    assert_eq!(adapter.calls(), 2);
    assert_eq!(summary.failed, 1);
    assert_eq!(
        summary.results["bad"].error(),
        Some(&FetchError::Transport("connection reset".to_string()))
    );
}

#[tokio::test]
async fn test_progress_counters_add_up() {
    let runner = BatchRunner::new(settings(0, 0));
    let adapter = Scripted::new(Duration::ZERO);
    let recorder = Recorder::default();

    runner
        .run(&adapter, jobs(&["a", "bad1", "c", "bad2"]), &recorder)
        .await
        .expect("run failed");

    let events = recorder.events.lock().unwrap();
    assert_eq!(events.len(), 4);
    for (i, event) in events.iter().enumerate() {
        assert_eq!(event.current, i + 1);
        assert_eq!(event.current, event.successful + event.failed + event.skipped);
        assert_eq!(event.total, 4);
    }
    assert_eq!(events[1].percentage, 50);
    assert_eq!(events[3].percentage, 100);
    assert_eq!(events[3].item_label, "job bad2");
}

#[tokio::test]
async fn test_cancel_stops_between_items() {
    let runner = BatchRunner::new(settings(50, 0));
    let adapter = Scripted::new(Duration::from_millis(20));
    let items = jobs(&["a", "b", "c", "d", "e", "f", "g", "h", "i", "j"]);

    let (summary, cancelled) = tokio::join!(runner.run(&adapter, items, &NoopObserver), async {
        tokio::time::sleep(Duration::from_millis(80)).await;
        runner.cancel()
    });

    let summary = summary.expect("run failed");
    assert!(cancelled);
    assert!(summary.cancelled);
    assert!(summary.processed < summary.total);
    assert_eq!(summary.processed, summary.results.len());

    // Controls are inert once the run has ended
    assert!(!runner.is_running());
    assert!(!runner.cancel());
}

#[tokio::test]
async fn test_pause_and_resume() {
    let runner = BatchRunner::new(settings(20, 0));
    let adapter = Scripted::new(Duration::from_millis(10));

    let (summary, (first, second, paused, resumed)) = tokio::join!(
        runner.run(&adapter, jobs(&["a", "b", "c"]), &NoopObserver),
        async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            let first = runner.pause();
            let second = runner.pause();
            tokio::time::sleep(Duration::from_millis(60)).await;
            let paused = runner.is_paused();
            let resumed = runner.resume();
            (first, second, paused, resumed)
        }
    );

    assert!(first);
    assert!(!second);
    assert!(paused);
    assert!(resumed);

    let summary = summary.expect("run failed");
    assert!(!summary.cancelled);
    assert_eq!(summary.successful, 3);
}

#[tokio::test]
async fn test_cancel_while_paused() {
    let runner = BatchRunner::new(settings(10, 0));
    let adapter = Scripted::new(Duration::from_millis(5));

    let (summary, _) = tokio::join!(
        runner.run(&adapter, jobs(&["a", "b", "c", "d"]), &NoopObserver),
        async {
            tokio::time::sleep(Duration::from_millis(2)).await;
            runner.pause();
            tokio::time::sleep(Duration::from_millis(30)).await;
            runner.cancel();
        }
    );

    let summary = summary.expect("run failed");
    assert!(summary.cancelled);
    assert!(summary.processed < 4);
}

#[tokio::test]
async fn test_second_run_is_rejected() {
    let runner = BatchRunner::new(settings(0, 0));
    let adapter = Scripted::new(Duration::from_millis(30));

    let (first, second) = tokio::join!(
        runner.run(&adapter, jobs(&["a", "b"]), &NoopObserver),
        async {
            tokio::time::sleep(Duration::from_millis(5)).await;
            runner.run(&adapter, jobs(&["c"]), &NoopObserver).await
        }
    );

    assert!(first.is_ok());
    assert!(matches!(second, Err(HarvestError::BatchInProgress)));
    assert_eq!(adapter.calls(), 2);
}

#[tokio::test]
async fn test_abort_notifies_observer() {
    let runner = BatchRunner::new(RunnerSettings {
        continue_on_error: false,
        ..settings(0, 0)
    });
    let adapter = Scripted::new(Duration::ZERO);
    let recorder = Recorder::default();

    let result = runner
        .run(&adapter, jobs(&["a", "bad", "c"]), &recorder)
        .await;

    match result {
        Err(HarvestError::BatchAborted { item, .. }) => assert_eq!(item, "bad"),
        other => panic!("expected abort, got {:?}", other.map(|s| s.processed)),
    }
    assert_eq!(recorder.errors.load(Ordering::SeqCst), 1);
    assert_eq!(adapter.calls(), 2);
    assert!(!runner.is_running());
}
