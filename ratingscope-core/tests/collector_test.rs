//! Integration tests for the ranking collector against scripted sources.

use parking_lot::Mutex;
use ratingscope_core::config::CollectorConfig;
use ratingscope_core::data::{
    CollectError, CollectProgress, DataError, NoProgress, RankingCollector, RankingSource,
    RatingStore,
};
use ratingscope_core::ShutdownSignal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

// ── Fixtures ─────────────────────────────────────────────────────────

/// Serves fixed responses per page; each page's responses are consumed in
/// order and the last one repeats.
struct PagedSource {
    pages: Mutex<HashMap<u32, Vec<Result<Vec<u32>, DataError>>>>,
    requested: Mutex<Vec<u32>>,
}

impl PagedSource {
    fn new() -> Self {
        Self {
            pages: Mutex::new(HashMap::new()),
            requested: Mutex::new(Vec::new()),
        }
    }

    fn page(self, page: u32, responses: Vec<Result<Vec<u32>, DataError>>) -> Self {
        self.pages.lock().insert(page, responses);
        self
    }

    fn requested(&self) -> Vec<u32> {
        self.requested.lock().clone()
    }
}

impl RankingSource for PagedSource {
    fn name(&self) -> &str {
        "paged"
    }

    fn fetch_page(&self, page: u32) -> Result<Vec<u32>, DataError> {
        self.requested.lock().push(page);
        let mut pages = self.pages.lock();
        match pages.get_mut(&page) {
            Some(responses) if responses.len() > 1 => responses.remove(0),
            Some(responses) => responses[0].clone(),
            None => Ok(vec![]),
        }
    }
}

/// Records every checkpoint attempt as `(page, succeeded)`.
#[derive(Default)]
struct CheckpointLog {
    attempts: Mutex<Vec<(u32, bool)>>,
}

impl CollectProgress for CheckpointLog {
    fn on_page(&self, _page: u32, _expected_pages: u32, _collected: usize) {}

    fn on_checkpoint(&self, page: u32, _collected: usize, result: &Result<(), String>) {
        self.attempts.lock().push((page, result.is_ok()));
    }

    fn on_page_failed(&self, _page: u32, _error: &DataError) {}

    fn on_finished(&self, _pages_requested: u32, _collected: usize) {}
}

fn fast_config(total: u64, page_size: u64) -> CollectorConfig {
    CollectorConfig {
        total_entries_estimate: total,
        page_size,
        pages_per_cycle: 300,
        cycle_cooldown_secs: 0,
        rate_limit_cooldown_secs: 0,
        error_delay_secs: 0,
        ..CollectorConfig::default()
    }
}

fn build(
    source: Arc<PagedSource>,
    dir: &tempfile::TempDir,
    config: CollectorConfig,
) -> RankingCollector {
    RankingCollector::new(
        source,
        RatingStore::new(dir.path().join("ratings.csv")),
        RatingStore::new(dir.path().join("ratings.partial.csv")),
        config,
    )
    .with_progress(Arc::new(NoProgress))
}

// ── Pagination ───────────────────────────────────────────────────────

#[test]
fn empty_page_ends_collection() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(
        PagedSource::new()
            .page(1, vec![Ok(vec![3000, 2900])])
            .page(2, vec![Ok(vec![2800, 2700])])
            .page(3, vec![Ok(vec![2600])])
            .page(4, vec![Ok(vec![])]),
    );
    let collector = build(source.clone(), &dir, fast_config(1000, 2));

    let report = collector.run(&ShutdownSignal::new()).unwrap();

    assert_eq!(source.requested(), vec![1, 2, 3, 4]);
    assert!(report.stopped_early);
    assert_eq!(report.requests, 4);
    assert_eq!(report.pages_collected, 3);
    let stored = collector.store().read().unwrap();
    assert_eq!(stored.values(), &[3000, 2900, 2800, 2700, 2600]);
    assert!(!stored.is_bootstrap());
}

#[test]
fn rate_limited_page_is_retried_without_duplication() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(
        PagedSource::new()
            .page(1, vec![Ok(vec![10, 20])])
            .page(
                2,
                vec![
                    Err(DataError::RateLimited { retry_after_secs: 60 }),
                    Ok(vec![30, 40]),
                ],
            ),
    );
    let collector = build(source.clone(), &dir, fast_config(4, 2));

    let report = collector.run(&ShutdownSignal::new()).unwrap();

    assert_eq!(source.requested(), vec![1, 2, 2]);
    assert_eq!(report.rate_limited, 1);
    assert_eq!(report.pages_failed, 0);
    assert_eq!(collector.store().read().unwrap().values(), &[10, 20, 30, 40]);
}

#[test]
fn server_errors_skip_the_page() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(
        PagedSource::new()
            .page(1, vec![Ok(vec![1])])
            .page(2, vec![Err(DataError::HttpStatus { status: 503 })])
            .page(3, vec![Err(DataError::Timeout("read timed out".into()))])
            .page(4, vec![Ok(vec![4])]),
    );
    let collector = build(source.clone(), &dir, fast_config(4, 1));

    let report = collector.run(&ShutdownSignal::new()).unwrap();

    assert_eq!(source.requested(), vec![1, 2, 3, 4]);
    assert_eq!(report.pages_failed, 2);
    assert_eq!(collector.store().read().unwrap().values(), &[1, 4]);
}

// ── Cooldown cycles and checkpoints ──────────────────────────────────

#[test]
fn rate_limited_cycle_start_pauses_once() {
    let dir = tempfile::tempdir().unwrap();
    let limited = || Err(DataError::RateLimited { retry_after_secs: 0 });
    let source = Arc::new(
        PagedSource::new()
            .page(1, vec![Ok(vec![10])])
            .page(2, vec![Ok(vec![20])])
            .page(3, vec![limited(), limited(), Ok(vec![30])]),
    );
    let config = CollectorConfig {
        pages_per_cycle: 2,
        max_rate_limit_retries: 5,
        ..fast_config(3, 1)
    };
    let log = Arc::new(CheckpointLog::default());
    let collector = build(source.clone(), &dir, config).with_progress(log.clone());

    let report = collector.run(&ShutdownSignal::new()).unwrap();

    assert_eq!(source.requested(), vec![1, 2, 3, 3, 3]);
    assert_eq!(report.rate_limited, 2);
    assert_eq!(report.checkpoints, 1);
    assert_eq!(*log.attempts.lock(), vec![(3, true)]);
    assert_eq!(collector.store().read().unwrap().values(), &[10, 20, 30]);
}

#[test]
fn unwritable_checkpoint_does_not_stop_collection() {
    let dir = tempfile::tempdir().unwrap();
    // A regular file where the checkpoint directory should be.
    let blocker = dir.path().join("blocked");
    std::fs::write(&blocker, "not a directory").unwrap();

    let source = Arc::new(
        PagedSource::new()
            .page(1, vec![Ok(vec![10])])
            .page(2, vec![Ok(vec![20])])
            .page(3, vec![Ok(vec![30])]),
    );
    let config = CollectorConfig {
        pages_per_cycle: 2,
        ..fast_config(3, 1)
    };
    let log = Arc::new(CheckpointLog::default());
    let collector = RankingCollector::new(
        source,
        RatingStore::new(dir.path().join("ratings.csv")),
        RatingStore::new(blocker.join("ratings.partial.csv")),
        config,
    )
    .with_progress(log.clone());

    let report = collector.run(&ShutdownSignal::new()).unwrap();

    assert_eq!(report.checkpoints, 0);
    assert_eq!(*log.attempts.lock(), vec![(3, false)]);
    assert_eq!(report.samples, 3);
    assert_eq!(collector.store().read().unwrap().values(), &[10, 20, 30]);
}

// ── Failure leaves store untouched ───────────────────────────────────

#[test]
fn all_pages_failing_keeps_previous_dataset() {
    let dir = tempfile::tempdir().unwrap();
    let store = RatingStore::new(dir.path().join("ratings.csv"));
    store.write(&[1111, 2222]).unwrap();
    let before = std::fs::read(store.path()).unwrap();

    let source = Arc::new(
        PagedSource::new()
            .page(1, vec![Err(DataError::NetworkUnreachable("dns".into()))])
            .page(2, vec![Err(DataError::HttpStatus { status: 500 })])
            .page(3, vec![Err(DataError::ResponseFormatChanged("no items".into()))]),
    );
    let collector = build(source, &dir, fast_config(3, 1));

    let err = collector.run(&ShutdownSignal::new()).unwrap_err();
    assert!(matches!(err, CollectError::NoSamples { pages_requested: 3 }));
    assert_eq!(std::fs::read(store.path()).unwrap(), before);
}

#[test]
fn first_page_empty_is_a_failed_run() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(PagedSource::new().page(1, vec![Ok(vec![])]));
    let collector = build(source, &dir, fast_config(100, 10));

    assert!(matches!(
        collector.run(&ShutdownSignal::new()),
        Err(CollectError::NoSamples { pages_requested: 1 })
    ));
    assert!(!collector.store().exists());
}

// ── Cancellation ─────────────────────────────────────────────────────

#[test]
fn shutdown_interrupts_rate_limit_cooldown() {
    let dir = tempfile::tempdir().unwrap();
    let source = Arc::new(PagedSource::new().page(
        1,
        vec![Err(DataError::RateLimited { retry_after_secs: 3600 })],
    ));
    let config = CollectorConfig {
        rate_limit_cooldown_secs: 3600,
        ..fast_config(10, 1)
    };
    let collector = build(source, &dir, config);

    let shutdown = ShutdownSignal::new();
    let trigger = shutdown.clone();
    let stopper = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        trigger.trigger();
    });

    let started = Instant::now();
    let result = collector.run(&shutdown);
    stopper.join().unwrap();

    assert!(matches!(result, Err(CollectError::Cancelled { .. })));
    assert!(started.elapsed() < Duration::from_secs(30));
    assert!(!collector.store().exists());
}
