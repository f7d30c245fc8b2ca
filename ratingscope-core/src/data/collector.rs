//! Ranking collector: paginates the ranking endpoint into one dataset.
//!
//! Per-page failures never abort a run: a 429 is retried on the same page
//! after a cooldown, anything else is logged and the page is skipped. Only
//! a run that gathered nothing at all is reported as failed, and in that case
//! the store is left alone so an empty result never replaces good data.

use super::provider::{CollectProgress, LogProgress, RankingSource};
use super::store::{RatingStore, StoreError};
use crate::config::CollectorConfig;
use crate::shutdown::ShutdownSignal;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CollectError {
    #[error("collection produced no samples after {pages_requested} request(s)")]
    NoSamples { pages_requested: u32 },

    #[error("collection cancelled with {collected} sample(s) gathered")]
    Cancelled { collected: usize },

    #[error("failed to persist dataset: {0}")]
    Store(#[from] StoreError),
}

/// Counters for one collection run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectReport {
    /// Ceiling of the entry estimate over the page size.
    pub expected_pages: u32,
    /// HTTP requests issued, retries included.
    pub requests: u32,
    /// Pages whose items were appended.
    pub pages_collected: u32,
    /// Pages skipped after an error or too many 429s.
    pub pages_failed: u32,
    /// 429 responses received.
    pub rate_limited: u32,
    /// Checkpoints persisted during cooldown pauses.
    pub checkpoints: u32,
    /// An empty page ended the run before `expected_pages`.
    pub stopped_early: bool,
    /// Samples in the persisted dataset.
    pub samples: usize,
}

/// Paginates a `RankingSource` and persists the result through `RatingStore`.
pub struct RankingCollector {
    source: Arc<dyn RankingSource>,
    store: RatingStore,
    checkpoint: RatingStore,
    config: CollectorConfig,
    progress: Arc<dyn CollectProgress>,
}

impl RankingCollector {
    pub fn new(
        source: Arc<dyn RankingSource>,
        store: RatingStore,
        checkpoint: RatingStore,
        config: CollectorConfig,
    ) -> Self {
        Self {
            source,
            store,
            checkpoint,
            config,
            progress: Arc::new(LogProgress),
        }
    }

    pub fn with_progress(mut self, progress: Arc<dyn CollectProgress>) -> Self {
        self.progress = progress;
        self
    }

    pub fn store(&self) -> &RatingStore {
        &self.store
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Run one full collection and replace the dataset on success.
    pub fn run(&self, shutdown: &ShutdownSignal) -> Result<CollectReport, CollectError> {
        let (samples, mut report) = self.collect(shutdown)?;

        if samples.is_empty() {
            tracing::warn!(
                source = self.source.name(),
                requests = report.requests,
                "collection gathered nothing, keeping existing dataset"
            );
            return Err(CollectError::NoSamples {
                pages_requested: report.requests,
            });
        }

        self.store.write(&samples)?;
        report.samples = samples.len();
        tracing::info!(
            source = self.source.name(),
            samples = report.samples,
            pages = report.pages_collected,
            failed = report.pages_failed,
            rate_limited = report.rate_limited,
            "collection complete"
        );
        Ok(report)
    }

    /// The page loop. Returns the accumulator without touching the store.
    fn collect(&self, shutdown: &ShutdownSignal) -> Result<(Vec<u32>, CollectReport), CollectError> {
        let expected_pages = self.config.expected_pages();
        let cycle = self.config.pages_per_cycle.max(1);
        let mut report = CollectReport {
            expected_pages,
            ..CollectReport::default()
        };
        let mut ratings: Vec<u32> = Vec::new();

        tracing::info!(
            source = self.source.name(),
            expected_pages,
            "starting collection"
        );

        let mut page: u32 = 1;
        let mut last_pause_page: u32 = 0;
        let mut rate_limit_hits: u32 = 0;

        while page <= expected_pages {
            if shutdown.is_triggered() {
                return Err(CollectError::Cancelled {
                    collected: ratings.len(),
                });
            }

            // Cooldown pause every `cycle` pages, once per page even across 429 retries.
            if page > 1 && (page - 1) % cycle == 0 && last_pause_page != page {
                last_pause_page = page;
                if self.checkpoint_partial(page, &ratings) {
                    report.checkpoints += 1;
                }
                tracing::info!(
                    page,
                    cooldown_secs = self.config.cycle_cooldown_secs,
                    "rate-limit cycle reached, pausing"
                );
                if !shutdown.sleep(self.config.cycle_cooldown()) {
                    return Err(CollectError::Cancelled {
                        collected: ratings.len(),
                    });
                }
            }

            self.progress.on_page(page, expected_pages, ratings.len());
            report.requests += 1;

            match self.source.fetch_page(page) {
                Ok(items) => {
                    rate_limit_hits = 0;
                    if items.is_empty() {
                        tracing::info!(page, "empty page, reached end of ranking");
                        report.stopped_early = true;
                        break;
                    }
                    ratings.extend_from_slice(&items);
                    report.pages_collected += 1;
                    page += 1;
                }
                Err(e) if e.is_rate_limited() => {
                    report.rate_limited += 1;
                    rate_limit_hits += 1;
                    if rate_limit_hits > self.config.max_rate_limit_retries {
                        self.progress.on_page_failed(page, &e);
                        report.pages_failed += 1;
                        rate_limit_hits = 0;
                        page += 1;
                        continue;
                    }
                    tracing::warn!(
                        page,
                        attempt = rate_limit_hits,
                        cooldown_secs = self.config.rate_limit_cooldown_secs,
                        error = %e,
                        "rate limited, retrying same page"
                    );
                    if !shutdown.sleep(self.config.rate_limit_cooldown()) {
                        return Err(CollectError::Cancelled {
                            collected: ratings.len(),
                        });
                    }
                }
                Err(e) => {
                    self.progress.on_page_failed(page, &e);
                    report.pages_failed += 1;
                    rate_limit_hits = 0;
                    page += 1;
                    if !shutdown.sleep(self.config.error_delay()) {
                        return Err(CollectError::Cancelled {
                            collected: ratings.len(),
                        });
                    }
                }
            }
        }

        self.progress.on_finished(report.requests, ratings.len());
        Ok((ratings, report))
    }

    /// Best-effort checkpoint of the partial accumulator.
    fn checkpoint_partial(&self, page: u32, ratings: &[u32]) -> bool {
        if ratings.is_empty() {
            return false;
        }
        let result = self
            .checkpoint
            .write(ratings)
            .map_err(|e: StoreError| e.to_string());
        self.progress.on_checkpoint(page, ratings.len(), &result);
        result.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::provider::{DataError, NoProgress};
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Scripted source: pops one response per request.
    struct Scripted {
        responses: Mutex<VecDeque<Result<Vec<u32>, DataError>>>,
        requested: Mutex<Vec<u32>>,
    }

    impl Scripted {
        fn new(responses: Vec<Result<Vec<u32>, DataError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                requested: Mutex::new(Vec::new()),
            })
        }
    }

    impl RankingSource for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        fn fetch_page(&self, page: u32) -> Result<Vec<u32>, DataError> {
            self.requested.lock().push(page);
            self.responses.lock().pop_front().unwrap_or(Ok(vec![]))
        }
    }

    fn quick_config(total: u64, page_size: u64, cycle: u32) -> CollectorConfig {
        CollectorConfig {
            total_entries_estimate: total,
            page_size,
            pages_per_cycle: cycle,
            cycle_cooldown_secs: 0,
            rate_limit_cooldown_secs: 0,
            error_delay_secs: 0,
            max_rate_limit_retries: 2,
            ..CollectorConfig::default()
        }
    }

    fn collector(
        source: Arc<Scripted>,
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

    #[test]
    fn expected_pages_bound_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let source = Scripted::new(vec![Ok(vec![1, 2]), Ok(vec![3, 4]), Ok(vec![5])]);
        let c = collector(source.clone(), &dir, quick_config(5, 2, 100));

        let report = c.run(&ShutdownSignal::new()).unwrap();
        assert_eq!(report.expected_pages, 3);
        assert_eq!(report.samples, 5);
        assert!(!report.stopped_early);
        assert_eq!(*source.requested.lock(), vec![1, 2, 3]);
    }

    #[test]
    fn rate_limit_retries_are_capped() {
        let dir = tempfile::tempdir().unwrap();
        let limited = || Err(DataError::RateLimited { retry_after_secs: 0 });
        let source = Scripted::new(vec![
            limited(),
            limited(),
            limited(),
            Ok(vec![9]),
        ]);
        let c = collector(source.clone(), &dir, quick_config(4, 2, 100));

        let report = c.run(&ShutdownSignal::new()).unwrap();
        // Two retries allowed, third 429 skips page 1; page 2 yields the data.
        assert_eq!(*source.requested.lock(), vec![1, 1, 1, 2]);
        assert_eq!(report.rate_limited, 3);
        assert_eq!(report.pages_failed, 1);
        assert_eq!(c.store().read().unwrap().values(), &[9]);
    }

    #[test]
    fn checkpoint_written_at_cycle_boundary() {
        let dir = tempfile::tempdir().unwrap();
        let source = Scripted::new(vec![
            Ok(vec![10]),
            Ok(vec![20]),
            Ok(vec![30]),
            Ok(vec![]),
        ]);
        let c = collector(source, &dir, quick_config(100, 1, 2));

        let report = c.run(&ShutdownSignal::new()).unwrap();
        assert_eq!(report.checkpoints, 1);
        let partial = RatingStore::new(dir.path().join("ratings.partial.csv"));
        assert_eq!(partial.read().unwrap().values(), &[10, 20]);
        assert_eq!(c.store().read().unwrap().values(), &[10, 20, 30]);
    }

    #[test]
    fn cancelled_before_start_leaves_store_absent() {
        let dir = tempfile::tempdir().unwrap();
        let source = Scripted::new(vec![Ok(vec![1])]);
        let c = collector(source.clone(), &dir, quick_config(10, 1, 100));

        let shutdown = ShutdownSignal::new();
        shutdown.trigger();
        assert!(matches!(
            c.run(&shutdown),
            Err(CollectError::Cancelled { collected: 0 })
        ));
        assert!(!c.store().exists());
        assert!(source.requested.lock().is_empty());
    }
}
