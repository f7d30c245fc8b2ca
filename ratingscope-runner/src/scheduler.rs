//! Background collection loop.
//!
//! One named thread runs the collection job, reloads the distribution cache
//! after each successful run and sleeps until the next one. Every sleep is a
//! `ShutdownSignal` wait, so `SchedulerHandle::stop` returns promptly even in
//! the middle of a day-long interval.

use crate::distribution_cache::DistributionCache;
use parking_lot::Mutex;
use ratingscope_core::config::ScheduleConfig;
use ratingscope_core::data::{CollectError, CollectReport, RankingCollector};
use ratingscope_core::ShutdownSignal;
use serde::Serialize;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// A unit of work the scheduler repeats.
pub trait CollectionJob: Send + Sync {
    fn name(&self) -> &str;

    fn run(&self, shutdown: &ShutdownSignal) -> Result<CollectReport, CollectError>;
}

impl CollectionJob for RankingCollector {
    fn name(&self) -> &str {
        "ranking-collector"
    }

    fn run(&self, shutdown: &ShutdownSignal) -> Result<CollectReport, CollectError> {
        RankingCollector::run(self, shutdown)
    }
}

/// Result of one scheduled run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RunOutcome {
    /// New dataset written and loaded as `generation`.
    Collected { samples: usize, generation: u64 },
    /// The ranking yielded no samples; nothing was written.
    Empty { pages_requested: u32 },
    /// The job or the reload failed; the previous dataset stays live.
    Failed { error: String },
    /// The job panicked.
    Panicked { message: String },
    /// Shutdown was requested mid-run.
    Cancelled,
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Collected { .. })
    }
}

/// Counters shared between the scheduler thread and its handle.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStatus {
    pub runs: u64,
    pub successes: u64,
    pub failures: u64,
    pub last_outcome: Option<RunOutcome>,
}

pub struct Scheduler {
    job: Arc<dyn CollectionJob>,
    cache: Arc<DistributionCache>,
    config: ScheduleConfig,
    shutdown: ShutdownSignal,
    status: Arc<Mutex<SchedulerStatus>>,
}

impl Scheduler {
    pub fn new(
        job: Arc<dyn CollectionJob>,
        cache: Arc<DistributionCache>,
        config: ScheduleConfig,
    ) -> Self {
        Self {
            job,
            cache,
            config,
            shutdown: ShutdownSignal::new(),
            status: Arc::new(Mutex::new(SchedulerStatus::default())),
        }
    }

    /// Use an externally owned signal, e.g. one also wired to Ctrl-C.
    pub fn with_shutdown(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = shutdown;
        self
    }

    pub fn status(&self) -> SchedulerStatus {
        self.status.lock().clone()
    }

    /// Run the job once and reload the cache on success. Panics in the job
    /// are caught and reported as `Panicked`.
    pub fn run_once(&self) -> RunOutcome {
        tracing::info!(job = self.job.name(), "scheduled collection starting");

        let job = Arc::clone(&self.job);
        let shutdown = self.shutdown.clone();
        let result = panic::catch_unwind(AssertUnwindSafe(|| job.run(&shutdown)));

        let outcome = match result {
            Ok(Ok(report)) => match self.cache.reload() {
                Ok(generation) => RunOutcome::Collected {
                    samples: report.samples,
                    generation,
                },
                Err(e) => RunOutcome::Failed {
                    error: format!("dataset written but reload failed: {e}"),
                },
            },
            Ok(Err(CollectError::Cancelled { .. })) => RunOutcome::Cancelled,
            Ok(Err(CollectError::NoSamples { pages_requested })) => {
                RunOutcome::Empty { pages_requested }
            }
            Ok(Err(e)) => RunOutcome::Failed {
                error: e.to_string(),
            },
            Err(payload) => RunOutcome::Panicked {
                message: panic_message(payload.as_ref()),
            },
        };

        match &outcome {
            RunOutcome::Collected {
                samples,
                generation,
            } => tracing::info!(samples, generation, "scheduled collection succeeded"),
            RunOutcome::Empty { pages_requested } => {
                tracing::warn!(pages_requested, "scheduled collection found no samples")
            }
            RunOutcome::Failed { error } => {
                tracing::error!(error = %error, "scheduled collection failed")
            }
            RunOutcome::Panicked { message } => {
                tracing::error!(message = %message, "scheduled collection panicked")
            }
            RunOutcome::Cancelled => tracing::info!("scheduled collection cancelled"),
        }

        self.record(&outcome);
        outcome
    }

    /// Sleep before the next run, or `None` to exit the loop.
    ///
    /// `failed_run_policy` only governs empty runs; errors and panics retry
    /// after the fallback interval.
    pub fn next_delay(&self, outcome: &RunOutcome) -> Option<Duration> {
        match outcome {
            RunOutcome::Collected { .. } => Some(self.config.interval()),
            RunOutcome::Empty { .. } => Some(self.config.after_empty_run()),
            RunOutcome::Failed { .. } | RunOutcome::Panicked { .. } => {
                Some(self.config.fallback_interval())
            }
            RunOutcome::Cancelled => None,
        }
    }

    /// Start the loop on a dedicated thread.
    pub fn spawn(self) -> std::io::Result<SchedulerHandle> {
        let shutdown = self.shutdown.clone();
        let status = Arc::clone(&self.status);
        let thread = thread::Builder::new()
            .name("ratingscope-scheduler".into())
            .spawn(move || self.run_loop())?;

        Ok(SchedulerHandle {
            shutdown,
            status,
            thread: Some(thread),
        })
    }

    fn run_loop(&self) {
        if !self.config.run_on_start {
            tracing::info!(
                interval_secs = self.config.interval_secs,
                "first collection deferred by one interval"
            );
            if !self.shutdown.sleep(self.config.interval()) {
                return;
            }
        }

        while !self.shutdown.is_triggered() {
            let outcome = self.run_once();
            let Some(delay) = self.next_delay(&outcome) else {
                break;
            };
            tracing::info!(sleep_secs = delay.as_secs(), "next collection scheduled");
            if !self.shutdown.sleep(delay) {
                break;
            }
        }

        tracing::info!("scheduler stopped");
    }

    fn record(&self, outcome: &RunOutcome) {
        let mut status = self.status.lock();
        status.runs += 1;
        if outcome.is_success() {
            status.successes += 1;
        } else if !matches!(outcome, RunOutcome::Cancelled) {
            status.failures += 1;
        }
        status.last_outcome = Some(outcome.clone());
    }
}

/// Owner of a running scheduler thread. Dropping it stops the thread.
pub struct SchedulerHandle {
    shutdown: ShutdownSignal,
    status: Arc<Mutex<SchedulerStatus>>,
    thread: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    pub fn status(&self) -> SchedulerStatus {
        self.status.lock().clone()
    }

    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, |t| t.is_finished())
    }

    /// Signal shutdown and wait for the thread to exit.
    pub fn stop(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.shutdown.trigger();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("scheduler thread panicked");
            }
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
