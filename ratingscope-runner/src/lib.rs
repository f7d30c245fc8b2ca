//! RatingScope Runner: the long-lived parts of the service.
//!
//! This crate builds on `ratingscope-core` to provide:
//! - `DistributionCache`, generation-scoped memoization of KDEs and histograms
//! - `Scheduler`, the cancellable background collection loop
//! - `QueryService`, per-user rating lookup with percentile and distribution

pub mod distribution_cache;
pub mod query;
pub mod scheduler;

pub use distribution_cache::{DistributionCache, Generation};
pub use query::{QueryError, QueryRequest, QueryResult, QueryService};
pub use scheduler::{
    CollectionJob, RunOutcome, Scheduler, SchedulerHandle, SchedulerStatus,
};
