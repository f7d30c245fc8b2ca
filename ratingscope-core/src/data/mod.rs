//! Rating data: the solved.ac client, the on-disk store and the ranking
//! collector that connects them.

pub mod bootstrap;
pub mod collector;
pub mod provider;
pub mod solvedac;
pub mod store;

pub use bootstrap::bootstrap_samples;
pub use collector::{CollectError, CollectReport, RankingCollector};
pub use provider::{
    CollectProgress, DataError, LogProgress, NoProgress, RankingSource, RatingLookup,
};
pub use solvedac::SolvedAcClient;
pub use store::{data_hash, DatasetMeta, RatingStore, StoreError};
