//! Per-user query: rating lookup plus percentile and distribution.

use crate::distribution_cache::DistributionCache;
use ratingscope_core::config::QueryConfig;
use ratingscope_core::data::RatingLookup;
use ratingscope_core::stats::{Distribution, DistributionKey, DistributionKeyError};
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum QueryError {
    #[error("username must not be empty")]
    EmptyUsername,

    #[error(transparent)]
    InvalidKey(#[from] DistributionKeyError),
}

/// One line of input: `username [kind [param]]`.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryRequest {
    pub username: String,
    pub key: DistributionKey,
}

impl QueryRequest {
    /// Parse a whitespace-separated request line. The key defaults to a
    /// Scott-rule density.
    pub fn parse_line(line: &str) -> Result<Self, QueryError> {
        let mut parts = line.split_whitespace();
        let username = parts.next().ok_or(QueryError::EmptyUsername)?.to_string();
        let key = match parts.next() {
            Some(kind) => DistributionKey::parse(kind, parts.next())?,
            None => DistributionKey::default(),
        };
        Ok(Self { username, key })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryResult {
    pub username: String,
    pub rating: u32,
    /// False when the lookup failed or the user does not exist.
    pub rating_known: bool,
    pub percentile: f64,
    /// Requested distribution evaluated at `rating`.
    pub density_at_rating: f64,
    pub distribution: Arc<Distribution>,
    pub generation: u64,
}

pub struct QueryService {
    lookup: Arc<dyn RatingLookup>,
    cache: Arc<DistributionCache>,
    config: QueryConfig,
}

impl QueryService {
    pub fn new(
        lookup: Arc<dyn RatingLookup>,
        cache: Arc<DistributionCache>,
        config: QueryConfig,
    ) -> Self {
        Self {
            lookup,
            cache,
            config,
        }
    }

    pub fn cache(&self) -> &Arc<DistributionCache> {
        &self.cache
    }

    /// Answer one query. Every statistic comes from the same generation.
    pub fn query(&self, username: &str, key: DistributionKey) -> Result<QueryResult, QueryError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(QueryError::EmptyUsername);
        }

        let (rating, rating_known) = match self.lookup.lookup_rating(username) {
            Ok(Some(rating)) => (rating, true),
            Ok(None) => {
                tracing::info!(username, "user not found, using placeholder rating");
                (self.config.unknown_rating, false)
            }
            Err(e) => {
                tracing::warn!(username, error = %e, "rating lookup failed, using placeholder rating");
                (self.config.unknown_rating, false)
            }
        };

        let generation = self.cache.snapshot();
        let distribution = generation.distribution(key);
        let value = f64::from(rating);

        Ok(QueryResult {
            username: username.to_string(),
            rating,
            rating_known,
            percentile: generation.percentile(value),
            density_at_rating: distribution.density_at(value),
            distribution,
            generation: generation.id(),
        })
    }

    pub fn handle(&self, request: &QueryRequest) -> Result<QueryResult, QueryError> {
        self.query(&request.username, request.key)
    }
}
