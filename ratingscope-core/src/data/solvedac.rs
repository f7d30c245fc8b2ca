//! solved.ac data source.
//!
//! Fetches ranking pages from `/api/v3/ranking/tier` and single users from
//! `/api/v3/search/user`. Status handling is thin: 429 maps to
//! `DataError::RateLimited` and every other failure is reported to the
//! caller, which owns the retry/skip policy.

use super::provider::{DataError, RankingSource, RatingLookup};
use crate::config::CollectorConfig;
use serde::Deserialize;
use std::time::Duration;

/// Envelope shared by the ranking and search endpoints.
#[derive(Debug, Deserialize)]
struct ItemsResponse {
    #[serde(default)]
    items: Vec<RatedItem>,
}

#[derive(Debug, Deserialize)]
struct RatedItem {
    rating: u32,
}

/// Blocking HTTP client for solved.ac.
pub struct SolvedAcClient {
    client: reqwest::blocking::Client,
    ranking_url: String,
    search_url: String,
}

impl SolvedAcClient {
    pub fn new(config: &CollectorConfig) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("ratingscope/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DataError::Other(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            ranking_url: config.ranking_url.clone(),
            search_url: config.search_url.clone(),
        })
    }

    /// GET `url` with the given query and decode the `items` envelope.
    fn get_items(&self, url: &str, query: &[(&str, &str)]) -> Result<Vec<RatedItem>, DataError> {
        let resp = self
            .client
            .get(url)
            .query(query)
            .header("Accept", "application/json")
            .header("x-solvedac-language", "")
            .send()
            .map_err(classify_transport_error)?;

        let status = resp.status();

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0);
            return Err(DataError::RateLimited {
                retry_after_secs: retry_after,
            });
        }

        if !status.is_success() {
            return Err(DataError::HttpStatus {
                status: status.as_u16(),
            });
        }

        let body: ItemsResponse = resp
            .json()
            .map_err(|e| DataError::ResponseFormatChanged(format!("failed to parse {url}: {e}")))?;
        Ok(body.items)
    }
}

fn classify_transport_error(e: reqwest::Error) -> DataError {
    if e.is_timeout() {
        DataError::Timeout(e.to_string())
    } else {
        DataError::NetworkUnreachable(e.to_string())
    }
}

impl RankingSource for SolvedAcClient {
    fn name(&self) -> &str {
        "solved.ac"
    }

    fn fetch_page(&self, page: u32) -> Result<Vec<u32>, DataError> {
        let page = page.to_string();
        let items = self.get_items(&self.ranking_url, &[("page", page.as_str())])?;
        Ok(items.into_iter().map(|item| item.rating).collect())
    }
}

impl RatingLookup for SolvedAcClient {
    fn lookup_rating(&self, username: &str) -> Result<Option<u32>, DataError> {
        match self.get_items(&self.search_url, &[("query", username)]) {
            Ok(items) => Ok(items.first().map(|item| item.rating)),
            // The search endpoint answers 404 for names it has never seen.
            Err(DataError::HttpStatus { status: 404 }) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
