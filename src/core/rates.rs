//! Exchange rate snapshots and the fetch abstraction

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashMap;
use thiserror::Error;

/// Rates for one base currency at one point in time: units of each target
/// currency per 1 unit of `base`.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeRateSnapshot {
    pub base: String,
    pub rates: HashMap<String, f64>,
    pub as_of: Option<NaiveDate>,
}

impl ExchangeRateSnapshot {
    pub fn new(base: &str, rates: HashMap<String, f64>) -> Self {
        Self {
            base: base.to_string(),
            rates,
            as_of: None,
        }
    }

    pub fn rate(&self, code: &str) -> Option<f64> {
        self.rates.get(code).copied()
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("malformed request for base currency '{code}': {reason}")]
    MalformedRequest { code: String, reason: String },
    #[error("request failed for base currency '{code}': {source}")]
    Transport {
        code: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("HTTP error: {status} for base currency '{code}'")]
    HttpStatus {
        code: String,
        status: reqwest::StatusCode,
    },
    #[error("failed to decode rates for base currency '{code}': {reason}")]
    Decode { code: String, reason: String },
}

impl FetchError {
    /// What a user sees for any fetch failure.
    pub const USER_MESSAGE: &'static str = "Failed to fetch exchange rates";
}

#[async_trait]
pub trait RateFetcher: Send + Sync {
    async fn fetch_rates(&self, base: &str) -> Result<ExchangeRateSnapshot, FetchError>;
}
