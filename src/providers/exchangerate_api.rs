use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Url;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, error, instrument};

use crate::core::rates::{ExchangeRateSnapshot, FetchError, RateFetcher};

pub const DEFAULT_BASE_URL: &str = "https://api.exchangerate-api.com";

// Rate table provider serving `/v4/latest/{CODE}`
pub struct ExchangeRateApiProvider {
    base_url: String,
    client: reqwest::Client,
}

impl ExchangeRateApiProvider {
    pub fn new(base_url: &str) -> Self {
        ExchangeRateApiProvider {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn request_url(&self, code: &str) -> Result<Url, FetchError> {
        if code.trim().is_empty() {
            return Err(FetchError::MalformedRequest {
                code: code.to_string(),
                reason: "currency code is empty".to_string(),
            });
        }
        let mut url = Url::parse(&self.base_url).map_err(|e| FetchError::MalformedRequest {
            code: code.to_string(),
            reason: format!("{e}: {}", self.base_url),
        })?;
        // The code is a single escaped segment, so `/`, `?` and `#` can't retarget the request.
        url.path_segments_mut()
            .map_err(|()| FetchError::MalformedRequest {
                code: code.to_string(),
                reason: format!("base URL cannot carry a path: {}", self.base_url),
            })?
            .pop_if_empty()
            .extend(["v4", "latest", code]);
        Ok(url)
    }
}

#[derive(Debug, Deserialize)]
struct LatestRatesResponse {
    rates: HashMap<String, f64>,
    #[serde(default)]
    date: Option<String>,
}

#[async_trait]
impl RateFetcher for ExchangeRateApiProvider {
    #[instrument(
        name = "ExchangeRateFetch",
        skip(self),
        fields(base = %base)
    )]
    async fn fetch_rates(&self, base: &str) -> Result<ExchangeRateSnapshot, FetchError> {
        let url = self.request_url(base)?;
        debug!("Requesting exchange rates from {}", url);

        let response = self
            .client
            .get(url)
            .header(
                reqwest::header::USER_AGENT,
                concat!("xconv/", env!("CARGO_PKG_VERSION")),
            )
            .send()
            .await
            .map_err(|source| FetchError::Transport {
                code: base.to_string(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(FetchError::HttpStatus {
                code: base.to_string(),
                status: response.status(),
            });
        }

        let text = response.text().await.map_err(|source| FetchError::Transport {
            code: base.to_string(),
            source,
        })?;

        let data: LatestRatesResponse = match serde_json::from_str(&text) {
            Ok(data) => data,
            Err(e) => {
                error!(
                    error = ?e,
                    response = %text,
                    "Failed to parse exchange rate response"
                );
                return Err(FetchError::Decode {
                    code: base.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let as_of = data
            .date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok());
        debug!(count = data.rates.len(), ?as_of, "Received exchange rates");

        Ok(ExchangeRateSnapshot {
            base: base.to_string(),
            rates: data.rates,
            as_of,
        })
    }
}
