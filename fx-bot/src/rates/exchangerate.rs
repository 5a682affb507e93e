//! exchangerate-api.com client.
//!
//! `GET {base_url}/{BASE}` answers with the latest rates from `BASE` to
//! every other currency it knows:
//!
//! ```json
//! { "base": "USD", "date": "2026-10-17", "rates": { "EUR": 0.9, "GBP": 0.78 } }
//! ```

use super::provider::RateProvider;
use crate::config::RatesConfig;
use crate::currency::CurrencyCode;
use crate::error::{RateError, RateResult};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error};

/// Public endpoint used when nothing else is configured.
pub const DEFAULT_API_URL: &str = "https://api.exchangerate-api.com/v4/latest";

/// Request timeout used when nothing else is configured.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Longest error body kept for logging.
const MAX_ERROR_BODY: usize = 200;

#[derive(Debug, Deserialize)]
struct LatestRates {
    #[serde(default)]
    rates: HashMap<String, f64>,
}

/// HTTP rate provider backed by exchangerate-api.com (or a compatible API).
#[derive(Debug, Clone)]
pub struct ExchangeRateApi {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl ExchangeRateApi {
    /// Client for the public endpoint.
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_API_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Client configured from the `rates` config section.
    #[must_use]
    pub fn from_config(config: &RatesConfig) -> Self {
        Self::new()
            .with_base_url(&config.api_url)
            .with_timeout(config.timeout())
    }

    /// Point at another endpoint (no trailing slash needed).
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.base_url = url.trim_end_matches('/').to_string();
        self
    }

    /// Set the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Configured endpoint.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch one rate, keeping the failure reason.
    ///
    /// # Errors
    ///
    /// Returns a [`RateError`] on transport failure or timeout, non-success
    /// status, undecodable body, or a missing or unusable rate.
    pub async fn try_fetch_rate(
        &self,
        base: CurrencyCode,
        target: CurrencyCode,
    ) -> RateResult<f64> {
        let url = format!("{}/{}", self.base_url, base);
        debug!(%url, "requesting exchange rates");

        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| RateError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(RateError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let latest: LatestRates = response
            .json()
            .await
            .map_err(|e| RateError::Decode(e.to_string()))?;

        latest
            .rates
            .get(target.as_str())
            .copied()
            .filter(|rate| rate.is_finite() && *rate > 0.0)
            .ok_or_else(|| RateError::Missing {
                base: base.to_string(),
                target: target.to_string(),
            })
    }
}

impl Default for ExchangeRateApi {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RateProvider for ExchangeRateApi {
    fn name(&self) -> &'static str {
        "exchangerate-api"
    }

    async fn fetch_rate(&self, base: CurrencyCode, target: CurrencyCode) -> Option<f64> {
        match self.try_fetch_rate(base, target).await {
            Ok(rate) => {
                debug!(%base, %target, rate, "exchange rate fetched");
                Some(rate)
            }
            Err(e) => {
                error!(%base, %target, error = %e, "exchange rate lookup failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let api = ExchangeRateApi::new()
            .with_base_url("http://localhost:8080/v4/latest/")
            .with_timeout(Duration::from_secs(3));
        assert_eq!(api.base_url(), "http://localhost:8080/v4/latest");
        assert_eq!(api.timeout, Duration::from_secs(3));
        assert_eq!(api.name(), "exchangerate-api");
    }

    #[test]
    fn test_decode_latest() {
        let latest: LatestRates =
            serde_json::from_str(r#"{"base":"USD","rates":{"EUR":0.9,"USD":1}}"#).unwrap();
        assert_eq!(latest.rates.get("EUR"), Some(&0.9));
        assert_eq!(latest.rates.get("USD"), Some(&1.0));

        let empty: LatestRates = serde_json::from_str(r#"{"result":"error"}"#).unwrap();
        assert!(empty.rates.is_empty());
    }
}
