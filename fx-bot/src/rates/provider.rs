//! Rate provider trait and conversion arithmetic.

use crate::currency::CurrencyCode;
use async_trait::async_trait;
use std::collections::HashMap;

/// Source of exchange rates.
///
/// Implementations bound their own latency and never fail loudly: any
/// transport, status or decoding problem is logged and reported as `None`.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Price of one unit of `base` in `target`, if available.
    async fn fetch_rate(&self, base: CurrencyCode, target: CurrencyCode) -> Option<f64>;
}

/// Fixed in-memory rates.
///
/// Pairs not in the table are unavailable. Inverse pairs are not derived.
#[derive(Debug, Clone, Default)]
pub struct StaticRates {
    rates: HashMap<(CurrencyCode, CurrencyCode), f64>,
}

impl StaticRates {
    /// Empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rate for `base -> target`.
    #[must_use]
    pub fn with_rate(mut self, base: CurrencyCode, target: CurrencyCode, rate: f64) -> Self {
        self.rates.insert((base, target), rate);
        self
    }
}

#[async_trait]
impl RateProvider for StaticRates {
    fn name(&self) -> &'static str {
        "static"
    }

    async fn fetch_rate(&self, base: CurrencyCode, target: CurrencyCode) -> Option<f64> {
        self.rates.get(&(base, target)).copied()
    }
}

/// Products at or above this magnitude have no fractional part to round.
const INTEGRAL_THRESHOLD: f64 = 4_503_599_627_370_496.0;

/// Convert `amount` at `rate`, rounded to two decimals (half to even).
///
/// Returns `None` when the product is not finite. Products of `2^52` or
/// more are already whole numbers and are returned as is, so scaling by
/// 100 cannot overflow.
#[must_use]
pub fn convert(amount: f64, rate: f64) -> Option<f64> {
    let value = amount * rate;
    if !value.is_finite() {
        return None;
    }
    if value.abs() >= INTEGRAL_THRESHOLD {
        return Some(value);
    }
    Some((value * 100.0).round_ties_even() / 100.0)
}

/// Render a number with at least one fractional digit (`54` as `54.0`).
///
/// Below `1e-4` and from `1e16` up the exponent form is used, with a signed
/// exponent of at least two digits (`2e+16`, `1e-05`).
#[must_use]
pub fn format_amount(value: f64) -> String {
    let plain = format!("{value:?}");
    if !plain.contains('e') {
        return plain;
    }
    let scientific = format!("{value:e}");
    let Some((mantissa, exponent)) = scientific.split_once('e') else {
        return plain;
    };
    let exponent: i32 = exponent.parse().unwrap_or_default();
    let sign = if exponent < 0 { '-' } else { '+' };
    format!("{mantissa}e{sign}{:02}", exponent.unsigned_abs())
}
