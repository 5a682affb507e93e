//! Exchange rate lookup.
//!
//! The dialogue only needs "how many units of `target` does one `base`
//! buy", and treats every failure the same way. [`RateProvider`] captures
//! that contract; [`ExchangeRateApi`] implements it over HTTP.

mod exchangerate;
mod provider;

pub use exchangerate::{DEFAULT_API_URL, ExchangeRateApi};
pub use provider::{RateProvider, StaticRates, convert, format_amount};
