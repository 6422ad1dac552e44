//! Amount conversion and rate description formatting

use super::rates::ExchangeRateSnapshot;
use thiserror::Error;

pub const INVALID_INPUT: &str = "Invalid input";
pub const RATE_NOT_AVAILABLE: &str = "Exchange rate: Not available";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConvertError {
    #[error("'{0}' is not a valid amount")]
    InvalidAmount(String),
    #[error("no rate for {0} in the current snapshot")]
    RateUnavailable(String),
}

/// Parses raw amount text as-is, without trimming. Non-finite values are rejected.
pub fn parse_amount(amount_text: &str) -> Result<f64, ConvertError> {
    amount_text
        .parse::<f64>()
        .ok()
        .filter(|amount| amount.is_finite())
        .ok_or_else(|| ConvertError::InvalidAmount(amount_text.to_string()))
}

/// Converts `amount_text` into `target` using `snapshot`.
///
/// The snapshot is assumed to be keyed by the source currency; only the target
/// rate is looked up.
pub fn try_convert(
    amount_text: &str,
    target: &str,
    snapshot: &ExchangeRateSnapshot,
) -> Result<f64, ConvertError> {
    let amount = parse_amount(amount_text)?;
    let rate = snapshot
        .rate(target)
        .ok_or_else(|| ConvertError::RateUnavailable(target.to_string()))?;
    Ok(amount * rate)
}

/// Display form of a conversion: the amount with two decimals, or [`INVALID_INPUT`].
pub fn convert(
    amount_text: &str,
    _source: &str,
    target: &str,
    snapshot: &ExchangeRateSnapshot,
) -> String {
    match try_convert(amount_text, target, snapshot) {
        Ok(converted) => format!("{converted:.2}"),
        Err(_) => INVALID_INPUT.to_string(),
    }
}

/// Display form of the rate between `source` and `target`, e.g. `1 USD to EUR: 1.5`.
pub fn describe_rate(source: &str, target: &str, snapshot: &ExchangeRateSnapshot) -> String {
    match snapshot.rate(target) {
        Some(rate) => format!("1 {source} to {target}: {rate:?}"),
        None => RATE_NOT_AVAILABLE.to_string(),
    }
}
