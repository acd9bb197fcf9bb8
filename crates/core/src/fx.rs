//! Currency handling: code normalization, FX-pair symbols, and the daily
//! rate map used by the valuation engine.
//!
//! Rate convention (fixed for the whole crate): `rate(from -> to)` is the
//! number of `to` units per one `from` unit, so every conversion site
//! multiplies: `amount_to = amount_from * rate`. When only the reciprocal
//! pair is quoted, the inverse is used.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::OnceLock;

use crate::errors::{Result, ValuationError};
use chrono::NaiveDate;

/// Pre-fetched FX rates for a single day: (from_currency, to_currency) -> rate.
pub type DailyRateMap = HashMap<(String, String), Decimal>;

#[derive(Debug, Clone)]
struct MinorUnitRule {
    major_code: &'static str,
    factor: Decimal,
}

static MINOR_UNIT_RULES: OnceLock<HashMap<&'static str, MinorUnitRule>> = OnceLock::new();

fn minor_unit_rules() -> &'static HashMap<&'static str, MinorUnitRule> {
    MINOR_UNIT_RULES.get_or_init(|| {
        let mut map = HashMap::new();
        map.insert(
            "GBp",
            MinorUnitRule {
                major_code: "GBP",
                factor: dec!(0.01),
            },
        );
        map.insert(
            "GBX",
            MinorUnitRule {
                major_code: "GBP",
                factor: dec!(0.01),
            },
        );
        map.insert(
            "ZAc",
            MinorUnitRule {
                major_code: "ZAR",
                factor: dec!(0.01),
            },
        );
        map.insert(
            "ILA",
            MinorUnitRule {
                major_code: "ILS",
                factor: dec!(0.01),
            },
        );
        map
    })
}

/// Converts an amount possibly expressed in a minor unit (pence, agorot, ...)
/// into its major unit and returns the normalized currency code.
pub fn normalize_amount(amount: Decimal, currency: &str) -> (Decimal, &str) {
    match minor_unit_rules().get(currency) {
        Some(rule) => (amount * rule.factor, rule.major_code),
        None => (amount, currency),
    }
}

/// Returns the major currency code for FX lookups without touching the amount.
pub fn normalize_currency_code(currency: &str) -> &str {
    match minor_unit_rules().get(currency) {
        Some(rule) => rule.major_code,
        None => currency,
    }
}

/// Recognizes an FX-pair marker in a ledger symbol.
///
/// Accepted forms: `EURUSD=X` (oracle style) and `EUR/USD`. Returns
/// `(from, to)` currency codes. Plain six-letter tickers without a marker are
/// deliberately not treated as pairs.
pub fn parse_fx_symbol(symbol: &str) -> Option<(String, String)> {
    let symbol = symbol.trim();

    if let Some(pair) = symbol.strip_suffix("=X") {
        if pair.len() == 6 && pair.chars().all(|c| c.is_ascii_uppercase()) {
            return Some((pair[..3].to_string(), pair[3..].to_string()));
        }
        return None;
    }

    if let Some((from, to)) = symbol.split_once('/') {
        if from.len() == 3
            && to.len() == 3
            && from.chars().all(|c| c.is_ascii_uppercase())
            && to.chars().all(|c| c.is_ascii_uppercase())
        {
            return Some((from.to_string(), to.to_string()));
        }
    }

    None
}

/// The oracle symbol quoting `from -> to`, e.g. `EURUSD=X` for EUR -> USD.
pub fn fx_pair_symbol(from: &str, to: &str) -> String {
    format!("{}{}=X", from, to)
}

/// Looks up a rate in the daily map, falling back to the inverse pair.
/// Returns an error if neither direction is quoted.
pub fn rate_from_map(
    rates: &DailyRateMap,
    from: &str,
    to: &str,
    date: NaiveDate,
) -> Result<Decimal> {
    if from == to {
        return Ok(Decimal::ONE);
    }

    let pair = (from.to_string(), to.to_string());
    if let Some(rate) = rates.get(&pair) {
        return Ok(*rate);
    }

    let inverse_pair = (to.to_string(), from.to_string());
    match rates.get(&inverse_pair) {
        Some(inverse) if *inverse != Decimal::ZERO => Ok(Decimal::ONE / *inverse),
        _ => Err(
            ValuationError::MissingFxRate(from.to_string(), to.to_string(), date).into(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 2).unwrap()
    }

    #[test]
    fn normalizes_pence_amounts() {
        let (amount, code) = normalize_amount(dec!(250), "GBp");
        assert_eq!(amount, dec!(2.50));
        assert_eq!(code, "GBP");
        let (amount, code) = normalize_amount(dec!(100), "USD");
        assert_eq!(amount, dec!(100));
        assert_eq!(code, "USD");
    }

    #[test]
    fn recognizes_fx_pair_markers() {
        assert_eq!(
            parse_fx_symbol("EURUSD=X"),
            Some(("EUR".to_string(), "USD".to_string()))
        );
        assert_eq!(
            parse_fx_symbol("CHF/EUR"),
            Some(("CHF".to_string(), "EUR".to_string()))
        );
        assert_eq!(parse_fx_symbol("EURUSD"), None);
        assert_eq!(parse_fx_symbol("AAPL"), None);
        assert_eq!(parse_fx_symbol("BRK/B"), None);
    }

    #[test]
    fn rate_lookup_uses_inverse_fallback() {
        let mut rates = DailyRateMap::new();
        rates.insert(("USD".to_string(), "EUR".to_string()), dec!(0.8));

        assert_eq!(rate_from_map(&rates, "USD", "EUR", date()).unwrap(), dec!(0.8));
        assert_eq!(
            rate_from_map(&rates, "EUR", "USD", date()).unwrap(),
            Decimal::ONE / dec!(0.8)
        );
        assert_eq!(rate_from_map(&rates, "EUR", "EUR", date()).unwrap(), Decimal::ONE);
        assert!(rate_from_map(&rates, "EUR", "JPY", date()).is_err());
    }
}
