//! Carry-forward filling of daily price series.

use chrono::NaiveDate;
use log::debug;
use std::collections::{HashMap, HashSet};

use super::PricePoint;
use crate::utils::time_utils;

/// Produces one price per required symbol per day over `[start, end]`,
/// carrying the most recent known price forward over days the oracle did not
/// quote. Raw points dated before `start` only seed the carry-forward state
/// (callers fetch with a lookback window for exactly that purpose).
///
/// A symbol with no quote anywhere in the input stays absent from the output
/// entirely; deciding whether that is fatal is the valuation engine's call.
pub fn fill_missing_prices(
    raw: &[PricePoint],
    required_symbols: &HashSet<String>,
    start: NaiveDate,
    end: NaiveDate,
) -> Vec<PricePoint> {
    if required_symbols.is_empty() {
        return Vec::new();
    }

    let mut points_by_date: HashMap<NaiveDate, HashMap<&str, &PricePoint>> = HashMap::new();
    for point in raw {
        if required_symbols.contains(&point.symbol) {
            points_by_date
                .entry(point.date)
                .or_default()
                .insert(point.symbol.as_str(), point);
        }
    }

    // Seed last-known prices from everything quoted strictly before `start`,
    // most recent quote winning.
    let mut last_known: HashMap<String, PricePoint> = HashMap::new();
    let mut lookback_dates: Vec<NaiveDate> = points_by_date
        .keys()
        .filter(|d| **d < start)
        .copied()
        .collect();
    lookback_dates.sort();
    for date in lookback_dates {
        if let Some(daily) = points_by_date.get(&date) {
            for point in daily.values() {
                last_known.insert(point.symbol.clone(), (*point).clone());
            }
        }
    }

    let mut filled = Vec::new();
    for current_date in time_utils::get_days_between(start, end) {
        if let Some(daily) = points_by_date.get(&current_date) {
            for point in daily.values() {
                last_known.insert(point.symbol.clone(), (*point).clone());
            }
        }

        for symbol in required_symbols {
            match last_known.get(symbol) {
                Some(known) if known.date == current_date => filled.push(known.clone()),
                Some(known) => {
                    let mut carried = known.clone();
                    carried.date = current_date;
                    carried.carried_forward = true;
                    filled.push(carried);
                }
                None => {
                    debug!(
                        "No price available for '{}' on or before {}",
                        symbol, current_date
                    );
                }
            }
        }
    }

    filled
}
