use chrono::{NaiveDate, Utc};

use crate::constants::DATE_FORMAT;
use crate::errors::Result;

/// The valuation date for "now". All freshness and end-of-range decisions
/// derive today from this single place.
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Inclusive list of calendar days from `start` to `end`.
pub fn get_days_between(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    if start > end {
        return Vec::new();
    }
    let mut days = Vec::new();
    let mut current = start;
    while current <= end {
        days.push(current);
        match current.succ_opt() {
            Some(next) => current = next,
            // Only reachable at NaiveDate::MAX
            None => break,
        }
    }
    days
}

/// Parses an ISO `YYYY-MM-DD` date from the command boundary.
pub fn parse_iso_date(value: &str) -> Result<NaiveDate> {
    Ok(NaiveDate::parse_from_str(value.trim(), DATE_FORMAT)?)
}
