//! Trading-day policy used by gap detection.
//!
//! Records themselves are produced for every calendar day (prices carry
//! forward over closed markets); the calendar only decides which missing
//! days the maintenance job treats as gaps.

use chrono::{Datelike, NaiveDate, Weekday};
use std::collections::HashSet;

#[derive(Debug, Clone, Default)]
pub struct TradingCalendar {
    exclude_weekends: bool,
    holidays: HashSet<NaiveDate>,
}

impl TradingCalendar {
    /// Strictest policy: every calendar day counts as a trading day.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_weekends_excluded(mut self) -> Self {
        self.exclude_weekends = true;
        self
    }

    pub fn with_holidays<I: IntoIterator<Item = NaiveDate>>(mut self, holidays: I) -> Self {
        self.holidays.extend(holidays);
        self
    }

    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        if self.exclude_weekends
            && matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
        {
            return false;
        }
        !self.holidays.contains(&date)
    }
}
