//! The history cache service: serve-from-store when fresh, recompute
//! through the valuation engine otherwise.

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, Utc};
use dashmap::mapref::entry::Entry as MapEntry;
use dashmap::DashMap;
use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Mutex};

use crate::constants::PRICE_LOOKBACK_DAYS;
use crate::errors::Result;
use crate::fx::{self, DailyRateMap};
use crate::history::history_model::{HistoryConfig, HistoryResponse, UpdateOutcome};
use crate::history::history_traits::HistoryStoreTrait;
use crate::ledger::{LedgerReaderTrait, Trade};
use crate::prices::{fill_missing_prices, PriceOracleTrait, PricePoint};
use crate::utils::time_utils;
use crate::valuation::engine;
use crate::valuation::{
    CalculationStatus, HoldingsState, PortfolioHistoryRecord, ValuationTotals,
};

#[async_trait]
pub trait HistoryServiceTrait: Send + Sync {
    /// Serves the portfolio's daily history, recomputing first when the
    /// cached set is older than `max_age_minutes` (or incomplete).
    /// `max_age_minutes` is caller policy: interactive callers pass a loose
    /// bound, maintenance passes 0.
    async fn get_history(
        &self,
        portfolio_id: &str,
        from: Option<NaiveDate>,
        till: Option<NaiveDate>,
        max_age_minutes: i64,
    ) -> Result<HistoryResponse>;

    /// Recomputes the portfolio's history: incrementally from the last
    /// cached date minus the safety window, or fully from the earliest
    /// trade when `full_recalculation` is set. At most one update per
    /// portfolio runs at a time; a concurrent incremental request joins the
    /// in-flight update and shares its result instead of recomputing.
    async fn update_history(&self, portfolio_id: &str, full_recalculation: bool)
        -> UpdateOutcome;

    /// Recomputes and upserts records for specific days only (gap repair).
    async fn backfill_dates(&self, portfolio_id: &str, dates: &[NaiveDate]) -> Result<usize>;
}

/// The shared outcome of one recalculation pass, broadcast to every caller
/// joined on it.
type FlightResult = Result<usize>;

pub struct HistoryService {
    ledger: Arc<dyn LedgerReaderTrait>,
    price_oracle: Arc<dyn PriceOracleTrait>,
    store: Arc<dyn HistoryStoreTrait>,
    config: HistoryConfig,
    /// Per-portfolio locks serializing recalculation and backfill.
    update_locks: DashMap<String, Arc<Mutex<()>>>,
    /// Updates currently in flight. Concurrent incremental callers
    /// subscribe here instead of starting a second pass.
    in_flight: DashMap<String, watch::Receiver<Option<FlightResult>>>,
}

/// Removes the in-flight entry once the owning update finishes, including
/// when its future is dropped mid-computation.
struct FlightGuard<'a> {
    flights: &'a DashMap<String, watch::Receiver<Option<FlightResult>>>,
    portfolio_id: String,
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.flights.remove(&self.portfolio_id);
    }
}

impl HistoryService {
    pub fn new(
        ledger: Arc<dyn LedgerReaderTrait>,
        price_oracle: Arc<dyn PriceOracleTrait>,
        store: Arc<dyn HistoryStoreTrait>,
        config: HistoryConfig,
    ) -> Self {
        Self {
            ledger,
            price_oracle,
            store,
            config,
            update_locks: DashMap::new(),
            in_flight: DashMap::new(),
        }
    }

    fn portfolio_lock(&self, portfolio_id: &str) -> Arc<Mutex<()>> {
        self.update_locks
            .entry(portfolio_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// The typed update path shared by `update_history` and `get_history`.
    ///
    /// Single-flight: the first caller claims the portfolio's flight slot
    /// and runs the recalculation; an incremental request arriving while
    /// that pass is in flight subscribes to its broadcast result instead of
    /// recomputing. Forced full recalculations wait for the current flight
    /// to land and then run their own pass.
    async fn update_history_inner(&self, portfolio_id: &str, full: bool) -> Result<usize> {
        loop {
            let flight = self.in_flight.get(portfolio_id).map(|entry| entry.clone());
            if let Some(mut rx) = flight {
                match Self::join_flight(&mut rx).await {
                    Some(result) if !full => {
                        debug!(
                            "Joined in-flight update for portfolio '{}'",
                            portfolio_id
                        );
                        return result;
                    }
                    // Forced full, or the flight was dropped mid-pass:
                    // go around and claim the slot ourselves.
                    _ => continue,
                }
            }

            let (tx, rx) = watch::channel(None);
            let claimed = match self.in_flight.entry(portfolio_id.to_string()) {
                MapEntry::Occupied(_) => false,
                MapEntry::Vacant(slot) => {
                    slot.insert(rx);
                    true
                }
            };
            if !claimed {
                // Lost the race; join the winner on the next iteration.
                continue;
            }
            let _flight = FlightGuard {
                flights: &self.in_flight,
                portfolio_id: portfolio_id.to_string(),
            };

            let lock = self.portfolio_lock(portfolio_id);
            let _guard = lock.lock().await;

            let result: FlightResult = match self.recalculate(portfolio_id, full).await {
                Ok(count) => Ok(count),
                Err(e) => {
                    if let Err(status_err) = self
                        .store
                        .set_status(portfolio_id, CalculationStatus::Failed)
                        .await
                    {
                        warn!(
                            "Failed to mark portfolio '{}' as failed: {}",
                            portfolio_id, status_err
                        );
                    }
                    Err(e)
                }
            };
            let _ = tx.send(Some(result.clone()));
            return result;
        }
    }

    /// Waits for an in-flight update to publish its result. `None` means
    /// the computing task was cancelled before finishing.
    async fn join_flight(
        rx: &mut watch::Receiver<Option<FlightResult>>,
    ) -> Option<FlightResult> {
        loop {
            if let Some(result) = rx.borrow().clone() {
                return Some(result);
            }
            if rx.changed().await.is_err() {
                return None;
            }
        }
    }

    /// Runs one recalculation pass. Caller must hold the portfolio lock.
    async fn recalculate(&self, portfolio_id: &str, full: bool) -> Result<usize> {
        let started = Instant::now();
        let today = time_utils::today();

        let Some(earliest) = self.ledger.earliest_trade_date(portfolio_id).await? else {
            debug!(
                "Portfolio '{}' has no trades; nothing to recalculate",
                portfolio_id
            );
            return Ok(0);
        };

        let start = if full {
            earliest
        } else {
            match self.store.latest_record_date(portfolio_id)? {
                Some(last_cached) => (last_cached
                    - Duration::days(self.config.safety_window_days))
                .max(earliest)
                .min(today),
                None => earliest,
            }
        };

        // A crash after this point leaves IN_PROGRESS behind; the next
        // update treats that as stale and starts over.
        self.store
            .set_status(portfolio_id, CalculationStatus::InProgress)
            .await?;

        let records = self.compute_range(portfolio_id, start, today).await?;
        let count = records.len();
        self.store
            .commit_history(portfolio_id, &records, CalculationStatus::Complete, full)
            .await?;

        debug!(
            "Recalculated {} day(s) for portfolio '{}' ({}) in {:?}",
            count,
            portfolio_id,
            if full { "full" } else { "incremental" },
            started.elapsed()
        );
        Ok(count)
    }

    /// Computes one record per calendar day over `[start, end]`, carrying
    /// the replay state forward day by day.
    async fn compute_range(
        &self,
        portfolio_id: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PortfolioHistoryRecord>> {
        let base_currency = self.ledger.portfolio_base_currency(portfolio_id).await?;
        let base_currency = fx::normalize_currency_code(&base_currency).to_string();
        let trades = self.ledger.trades_until(portfolio_id, end).await?;

        // Seed the replay state with everything before the window.
        let (past, window): (Vec<Trade>, Vec<Trade>) =
            trades.iter().cloned().partition(|t| t.trade_day() < start);
        let mut state = HoldingsState::from_trades(&past);

        let mut trades_by_day: HashMap<NaiveDate, Vec<Trade>> = HashMap::new();
        for trade in window {
            trades_by_day.entry(trade.trade_day()).or_default().push(trade);
        }

        let prices_by_date = self
            .fetch_filled_prices(&trades, start, end)
            .await?;
        let rates_by_date = self
            .fetch_filled_rates(&trades, &prices_by_date, &base_currency, start, end)
            .await?;

        let mut previous_totals: Option<ValuationTotals> = match start.pred_opt() {
            Some(day_before) => self
                .store
                .get_record_on(portfolio_id, day_before)?
                .map(|r| r.totals),
            None => None,
        };

        let empty_prices = HashMap::new();
        let empty_rates = DailyRateMap::new();
        let mut records = Vec::new();
        for day in time_utils::get_days_between(start, end) {
            if let Some(day_trades) = trades_by_day.remove(&day) {
                state.apply_trades(&day_trades);
            }

            let prices_today = prices_by_date.get(&day).unwrap_or(&empty_prices);
            let rates_today = rates_by_date.get(&day).unwrap_or(&empty_rates);

            let mut record = engine::value_holdings(
                portfolio_id,
                &state,
                prices_today,
                rates_today,
                day,
                &base_currency,
            )?;
            record.totals.today_result_base =
                engine::today_result(&record.totals, previous_totals.as_ref());
            previous_totals = Some(record.totals.clone());
            records.push(record);
        }

        Ok(records)
    }

    /// Security prices for every non-FX symbol in the ledger, carry-forward
    /// filled over `[start, end]`, grouped by date.
    async fn fetch_filled_prices(
        &self,
        trades: &[Trade],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<HashMap<NaiveDate, HashMap<String, PricePoint>>> {
        let symbols: HashSet<String> = trades
            .iter()
            .filter_map(|t| t.symbol.as_deref())
            .filter(|s| fx::parse_fx_symbol(s).is_none())
            .map(str::to_string)
            .collect();
        if symbols.is_empty() {
            return Ok(HashMap::new());
        }

        let lookback_start = start - Duration::days(PRICE_LOOKBACK_DAYS);
        let raw = self
            .price_oracle
            .prices_in_range(&symbols, lookback_start, end)
            .await?;
        let filled = fill_missing_prices(&raw, &symbols, start, end);

        let mut by_date: HashMap<NaiveDate, HashMap<String, PricePoint>> = HashMap::new();
        for point in filled {
            by_date
                .entry(point.date)
                .or_default()
                .insert(point.symbol.clone(), point);
        }
        Ok(by_date)
    }

    /// FX rates to base for every currency the range can touch, fetched as
    /// FX-pair symbols from the oracle and carry-forward filled like prices.
    async fn fetch_filled_rates(
        &self,
        trades: &[Trade],
        prices_by_date: &HashMap<NaiveDate, HashMap<String, PricePoint>>,
        base_currency: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<HashMap<NaiveDate, DailyRateMap>> {
        let mut currencies: HashSet<String> = HashSet::new();
        for trade in trades {
            currencies.insert(fx::normalize_currency_code(&trade.currency).to_string());
            // FX-pair trades touch both legs
            if let Some((from, to)) = trade.symbol.as_deref().and_then(fx::parse_fx_symbol) {
                currencies.insert(from);
                currencies.insert(to);
            }
        }
        for daily in prices_by_date.values() {
            for point in daily.values() {
                currencies.insert(fx::normalize_currency_code(&point.currency).to_string());
            }
        }
        currencies.remove(base_currency);
        if currencies.is_empty() {
            return Ok(HashMap::new());
        }

        let pair_symbols: HashSet<String> = currencies
            .iter()
            .map(|c| fx::fx_pair_symbol(c, base_currency))
            .collect();
        let lookback_start = start - Duration::days(PRICE_LOOKBACK_DAYS);
        let raw = self
            .price_oracle
            .prices_in_range(&pair_symbols, lookback_start, end)
            .await?;
        let filled = fill_missing_prices(&raw, &pair_symbols, start, end);

        let mut by_date: HashMap<NaiveDate, DailyRateMap> = HashMap::new();
        for point in filled {
            let Some(pair) = fx::parse_fx_symbol(&point.symbol) else {
                continue;
            };
            by_date.entry(point.date).or_default().insert(pair, point.price);
        }
        Ok(by_date)
    }
}

#[async_trait]
impl HistoryServiceTrait for HistoryService {
    async fn get_history(
        &self,
        portfolio_id: &str,
        from: Option<NaiveDate>,
        till: Option<NaiveDate>,
        max_age_minutes: i64,
    ) -> Result<HistoryResponse> {
        let now = Utc::now();
        if let Some(meta) = self.store.get_metadata(portfolio_id)? {
            let age = meta.age_minutes(now);
            if meta.calculation_status == CalculationStatus::Complete && age <= max_age_minutes
            {
                let days = self.store.get_records(portfolio_id, from, till)?;
                return Ok(HistoryResponse {
                    days,
                    cached: true,
                    cache_age_minutes: age,
                });
            }
        }

        match self.update_history_inner(portfolio_id, false).await {
            Ok(_) => {}
            // The never-priced case is the one error interactive callers see.
            Err(e) if e.is_fatal_valuation() => return Err(e),
            Err(e) => {
                warn!(
                    "Update for portfolio '{}' failed ({}); serving stored records",
                    portfolio_id, e
                );
            }
        }

        let days = self.store.get_records(portfolio_id, from, till)?;
        Ok(HistoryResponse {
            days,
            cached: false,
            cache_age_minutes: 0,
        })
    }

    async fn update_history(
        &self,
        portfolio_id: &str,
        full_recalculation: bool,
    ) -> UpdateOutcome {
        match self
            .update_history_inner(portfolio_id, full_recalculation)
            .await
        {
            Ok(count) => UpdateOutcome::ok(count),
            Err(e) => UpdateOutcome::failed(e.to_string()),
        }
    }

    async fn backfill_dates(&self, portfolio_id: &str, dates: &[NaiveDate]) -> Result<usize> {
        if dates.is_empty() {
            return Ok(0);
        }
        let lock = self.portfolio_lock(portfolio_id);
        let _guard = lock.lock().await;

        let start = *dates.iter().min().unwrap_or(&dates[0]);
        let end = *dates.iter().max().unwrap_or(&dates[0]);
        let wanted: HashSet<NaiveDate> = dates.iter().copied().collect();

        self.store
            .set_status(portfolio_id, CalculationStatus::InProgress)
            .await?;
        let computed = self.compute_range(portfolio_id, start, end).await?;
        let records: Vec<PortfolioHistoryRecord> = computed
            .into_iter()
            .filter(|r| wanted.contains(&r.date))
            .collect();
        self.store
            .commit_history(portfolio_id, &records, CalculationStatus::Complete, false)
            .await?;
        Ok(records.len())
    }
}
