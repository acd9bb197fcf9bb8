//! The daily maintenance job: force-full recalculation for every portfolio
//! with history, gap repair, and retention pruning.

use chrono::{Duration, NaiveDate, Utc};
use futures::future::join_all;
use log::{error, info, warn};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use crate::calendar::TradingCalendar;
use crate::errors::Result;
use crate::history::{HistoryServiceTrait, HistoryStoreTrait};
use crate::maintenance::maintenance_model::{MaintenanceConfig, MaintenanceSummary};
use crate::utils::time_utils;

/// Per-portfolio tally, folded into the run summary.
#[derive(Debug, Default)]
struct PortfolioReport {
    records_updated: usize,
    gaps_detected: usize,
    gaps_filled: usize,
    records_cleaned: usize,
    error: Option<String>,
}

pub struct MaintenanceService {
    history: Arc<dyn HistoryServiceTrait>,
    store: Arc<dyn HistoryStoreTrait>,
    calendar: TradingCalendar,
    config: MaintenanceConfig,
}

impl MaintenanceService {
    pub fn new(
        history: Arc<dyn HistoryServiceTrait>,
        store: Arc<dyn HistoryStoreTrait>,
        calendar: TradingCalendar,
        config: MaintenanceConfig,
    ) -> Self {
        Self {
            history,
            store,
            calendar,
            config,
        }
    }

    /// Runs one maintenance pass over every portfolio with stored history.
    /// Portfolios are processed in bounded concurrent batches with a pause
    /// between batches; one portfolio's failure never aborts the run.
    pub async fn run_daily_maintenance(&self) -> Result<MaintenanceSummary> {
        let started = Instant::now();
        let portfolio_ids = self.store.portfolio_ids_with_history()?;
        info!(
            "Maintenance run starting for {} portfolio(s)",
            portfolio_ids.len()
        );

        let mut summary = MaintenanceSummary::default();
        let mut batches = portfolio_ids.chunks(self.config.batch_size.max(1)).peekable();
        while let Some(batch) = batches.next() {
            let reports = join_all(batch.iter().map(|id| self.maintain_portfolio(id))).await;
            for (portfolio_id, report) in batch.iter().zip(reports) {
                match report.error {
                    Some(ref message) => {
                        warn!("Maintenance failed for portfolio '{}': {}", portfolio_id, message);
                        summary.portfolios_with_errors += 1;
                    }
                    None if report.records_updated == 0 && report.gaps_filled == 0 => {
                        summary.portfolios_skipped += 1;
                    }
                    None => summary.portfolios_processed += 1,
                }
                summary.total_records_updated += report.records_updated;
                summary.gaps_detected += report.gaps_detected;
                summary.gaps_filled += report.gaps_filled;
                summary.old_records_cleaned += report.records_cleaned;
            }
            if batches.peek().is_some() && self.config.batch_pause_ms > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(self.config.batch_pause_ms))
                    .await;
            }
        }

        summary.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            "Maintenance run finished: {} processed, {} skipped, {} failed, {} record(s) updated, {}/{} gap(s) filled, {} pruned, {}ms",
            summary.portfolios_processed,
            summary.portfolios_skipped,
            summary.portfolios_with_errors,
            summary.total_records_updated,
            summary.gaps_filled,
            summary.gaps_detected,
            summary.old_records_cleaned,
            summary.duration_ms
        );
        Ok(summary)
    }

    /// Fires `run_daily_maintenance` once per day at the configured UTC time.
    /// Never returns; run it on its own task.
    pub async fn run_on_schedule(self: Arc<Self>) {
        loop {
            let now = Utc::now();
            let todays_run = now.date_naive().and_time(self.config.run_at_utc).and_utc();
            let next_run = if todays_run > now {
                todays_run
            } else {
                todays_run + Duration::days(1)
            };
            let wait = (next_run - now).to_std().unwrap_or_default();
            info!("Next maintenance run scheduled at {}", next_run);
            tokio::time::sleep(wait).await;

            if let Err(e) = self.run_daily_maintenance().await {
                error!("Maintenance run failed: {}", e);
            }
        }
    }

    async fn maintain_portfolio(&self, portfolio_id: &str) -> PortfolioReport {
        let mut report = PortfolioReport::default();

        // Maintenance cannot cheaply verify upstream price corrections, so
        // it always forces a full recalculation.
        let outcome = self.history.update_history(portfolio_id, true).await;
        report.records_updated = outcome.records_updated;
        if !outcome.success {
            report.error = outcome.error;
            return report;
        }

        match self.repair_gaps(portfolio_id).await {
            Ok((detected, filled)) => {
                report.gaps_detected = detected;
                report.gaps_filled = filled;
            }
            Err(e) => {
                report.error = Some(e.to_string());
                return report;
            }
        }

        if let Some(retention_days) = self.config.retention_days {
            let cutoff = time_utils::today() - Duration::days(retention_days);
            match self.store.delete_records_before(portfolio_id, cutoff).await {
                Ok(cleaned) => report.records_cleaned = cleaned,
                Err(e) => report.error = Some(e.to_string()),
            }
        }
        report
    }

    /// Scans the stored date sequence for missing trading days and backfills
    /// them. Returns `(detected, filled)`.
    async fn repair_gaps(&self, portfolio_id: &str) -> Result<(usize, usize)> {
        let Some(meta) = self.store.get_metadata(portfolio_id)? else {
            return Ok((0, 0));
        };
        let (Some(from), Some(till)) = (meta.date_from, meta.date_till) else {
            return Ok((0, 0));
        };

        let present: HashSet<NaiveDate> = self
            .store
            .get_records(portfolio_id, Some(from), Some(till))?
            .into_iter()
            .map(|r| r.date)
            .collect();
        let gaps: Vec<NaiveDate> = time_utils::get_days_between(from, till)
            .into_iter()
            .filter(|day| self.calendar.is_trading_day(*day) && !present.contains(day))
            .collect();
        if gaps.is_empty() {
            return Ok((0, 0));
        }

        warn!(
            "Portfolio '{}' has {} gap day(s) between {} and {}; backfilling",
            portfolio_id,
            gaps.len(),
            from,
            till
        );
        let filled = self.history.backfill_dates(portfolio_id, &gaps).await?;
        Ok((gaps.len(), filled))
    }
}
