//! SQLite-backed implementation of the history store.
//!
//! Reads go straight to the pool; every write runs on the write actor so
//! records and metadata land in one immediate transaction.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;

use super::model::{format_timestamp, HistoryMetadataDB, PortfolioHistoryRecordDB};
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::portfolio_history as ph;
use crate::schema::portfolio_history_metadata as md;
use foliocache_core::errors::Result;
use foliocache_core::history::HistoryStoreTrait;
use foliocache_core::valuation::{CalculationStatus, HistoryMetadata, PortfolioHistoryRecord};

pub struct SqliteHistoryStore {
    pool: DbPool,
    writer: WriteHandle,
}

impl SqliteHistoryStore {
    pub fn new(pool: DbPool, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }
}

/// Recomputes the metadata row from the stored record set and upserts it.
/// Must run inside the same transaction as the record write it describes.
fn refresh_metadata(
    conn: &mut SqliteConnection,
    portfolio_id: &str,
    status: CalculationStatus,
    last_updated: DateTime<Utc>,
) -> Result<HistoryMetadata> {
    let (date_from, date_till, total_records): (Option<NaiveDate>, Option<NaiveDate>, i64) =
        ph::table
            .filter(ph::portfolio_id.eq(portfolio_id))
            .select((
                diesel::dsl::min(ph::history_date),
                diesel::dsl::max(ph::history_date),
                diesel::dsl::count_star(),
            ))
            .first(conn)
            .map_err(StorageError::from)?;

    let row = HistoryMetadataDB {
        portfolio_id: portfolio_id.to_string(),
        date_from,
        date_till,
        total_records,
        last_updated: format_timestamp(last_updated),
        calculation_status: status.as_str().to_string(),
    };
    diesel::replace_into(md::table)
        .values(&row)
        .execute(conn)
        .map_err(StorageError::from)?;
    Ok(HistoryMetadata::from(row))
}

#[async_trait]
impl HistoryStoreTrait for SqliteHistoryStore {
    async fn commit_history(
        &self,
        portfolio_id: &str,
        records: &[PortfolioHistoryRecord],
        status: CalculationStatus,
        replace_all: bool,
    ) -> Result<HistoryMetadata> {
        let pid = portfolio_id.to_string();
        let rows: Vec<PortfolioHistoryRecordDB> = records
            .iter()
            .cloned()
            .map(PortfolioHistoryRecordDB::from)
            .collect();

        self.writer
            .exec(move |conn| {
                if replace_all {
                    diesel::delete(ph::table.filter(ph::portfolio_id.eq(&pid)))
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                for chunk in rows.chunks(500) {
                    diesel::replace_into(ph::table)
                        .values(chunk)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                refresh_metadata(conn, &pid, status, Utc::now())
            })
            .await
    }

    async fn set_status(&self, portfolio_id: &str, status: CalculationStatus) -> Result<()> {
        let pid = portfolio_id.to_string();
        self.writer
            .exec(move |conn| {
                let updated = diesel::update(md::table.filter(md::portfolio_id.eq(&pid)))
                    .set(md::calculation_status.eq(status.as_str()))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                if updated == 0 {
                    let mut row = HistoryMetadataDB::from(HistoryMetadata::never(&pid));
                    row.calculation_status = status.as_str().to_string();
                    diesel::insert_into(md::table)
                        .values(&row)
                        .execute(conn)
                        .map_err(StorageError::from)?;
                }
                Ok(())
            })
            .await
    }

    fn get_records(
        &self,
        portfolio_id: &str,
        from: Option<NaiveDate>,
        till: Option<NaiveDate>,
    ) -> Result<Vec<PortfolioHistoryRecord>> {
        let mut conn = get_connection(&self.pool)?;

        let mut query = ph::table
            .filter(ph::portfolio_id.eq(portfolio_id))
            .order(ph::history_date.asc())
            .into_boxed();
        if let Some(from) = from {
            query = query.filter(ph::history_date.ge(from));
        }
        if let Some(till) = till {
            query = query.filter(ph::history_date.le(till));
        }

        let rows = query.load::<PortfolioHistoryRecordDB>(&mut conn).into_core()?;
        Ok(rows.into_iter().map(PortfolioHistoryRecord::from).collect())
    }

    fn get_record_on(
        &self,
        portfolio_id: &str,
        date: NaiveDate,
    ) -> Result<Option<PortfolioHistoryRecord>> {
        let mut conn = get_connection(&self.pool)?;

        let row = ph::table
            .filter(ph::portfolio_id.eq(portfolio_id))
            .filter(ph::history_date.eq(date))
            .first::<PortfolioHistoryRecordDB>(&mut conn)
            .optional()
            .into_core()?;
        Ok(row.map(PortfolioHistoryRecord::from))
    }

    fn get_metadata(&self, portfolio_id: &str) -> Result<Option<HistoryMetadata>> {
        let mut conn = get_connection(&self.pool)?;

        let row = md::table
            .filter(md::portfolio_id.eq(portfolio_id))
            .first::<HistoryMetadataDB>(&mut conn)
            .optional()
            .into_core()?;
        Ok(row.map(HistoryMetadata::from))
    }

    fn latest_record_date(&self, portfolio_id: &str) -> Result<Option<NaiveDate>> {
        let mut conn = get_connection(&self.pool)?;

        let result: Option<Option<NaiveDate>> = ph::table
            .filter(ph::portfolio_id.eq(portfolio_id))
            .select(diesel::dsl::max(ph::history_date))
            .first::<Option<NaiveDate>>(&mut conn)
            .optional()
            .into_core()?;
        Ok(result.flatten())
    }

    fn portfolio_ids_with_history(&self) -> Result<Vec<String>> {
        let mut conn = get_connection(&self.pool)?;

        ph::table
            .select(ph::portfolio_id)
            .distinct()
            .order(ph::portfolio_id.asc())
            .load::<String>(&mut conn)
            .into_core()
    }

    async fn delete_records_before(
        &self,
        portfolio_id: &str,
        cutoff: NaiveDate,
    ) -> Result<usize> {
        let pid = portfolio_id.to_string();
        self.writer
            .exec(move |conn| {
                let deleted = diesel::delete(
                    ph::table
                        .filter(ph::portfolio_id.eq(&pid))
                        .filter(ph::history_date.lt(cutoff)),
                )
                .execute(conn)
                .map_err(StorageError::from)?;

                if deleted > 0 {
                    // Pruning moves the date range but is not an update:
                    // status and last_updated are preserved.
                    let existing: Option<HistoryMetadataDB> = md::table
                        .filter(md::portfolio_id.eq(&pid))
                        .first(conn)
                        .optional()
                        .map_err(StorageError::from)?;
                    let current = existing
                        .map(HistoryMetadata::from)
                        .unwrap_or_else(|| HistoryMetadata::never(&pid));
                    refresh_metadata(conn, &pid, current.calculation_status, current.last_updated)?;
                }
                Ok(deleted)
            })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, run_migrations, spawn_writer};
    use foliocache_core::valuation::{CashBalance, PositionValuation, ValuationTotals};
    use rust_decimal::Decimal;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    fn sample_record(portfolio_id: &str, date: NaiveDate, market_value: i64) -> PortfolioHistoryRecord {
        let mut cash_balances = HashMap::new();
        cash_balances.insert(
            "USD".to_string(),
            CashBalance {
                amount: Decimal::from(500),
                rate_to_base: Decimal::ONE,
            },
        );
        PortfolioHistoryRecord {
            id: PortfolioHistoryRecord::record_id(portfolio_id, date),
            portfolio_id: portfolio_id.to_string(),
            date,
            positions: vec![PositionValuation {
                symbol: "AAPL".to_string(),
                volume: Decimal::from(10),
                local_currency: "USD".to_string(),
                market_price_local: Decimal::from(market_value) / Decimal::from(10),
                market_value_local: Decimal::from(market_value),
                market_value_base: Decimal::from(market_value),
                invested_base: Decimal::from(1000),
                realized_base: Decimal::ZERO,
            }],
            cash_balances,
            totals: ValuationTotals {
                market_value_base: Decimal::from(market_value + 500),
                invested_base: Decimal::from(1000),
                result_base: Decimal::from(market_value - 1000),
                today_result_base: Decimal::ZERO,
            },
            stale_symbols: Vec::new(),
            computed_at: Utc::now(),
        }
    }

    fn setup() -> (SqliteHistoryStore, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("history.db");
        let pool = create_pool(db_path.to_str().unwrap()).unwrap();
        let mut conn = get_connection(&pool).unwrap();
        run_migrations(&mut conn).unwrap();
        drop(conn);
        let writer = spawn_writer(pool.clone());
        (SqliteHistoryStore::new(pool, writer), dir)
    }

    #[tokio::test]
    async fn commit_round_trips_records_and_refreshes_metadata() {
        let (store, _dir) = setup();
        let records = vec![
            sample_record("p1", day(1), 1100),
            sample_record("p1", day(2), 1150),
            sample_record("p1", day(3), 1120),
        ];

        let meta = store
            .commit_history("p1", &records, CalculationStatus::Complete, false)
            .await
            .unwrap();
        assert_eq!(meta.total_records, 3);
        assert_eq!(meta.date_from, Some(day(1)));
        assert_eq!(meta.date_till, Some(day(3)));
        assert_eq!(meta.calculation_status, CalculationStatus::Complete);

        let loaded = store.get_records("p1", None, None).unwrap();
        assert_eq!(loaded.len(), 3);
        assert_eq!(loaded[1].id, "p1_2024-01-02");
        assert_eq!(loaded[1].positions, records[1].positions);
        assert_eq!(loaded[1].cash_balances, records[1].cash_balances);
        assert_eq!(loaded[1].totals, records[1].totals);
    }

    #[tokio::test]
    async fn range_reads_are_bounded_and_ascending() {
        let (store, _dir) = setup();
        let records: Vec<PortfolioHistoryRecord> =
            (1..=5).map(|d| sample_record("p1", day(d), 1000)).collect();
        store
            .commit_history("p1", &records, CalculationStatus::Complete, false)
            .await
            .unwrap();

        let window = store
            .get_records("p1", Some(day(2)), Some(day(4)))
            .unwrap();
        let dates: Vec<NaiveDate> = window.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![day(2), day(3), day(4)]);

        let single = store.get_record_on("p1", day(3)).unwrap().unwrap();
        assert_eq!(single.date, day(3));
        assert!(store.get_record_on("p1", day(9)).unwrap().is_none());
        assert_eq!(store.latest_record_date("p1").unwrap(), Some(day(5)));
    }

    #[tokio::test]
    async fn committing_the_same_date_twice_overwrites_in_place() {
        let (store, _dir) = setup();
        store
            .commit_history(
                "p1",
                &[sample_record("p1", day(1), 1000)],
                CalculationStatus::Complete,
                false,
            )
            .await
            .unwrap();
        let meta = store
            .commit_history(
                "p1",
                &[sample_record("p1", day(1), 1234)],
                CalculationStatus::Complete,
                false,
            )
            .await
            .unwrap();

        assert_eq!(meta.total_records, 1);
        let record = store.get_record_on("p1", day(1)).unwrap().unwrap();
        assert_eq!(record.totals.market_value_base, Decimal::from(1734));
    }

    #[tokio::test]
    async fn replace_all_discards_prior_records() {
        let (store, _dir) = setup();
        let initial: Vec<PortfolioHistoryRecord> =
            (1..=4).map(|d| sample_record("p1", day(d), 1000)).collect();
        store
            .commit_history("p1", &initial, CalculationStatus::Complete, false)
            .await
            .unwrap();

        let replacement = vec![sample_record("p1", day(10), 2000)];
        let meta = store
            .commit_history("p1", &replacement, CalculationStatus::Complete, true)
            .await
            .unwrap();

        assert_eq!(meta.total_records, 1);
        assert_eq!(meta.date_from, Some(day(10)));
        let loaded = store.get_records("p1", None, None).unwrap();
        assert_eq!(loaded.len(), 1);
    }

    #[tokio::test]
    async fn set_status_creates_a_row_and_leaves_last_updated_alone() {
        let (store, _dir) = setup();

        store
            .set_status("p1", CalculationStatus::InProgress)
            .await
            .unwrap();
        let fresh = store.get_metadata("p1").unwrap().unwrap();
        assert_eq!(fresh.calculation_status, CalculationStatus::InProgress);
        assert_eq!(fresh.total_records, 0);

        store
            .commit_history(
                "p1",
                &[sample_record("p1", day(1), 1000)],
                CalculationStatus::Complete,
                false,
            )
            .await
            .unwrap();
        let committed = store.get_metadata("p1").unwrap().unwrap();

        store.set_status("p1", CalculationStatus::Failed).await.unwrap();
        let failed = store.get_metadata("p1").unwrap().unwrap();
        assert_eq!(failed.calculation_status, CalculationStatus::Failed);
        assert_eq!(failed.last_updated, committed.last_updated);
    }

    #[tokio::test]
    async fn delete_records_before_prunes_and_refreshes_the_range() {
        let (store, _dir) = setup();
        let records: Vec<PortfolioHistoryRecord> =
            (1..=5).map(|d| sample_record("p1", day(d), 1000)).collect();
        store
            .commit_history("p1", &records, CalculationStatus::Complete, false)
            .await
            .unwrap();
        let before = store.get_metadata("p1").unwrap().unwrap();

        let deleted = store.delete_records_before("p1", day(3)).await.unwrap();
        assert_eq!(deleted, 2);

        let after = store.get_metadata("p1").unwrap().unwrap();
        assert_eq!(after.total_records, 3);
        assert_eq!(after.date_from, Some(day(3)));
        assert_eq!(after.date_till, Some(day(5)));
        assert_eq!(after.last_updated, before.last_updated);
        assert_eq!(after.calculation_status, CalculationStatus::Complete);
    }

    #[tokio::test]
    async fn portfolio_ids_are_distinct_and_sorted() {
        let (store, _dir) = setup();
        for pid in ["zeta", "alpha", "alpha"] {
            store
                .commit_history(
                    pid,
                    &[sample_record(pid, day(1), 1000)],
                    CalculationStatus::Complete,
                    false,
                )
                .await
                .unwrap();
        }

        let ids = store.portfolio_ids_with_history().unwrap();
        assert_eq!(ids, vec!["alpha".to_string(), "zeta".to_string()]);
    }
}
