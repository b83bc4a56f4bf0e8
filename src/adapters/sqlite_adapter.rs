//! SQLite price cache.

use chrono::NaiveDate;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

use crate::domain::error::PortoptError;
use crate::domain::price_bar::PriceBar;
use crate::ports::config_port::ConfigPort;
use crate::ports::price_port::PricePort;

const DATE_FORMAT: &str = "%Y-%m-%d";

type Conn = r2d2::PooledConnection<SqliteConnectionManager>;

fn pool_err(e: r2d2::Error) -> PortoptError {
    PortoptError::Database {
        reason: e.to_string(),
    }
}

fn query_err(e: rusqlite::Error) -> PortoptError {
    PortoptError::DatabaseQuery {
        reason: e.to_string(),
    }
}

fn parse_stored_date(raw: &str) -> Result<NaiveDate, PortoptError> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|e| PortoptError::Database {
        reason: format!("bad stored date {raw:?}: {e}"),
    })
}

pub struct SqliteAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PortoptError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| PortoptError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_err)?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, PortoptError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_err)?;

        Ok(Self { pool })
    }

    fn conn(&self) -> Result<Conn, PortoptError> {
        self.pool.get().map_err(pool_err)
    }

    pub fn initialize_schema(&self) -> Result<(), PortoptError> {
        self.conn()?
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS price (
                    ticker TEXT NOT NULL,
                    date TEXT NOT NULL,
                    open REAL NOT NULL,
                    high REAL NOT NULL,
                    low REAL NOT NULL,
                    close REAL NOT NULL,
                    volume INTEGER NOT NULL,
                    adjclose REAL NOT NULL,
                    PRIMARY KEY (ticker, date)
                );
                CREATE INDEX IF NOT EXISTS idx_price_ticker ON price(ticker);",
            )
            .map_err(query_err)
    }

    /// Upserts `bars` in a single transaction. Returns the number written.
    pub fn insert_bars(&self, bars: &[PriceBar]) -> Result<usize, PortoptError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(query_err)?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR REPLACE INTO price
                     (ticker, date, open, high, low, close, volume, adjclose)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                )
                .map_err(query_err)?;
            for bar in bars {
                stmt.execute(params![
                    bar.ticker,
                    bar.date.format(DATE_FORMAT).to_string(),
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume,
                    bar.adj_close
                ])
                .map_err(query_err)?;
            }
        }

        tx.commit().map_err(query_err)?;
        Ok(bars.len())
    }

    pub fn delete_ticker(&self, ticker: &str) -> Result<usize, PortoptError> {
        self.conn()?
            .execute("DELETE FROM price WHERE ticker = ?1", params![ticker])
            .map_err(query_err)
    }
}

impl PricePort for SqliteAdapter {
    fn fetch_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceBar>, PortoptError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(
                "SELECT ticker, date, open, high, low, close, volume, adjclose
                 FROM price
                 WHERE ticker = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date ASC",
            )
            .map_err(query_err)?;

        let start_str = start.format(DATE_FORMAT).to_string();
        let end_str = end.format(DATE_FORMAT).to_string();
        let rows = stmt
            .query_map(params![ticker, start_str, end_str], |row| {
                let date_str: String = row.get(1)?;
                let date = NaiveDate::parse_from_str(&date_str, DATE_FORMAT).map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        1,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                Ok(PriceBar {
                    ticker: row.get(0)?,
                    date,
                    open: row.get(2)?,
                    high: row.get(3)?,
                    low: row.get(4)?,
                    close: row.get(5)?,
                    volume: row.get(6)?,
                    adj_close: row.get(7)?,
                })
            })
            .map_err(query_err)?;

        rows.collect::<Result<Vec<_>, _>>().map_err(query_err)
    }

    fn list_tickers(&self) -> Result<Vec<String>, PortoptError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare("SELECT DISTINCT ticker FROM price ORDER BY ticker")
            .map_err(query_err)?;
        let rows = stmt.query_map([], |row| row.get(0)).map_err(query_err)?;
        rows.collect::<Result<Vec<String>, _>>().map_err(query_err)
    }

    fn get_date_range(
        &self,
        ticker: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, PortoptError> {
        let (min, max, count): (Option<String>, Option<String>, i64) = self
            .conn()?
            .query_row(
                "SELECT MIN(date), MAX(date), COUNT(*) FROM price WHERE ticker = ?1",
                params![ticker],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(query_err)?;

        match (min, max) {
            (Some(min), Some(max)) if count > 0 => Ok(Some((
                parse_stored_date(&min)?,
                parse_stored_date(&max)?,
                count as usize,
            ))),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::file_config_adapter::FileConfigAdapter;
    use tempfile::TempDir;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn bar(ticker: &str, date: NaiveDate, adj_close: f64) -> PriceBar {
        PriceBar {
            ticker: ticker.to_string(),
            date,
            open: adj_close,
            high: adj_close + 1.0,
            low: adj_close - 1.0,
            close: adj_close + 0.5,
            volume: 1000,
            adj_close,
        }
    }

    fn seeded() -> SqliteAdapter {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter
            .insert_bars(&[
                bar("VTI", date(2012, 1, 5), 60.0),
                bar("VTI", date(2012, 1, 3), 59.0),
                bar("VTI", date(2012, 2, 1), 61.5),
                bar("BND", date(2012, 1, 3), 81.0),
            ])
            .unwrap();
        adapter
    }

    #[test]
    fn from_config_missing_path() {
        let config = FileConfigAdapter::from_string("[sqlite]\npool_size = 2\n").unwrap();
        match SqliteAdapter::from_config(&config) {
            Err(PortoptError::ConfigMissing { section, key }) => {
                assert_eq!(section, "sqlite");
                assert_eq!(key, "path");
            }
            Err(other) => panic!("expected ConfigMissing, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn from_config_opens_file_database() {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join("quotes.db");
        let config =
            FileConfigAdapter::from_string(&format!("[sqlite]\npath = {}\n", db.display()))
                .unwrap();
        let adapter = SqliteAdapter::from_config(&config).unwrap();
        adapter.initialize_schema().unwrap();
        adapter.insert_bars(&[bar("VTI", date(2012, 1, 3), 59.0)]).unwrap();
        assert!(db.exists());
    }

    #[test]
    fn schema_is_idempotent() {
        let adapter = SqliteAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        adapter.initialize_schema().unwrap();
    }

    #[test]
    fn fetch_prices_sorted_and_bounded() {
        let adapter = seeded();
        let bars = adapter
            .fetch_prices("VTI", date(2012, 1, 1), date(2012, 1, 31))
            .unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].date, date(2012, 1, 3));
        assert_eq!(bars[1].date, date(2012, 1, 5));
        assert_eq!(bars[1].adj_close, 60.0);
        assert_eq!(bars[1].close, 60.5);
    }

    #[test]
    fn insert_replaces_same_day() {
        let adapter = seeded();
        adapter.insert_bars(&[bar("VTI", date(2012, 1, 3), 70.0)]).unwrap();
        let bars = adapter
            .fetch_prices("VTI", date(2012, 1, 3), date(2012, 1, 3))
            .unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].adj_close, 70.0);
    }

    #[test]
    fn list_tickers_sorted_distinct() {
        assert_eq!(seeded().list_tickers().unwrap(), vec!["BND", "VTI"]);
    }

    #[test]
    fn date_range_for_ticker() {
        let adapter = seeded();
        assert_eq!(
            adapter.get_date_range("VTI").unwrap(),
            Some((date(2012, 1, 3), date(2012, 2, 1), 3))
        );
        assert_eq!(adapter.get_date_range("NOPE").unwrap(), None);
    }

    #[test]
    fn delete_ticker_removes_rows() {
        let adapter = seeded();
        assert_eq!(adapter.delete_ticker("VTI").unwrap(), 3);
        assert_eq!(adapter.list_tickers().unwrap(), vec!["BND"]);
    }

    #[test]
    fn query_before_schema_is_a_query_error() {
        let adapter = SqliteAdapter::in_memory().unwrap();
        assert!(matches!(
            adapter.list_tickers(),
            Err(PortoptError::DatabaseQuery { .. })
        ));
    }
}
