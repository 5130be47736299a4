//! # Candlefill Warehouse
//!
//! DuckDB-based storage for instruments and daily bars.
//!
//! ## Overview
//!
//! The warehouse is the only persistent state of a backfill run. It offers
//! three operations to the pipeline, each safe to call from many tasks at once:
//!
//! - **Instrument lookup** by ticker (the resolver's cache)
//! - **Instrument upsert** keyed by external id, returning the storage id
//! - **Bulk bar insert** for one instrument and one date chunk, atomic per call
//!
//! All values are bound as parameters. Decimals travel as text and are cast to
//! `DECIMAL(38, 18)` inside the statement so no precision is lost to `f64`.
//! A value with more than 18 fractional digits is rejected, never rounded.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use candlefill_warehouse::{InstrumentRecord, Warehouse};
//! # use rust_decimal::Decimal;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Warehouse::open_default()?;
//!
//!     let id = warehouse.upsert_instrument(&InstrumentRecord {
//!         external_id: "BBG004730N88".to_string(),
//!         ticker: "SBER".to_string(),
//!         isin: "RU0009029540".to_string(),
//!         name: "Сбербанк России".to_string(),
//!         min_price_increment: Decimal::new(1, 2),
//!         lot: 10,
//!         currency: "RUB".to_string(),
//!         instrument_type: "Stock".to_string(),
//!     })?;
//!
//!     println!("SBER stored as {id}");
//!     Ok(())
//! }
//! ```
//!
//! ## Tables
//!
//! | Table | Description |
//! |-------|-------------|
//! | `instruments` | Instrument identity, unique by `external_id` |
//! | `bars_1d` | Daily OHLCV bars keyed by `(instrument_id, ts)` |
//! | `schema_migrations` | Applied migration versions |

pub mod duckdb;
pub mod migrations;

use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ::duckdb::types::Value as DuckValue;
use ::duckdb::{params_from_iter, Connection, ToSql};
use rust_decimal::Decimal;
use thiserror::Error;
use time::macros::format_description;
use time::Date;
use tracing::{debug, warn};

pub use duckdb::{DuckDbConnectionManager, PooledConnection};

const BAR_COLUMNS: usize = 7;
/// Fractional digits kept by every price column.
const PRICE_SCALE: u32 = 18;

/// Errors that can occur during warehouse operations.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// `DuckDB` database error.
    #[error(transparent)]
    DuckDb(#[from] ::duckdb::Error),

    /// I/O error (file system operations).
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// A stored value could not be decoded.
    #[error("invalid stored data: {0}")]
    InvalidData(String),

    /// Bars were offered for an instrument id that has no row.
    #[error("instrument {instrument_id} is not stored; bars cannot reference it")]
    MissingInstrument { instrument_id: i64 },
}

/// Configuration for the warehouse database.
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Root directory for candlefill data.
    pub candlefill_home: PathBuf,
    /// Path to the `DuckDB` database file.
    pub db_path: PathBuf,
    /// Maximum number of idle connections kept in the pool.
    pub max_pool_size: usize,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        let candlefill_home = resolve_candlefill_home();
        let db_path = candlefill_home.join("warehouse.duckdb");
        Self {
            candlefill_home,
            db_path,
            max_pool_size: 8,
        }
    }
}

impl WarehouseConfig {
    /// Configuration for an explicit database file, keeping default pool sizing.
    pub fn at(db_path: impl Into<PathBuf>) -> Self {
        let db_path = db_path.into();
        let candlefill_home = db_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(resolve_candlefill_home);
        Self {
            candlefill_home,
            db_path,
            ..Self::default()
        }
    }
}

/// Instrument identity as written to the `instruments` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentRecord {
    /// Provider identifier (FIGI); the upsert key.
    pub external_id: String,
    pub ticker: String,
    pub isin: String,
    pub name: String,
    /// Price step; refreshed on every upsert.
    pub min_price_increment: Decimal,
    pub lot: i64,
    /// ISO currency code.
    pub currency: String,
    pub instrument_type: String,
}

/// An instrument row together with its storage id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredInstrument {
    pub id: i64,
    pub record: InstrumentRecord,
}

/// A daily OHLCV bar for ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarRecord {
    /// Trading day.
    pub ts: Date,
    pub open: Decimal,
    pub close: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub volume: i64,
}

/// The main warehouse interface.
#[derive(Clone)]
pub struct Warehouse {
    config: WarehouseConfig,
    manager: DuckDbConnectionManager,
}

impl Warehouse {
    /// Open a warehouse with default configuration.
    pub fn open_default() -> Result<Self, WarehouseError> {
        Self::open(WarehouseConfig::default())
    }

    /// Open a warehouse with the specified configuration.
    pub fn open(config: WarehouseConfig) -> Result<Self, WarehouseError> {
        if let Some(parent) = config.db_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let manager = DuckDbConnectionManager::open(config.db_path.clone(), config.max_pool_size)?;
        let warehouse = Self { config, manager };
        warehouse.initialize()?;
        Ok(warehouse)
    }

    /// Apply pending schema migrations.
    pub fn initialize(&self) -> Result<(), WarehouseError> {
        let connection = self.manager.acquire()?;
        migrations::apply_migrations(&connection)?;
        Ok(())
    }

    /// Get the path to the database file.
    pub fn db_path(&self) -> &Path {
        self.manager.db_path()
    }

    pub fn config(&self) -> &WarehouseConfig {
        &self.config
    }

    /// Look up an instrument by ticker.
    ///
    /// Tickers are not unique across providers' history; the oldest row wins.
    pub fn find_instrument_by_ticker(
        &self,
        ticker: &str,
    ) -> Result<Option<StoredInstrument>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let mut statement = connection.prepare(
            "SELECT id, external_id, ticker, isin, name, \
             CAST(min_price_increment AS VARCHAR), lot, currency, instrument_type \
             FROM instruments WHERE ticker = ? ORDER BY id LIMIT 1",
        )?;
        let mut rows = statement.query([ticker])?;

        let Some(row) = rows.next()? else {
            return Ok(None);
        };

        let min_price_increment: String = row.get(5)?;
        Ok(Some(StoredInstrument {
            id: row.get(0)?,
            record: InstrumentRecord {
                external_id: row.get(1)?,
                ticker: row.get(2)?,
                isin: row.get(3)?,
                name: row.get(4)?,
                min_price_increment: parse_decimal(&min_price_increment)?,
                lot: row.get(6)?,
                currency: row.get(7)?,
                instrument_type: row.get(8)?,
            },
        }))
    }

    /// Insert an instrument, or refresh its price step when the external id is
    /// already stored. Returns the storage id, which never changes once assigned.
    pub fn upsert_instrument(&self, record: &InstrumentRecord) -> Result<i64, WarehouseError> {
        let connection = self.manager.acquire()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<i64, WarehouseError> {
            let min_price_increment = decimal_text("min_price_increment", record.min_price_increment)?;
            let params: [&dyn ToSql; 8] = [
                &record.external_id,
                &record.ticker,
                &record.isin,
                &record.name,
                &min_price_increment,
                &record.lot,
                &record.currency,
                &record.instrument_type,
            ];
            connection.execute(
                "INSERT INTO instruments \
                 (external_id, ticker, isin, name, min_price_increment, lot, currency, instrument_type) \
                 VALUES (?, ?, ?, ?, CAST(? AS DECIMAL(38, 18)), ?, ?, ?) \
                 ON CONFLICT (external_id) DO UPDATE SET \
                 min_price_increment = excluded.min_price_increment, \
                 updated_at = now()",
                params.as_slice(),
            )?;

            let id: i64 = connection.query_row(
                "SELECT id FROM instruments WHERE external_id = ?",
                [&record.external_id],
                |row| row.get(0),
            )?;
            Ok(id)
        })();

        let id = finalize_transaction(connection, result)?;
        debug!(ticker = %record.ticker, external_id = %record.external_id, id, "instrument upserted");
        Ok(id)
    }

    /// Insert all bars of one chunk as a single multi-row statement.
    ///
    /// The statement runs in its own transaction: either every row of the
    /// chunk becomes visible or none does. Rows whose `(instrument_id, ts)` is
    /// already stored are skipped, so re-running a chunk is harmless.
    /// Returns the number of rows written.
    pub fn insert_daily_bars(
        &self,
        instrument_id: i64,
        rows: &[BarRecord],
    ) -> Result<usize, WarehouseError> {
        if rows.is_empty() {
            return Ok(0);
        }

        let connection = self.manager.acquire()?;
        connection.execute_batch("BEGIN TRANSACTION")?;
        let result = (|| -> Result<usize, WarehouseError> {
            ensure_instrument_exists(&connection, instrument_id)?;

            let sql = bulk_bar_insert_sql(rows.len());
            let mut values = Vec::with_capacity(rows.len() * BAR_COLUMNS);
            for row in rows {
                values.push(DuckValue::BigInt(instrument_id));
                values.push(DuckValue::Text(row.ts.to_string()));
                values.push(DuckValue::Text(decimal_text("open", row.open)?));
                values.push(DuckValue::Text(decimal_text("close", row.close)?));
                values.push(DuckValue::Text(decimal_text("high", row.high)?));
                values.push(DuckValue::Text(decimal_text("low", row.low)?));
                values.push(DuckValue::BigInt(row.volume));
            }

            let written = connection.execute(sql.as_str(), params_from_iter(values.iter()))?;
            Ok(written)
        })();

        finalize_transaction(connection, result)
    }

    /// Number of stored daily bars for an instrument.
    pub fn count_daily_bars(&self, instrument_id: i64) -> Result<usize, WarehouseError> {
        let connection = self.manager.acquire()?;
        let count: i64 = connection.query_row(
            "SELECT COUNT(*) FROM bars_1d WHERE instrument_id = ?",
            [instrument_id],
            |row| row.get(0),
        )?;
        usize::try_from(count).map_err(|_| WarehouseError::InvalidData(format!("count {count}")))
    }

    /// Number of stored instruments.
    pub fn count_instruments(&self) -> Result<usize, WarehouseError> {
        let connection = self.manager.acquire()?;
        let count: i64 =
            connection.query_row("SELECT COUNT(*) FROM instruments", [], |row| row.get(0))?;
        usize::try_from(count).map_err(|_| WarehouseError::InvalidData(format!("count {count}")))
    }

    /// Stored daily bars for an instrument, oldest first.
    pub fn daily_bars(&self, instrument_id: i64) -> Result<Vec<BarRecord>, WarehouseError> {
        let connection = self.manager.acquire()?;
        let mut statement = connection.prepare(
            "SELECT CAST(ts AS VARCHAR), CAST(open AS VARCHAR), CAST(close AS VARCHAR), \
             CAST(high AS VARCHAR), CAST(low AS VARCHAR), volume \
             FROM bars_1d WHERE instrument_id = ? ORDER BY ts",
        )?;
        let mut rows = statement.query([instrument_id])?;

        let mut bars = Vec::new();
        while let Some(row) = rows.next()? {
            let ts: String = row.get(0)?;
            let open: String = row.get(1)?;
            let close: String = row.get(2)?;
            let high: String = row.get(3)?;
            let low: String = row.get(4)?;
            bars.push(BarRecord {
                ts: parse_date(&ts)?,
                open: parse_decimal(&open)?,
                close: parse_decimal(&close)?,
                high: parse_decimal(&high)?,
                low: parse_decimal(&low)?,
                volume: row.get(5)?,
            });
        }

        Ok(bars)
    }
}

/// Finalize a transaction, committing on success or rolling back on failure.
///
/// A connection whose rollback fails is dropped instead of going back to the
/// pool, so no later caller inherits an open transaction.
fn finalize_transaction<T>(
    connection: PooledConnection,
    result: Result<T, WarehouseError>,
) -> Result<T, WarehouseError> {
    match result {
        Ok(value) => {
            connection.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(error) => {
            if let Err(rollback) = connection.execute_batch("ROLLBACK") {
                warn!(error = %rollback, "rollback failed; discarding connection");
                connection.discard();
            }
            Err(error)
        }
    }
}

fn ensure_instrument_exists(connection: &Connection, instrument_id: i64) -> Result<(), WarehouseError> {
    let count: i64 = connection.query_row(
        "SELECT COUNT(*) FROM instruments WHERE id = ?",
        [instrument_id],
        |row| row.get(0),
    )?;
    if count == 0 {
        return Err(WarehouseError::MissingInstrument { instrument_id });
    }
    Ok(())
}

fn bulk_bar_insert_sql(row_count: usize) -> String {
    let tuple = "(?, CAST(? AS DATE), CAST(? AS DECIMAL(38, 18)), CAST(? AS DECIMAL(38, 18)), \
                 CAST(? AS DECIMAL(38, 18)), CAST(? AS DECIMAL(38, 18)), ?)";
    let tuples = vec![tuple; row_count].join(", ");
    format!(
        "INSERT OR IGNORE INTO bars_1d (instrument_id, ts, open, close, high, low, volume) VALUES {tuples}"
    )
}

/// Text form of a price for a `DECIMAL(38, 18)` column.
///
/// Values with more fractional digits than the column holds are rejected
/// instead of rounded.
fn decimal_text(field: &str, value: Decimal) -> Result<String, WarehouseError> {
    let value = value.normalize();
    if value.scale() > PRICE_SCALE {
        return Err(WarehouseError::InvalidData(format!(
            "{field} {value} has {} fractional digits, at most {PRICE_SCALE} are stored",
            value.scale()
        )));
    }
    Ok(value.to_string())
}

fn parse_decimal(value: &str) -> Result<Decimal, WarehouseError> {
    let value = value.trim();
    // DuckDB pads to the column scale; the padding can exceed rust_decimal's precision.
    let digits = if value.contains('.') {
        value.trim_end_matches('0').trim_end_matches('.')
    } else {
        value
    };
    Decimal::from_str(digits)
        .map(|decimal| decimal.normalize())
        .map_err(|error| WarehouseError::InvalidData(format!("decimal '{value}': {error}")))
}

fn parse_date(value: &str) -> Result<Date, WarehouseError> {
    Date::parse(value.trim(), format_description!("[year]-[month]-[day]"))
        .map_err(|error| WarehouseError::InvalidData(format!("date '{value}': {error}")))
}

/// Resolve the candlefill home directory from environment or default.
fn resolve_candlefill_home() -> PathBuf {
    if let Some(path) = env::var_os("CANDLEFILL_HOME") {
        let path = PathBuf::from(path);
        if !path.as_os_str().is_empty() {
            return path;
        }
    }

    if let Some(home) = env::var_os("HOME") {
        return PathBuf::from(home).join(".candlefill");
    }

    PathBuf::from(".candlefill")
}
