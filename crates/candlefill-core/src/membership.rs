//! Time-varying index membership.
//!
//! The membership table is a CSV file with a `date,tickers` header, ISO dates
//! and `;`-separated tickers:
//!
//! ```text
//! date,tickers
//! 2018-01-09,SBER;GAZP;LKOH
//! 2018-03-01,SBER;GAZP;SBERP
//! ```
//!
//! Each distinct ticker is backfilled from its first to its last appearance.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use time::Date;

use crate::chunker::DateChunker;
use crate::{parse_date, DateRange, Equity, Ticker, ValidationError};

const TICKER_SEPARATOR: char = ';';

/// Failures while loading membership data. All of them are fatal before any fetch starts.
#[derive(Debug, Error)]
pub enum MembershipError {
    #[error("failed to open index file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed index csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("index row {row}: {source}")]
    Row {
        row: usize,
        #[source]
        source: ValidationError,
    },

    #[error("index file contains no rows")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct IndexRow {
    date: String,
    tickers: String,
}

/// Index constituents on one date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    pub date: Date,
    pub tickers: Vec<Ticker>,
}

/// Membership entries ordered by date.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexTable {
    entries: Vec<IndexEntry>,
}

impl IndexTable {
    pub fn new(mut entries: Vec<IndexEntry>) -> Result<Self, MembershipError> {
        if entries.is_empty() {
            return Err(MembershipError::Empty);
        }
        entries.sort_by_key(|entry| entry.date);
        Ok(Self { entries })
    }

    pub fn from_csv_path(path: impl AsRef<Path>) -> Result<Self, MembershipError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| MembershipError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_reader(file)
    }

    pub fn from_reader(reader: impl Read) -> Result<Self, MembershipError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut entries = Vec::new();
        for (index, row) in csv_reader.deserialize::<IndexRow>().enumerate() {
            let row = row?;
            let line = index + 2;
            let date = parse_date(&row.date)
                .map_err(|source| MembershipError::Row { row: line, source })?;

            let mut tickers: Vec<Ticker> = Vec::new();
            for raw in row.tickers.split(TICKER_SEPARATOR) {
                if raw.trim().is_empty() {
                    continue;
                }
                let ticker = Ticker::parse(raw)
                    .map_err(|source| MembershipError::Row { row: line, source })?;
                if !tickers.contains(&ticker) {
                    tickers.push(ticker);
                }
            }

            entries.push(IndexEntry { date, tickers });
        }

        Self::new(entries)
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Whether `ticker` is a constituent on `date`. Matching is exact.
    pub fn is_member(&self, ticker: &Ticker, date: Date) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.date == date && entry.tickers.contains(ticker))
    }

    /// Per ticker, the span from its first to its last appearance, in order of
    /// first appearance.
    pub fn spans(&self) -> Vec<(Ticker, DateRange)> {
        let mut order: Vec<Ticker> = Vec::new();
        let mut bounds: HashMap<Ticker, (Date, Date)> = HashMap::new();

        for entry in &self.entries {
            for ticker in &entry.tickers {
                bounds
                    .entry(ticker.clone())
                    .and_modify(|(_, last)| *last = entry.date)
                    .or_insert_with(|| {
                        order.push(ticker.clone());
                        (entry.date, entry.date)
                    });
            }
        }

        order
            .into_iter()
            .filter_map(|ticker| {
                let (first, last) = bounds.get(&ticker).copied()?;
                Some((ticker, DateRange::ordered(first, last)))
            })
            .collect()
    }

    /// Units of work for index mode: each ticker's span, chunked.
    pub fn equities(&self, chunker: &DateChunker) -> Vec<Equity> {
        self.spans()
            .into_iter()
            .map(|(ticker, span)| Equity::new(ticker, chunker.chunk(span)))
            .collect()
    }
}
