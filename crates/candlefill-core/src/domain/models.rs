use std::fmt::{Display, Formatter};
use std::str::FromStr;

use candlefill_warehouse::{BarRecord, InstrumentRecord, StoredInstrument};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use time::Date;

use crate::{DateRange, Ticker, ValidationError};

/// Settlement currency of an instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    Rub,
    Usd,
    Eur,
    Gbp,
    Hkd,
    Chf,
    Jpy,
    Cny,
    Try,
}

impl Currency {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rub => "RUB",
            Self::Usd => "USD",
            Self::Eur => "EUR",
            Self::Gbp => "GBP",
            Self::Hkd => "HKD",
            Self::Chf => "CHF",
            Self::Jpy => "JPY",
            Self::Cny => "CNY",
            Self::Try => "TRY",
        }
    }
}

impl Display for Currency {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Currency {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "RUB" => Ok(Self::Rub),
            "USD" => Ok(Self::Usd),
            "EUR" => Ok(Self::Eur),
            "GBP" => Ok(Self::Gbp),
            "HKD" => Ok(Self::Hkd),
            "CHF" => Ok(Self::Chf),
            "JPY" => Ok(Self::Jpy),
            "CNY" => Ok(Self::Cny),
            "TRY" => Ok(Self::Try),
            _ => Err(ValidationError::UnknownCurrency {
                value: value.to_string(),
            }),
        }
    }
}

/// Instrument class as reported by the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InstrumentType {
    Stock,
    Currency,
    Bond,
    Etf,
}

impl InstrumentType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Stock => "Stock",
            Self::Currency => "Currency",
            Self::Bond => "Bond",
            Self::Etf => "Etf",
        }
    }
}

impl FromStr for InstrumentType {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "Stock" => Ok(Self::Stock),
            "Currency" => Ok(Self::Currency),
            "Bond" => Ok(Self::Bond),
            "Etf" => Ok(Self::Etf),
            _ => Err(ValidationError::UnknownInstrumentType {
                value: value.to_string(),
            }),
        }
    }
}

/// Canonical instrument identity.
///
/// `storage_id` is `None` until the instrument has been persisted and never
/// changes afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instrument {
    pub storage_id: Option<i64>,
    /// Provider identifier (FIGI).
    pub external_id: String,
    pub ticker: Ticker,
    pub isin: String,
    pub name: String,
    pub min_price_increment: Decimal,
    pub lot: i64,
    pub currency: Currency,
    pub kind: InstrumentType,
}

impl Instrument {
    pub fn to_record(&self) -> InstrumentRecord {
        InstrumentRecord {
            external_id: self.external_id.clone(),
            ticker: self.ticker.as_str().to_string(),
            isin: self.isin.clone(),
            name: self.name.clone(),
            min_price_increment: self.min_price_increment,
            lot: self.lot,
            currency: self.currency.as_str().to_string(),
            instrument_type: self.kind.as_str().to_string(),
        }
    }

    /// Same instrument, now carrying the id assigned by storage.
    pub fn with_storage_id(self, storage_id: i64) -> Self {
        Self {
            storage_id: Some(storage_id),
            ..self
        }
    }
}

impl TryFrom<StoredInstrument> for Instrument {
    type Error = ValidationError;

    fn try_from(stored: StoredInstrument) -> Result<Self, Self::Error> {
        let record = stored.record;
        Ok(Self {
            storage_id: Some(stored.id),
            external_id: record.external_id,
            ticker: Ticker::parse(&record.ticker)?,
            isin: record.isin,
            name: record.name,
            min_price_increment: record.min_price_increment,
            lot: record.lot,
            currency: record.currency.parse()?,
            kind: record.instrument_type.parse()?,
        })
    }
}

/// Daily OHLCV bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bar {
    pub open: Decimal,
    pub close: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub volume: i64,
    pub timestamp: Date,
}

impl Bar {
    pub fn new(
        open: Decimal,
        close: Decimal,
        high: Decimal,
        low: Decimal,
        volume: i64,
        timestamp: Date,
    ) -> Result<Self, ValidationError> {
        if volume < 0 {
            return Err(ValidationError::NegativeValue { field: "volume" });
        }

        Ok(Self {
            open,
            close,
            high,
            low,
            volume,
            timestamp,
        })
    }

    pub fn to_record(&self) -> BarRecord {
        BarRecord {
            ts: self.timestamp,
            open: self.open,
            close: self.close,
            high: self.high,
            low: self.low,
            volume: self.volume,
        }
    }
}

/// Per-ticker unit of work: the ticker, its chunked date ranges and, once
/// resolved, its instrument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Equity {
    pub instrument: Option<Instrument>,
    pub ticker: Ticker,
    pub date_ranges: Vec<DateRange>,
}

impl Equity {
    pub fn new(ticker: Ticker, date_ranges: Vec<DateRange>) -> Self {
        Self {
            instrument: None,
            ticker,
            date_ranges,
        }
    }

    /// An equity whose instrument is already known, as in whole-market mode.
    pub fn with_instrument(instrument: Instrument, date_ranges: Vec<DateRange>) -> Self {
        Self {
            ticker: instrument.ticker.clone(),
            instrument: Some(instrument),
            date_ranges,
        }
    }
}
