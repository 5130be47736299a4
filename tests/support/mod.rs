//! Shared fakes for the pipeline behaviour tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use candlefill_core::{
    Bar, Currency, DateRange, Instrument, InstrumentType, MarketDataSource, PipelineConfig,
    SourceError, SourceFuture, Ticker, Warehouse, WarehouseConfig,
};
use rust_decimal::Decimal;
use tempfile::TempDir;
use time::Date;

/// In-memory provider that counts every call.
#[derive(Default)]
pub struct FakeSource {
    instruments: HashMap<Ticker, Vec<Instrument>>,
    bars: HashMap<String, Vec<Bar>>,
    listing: Vec<Instrument>,
    failing_bars: Option<String>,
    delay: Option<Duration>,
    bar_delay: Option<Duration>,
    search_delays: HashMap<Ticker, Duration>,
    events: Mutex<Vec<String>>,
    pub search_calls: AtomicUsize,
    pub bar_calls: AtomicUsize,
    pub listing_calls: AtomicUsize,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instrument(mut self, instrument: Instrument) -> Self {
        self.instruments
            .entry(instrument.ticker.clone())
            .or_default()
            .push(instrument);
        self
    }

    pub fn with_bars(mut self, external_id: &str, bars: Vec<Bar>) -> Self {
        self.bars.insert(external_id.to_string(), bars);
        self
    }

    pub fn with_listing(mut self, listing: Vec<Instrument>) -> Self {
        self.listing = listing;
        self
    }

    pub fn failing_bars_for(mut self, external_id: &str) -> Self {
        self.failing_bars = Some(external_id.to_string());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Delay only the candle endpoint.
    pub fn with_bar_delay(mut self, delay: Duration) -> Self {
        self.bar_delay = Some(delay);
        self
    }

    /// Delay searches for one ticker.
    pub fn with_search_delay(mut self, ticker: &str, delay: Duration) -> Self {
        self.search_delays
            .insert(Ticker::parse(ticker).expect("valid ticker"), delay);
        self
    }

    /// Calls in the order they happened: `search <ticker>` when a search
    /// starts, `bars <external id>` when a candle request completes.
    pub fn events(&self) -> Vec<String> {
        self.events.lock().expect("event log").clone()
    }

    fn log(&self, event: String) {
        self.events.lock().expect("event log").push(event);
    }

    pub fn searches(&self) -> usize {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn bar_requests(&self) -> usize {
        self.bar_calls.load(Ordering::SeqCst)
    }

    pub fn listings(&self) -> usize {
        self.listing_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
    }
}

impl MarketDataSource for FakeSource {
    fn find_by_ticker<'a>(&'a self, ticker: &'a Ticker) -> SourceFuture<'a, Vec<Instrument>> {
        Box::pin(async move {
            self.search_calls.fetch_add(1, Ordering::SeqCst);
            self.log(format!("search {ticker}"));
            self.pause().await;
            if let Some(delay) = self.search_delays.get(ticker) {
                tokio::time::sleep(*delay).await;
            }
            Ok(self.instruments.get(ticker).cloned().unwrap_or_default())
        })
    }

    fn daily_bars<'a>(&'a self, external_id: &'a str, range: DateRange) -> SourceFuture<'a, Vec<Bar>> {
        Box::pin(async move {
            self.bar_calls.fetch_add(1, Ordering::SeqCst);
            self.pause().await;
            if let Some(delay) = self.bar_delay {
                tokio::time::sleep(delay).await;
            }
            self.log(format!("bars {external_id}"));
            if self.failing_bars.as_deref() == Some(external_id) {
                return Err(SourceError::upstream("candles endpoint returned status 500"));
            }
            Ok(self
                .bars
                .get(external_id)
                .map(|bars| {
                    bars.iter()
                        .filter(|bar| range.contains(bar.timestamp))
                        .cloned()
                        .collect()
                })
                .unwrap_or_default())
        })
    }

    fn stocks<'a>(&'a self) -> SourceFuture<'a, Vec<Instrument>> {
        Box::pin(async move {
            self.listing_calls.fetch_add(1, Ordering::SeqCst);
            self.pause().await;
            Ok(self.listing.clone())
        })
    }
}

pub fn instrument(ticker: &str, external_id: &str, currency: Currency) -> Instrument {
    Instrument {
        storage_id: None,
        external_id: external_id.to_string(),
        ticker: Ticker::parse(ticker).expect("valid ticker"),
        isin: format!("RU000{external_id}"),
        name: format!("{ticker} plc"),
        min_price_increment: Decimal::new(1, 2),
        lot: 1,
        currency,
        kind: InstrumentType::Stock,
    }
}

pub fn bar(timestamp: Date, close: &str, volume: i64) -> Bar {
    let close = Decimal::from_str(close).expect("decimal");
    Bar {
        open: close,
        close,
        high: close,
        low: close,
        volume,
        timestamp,
    }
}

pub fn open_warehouse() -> (TempDir, Warehouse) {
    let temp = tempfile::tempdir().expect("tempdir");
    let warehouse = Warehouse::open(WarehouseConfig {
        candlefill_home: temp.path().to_path_buf(),
        db_path: temp.path().join("warehouse.duckdb"),
        max_pool_size: 4,
    })
    .expect("warehouse open");
    (temp, warehouse)
}

pub fn fast_config() -> PipelineConfig {
    PipelineConfig {
        requests_per_second: 100,
        ..PipelineConfig::default()
    }
}

pub fn shared(source: FakeSource) -> Arc<FakeSource> {
    Arc::new(source)
}
