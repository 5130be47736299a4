use std::sync::Arc;
use std::time::Duration;

use candlefill_warehouse::Warehouse;
use tracing::{debug, info, warn};

use crate::calls;
use crate::data_source::MarketDataSource;
use crate::throttling::RateLimiter;
use crate::{Instrument, PipelineError, Ticker};

/// Outcome of resolving one ticker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Instrument with its storage id populated.
    Found(Instrument),
    NotFound(Ticker),
}

/// Maps tickers to stored instruments, consulting the provider only on a
/// storage miss.
#[derive(Clone)]
pub struct InstrumentResolver {
    warehouse: Warehouse,
    source: Arc<dyn MarketDataSource>,
    limiter: RateLimiter,
    call_timeout: Duration,
}

impl InstrumentResolver {
    pub fn new(
        warehouse: Warehouse,
        source: Arc<dyn MarketDataSource>,
        limiter: RateLimiter,
        call_timeout: Duration,
    ) -> Self {
        Self {
            warehouse,
            source,
            limiter,
            call_timeout,
        }
    }

    /// Resolve `ticker`. A stored instrument is returned without a remote call
    /// or a rate-limit token.
    pub async fn resolve(&self, ticker: &Ticker) -> Result<Resolution, PipelineError> {
        let key = ticker.as_str().to_string();
        let stored = calls::storage(
            &format!("instrument lookup {ticker}"),
            self.call_timeout,
            &self.warehouse,
            move |warehouse| warehouse.find_instrument_by_ticker(&key),
        )
        .await?;

        if let Some(stored) = stored {
            let instrument = Instrument::try_from(stored)?;
            debug!(%ticker, storage_id = ?instrument.storage_id, "instrument cache hit");
            return Ok(Resolution::Found(instrument));
        }

        self.limiter.take().await;
        let matches = calls::remote(
            &format!("instrument search {ticker}"),
            self.call_timeout,
            self.source.find_by_ticker(ticker),
        )
        .await?;

        let Some(first) = matches.into_iter().next() else {
            warn!(%ticker, "instrument not found; skipping ticker");
            return Ok(Resolution::NotFound(ticker.clone()));
        };

        self.register(first).await.map(Resolution::Found)
    }

    /// Persist an instrument already known from the provider and return it
    /// with its storage id.
    pub async fn register(&self, instrument: Instrument) -> Result<Instrument, PipelineError> {
        let record = instrument.to_record();
        let storage_id = calls::storage(
            &format!("instrument upsert {}", instrument.ticker),
            self.call_timeout,
            &self.warehouse,
            move |warehouse| warehouse.upsert_instrument(&record),
        )
        .await?;

        info!(
            ticker = %instrument.ticker,
            external_id = %instrument.external_id,
            storage_id,
            "instrument stored"
        );
        Ok(instrument.with_storage_id(storage_id))
    }
}
