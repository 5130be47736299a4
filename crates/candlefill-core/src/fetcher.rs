use std::sync::Arc;
use std::time::Duration;

use candlefill_warehouse::{BarRecord, Warehouse};
use tracing::{info, warn};

use crate::calls;
use crate::data_source::MarketDataSource;
use crate::throttling::RateLimiter;
use crate::{DateRange, Instrument, PipelineError};

/// Result of one chunk fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// Number of new rows written; bars already stored are not counted.
    Stored(usize),
    Empty,
}

/// Fetches the daily bars of one chunk and stores them atomically.
#[derive(Clone)]
pub struct BarFetcher {
    warehouse: Warehouse,
    source: Arc<dyn MarketDataSource>,
    limiter: RateLimiter,
    call_timeout: Duration,
}

impl BarFetcher {
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

    pub async fn fetch_and_store(
        &self,
        instrument: &Instrument,
        range: DateRange,
    ) -> Result<FetchOutcome, PipelineError> {
        let Some(storage_id) = instrument.storage_id else {
            return Err(PipelineError::Unresolved {
                ticker: instrument.ticker.to_string(),
            });
        };

        self.limiter.take().await;
        let bars = calls::remote(
            &format!("bars {} {range}", instrument.ticker),
            self.call_timeout,
            self.source.daily_bars(&instrument.external_id, range),
        )
        .await?;

        if bars.is_empty() {
            warn!(ticker = %instrument.ticker, %range, "no bars returned");
            return Ok(FetchOutcome::Empty);
        }

        let received = bars.len();
        let records: Vec<BarRecord> = bars.iter().map(|bar| bar.to_record()).collect();
        let written = calls::storage(
            &format!("bar insert {} {range}", instrument.ticker),
            self.call_timeout,
            &self.warehouse,
            move |warehouse| warehouse.insert_daily_bars(storage_id, &records),
        )
        .await?;

        info!(ticker = %instrument.ticker, %range, received, written, "bars stored");
        Ok(FetchOutcome::Stored(written))
    }
}
