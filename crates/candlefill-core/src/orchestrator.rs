//! Drives a backfill run.
//!
//! Tickers are resolved one after another; each resolution runs in its own
//! task and is awaited. A found instrument fans out into one fetch task per
//! date chunk, and the orchestrator moves on to the next ticker without
//! waiting for them. Remote calls are paced by one shared [`RateLimiter`].
//!
//! The first error of any task ends the run, even while the next ticker is
//! still resolving. Outstanding fetches are aborted and the error is returned
//! to the caller. Both storage writes are
//! idempotent, so a failed run can simply be restarted.

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use candlefill_warehouse::Warehouse;
use tokio::task::{JoinError, JoinSet};
use tracing::info;

use crate::calls;
use crate::chunker::DateChunker;
use crate::config::PipelineConfig;
use crate::data_source::MarketDataSource;
use crate::fetcher::{BarFetcher, FetchOutcome};
use crate::membership::IndexTable;
use crate::resolver::{InstrumentResolver, Resolution};
use crate::throttling::RateLimiter;
use crate::{DateRange, Equity, PipelineError};

/// Totals of a completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub tickers_resolved: usize,
    pub tickers_skipped: usize,
    pub chunks_stored: usize,
    pub chunks_empty: usize,
    pub bars_written: usize,
}

impl RunReport {
    fn record(&mut self, outcome: FetchOutcome) {
        match outcome {
            FetchOutcome::Stored(written) => {
                self.chunks_stored += 1;
                self.bars_written += written;
            }
            FetchOutcome::Empty => self.chunks_empty += 1,
        }
    }
}

impl Display for RunReport {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "tickers resolved: {}, skipped: {}; chunks stored: {}, empty: {}; bars written: {}",
            self.tickers_resolved,
            self.tickers_skipped,
            self.chunks_stored,
            self.chunks_empty,
            self.bars_written
        )
    }
}

pub struct FetchOrchestrator {
    config: PipelineConfig,
    chunker: DateChunker,
    source: Arc<dyn MarketDataSource>,
    limiter: RateLimiter,
    resolver: InstrumentResolver,
    fetcher: BarFetcher,
}

impl FetchOrchestrator {
    pub fn new(
        warehouse: Warehouse,
        source: Arc<dyn MarketDataSource>,
        config: PipelineConfig,
    ) -> Result<Self, PipelineError> {
        let chunker = config.chunker()?;
        let limiter = RateLimiter::per_second(config.requests_per_second);
        let resolver = InstrumentResolver::new(
            warehouse.clone(),
            Arc::clone(&source),
            limiter.clone(),
            config.call_timeout,
        );
        let fetcher = BarFetcher::new(
            warehouse,
            Arc::clone(&source),
            limiter.clone(),
            config.call_timeout,
        );

        Ok(Self {
            config,
            chunker,
            source,
            limiter,
            resolver,
            fetcher,
        })
    }

    pub fn chunker(&self) -> &DateChunker {
        &self.chunker
    }

    /// Index-membership mode: every ticker of the table over its membership span.
    pub async fn run_index(&self, table: &IndexTable) -> Result<RunReport, PipelineError> {
        let equities = table.equities(&self.chunker);
        info!(tickers = equities.len(), "starting index backfill");
        self.run(equities).await
    }

    /// Whole-market mode: every listed stock in the configured currency over `window`.
    pub async fn run_market(&self, window: DateRange) -> Result<RunReport, PipelineError> {
        self.limiter.take().await;
        let listing =
            calls::remote("stock listing", self.config.call_timeout, self.source.stocks()).await?;

        let listed = listing.len();
        let ranges = self.chunker.chunk(window);
        let equities: Vec<Equity> = listing
            .into_iter()
            .filter(|instrument| instrument.currency == self.config.currency)
            .map(|instrument| Equity::with_instrument(instrument, ranges.clone()))
            .collect();

        info!(
            listed,
            selected = equities.len(),
            currency = %self.config.currency,
            %window,
            "starting market backfill"
        );
        self.run(equities).await
    }

    /// Resolve each equity in turn and fan out its chunk fetches.
    pub async fn run(&self, equities: Vec<Equity>) -> Result<RunReport, PipelineError> {
        let mut report = RunReport::default();
        // Dropping the set on an early return aborts every outstanding fetch.
        let mut fetches: JoinSet<Result<FetchOutcome, PipelineError>> = JoinSet::new();

        for equity in equities {
            let Equity {
                instrument: known,
                ticker,
                date_ranges,
            } = equity;
            let context = format!("resolve {ticker}");
            let resolver = self.resolver.clone();
            let mut resolving = tokio::spawn(async move {
                match known {
                    Some(instrument) => resolver.register(instrument).await.map(Resolution::Found),
                    None => resolver.resolve(&ticker).await,
                }
            });

            // Fetches that finish while this ticker resolves are drained right
            // away, so a failed chunk ends the run without waiting for the resolver.
            let resolution = loop {
                tokio::select! {
                    joined = &mut resolving => {
                        break joined.map_err(|error| task_failure(&context, error))??;
                    }
                    Some(joined) = fetches.join_next(), if !fetches.is_empty() => {
                        match flatten(joined) {
                            Ok(outcome) => report.record(outcome),
                            Err(error) => {
                                resolving.abort();
                                return Err(error);
                            }
                        }
                    }
                }
            };

            match resolution {
                Resolution::Found(instrument) => {
                    info!(
                        ticker = %instrument.ticker,
                        chunks = date_ranges.len(),
                        "instrument resolved"
                    );
                    report.tickers_resolved += 1;
                    for range in date_ranges {
                        let fetcher = self.fetcher.clone();
                        let instrument = instrument.clone();
                        fetches.spawn(async move { fetcher.fetch_and_store(&instrument, range).await });
                    }
                }
                Resolution::NotFound(_) => report.tickers_skipped += 1,
            }
        }

        while let Some(joined) = fetches.join_next().await {
            report.record(flatten(joined)?);
        }

        info!(%report, "backfill finished");
        Ok(report)
    }
}

fn flatten(
    joined: Result<Result<FetchOutcome, PipelineError>, JoinError>,
) -> Result<FetchOutcome, PipelineError> {
    joined.map_err(|error| task_failure("bar fetch", error))?
}

fn task_failure(context: &str, error: JoinError) -> PipelineError {
    PipelineError::Task {
        context: context.to_string(),
        message: error.to_string(),
    }
}
