//! Behavior-driven tests for the backfill pipeline
//!
//! These tests drive the resolver, the bar fetcher and the orchestrator
//! against an in-memory provider and a temporary DuckDB warehouse.

mod support;

use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use candlefill_core::{
    BarFetcher, Currency, DateRange, FetchOrchestrator, FetchOutcome, IndexEntry, IndexTable,
    InstrumentResolver, PipelineConfig, PipelineError, RateLimiter, Resolution, Ticker,
};
use rust_decimal::Decimal;
use time::macros::date;

use support::{bar, fast_config, instrument, open_warehouse, shared, FakeSource};

fn resolver_for(
    warehouse: &candlefill_core::Warehouse,
    source: Arc<FakeSource>,
) -> InstrumentResolver {
    InstrumentResolver::new(
        warehouse.clone(),
        source,
        RateLimiter::per_second(100),
        Duration::from_secs(5),
    )
}

fn fetcher_for(warehouse: &candlefill_core::Warehouse, source: Arc<FakeSource>) -> BarFetcher {
    BarFetcher::new(
        warehouse.clone(),
        source,
        RateLimiter::per_second(100),
        Duration::from_secs(5),
    )
}

// =============================================================================
// Resolution
// =============================================================================

#[tokio::test]
async fn when_ticker_is_resolved_twice_then_second_resolution_skips_the_provider() {
    // Given: A provider that knows AAA as BBG1 and an empty warehouse
    let (_temp, warehouse) = open_warehouse();
    let source = shared(FakeSource::new().with_instrument(instrument("AAA", "BBG1", Currency::Rub)));
    let resolver = resolver_for(&warehouse, source.clone());
    let ticker = Ticker::parse("AAA").expect("valid");

    // When: The ticker is resolved twice
    let first = resolver.resolve(&ticker).await.expect("first resolve");
    let second = resolver.resolve(&ticker).await.expect("second resolve");

    // Then: Both return the same stored instrument and the provider was asked once
    let Resolution::Found(first) = first else {
        panic!("AAA should be found");
    };
    let Resolution::Found(second) = second else {
        panic!("AAA should be found from storage");
    };
    assert!(first.storage_id.is_some());
    assert_eq!(first.storage_id, second.storage_id);
    assert_eq!(second.external_id, "BBG1");
    assert_eq!(source.searches(), 1);
    assert_eq!(warehouse.count_instruments().expect("count"), 1);
}

#[tokio::test]
async fn when_provider_has_no_match_then_ticker_is_not_found_and_nothing_is_stored() {
    // Given: A provider with no instruments
    let (_temp, warehouse) = open_warehouse();
    let source = shared(FakeSource::new());
    let resolver = resolver_for(&warehouse, source.clone());
    let ticker = Ticker::parse("ZZZ").expect("valid");

    // When: The ticker is resolved
    let resolution = resolver.resolve(&ticker).await.expect("not found is not an error");

    // Then: NotFound is reported and storage stays empty
    assert_eq!(resolution, Resolution::NotFound(ticker));
    assert_eq!(warehouse.count_instruments().expect("count"), 0);
}

#[tokio::test]
async fn when_instrument_is_registered_again_then_price_step_is_refreshed_and_id_kept() {
    // Given: A stored instrument
    let (_temp, warehouse) = open_warehouse();
    let resolver = resolver_for(&warehouse, shared(FakeSource::new()));
    let original = resolver
        .register(instrument("AAA", "BBG1", Currency::Rub))
        .await
        .expect("register");

    // When: The provider reports a new price step for the same external id
    let mut changed = instrument("AAA", "BBG1", Currency::Rub);
    changed.min_price_increment = Decimal::from_str("0.005").expect("decimal");
    let refreshed = resolver.register(changed).await.expect("re-register");

    // Then: The storage id is stable and the stored price step is the new one
    assert_eq!(original.storage_id, refreshed.storage_id);
    let stored = warehouse
        .find_instrument_by_ticker("AAA")
        .expect("lookup")
        .expect("present");
    assert_eq!(stored.record.min_price_increment, Decimal::from_str("0.005").expect("decimal"));
}

// =============================================================================
// Bar fetching
// =============================================================================

#[tokio::test]
async fn when_chunk_has_no_bars_then_fetch_is_empty_and_row_count_unchanged() {
    // Given: A resolved instrument with no history
    let (_temp, warehouse) = open_warehouse();
    let source = shared(FakeSource::new());
    let stored = resolver_for(&warehouse, source.clone())
        .register(instrument("AAA", "BBG1", Currency::Rub))
        .await
        .expect("register");
    let range = DateRange::new(date!(2019 - 01 - 01), date!(2019 - 12 - 31)).expect("range");

    // When: The chunk is fetched
    let outcome = fetcher_for(&warehouse, source.clone())
        .fetch_and_store(&stored, range)
        .await
        .expect("empty chunk is not an error");

    // Then: The outcome is Empty and nothing was written
    assert_eq!(outcome, FetchOutcome::Empty);
    assert_eq!(source.bar_requests(), 1);
    let id = stored.storage_id.expect("stored");
    assert_eq!(warehouse.count_daily_bars(id).expect("count"), 0);
}

#[tokio::test]
async fn when_bars_are_fetched_then_prices_are_stored_exactly() {
    // Given: A provider with three bars, one outside the requested chunk
    let (_temp, warehouse) = open_warehouse();
    let source = shared(FakeSource::new().with_bars(
        "BBG1",
        vec![
            bar(date!(2019 - 01 - 03), "186.10", 4_431_920),
            bar(date!(2019 - 01 - 04), "0.000123456789", 10),
            bar(date!(2020 - 01 - 03), "255.00", 7),
        ],
    ));
    let stored = resolver_for(&warehouse, source.clone())
        .register(instrument("AAA", "BBG1", Currency::Rub))
        .await
        .expect("register");
    let range = DateRange::new(date!(2019 - 01 - 01), date!(2019 - 12 - 31)).expect("range");

    // When: The chunk is fetched
    let outcome = fetcher_for(&warehouse, source)
        .fetch_and_store(&stored, range)
        .await
        .expect("fetch");

    // Then: Both in-range bars are stored with their exact decimal values
    assert_eq!(outcome, FetchOutcome::Stored(2));
    let rows = warehouse
        .daily_bars(stored.storage_id.expect("stored"))
        .expect("read bars");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1].close, Decimal::from_str("0.000123456789").expect("decimal"));
}

#[tokio::test]
async fn when_one_row_is_rejected_by_storage_then_the_whole_chunk_is_discarded() {
    // Given: A chunk whose last bar violates the non-negative volume constraint
    let (_temp, warehouse) = open_warehouse();
    let source = shared(FakeSource::new().with_bars(
        "BBG1",
        vec![
            bar(date!(2019 - 01 - 03), "10", 100),
            bar(date!(2019 - 01 - 04), "11", 200),
            bar(date!(2019 - 01 - 05), "12", -1),
        ],
    ));
    let stored = resolver_for(&warehouse, source.clone())
        .register(instrument("AAA", "BBG1", Currency::Rub))
        .await
        .expect("register");
    let range = DateRange::new(date!(2019 - 01 - 01), date!(2019 - 01 - 31)).expect("range");

    // When: The chunk is fetched
    let error = fetcher_for(&warehouse, source)
        .fetch_and_store(&stored, range)
        .await
        .expect_err("constraint violation must fail");

    // Then: The error is a storage failure and no row of the chunk remains
    assert!(matches!(error, PipelineError::Storage { .. }));
    let id = stored.storage_id.expect("stored");
    assert_eq!(warehouse.count_daily_bars(id).expect("count"), 0);
}

#[tokio::test]
async fn when_instrument_is_unresolved_then_fetch_is_rejected_without_remote_call() {
    // Given: An instrument that never went through storage
    let (_temp, warehouse) = open_warehouse();
    let source = shared(FakeSource::new());
    let range = DateRange::single(date!(2019 - 01 - 03));

    // When: A fetch is attempted
    let error = fetcher_for(&warehouse, source.clone())
        .fetch_and_store(&instrument("AAA", "BBG1", Currency::Rub), range)
        .await
        .expect_err("must be rejected");

    // Then: It fails before reaching the provider
    assert!(matches!(error, PipelineError::Unresolved { .. }));
    assert_eq!(source.bar_requests(), 0);
}

#[tokio::test]
async fn when_instruments_are_already_stored_then_resolution_takes_no_rate_limit_token() {
    // Given: Four stored instruments and a limiter of 1 per second with its token spent
    let (_temp, warehouse) = open_warehouse();
    let source = shared(FakeSource::new());
    let limiter = RateLimiter::per_second(1);
    let resolver = InstrumentResolver::new(
        warehouse.clone(),
        source.clone(),
        limiter.clone(),
        Duration::from_secs(5),
    );
    let tickers = ["AAA", "BBB", "CCC", "DDD"];
    for (index, ticker) in tickers.iter().enumerate() {
        resolver
            .register(instrument(ticker, &format!("BBG{index}"), Currency::Rub))
            .await
            .expect("register");
    }
    limiter.take().await;

    // When: Every ticker is resolved
    let started = Instant::now();
    for ticker in tickers {
        let resolution = resolver
            .resolve(&Ticker::parse(ticker).expect("valid"))
            .await
            .expect("resolve");
        assert!(matches!(resolution, Resolution::Found(_)));
    }

    // Then: No resolution waited on the limiter or reached the provider
    assert!(
        started.elapsed() < Duration::from_millis(500),
        "elapsed {:?}",
        started.elapsed()
    );
    assert_eq!(source.searches(), 0);
}

// =============================================================================
// Orchestration
// =============================================================================

fn membership() -> IndexTable {
    let aaa = Ticker::parse("AAA").expect("valid");
    let zzz = Ticker::parse("ZZZ").expect("valid");
    IndexTable::new(vec![
        IndexEntry {
            date: date!(2018 - 01 - 01),
            tickers: vec![aaa.clone(), zzz],
        },
        IndexEntry {
            date: date!(2020 - 06 - 15),
            tickers: vec![aaa],
        },
    ])
    .expect("non-empty table")
}

fn aaa_history() -> FakeSource {
    FakeSource::new()
        .with_instrument(instrument("AAA", "BBG1", Currency::Rub))
        .with_bars(
            "BBG1",
            vec![
                bar(date!(2018 - 03 - 01), "100.5", 10),
                bar(date!(2018 - 12 - 31), "101.5", 11),
                bar(date!(2019 - 01 - 01), "102.5", 12),
                bar(date!(2020 - 06 - 15), "103.5", 13),
            ],
        )
}

#[tokio::test]
async fn when_index_run_completes_then_every_chunk_is_accounted_for() {
    // Given: AAA spanning three chunks and ZZZ unknown to the provider
    let (_temp, warehouse) = open_warehouse();
    let source = shared(aaa_history());
    let orchestrator =
        FetchOrchestrator::new(warehouse.clone(), source.clone(), fast_config()).expect("config");

    // When: The index run executes
    let report = orchestrator.run_index(&membership()).await.expect("run");

    // Then: AAA is resolved, ZZZ skipped, and all bars landed once
    assert_eq!(report.tickers_resolved, 1);
    assert_eq!(report.tickers_skipped, 1);
    assert_eq!(report.chunks_stored + report.chunks_empty, 3);
    assert_eq!(report.bars_written, 4);
    assert_eq!(source.bar_requests(), 3);

    let stored = warehouse
        .find_instrument_by_ticker("AAA")
        .expect("lookup")
        .expect("present");
    assert_eq!(warehouse.count_daily_bars(stored.id).expect("count"), 4);
}

#[tokio::test]
async fn when_run_is_repeated_then_nothing_is_duplicated() {
    // Given: A completed index run
    let (_temp, warehouse) = open_warehouse();
    let source = shared(aaa_history());
    let orchestrator =
        FetchOrchestrator::new(warehouse.clone(), source.clone(), fast_config()).expect("config");
    orchestrator.run_index(&membership()).await.expect("first run");

    // When: The same run is executed again
    let report = orchestrator.run_index(&membership()).await.expect("second run");

    // Then: AAA came from storage and no new rows were written
    assert_eq!(source.searches(), 3, "AAA once, ZZZ on both runs");
    assert_eq!(report.bars_written, 0);
    assert_eq!(warehouse.count_instruments().expect("count"), 1);
    let stored = warehouse
        .find_instrument_by_ticker("AAA")
        .expect("lookup")
        .expect("present");
    assert_eq!(warehouse.count_daily_bars(stored.id).expect("count"), 4);
}

#[tokio::test]
async fn when_a_bar_fetch_fails_then_the_run_fails() {
    // Given: A provider whose candle endpoint errors for AAA
    let (_temp, warehouse) = open_warehouse();
    let source = shared(aaa_history().failing_bars_for("BBG1"));
    let orchestrator = FetchOrchestrator::new(warehouse, source, fast_config()).expect("config");

    // When: The run executes
    let error = orchestrator
        .run_index(&membership())
        .await
        .expect_err("remote failure is fatal");

    // Then: The remote error surfaces
    assert!(matches!(error, PipelineError::Remote { .. }));
    assert_eq!(error.code(), "pipeline.remote");
}

fn two_tickers() -> IndexTable {
    IndexTable::new(vec![IndexEntry {
        date: date!(2019 - 01 - 03),
        tickers: vec![
            Ticker::parse("AAA").expect("valid"),
            Ticker::parse("BBB").expect("valid"),
        ],
    }])
    .expect("non-empty table")
}

#[tokio::test]
async fn when_fetches_are_slow_then_the_next_ticker_resolves_before_they_finish() {
    // Given: Two tickers whose candle requests take a while
    let (_temp, warehouse) = open_warehouse();
    let source = shared(
        FakeSource::new()
            .with_instrument(instrument("AAA", "BBG1", Currency::Rub))
            .with_instrument(instrument("BBB", "BBG2", Currency::Rub))
            .with_bars("BBG1", vec![bar(date!(2019 - 01 - 03), "10", 1)])
            .with_bars("BBG2", vec![bar(date!(2019 - 01 - 03), "20", 2)])
            .with_bar_delay(Duration::from_millis(400)),
    );
    let orchestrator =
        FetchOrchestrator::new(warehouse, source.clone(), fast_config()).expect("config");

    // When: The index run executes
    let report = orchestrator.run_index(&two_tickers()).await.expect("run");

    // Then: BBB was searched while AAA's fetch was still in flight
    assert_eq!(report.tickers_resolved, 2);
    assert_eq!(report.bars_written, 2);
    let events = source.events();
    let position = |event: &str| {
        events
            .iter()
            .position(|logged| logged == event)
            .unwrap_or_else(|| panic!("{event} missing from {events:?}"))
    };
    assert!(
        position("search BBB") < position("bars BBG1"),
        "events: {events:?}"
    );
}

#[tokio::test]
async fn when_a_fetch_fails_during_a_slow_resolution_then_the_run_stops_at_once() {
    // Given: AAA's candles fail and BBB's search hangs for three seconds
    let (_temp, warehouse) = open_warehouse();
    let source = shared(
        FakeSource::new()
            .with_instrument(instrument("AAA", "BBG1", Currency::Rub))
            .with_instrument(instrument("BBB", "BBG2", Currency::Rub))
            .failing_bars_for("BBG1")
            .with_search_delay("BBB", Duration::from_secs(3)),
    );
    let orchestrator = FetchOrchestrator::new(warehouse, source, fast_config()).expect("config");

    // When: The index run executes
    let started = Instant::now();
    let error = orchestrator
        .run_index(&two_tickers())
        .await
        .expect_err("remote failure is fatal");

    // Then: The failure surfaces without waiting for BBB
    assert!(matches!(error, PipelineError::Remote { .. }));
    assert!(
        started.elapsed() < Duration::from_secs(2),
        "elapsed {:?}",
        started.elapsed()
    );
}

#[tokio::test]
async fn when_provider_hangs_then_the_call_times_out() {
    // Given: A provider slower than the call deadline
    let (_temp, warehouse) = open_warehouse();
    let source = shared(aaa_history().with_delay(Duration::from_secs(5)));
    let config = PipelineConfig {
        call_timeout: Duration::from_millis(300),
        ..fast_config()
    };
    let orchestrator = FetchOrchestrator::new(warehouse, source, config).expect("config");

    // When: The run executes
    let error = orchestrator
        .run_index(&membership())
        .await
        .expect_err("deadline must expire");

    // Then: A timeout is reported
    assert!(matches!(error, PipelineError::Timeout { .. }));
}

#[tokio::test]
async fn when_market_run_executes_then_only_the_configured_currency_is_stored() {
    // Given: A listing with one RUB and one USD stock
    let (_temp, warehouse) = open_warehouse();
    let source = shared(
        FakeSource::new()
            .with_listing(vec![
                instrument("AAA", "BBG1", Currency::Rub),
                instrument("UUU", "BBG2", Currency::Usd),
            ])
            .with_bars("BBG1", vec![bar(date!(2019 - 06 - 03), "50", 5)])
            .with_bars("BBG2", vec![bar(date!(2019 - 06 - 03), "60", 6)]),
    );
    let orchestrator =
        FetchOrchestrator::new(warehouse.clone(), source.clone(), fast_config()).expect("config");
    let window = DateRange::new(date!(2019 - 01 - 01), date!(2019 - 12 - 31)).expect("range");

    // When: Whole-market mode runs
    let report = orchestrator.run_market(window).await.expect("run");

    // Then: Only the RUB stock is stored, straight from the listing
    assert_eq!(source.listings(), 1);
    assert_eq!(source.searches(), 0);
    assert_eq!(report.tickers_resolved, 1);
    assert_eq!(report.bars_written, 1);
    assert_eq!(warehouse.count_instruments().expect("count"), 1);
    assert!(warehouse
        .find_instrument_by_ticker("UUU")
        .expect("lookup")
        .is_none());
}

#[tokio::test]
async fn when_span_is_zero_then_orchestrator_is_rejected() {
    let (_temp, warehouse) = open_warehouse();
    let config = PipelineConfig {
        max_span_days: 0,
        ..PipelineConfig::default()
    };

    let result = FetchOrchestrator::new(warehouse, shared(FakeSource::new()), config);
    assert!(matches!(result, Err(PipelineError::Validation(_))));
}
