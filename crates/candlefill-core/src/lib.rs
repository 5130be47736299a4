//! # Candlefill Core
//!
//! Rate-limited, concurrent backfill of daily price bars.
//!
//! ## Overview
//!
//! Given tickers with date ranges, the pipeline:
//!
//! - **Resolves** each ticker to a stored instrument, asking the provider only on a cache miss
//! - **Chunks** long ranges into windows the provider accepts (one year of daily history)
//! - **Fetches** every chunk concurrently and stores it in a single atomic insert
//! - **Paces** all remote calls through one shared token source
//!
//! ## Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`adapters`] | Provider adapters (Tinkoff OpenAPI) |
//! | [`chunker`] | Date range chunking |
//! | [`config`] | Pipeline limits |
//! | [`data_source`] | Remote market-data trait and source errors |
//! | [`domain`] | Domain models (Instrument, Bar, Equity, DateRange, Ticker) |
//! | [`error`] | Validation and pipeline errors |
//! | [`fetcher`] | Per-chunk bar fetch and store |
//! | [`http_client`] | HTTP client abstraction |
//! | [`membership`] | Index membership table |
//! | [`orchestrator`] | Run driver for index and whole-market modes |
//! | [`resolver`] | Ticker to instrument resolution |
//! | [`throttling`] | Shared rate limiter |
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use candlefill_core::{
//!     FetchOrchestrator, IndexTable, PipelineConfig, TinkoffAdapter, TinkoffConfig, Warehouse,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let warehouse = Warehouse::open_default()?;
//!     let source = Arc::new(TinkoffAdapter::new(TinkoffConfig::default()));
//!     let orchestrator = FetchOrchestrator::new(warehouse, source, PipelineConfig::default())?;
//!
//!     let table = IndexTable::from_csv_path("index.csv")?;
//!     let report = orchestrator.run_index(&table).await?;
//!     println!("{report}");
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  CLI / index    │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │  Orchestrator   │────▶│ Resolver         │──┐
//! └────────┬────────┘     └──────────────────┘  │
//!          │ one task per chunk                 │
//!          ▼                                    ▼
//! ┌─────────────────┐     ┌──────────────────┐  ┌─────────────┐
//! │ Bar fetcher     │────▶│ Rate limiter     │  │ Warehouse   │
//! └────────┬────────┘     └──────────────────┘  │ (DuckDB)    │
//!          │                                    └─────────────┘
//!          ▼
//! ┌─────────────────┐     ┌──────────────────┐
//! │ Market data     │────▶│ HTTP client      │
//! │ source (trait)  │     │ (reqwest)        │
//! └─────────────────┘     └──────────────────┘
//! ```
//!
//! ## Error Handling
//!
//! Unknown tickers and empty chunks are logged and skipped. Every other
//! failure is a [`PipelineError`] that ends the run:
//!
//! ```rust
//! use candlefill_core::PipelineError;
//!
//! fn describe(error: &PipelineError) -> &'static str {
//!     match error {
//!         PipelineError::Remote { .. } | PipelineError::Timeout { .. } => "provider trouble",
//!         PipelineError::Storage { .. } => "database trouble",
//!         _ => "bad input",
//!     }
//! }
//! ```
//!
//! ## Security
//!
//! - The API token is read from `CANDLEFILL_API_TOKEN` or the command line and never logged
//! - All SQL values are bound as parameters

pub mod adapters;
mod calls;
pub mod chunker;
pub mod config;
pub mod data_source;
pub mod domain;
pub mod error;
pub mod fetcher;
pub mod http_client;
pub mod membership;
pub mod orchestrator;
pub mod resolver;
pub mod throttling;

// Adapter implementations
pub use adapters::{TinkoffAdapter, TinkoffConfig};

// Pipeline
pub use chunker::DateChunker;
pub use config::PipelineConfig;
pub use fetcher::{BarFetcher, FetchOutcome};
pub use orchestrator::{FetchOrchestrator, RunReport};
pub use resolver::{InstrumentResolver, Resolution};
pub use throttling::RateLimiter;

// Data source trait and types
pub use data_source::{MarketDataSource, SourceError, SourceErrorKind, SourceFuture};

// Domain models
pub use domain::{parse_date, Bar, Currency, DateRange, Equity, Instrument, InstrumentType, Ticker};

// Error types
pub use error::{PipelineError, ValidationError};
pub use membership::{IndexEntry, IndexTable, MembershipError};

// Warehouse (re-exported from candlefill-warehouse)
pub use candlefill_warehouse::{Warehouse, WarehouseConfig, WarehouseError};

// HTTP client types
pub use http_client::{HttpAuth, HttpClient, HttpError, HttpRequest, HttpResponse, ReqwestHttpClient};
