use std::time::Duration;

use candlefill_warehouse::WarehouseError;
use thiserror::Error;

use crate::data_source::SourceError;
use crate::membership::MembershipError;

/// Validation and contract errors exposed by `candlefill-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("ticker cannot be empty")]
    EmptyTicker,
    #[error("ticker length {len} exceeds max {max}")]
    TickerTooLong { len: usize, max: usize },
    #[error("ticker contains invalid character '{ch}' at index {index}")]
    TickerInvalidChar { ch: char, index: usize },

    #[error("date range is inverted: {from} is after {to}")]
    InvertedRange { from: time::Date, to: time::Date },
    #[error("date must be YYYY-MM-DD: '{value}'")]
    InvalidDate { value: String },
    #[error("chunk span must be at least one day")]
    EmptySpan,

    #[error("unsupported currency '{value}'")]
    UnknownCurrency { value: String },
    #[error("unsupported instrument type '{value}'")]
    UnknownInstrumentType { value: String },

    #[error("field '{field}' must be non-negative")]
    NegativeValue { field: &'static str },
}

/// Run-level error taxonomy of the backfill pipeline.
///
/// Every variant is fatal: the orchestrator aborts outstanding work and
/// returns it to the entry point.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("remote call for {context} failed: {source}")]
    Remote {
        context: String,
        #[source]
        source: SourceError,
    },

    #[error("storage call for {context} failed: {source}")]
    Storage {
        context: String,
        #[source]
        source: WarehouseError,
    },

    #[error("{context} did not finish within {}ms", timeout.as_millis())]
    Timeout { context: String, timeout: Duration },

    #[error(transparent)]
    Membership(#[from] MembershipError),

    #[error("instrument {ticker} has no storage id; resolve it before fetching bars")]
    Unresolved { ticker: String },

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("background task for {context} failed: {message}")]
    Task { context: String, message: String },
}

impl PipelineError {
    pub(crate) fn remote(context: impl Into<String>, source: SourceError) -> Self {
        Self::Remote {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn storage(context: impl Into<String>, source: WarehouseError) -> Self {
        Self::Storage {
            context: context.into(),
            source,
        }
    }

    /// Stable machine-readable code, mirrored by the CLI.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Remote { .. } => "pipeline.remote",
            Self::Storage { .. } => "pipeline.storage",
            Self::Timeout { .. } => "pipeline.timeout",
            Self::Membership(_) => "pipeline.membership",
            Self::Unresolved { .. } => "pipeline.unresolved",
            Self::Validation(_) => "pipeline.validation",
            Self::Task { .. } => "pipeline.task",
        }
    }
}
