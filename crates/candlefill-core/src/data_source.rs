//! Remote market-data contract.
//!
//! The pipeline talks to the provider only through [`MarketDataSource`].
//!
//! | Operation | Returns | Used by |
//! |-----------|---------|---------|
//! | [`find_by_ticker`](MarketDataSource::find_by_ticker) | matching instruments | resolver |
//! | [`daily_bars`](MarketDataSource::daily_bars) | daily bars in a range | bar fetcher |
//! | [`stocks`](MarketDataSource::stocks) | every listed stock | whole-market mode |

use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;

use crate::{Bar, DateRange, Instrument, Ticker};

pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, SourceError>> + Send + 'a>>;

/// Adapter-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    Transport,
    Timeout,
    Unauthorized,
    RateLimited,
    Upstream,
    Decode,
    InvalidRequest,
}

/// Structured source error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
}

impl SourceError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Transport, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Timeout, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Unauthorized, message)
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::RateLimited, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Upstream, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::Decode, message)
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(SourceErrorKind::InvalidRequest, message)
    }

    fn new(kind: SourceErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Transport => "source.transport",
            SourceErrorKind::Timeout => "source.timeout",
            SourceErrorKind::Unauthorized => "source.unauthorized",
            SourceErrorKind::RateLimited => "source.rate_limited",
            SourceErrorKind::Upstream => "source.upstream",
            SourceErrorKind::Decode => "source.decode",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

/// Remote market-data provider.
///
/// Implementations must be `Send + Sync`; one instance is shared by every
/// resolution and fetch task of a run.
pub trait MarketDataSource: Send + Sync {
    /// Instruments whose ticker equals `ticker`. Empty when nothing matches.
    fn find_by_ticker<'a>(&'a self, ticker: &'a Ticker) -> SourceFuture<'a, Vec<Instrument>>;

    /// Daily bars for the instrument with `external_id`, both range ends included.
    fn daily_bars<'a>(&'a self, external_id: &'a str, range: DateRange) -> SourceFuture<'a, Vec<Bar>>;

    /// Every stock the provider lists.
    fn stocks<'a>(&'a self) -> SourceFuture<'a, Vec<Instrument>>;
}
