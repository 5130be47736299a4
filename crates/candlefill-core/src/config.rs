use std::time::Duration;

use crate::chunker::{DateChunker, DEFAULT_MAX_SPAN_DAYS};
use crate::{Currency, ValidationError};

pub const DEFAULT_REQUESTS_PER_SECOND: u32 = 2;
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(5);

/// Run-wide limits of the backfill pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Longest history window served by one bar request.
    pub max_span_days: u32,
    /// Aggregate ceiling on remote calls.
    pub requests_per_second: u32,
    /// Upper bound for every single remote or storage call.
    pub call_timeout: Duration,
    /// Whole-market mode keeps only stocks settled in this currency.
    pub currency: Currency,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_span_days: DEFAULT_MAX_SPAN_DAYS,
            requests_per_second: DEFAULT_REQUESTS_PER_SECOND,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            currency: Currency::Rub,
        }
    }
}

impl PipelineConfig {
    pub fn chunker(&self) -> Result<DateChunker, ValidationError> {
        DateChunker::new(self.max_span_days)
    }
}
