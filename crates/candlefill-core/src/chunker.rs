//! Splits long date ranges into provider-sized chunks.
//!
//! The provider serves at most one year of daily history per request. A range
//! of `N` days (both ends counted) becomes `ceil(N / max_span_days)` contiguous
//! chunks; every chunk but the last covers exactly `max_span_days` days.

use std::num::NonZeroU32;

use time::Duration;

use crate::{DateRange, ValidationError};

pub const DEFAULT_MAX_SPAN_DAYS: u32 = 365;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateChunker {
    max_span_days: NonZeroU32,
}

impl Default for DateChunker {
    fn default() -> Self {
        Self {
            max_span_days: NonZeroU32::new(DEFAULT_MAX_SPAN_DAYS).unwrap_or(NonZeroU32::MIN),
        }
    }
}

impl DateChunker {
    pub fn new(max_span_days: u32) -> Result<Self, ValidationError> {
        let max_span_days = NonZeroU32::new(max_span_days).ok_or(ValidationError::EmptySpan)?;
        Ok(Self { max_span_days })
    }

    pub const fn max_span_days(&self) -> u32 {
        self.max_span_days.get()
    }

    /// Split `range` into contiguous chunks of at most `max_span_days` days.
    ///
    /// Days are counted inclusively: a range stays whole only while
    /// `to - from + 1 <= max_span_days`. 2018-01-01..=2019-01-01 spans 366 days
    /// and therefore yields two chunks, not one.
    pub fn chunk(&self, range: DateRange) -> Vec<DateRange> {
        let span = i64::from(self.max_span_days.get());
        let expected = (range.days() + span - 1) / span;
        let mut chunks = Vec::with_capacity(usize::try_from(expected).unwrap_or_default());

        let mut from = range.from();
        loop {
            let remaining = (range.to() - from).whole_days() + 1;
            if remaining <= span {
                chunks.push(DateRange::ordered(from, range.to()));
                return chunks;
            }

            let to = from + Duration::days(span - 1);
            chunks.push(DateRange::ordered(from, to));
            from = to + Duration::days(1);
        }
    }
}
