use std::fmt::{Display, Formatter};

use time::macros::format_description;
use time::Date;

use crate::ValidationError;

/// Inclusive range of calendar days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DateRange {
    from: Date,
    to: Date,
}

impl DateRange {
    /// Build a range, rejecting `from > to`.
    pub fn new(from: Date, to: Date) -> Result<Self, ValidationError> {
        if from > to {
            return Err(ValidationError::InvertedRange { from, to });
        }
        Ok(Self { from, to })
    }

    /// A range covering one day.
    pub const fn single(day: Date) -> Self {
        Self { from: day, to: day }
    }

    /// Caller guarantees `from <= to`.
    pub(crate) const fn ordered(from: Date, to: Date) -> Self {
        Self { from, to }
    }

    pub const fn from(&self) -> Date {
        self.from
    }

    pub const fn to(&self) -> Date {
        self.to
    }

    /// Number of days covered, both ends included.
    pub fn days(&self) -> i64 {
        (self.to - self.from).whole_days() + 1
    }

    pub fn contains(&self, day: Date) -> bool {
        self.from <= day && day <= self.to
    }
}

impl Display for DateRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.from, self.to)
    }
}

/// Parse an ISO `YYYY-MM-DD` date.
pub fn parse_date(value: &str) -> Result<Date, ValidationError> {
    Date::parse(value.trim(), format_description!("[year]-[month]-[day]")).map_err(|_| {
        ValidationError::InvalidDate {
            value: value.to_string(),
        }
    })
}
