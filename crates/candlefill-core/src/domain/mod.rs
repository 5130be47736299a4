//! # Domain Models
//!
//! Canonical domain types for the backfill pipeline.
//!
//! ## Models
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Instrument`] | Instrument identity with optional storage id |
//! | [`Bar`] | Daily OHLCV bar with exact decimal prices |
//! | [`Equity`] | Per-ticker unit of work |
//! | [`DateRange`] | Inclusive day range, ordered by construction |
//! | [`Ticker`] | Validated exchange ticker |
//! | [`Currency`] | Settlement currency |
//! | [`InstrumentType`] | Provider instrument class |

mod date_range;
mod models;
mod ticker;

pub use date_range::{parse_date, DateRange};
pub use models::{Bar, Currency, Equity, Instrument, InstrumentType};
pub use ticker::Ticker;
