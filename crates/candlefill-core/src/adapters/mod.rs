//! Provider adapters implementing [`MarketDataSource`](crate::MarketDataSource).

pub mod tinkoff;

pub use tinkoff::{TinkoffAdapter, TinkoffConfig};
