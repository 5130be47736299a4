//! CLI argument definitions for candlefill.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `index` | Backfill every constituent of an index membership CSV |
//! | `market` | Backfill every listed stock in one currency over a window |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `--db` | `$CANDLEFILL_HOME/warehouse.duckdb` | DuckDB database file |
//! | `--token` | `$CANDLEFILL_API_TOKEN` | Provider API token |
//! | `--api-url` | Tinkoff sandbox | Provider base URL |
//! | `--rate` | `2` | Remote calls per second |
//! | `--timeout-ms` | `5000` | Deadline for each remote or storage call |
//! | `--log-format` | `pretty` | Log output format |
//!
//! # Examples
//!
//! ```bash
//! candlefill index --csv index.csv
//! candlefill market --from 2015-01-01 --to 2020-06-15 --currency USD
//! RUST_LOG=debug candlefill --log-format json index --csv index.csv
//! ```

use std::path::PathBuf;

use candlefill_core::adapters::tinkoff::{DEFAULT_BASE_URL, TOKEN_ENV};
use clap::{Args, Parser, Subcommand, ValueEnum};

/// Backfill daily price bars into a local DuckDB warehouse.
#[derive(Debug, Parser)]
#[command(
    name = "candlefill",
    author,
    version,
    about = "Rate-limited daily bar backfill",
    long_about = "candlefill resolves tickers to provider instruments, splits their history into \
one-year chunks and stores daily bars in DuckDB while staying under the provider's request rate.\n\
\n\
Re-running a command is safe: instruments are upserted and stored bars are never duplicated."
)]
pub struct Cli {
    /// DuckDB database file.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Provider API token.
    #[arg(long, global = true, env = TOKEN_ENV, hide_env_values = true)]
    pub token: Option<String>,

    /// Provider base URL.
    #[arg(long, global = true, default_value = DEFAULT_BASE_URL)]
    pub api_url: String,

    /// Remote calls allowed per second across all tasks.
    #[arg(long, global = true, default_value_t = 2)]
    pub rate: u32,

    /// Deadline in milliseconds for each remote or storage call.
    #[arg(long, global = true, default_value_t = 5000)]
    pub timeout_ms: u64,

    /// Log output format. Verbosity follows `RUST_LOG` (default `info`).
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Multi-line human readable output.
    Pretty,
    /// Single-line human readable output.
    Compact,
    /// One JSON object per event.
    Json,
}

/// Available CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Backfill index constituents from a membership CSV.
    ///
    /// The file has a `date,tickers` header, ISO dates and `;`-separated
    /// tickers. Each ticker is fetched from its first to its last appearance.
    ///
    /// # Examples
    ///
    ///   candlefill index --csv index.csv
    Index(IndexArgs),

    /// Backfill every listed stock settled in one currency.
    ///
    /// # Examples
    ///
    ///   candlefill market --from 2015-01-01 --to 2020-06-15
    ///   candlefill market --from 2019-01-01 --to 2019-12-31 --currency USD
    Market(MarketArgs),
}

/// Arguments for the `index` command.
#[derive(Debug, Args)]
pub struct IndexArgs {
    /// Path to the membership CSV.
    #[arg(long)]
    pub csv: PathBuf,
}

/// Arguments for the `market` command.
#[derive(Debug, Args)]
pub struct MarketArgs {
    /// First day of the window (YYYY-MM-DD).
    #[arg(long)]
    pub from: String,

    /// Last day of the window, inclusive (YYYY-MM-DD).
    #[arg(long)]
    pub to: String,

    /// Settlement currency to keep.
    #[arg(long, default_value = "RUB")]
    pub currency: String,
}
