use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::cli::LogFormat;
use crate::error::CliError;

const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber. Events go to stderr so stdout carries only
/// the run report.
pub fn init(format: LogFormat) -> Result<(), CliError> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(env_filter);
    let layer = fmt::layer().with_writer(std::io::stderr).with_target(true);

    let result = match format {
        LogFormat::Pretty => registry.with(layer.pretty()).try_init(),
        LogFormat::Compact => registry.with(layer.compact()).try_init(),
        LogFormat::Json => registry.with(layer.json()).try_init(),
    };

    result.map_err(|error| CliError::Logging(error.to_string()))
}
