mod index;
mod market;

use std::sync::Arc;
use std::time::Duration;

use candlefill_core::adapters::tinkoff::TOKEN_ENV;
use candlefill_core::{
    FetchOrchestrator, PipelineConfig, RunReport, TinkoffAdapter, TinkoffConfig, Warehouse,
    WarehouseConfig,
};

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn run(cli: &Cli) -> Result<RunReport, CliError> {
    match &cli.command {
        Command::Index(args) => index::run(cli, args).await,
        Command::Market(args) => market::run(cli, args).await,
    }
}

fn pipeline_config(cli: &Cli) -> PipelineConfig {
    PipelineConfig {
        requests_per_second: cli.rate,
        call_timeout: Duration::from_millis(cli.timeout_ms),
        ..PipelineConfig::default()
    }
}

fn open_warehouse(cli: &Cli) -> Result<Warehouse, CliError> {
    let config = match &cli.db {
        Some(path) => WarehouseConfig::at(path),
        None => WarehouseConfig::default(),
    };
    let warehouse = Warehouse::open(config)?;
    tracing::debug!(db = %warehouse.db_path().display(), "warehouse opened");
    Ok(warehouse)
}

fn tinkoff_adapter(cli: &Cli) -> Result<TinkoffAdapter, CliError> {
    let token = cli
        .token
        .as_deref()
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(CliError::MissingToken(TOKEN_ENV))?;

    Ok(TinkoffAdapter::new(TinkoffConfig {
        base_url: cli.api_url.clone(),
        token: token.to_string(),
        timeout_ms: cli.timeout_ms,
    }))
}

fn orchestrator(cli: &Cli, config: PipelineConfig) -> Result<FetchOrchestrator, CliError> {
    let source = Arc::new(tinkoff_adapter(cli)?);
    let warehouse = open_warehouse(cli)?;
    Ok(FetchOrchestrator::new(warehouse, source, config)?)
}
