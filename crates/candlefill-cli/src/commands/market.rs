use candlefill_core::{parse_date, Currency, DateRange, PipelineConfig, RunReport};

use crate::cli::{Cli, MarketArgs};
use crate::error::CliError;

pub async fn run(cli: &Cli, args: &MarketArgs) -> Result<RunReport, CliError> {
    let window = DateRange::new(parse_date(&args.from)?, parse_date(&args.to)?)?;
    let currency: Currency = args.currency.parse()?;

    let config = PipelineConfig {
        currency,
        ..super::pipeline_config(cli)
    };
    let orchestrator = super::orchestrator(cli, config)?;
    Ok(orchestrator.run_market(window).await?)
}
