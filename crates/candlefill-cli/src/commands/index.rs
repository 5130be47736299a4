use candlefill_core::{IndexTable, RunReport};

use crate::cli::{Cli, IndexArgs};
use crate::error::CliError;

pub async fn run(cli: &Cli, args: &IndexArgs) -> Result<RunReport, CliError> {
    // Membership is parsed before anything touches the network or the database.
    let table = IndexTable::from_csv_path(&args.csv)?;
    tracing::info!(
        csv = %args.csv.display(),
        dates = table.entries().len(),
        "index membership loaded"
    );

    let orchestrator = super::orchestrator(cli, super::pipeline_config(cli))?;
    Ok(orchestrator.run_index(&table).await?)
}
