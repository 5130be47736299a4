//! Deadline-bounded wrappers around remote and storage calls.

use std::future::Future;
use std::time::Duration;

use candlefill_warehouse::{Warehouse, WarehouseError};

use crate::data_source::SourceError;
use crate::PipelineError;

pub(crate) async fn remote<T>(
    context: &str,
    timeout: Duration,
    call: impl Future<Output = Result<T, SourceError>>,
) -> Result<T, PipelineError> {
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result.map_err(|source| PipelineError::remote(context, source)),
        Err(_) => Err(PipelineError::Timeout {
            context: context.to_string(),
            timeout,
        }),
    }
}

/// Run a blocking warehouse operation on the blocking pool.
///
/// An expired deadline fails the caller; the operation itself runs to
/// completion and commits or rolls back on its own.
pub(crate) async fn storage<T, F>(
    context: &str,
    timeout: Duration,
    warehouse: &Warehouse,
    operation: F,
) -> Result<T, PipelineError>
where
    T: Send + 'static,
    F: FnOnce(&Warehouse) -> Result<T, WarehouseError> + Send + 'static,
{
    let warehouse = warehouse.clone();
    let task = tokio::task::spawn_blocking(move || operation(&warehouse));

    match tokio::time::timeout(timeout, task).await {
        Ok(Ok(result)) => result.map_err(|source| PipelineError::storage(context, source)),
        Ok(Err(join_error)) => Err(PipelineError::Task {
            context: context.to_string(),
            message: join_error.to_string(),
        }),
        Err(_) => Err(PipelineError::Timeout {
            context: context.to_string(),
            timeout,
        }),
    }
}
