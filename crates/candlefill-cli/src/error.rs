use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] candlefill_core::ValidationError),

    #[error("missing API token: pass --token or set {0}")]
    MissingToken(&'static str),

    #[error(transparent)]
    Membership(#[from] candlefill_core::MembershipError),

    #[error(transparent)]
    Warehouse(#[from] candlefill_core::WarehouseError),

    #[error(transparent)]
    Pipeline(#[from] candlefill_core::PipelineError),

    #[error("failed to initialise logging: {0}")]
    Logging(String),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Validation(_) => 2,
            Self::MissingToken(_) => 2,
            Self::Membership(_) => 3,
            Self::Warehouse(_) => 4,
            Self::Pipeline(error) => match error {
                candlefill_core::PipelineError::Storage { .. } => 4,
                candlefill_core::PipelineError::Membership(_) => 3,
                _ => 5,
            },
            Self::Logging(_) => 10,
        }
    }
}
