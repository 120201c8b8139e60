use engine::{EngineError, ErrorKind};
use thiserror::Error;

/// Errors surfaced by `settle_admin`.
#[derive(Error, Debug)]
pub enum AdminError {
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error(transparent)]
    Database(#[from] sea_orm::DbErr),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl AdminError {
    /// Process exit code for this error.
    ///
    /// Engine errors map by kind: invalid 2, not found 3, conflict 4,
    /// persistence 5. Authorization failures exit with 6.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Engine(err) => match err.kind() {
                ErrorKind::Invalid => 2,
                ErrorKind::NotFound => 3,
                ErrorKind::Conflict => 4,
                ErrorKind::Persistence => 5,
            },
            Self::Database(_) => 5,
            Self::Forbidden(_) => 6,
            Self::Config(_) | Self::Json(_) => 1,
        }
    }
}
