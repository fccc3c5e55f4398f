//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Registry error: {0}")]
    Registry(#[from] flowbot_registry::RegistryError),

    #[error("Executor error: {0}")]
    Executor(#[from] flowbot_executor::ExecutorError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] flowbot_telemetry::TelemetryError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
