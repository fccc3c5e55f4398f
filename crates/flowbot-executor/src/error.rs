//! Executor error types.

use flowbot_risk::RiskError;
use flowbot_strategy::StrategyError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Strategy error: {0}")]
    Strategy(#[from] StrategyError),

    #[error("Risk error: {0}")]
    Risk(#[from] RiskError),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

pub type ExecutorResult<T> = Result<T, ExecutorError>;
