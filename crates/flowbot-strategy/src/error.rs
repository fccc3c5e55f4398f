//! Strategy error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StrategyError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Insufficient liquidity: {0}")]
    InsufficientLiquidity(String),

    #[error("Price out of bounds: {0}")]
    PriceOutOfBounds(String),

    #[error("Core error: {0}")]
    Core(#[from] flowbot_core::CoreError),
}

pub type StrategyResult<T> = Result<T, StrategyError>;
