//! Risk error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RiskError {
    #[error("Configuration error: {0}")]
    Config(String),
}

pub type RiskResult<T> = Result<T, RiskError>;
