//! Error types for flowbot-core.

use rust_decimal::Decimal;
use thiserror::Error;

/// Core error types.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid size: {0}")]
    InvalidSize(String),

    #[error("Invalid token id: {0}")]
    InvalidToken(String),

    #[error("Decimal parse error: {0}")]
    DecimalParse(#[from] rust_decimal::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Order cost {cost} below minimum order value {min}")]
    BelowMinimumOrder { cost: Decimal, min: Decimal },

    #[error("Price {price} outside bounds [{min}, {max}]")]
    PriceOutOfBounds {
        price: Decimal,
        min: Decimal,
        max: Decimal,
    },

    #[error("Order book unavailable: {0}")]
    BookUnavailable(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
