//! Core domain types for the flowbot order-taking engine.
//!
//! This crate provides the vocabulary shared by every other crate:
//! - `Price`, `Size`: Precision-safe numeric types
//! - `TokenId`, `MarketSpec`: Outcome token identifiers and tick/lot granularity
//! - `OrderBookSnapshot`, `Quote`: Immutable ladder views and the `OrderBookSource` port
//! - `TradeIntent`, `TradeResult`, `ExecErrorKind`: Validated orders and their outcomes

pub mod book;
pub mod decimal;
pub mod error;
pub mod execution;
pub mod market;
pub mod order;

pub use book::{
    BookState, BoxFuture, OrderBookSnapshot, OrderBookSource, Quote, StaticBookSource,
};
pub use decimal::{Price, Size};
pub use error::{CoreError, Result};
pub use market::{MarketSpec, PriceBounds, TokenId, CANONICAL_TOKEN_MIN_LEN};
pub use order::{ClientOrderId, OrderSide, RecentIds, TimeInForce};

// Execution types
pub use execution::{
    ErrorClass, ExecErrorKind, GatewayAck, IntentConstraints, SkipReason, TradeIntent,
    TradeResult, COST_DP, SIZE_DP,
};
