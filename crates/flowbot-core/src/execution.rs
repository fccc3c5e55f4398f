//! Trade intents, execution outcomes, and skip reasons.

use crate::decimal::{Price, Size};
use crate::error::{CoreError, Result};
use crate::market::{PriceBounds, TokenId};
use crate::order::{ClientOrderId, OrderSide, TimeInForce};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Decimal places kept for order cost.
pub const COST_DP: u32 = 8;

/// Decimal places kept for planned share sizes.
pub const SIZE_DP: u32 = 8;

// ============================================================================
// IntentConstraints
// ============================================================================

/// Limits every intent must satisfy at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntentConstraints {
    pub min_order_value: Decimal,
    pub bounds: PriceBounds,
}

impl Default for IntentConstraints {
    fn default() -> Self {
        Self {
            min_order_value: dec!(1.0),
            bounds: PriceBounds::default(),
        }
    }
}

// ============================================================================
// TradeIntent
// ============================================================================

/// A validated order ready for submission.
///
/// Invariants: `cost >= min_order_value` and `price` inside the price bounds.
/// Built by the round planner only; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeIntent {
    id: ClientOrderId,
    token: TokenId,
    side: OrderSide,
    price: Price,
    size: Size,
    cost: Decimal,
    tif: TimeInForce,
    /// Planning round this intent belongs to (1-based).
    round: u32,
    created_at: DateTime<Utc>,
}

impl TradeIntent {
    pub fn new(
        token: TokenId,
        side: OrderSide,
        price: Price,
        size: Size,
        round: u32,
        constraints: &IntentConstraints,
    ) -> Result<Self> {
        if !price.is_positive() {
            return Err(CoreError::InvalidPrice(format!("price must be positive, got {price}")));
        }
        if !size.is_positive() {
            return Err(CoreError::InvalidSize(format!("size must be positive, got {size}")));
        }
        if !constraints.bounds.contains(price) {
            return Err(CoreError::PriceOutOfBounds {
                price: price.inner(),
                min: constraints.bounds.min.inner(),
                max: constraints.bounds.max.inner(),
            });
        }
        let cost = size.notional(price).round_dp(COST_DP);
        if cost < constraints.min_order_value {
            return Err(CoreError::BelowMinimumOrder {
                cost,
                min: constraints.min_order_value,
            });
        }
        Ok(Self {
            id: ClientOrderId::new(),
            token,
            side,
            price,
            size,
            cost,
            tif: TimeInForce::ImmediateOrCancel,
            round,
            created_at: Utc::now(),
        })
    }

    pub fn id(&self) -> &ClientOrderId {
        &self.id
    }

    pub fn token(&self) -> &TokenId {
        &self.token
    }

    pub fn side(&self) -> OrderSide {
        self.side
    }

    pub fn price(&self) -> Price {
        self.price
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn cost(&self) -> Decimal {
        self.cost
    }

    pub fn tif(&self) -> TimeInForce {
        self.tif
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

// ============================================================================
// Execution errors
// ============================================================================

/// Retry classification of an execution error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Transient; another attempt may succeed.
    Retryable,
    /// Permanent; further attempts are wasted.
    Fatal,
}

/// Error kind reported for a failed submission.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecErrorKind {
    #[error("rate limited")]
    RateLimited,

    #[error("submission timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),

    #[error("server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("invalid order parameters: {0}")]
    InvalidParams(String),

    #[error("insufficient balance or allowance: {0}")]
    InsufficientBalance(String),

    #[error("order rejected: {0}")]
    Rejected(String),

    /// IOC order came back without a full fill.
    #[error("order not filled (status {0})")]
    NotFilled(String),

    /// Intent already produced a result and was not resubmitted.
    #[error("duplicate submission")]
    Duplicate,

    #[error("unclassified error: {0}")]
    Unclassified(String),
}

impl ExecErrorKind {
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::RateLimited | Self::Timeout | Self::Network(_) | Self::Server { .. } => {
                ErrorClass::Retryable
            }
            Self::InvalidParams(_)
            | Self::InsufficientBalance(_)
            | Self::Rejected(_)
            | Self::NotFilled(_)
            | Self::Duplicate
            | Self::Unclassified(_) => ErrorClass::Fatal,
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Retryable
    }

    /// Stable label for metrics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::Timeout => "timeout",
            Self::Network(_) => "network",
            Self::Server { .. } => "server",
            Self::InvalidParams(_) => "invalid_params",
            Self::InsufficientBalance(_) => "insufficient_balance",
            Self::Rejected(_) => "rejected",
            Self::NotFilled(_) => "not_filled",
            Self::Duplicate => "duplicate",
            Self::Unclassified(_) => "unclassified",
        }
    }
}

// ============================================================================
// Results
// ============================================================================

/// Acknowledgement of a fully filled submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayAck {
    pub order_id: String,
}

/// Final outcome of one intent. Exactly one per intent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TradeResult {
    pub intent_id: ClientOrderId,
    pub success: bool,
    /// Venue order id on success.
    pub order_id: Option<String>,
    pub error: Option<ExecErrorKind>,
    /// Submission attempts made (0 when the intent was never sent).
    pub attempts: u32,
}

impl TradeResult {
    pub fn filled(intent_id: ClientOrderId, order_id: String, attempts: u32) -> Self {
        Self {
            intent_id,
            success: true,
            order_id: Some(order_id),
            error: None,
            attempts,
        }
    }

    pub fn failed(intent_id: ClientOrderId, error: ExecErrorKind, attempts: u32) -> Self {
        Self {
            intent_id,
            success: false,
            order_id: None,
            error: Some(error),
            attempts,
        }
    }

    /// True when the failure should count towards the circuit breaker.
    pub fn is_fatal_failure(&self) -> bool {
        matches!(&self.error, Some(kind) if kind.class() == ErrorClass::Fatal)
    }
}

// ============================================================================
// SkipReason
// ============================================================================

/// Why a market or intent was passed over. None of these are errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SkipReason {
    /// Ledger grants less than the minimum order value.
    BudgetExhausted,
    /// Relevant ladder is empty.
    InsufficientLiquidity,
    /// Crossed or otherwise unusable book.
    InvalidBook,
    /// Order book could not be fetched.
    BookUnavailable,
    /// Best price outside the configured bounds.
    PriceOutOfBounds,
    /// Planned cost below the minimum order value.
    BelowMinimumOrder,
    /// Spread narrower than the configured minimum.
    SpreadTooNarrow,
    /// Operator declined the intent.
    Declined,
}

impl SkipReason {
    pub fn label(&self) -> &'static str {
        match self {
            Self::BudgetExhausted => "budget_exhausted",
            Self::InsufficientLiquidity => "insufficient_liquidity",
            Self::InvalidBook => "invalid_book",
            Self::BookUnavailable => "book_unavailable",
            Self::PriceOutOfBounds => "price_out_of_bounds",
            Self::BelowMinimumOrder => "below_minimum_order",
            Self::SpreadTooNarrow => "spread_too_narrow",
            Self::Declined => "declined",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
