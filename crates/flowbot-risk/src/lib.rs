//! Spend controls for flowbot.
//!
//! - BudgetLedger: Two-phase reserve/commit/rollback accounting against
//!   per-side, per-market and per-round caps
//! - CircuitBreaker: Stops the session after consecutive fatal execution failures

pub mod breaker;
pub mod error;
pub mod ledger;

pub use breaker::CircuitBreaker;
pub use error::{RiskError, RiskResult};
pub use ledger::{BudgetCaps, BudgetLedger, CommitOutcome, Reservation};
