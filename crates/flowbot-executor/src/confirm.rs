//! Operator approval of individual intents.

use flowbot_core::TradeIntent;

/// Approves or declines an intent before anything is reserved.
///
/// Called synchronously from the trading loop; a declined intent costs no
/// budget and does not count as a failure.
#[cfg_attr(test, mockall::automock)]
pub trait Confirmation: Send + Sync {
    fn confirm(&self, intent: &TradeIntent) -> bool;
}

/// Approves everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutoApprove;

impl Confirmation for AutoApprove {
    fn confirm(&self, _intent: &TradeIntent) -> bool {
        true
    }
}
