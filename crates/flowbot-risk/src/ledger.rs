//! Budget ledger with two-phase spend accounting.
//!
//! Spend is reserved before an intent is submitted and then either committed
//! (the venue confirmed a fill) or rolled back (anything else). A `Reservation`
//! is not `Clone` and both `commit` and `rollback` take it by value, so every
//! reservation resolves exactly once.
//!
//! Three cap classes apply simultaneously:
//! - per side: spend on one (token, side)
//! - per market: spend on both sides of one token
//! - per round: spend across all tokens since the last `begin_round`

use std::collections::HashMap;

use flowbot_core::{ClientOrderId, OrderSide, RecentIds, TokenId};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{RiskError, RiskResult};

// ============================================================================
// BudgetCaps
// ============================================================================

/// Spend caps. An unset cap does not constrain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BudgetCaps {
    /// Maximum spend on one side of one market.
    #[serde(default = "default_max_spend_per_side")]
    pub max_spend_per_side: Option<Decimal>,
    /// Maximum spend across both sides of one market.
    #[serde(default = "default_max_spend_per_market")]
    pub max_spend_per_market: Option<Decimal>,
    /// Total budget for one market in multi-round sessions.
    #[serde(default)]
    pub market_budget: Option<Decimal>,
    /// Maximum spend in one planning round.
    #[serde(default)]
    pub round_cap: Option<Decimal>,
    /// Smallest order cost the venue accepts.
    #[serde(default = "default_min_order_value")]
    pub min_order_value: Decimal,
}

fn default_max_spend_per_side() -> Option<Decimal> {
    Some(dec!(2.0))
}

fn default_max_spend_per_market() -> Option<Decimal> {
    Some(dec!(5.0))
}

fn default_min_order_value() -> Decimal {
    dec!(1.0)
}

impl Default for BudgetCaps {
    fn default() -> Self {
        Self {
            max_spend_per_side: default_max_spend_per_side(),
            max_spend_per_market: default_max_spend_per_market(),
            market_budget: None,
            round_cap: None,
            min_order_value: default_min_order_value(),
        }
    }
}

impl BudgetCaps {
    /// Caps with nothing but a minimum order value.
    pub fn unlimited(min_order_value: Decimal) -> Self {
        Self {
            max_spend_per_side: None,
            max_spend_per_market: None,
            market_budget: None,
            round_cap: None,
            min_order_value,
        }
    }

    /// Effective per-market cap: the tighter of `max_spend_per_market` and
    /// `market_budget`.
    pub fn per_market(&self) -> Option<Decimal> {
        match (self.max_spend_per_market, self.market_budget) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn validate(&self) -> RiskResult<()> {
        if self.min_order_value <= Decimal::ZERO {
            return Err(RiskError::Config(format!(
                "min_order_value must be positive, got {}",
                self.min_order_value
            )));
        }
        let caps = [
            ("max_spend_per_side", self.max_spend_per_side),
            ("max_spend_per_market", self.max_spend_per_market),
            ("market_budget", self.market_budget),
            ("round_cap", self.round_cap),
        ];
        for (name, cap) in caps {
            if let Some(value) = cap {
                if value <= Decimal::ZERO {
                    return Err(RiskError::Config(format!(
                        "{name} must be positive, got {value}"
                    )));
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Reservation
// ============================================================================

/// Budget held for one intent until it is committed or rolled back.
#[derive(Debug)]
#[must_use = "a reservation must be committed or rolled back"]
pub struct Reservation {
    token: TokenId,
    side: OrderSide,
    amount: Decimal,
}

impl Reservation {
    pub fn token(&self) -> &TokenId {
        &self.token
    }

    pub fn side(&self) -> OrderSide {
        self.side
    }

    /// Granted amount.
    pub fn amount(&self) -> Decimal {
        self.amount
    }
}

/// Result of a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommitOutcome {
    /// Spend recorded.
    Committed(Decimal),
    /// The intent was already committed; no spend added.
    AlreadyCommitted,
}

// ============================================================================
// BudgetLedger
// ============================================================================

type Key = (TokenId, OrderSide);

/// Session-scoped spend ledger. Owned by a single trading loop.
#[derive(Debug)]
pub struct BudgetLedger {
    caps: BudgetCaps,
    spent: HashMap<Key, Decimal>,
    reserved: HashMap<Key, Decimal>,
    round_spent: Decimal,
    round_reserved: Decimal,
    committed: RecentIds,
}

impl BudgetLedger {
    pub fn new(caps: BudgetCaps) -> Self {
        Self {
            caps,
            spent: HashMap::new(),
            reserved: HashMap::new(),
            round_spent: Decimal::ZERO,
            round_reserved: Decimal::ZERO,
            committed: RecentIds::default(),
        }
    }

    pub fn caps(&self) -> &BudgetCaps {
        &self.caps
    }

    pub fn min_order_value(&self) -> Decimal {
        self.caps.min_order_value
    }

    /// Committed spend on one side of a market.
    pub fn spent(&self, token: &TokenId, side: OrderSide) -> Decimal {
        self.spent
            .get(&(token.clone(), side))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    /// Committed spend on both sides of a market.
    pub fn market_spent(&self, token: &TokenId) -> Decimal {
        self.spent(token, OrderSide::Buy) + self.spent(token, OrderSide::Sell)
    }

    /// Committed spend across every market.
    pub fn total_spent(&self) -> Decimal {
        self.spent.values().copied().sum()
    }

    pub fn round_spent(&self) -> Decimal {
        self.round_spent
    }

    /// Sum of reservations not yet resolved.
    pub fn outstanding(&self) -> Decimal {
        self.reserved.values().copied().sum()
    }

    pub fn is_committed(&self, id: &ClientOrderId) -> bool {
        self.committed.contains(id)
    }

    /// Remaining budget for one (market, side) under every applicable cap.
    ///
    /// Reservations count as used. Returns `Decimal::MAX` when no cap applies.
    pub fn remaining(&self, token: &TokenId, side: OrderSide) -> Decimal {
        self.remaining_after(token, side, &[])
    }

    /// Remaining budget as if `planned` spend on this market were already reserved.
    pub fn remaining_after(
        &self,
        token: &TokenId,
        side: OrderSide,
        planned: &[(OrderSide, Decimal)],
    ) -> Decimal {
        let planned_side: Decimal = planned
            .iter()
            .filter(|(s, _)| *s == side)
            .map(|(_, amount)| *amount)
            .sum();
        let planned_all: Decimal = planned.iter().map(|(_, amount)| *amount).sum();

        let used_side = self.used(token, side) + planned_side;
        let used_market =
            self.used(token, side) + self.used(token, side.opposite()) + planned_all;
        let used_round = self.round_spent + self.round_reserved + planned_all;

        [
            self.caps.max_spend_per_side.map(|cap| cap - used_side),
            self.caps.per_market().map(|cap| cap - used_market),
            self.caps.round_cap.map(|cap| cap - used_round),
        ]
        .into_iter()
        .flatten()
        .min()
        .map(|left| left.max(Decimal::ZERO))
        .unwrap_or(Decimal::MAX)
    }

    /// Reserve up to `proposed` for one (market, side).
    ///
    /// The grant is capped by every remaining cap. Returns `None` when the grant
    /// would be below the minimum order value; nothing is held in that case.
    pub fn reserve(
        &mut self,
        token: &TokenId,
        side: OrderSide,
        proposed: Decimal,
    ) -> Option<Reservation> {
        let granted = proposed.min(self.remaining(token, side));
        if granted <= Decimal::ZERO || granted < self.caps.min_order_value {
            debug!(
                token = %token.short(),
                %side,
                %proposed,
                %granted,
                min = %self.caps.min_order_value,
                "Budget exhausted"
            );
            return None;
        }

        *self
            .reserved
            .entry((token.clone(), side))
            .or_insert(Decimal::ZERO) += granted;
        self.round_reserved += granted;

        debug!(token = %token.short(), %side, %granted, "Budget reserved");
        Some(Reservation {
            token: token.clone(),
            side,
            amount: granted,
        })
    }

    /// Record the reservation as spend for `intent_id`.
    ///
    /// Only called after the gateway confirmed a fill. An id that was
    /// already committed releases the reservation and adds nothing.
    pub fn commit(&mut self, reservation: Reservation, intent_id: &ClientOrderId) -> CommitOutcome {
        self.release(&reservation);

        if !self.committed.insert(intent_id.clone()) {
            warn!(%intent_id, "Intent already committed, spend not recorded twice");
            return CommitOutcome::AlreadyCommitted;
        }

        let Reservation {
            token,
            side,
            amount,
        } = reservation;
        *self.spent.entry((token, side)).or_insert(Decimal::ZERO) += amount;
        self.round_spent += amount;
        CommitOutcome::Committed(amount)
    }

    /// Release a reservation that was never committed.
    pub fn rollback(&mut self, reservation: Reservation) {
        self.release(&reservation);
        debug!(
            token = %reservation.token.short(),
            side = %reservation.side,
            amount = %reservation.amount,
            "Budget reservation rolled back"
        );
    }

    /// Start a new planning round; the per-round counter restarts at zero.
    pub fn begin_round(&mut self) {
        self.round_spent = Decimal::ZERO;
    }

    fn used(&self, token: &TokenId, side: OrderSide) -> Decimal {
        let key = (token.clone(), side);
        let spent = self.spent.get(&key).copied().unwrap_or(Decimal::ZERO);
        let reserved = self.reserved.get(&key).copied().unwrap_or(Decimal::ZERO);
        spent + reserved
    }

    fn release(&mut self, reservation: &Reservation) {
        let key = (reservation.token.clone(), reservation.side);
        if let Some(held) = self.reserved.get_mut(&key) {
            *held -= reservation.amount;
            if held.is_zero() {
                self.reserved.remove(&key);
            }
        }
        self.round_reserved -= reservation.amount;
    }
}
