//! Round planning: snapshot + remaining budget -> validated trade intents.
//!
//! Single-order mode collapses a fill plan into one IOC intent at the
//! marginal price. Multi-round mode emits one intent per eligible level and is
//! called once per round on a working book from which the previous round's
//! levels were removed.
//!
//! No intent below the minimum order value is ever emitted: a level too small
//! on its own is merged into the next eligible level, priced at the deeper
//! level, and dropped if no merge reaches the minimum.

use flowbot_core::{
    BookState, CoreError, IntentConstraints, MarketSpec, OrderBookSnapshot, OrderSide, Price,
    Size, SkipReason, TradeIntent, SIZE_DP,
};
use flowbot_risk::BudgetLedger;
use rust_decimal::Decimal;
use tracing::debug;

use crate::config::{MultiRoundConfig, PlannerConfig, ScoringMode, StrategyMode};
use crate::discovery::{align_price, discover_fill, effective_tick, FillTarget};
use crate::error::{StrategyError, StrategyResult};

const BUY_ONLY: &[OrderSide] = &[OrderSide::Buy];
const BOTH_SIDES: &[OrderSide] = &[OrderSide::Buy, OrderSide::Sell];

/// Intents planned for one round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundPlan {
    /// 1-based round number.
    pub round: u32,
    pub intents: Vec<TradeIntent>,
    pub total_cost: Decimal,
    /// Levels the intents consume, per side.
    pub consumed: Vec<(OrderSide, Price)>,
    /// Why nothing was planned for a side, if anything was skipped.
    pub skips: Vec<(OrderSide, SkipReason)>,
}

impl RoundPlan {
    fn empty(round: u32) -> Self {
        Self {
            round,
            intents: Vec::new(),
            total_cost: Decimal::ZERO,
            consumed: Vec::new(),
            skips: Vec::new(),
        }
    }

    fn skipped(round: u32, side: OrderSide, reason: SkipReason) -> Self {
        let mut plan = Self::empty(round);
        plan.skips.push((side, reason));
        plan
    }

    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }

    /// First skip reason, used when the whole plan is empty.
    pub fn skip_reason(&self) -> Option<SkipReason> {
        self.skips.first().map(|(_, reason)| *reason)
    }

    /// The working book for the next round: consumed levels removed.
    pub fn consume(&self, book: &OrderBookSnapshot) -> OrderBookSnapshot {
        let mut next = book.clone();
        for side in [OrderSide::Buy, OrderSide::Sell] {
            let prices: Vec<Price> = self
                .consumed
                .iter()
                .filter(|(s, _)| *s == side)
                .map(|(_, p)| *p)
                .collect();
            if !prices.is_empty() {
                next = next.without_prices(side, &prices);
            }
        }
        next
    }

    fn push(&mut self, intent: TradeIntent, levels: &[Price]) {
        self.total_cost += intent.cost();
        self.consumed
            .extend(levels.iter().map(|price| (intent.side(), *price)));
        self.intents.push(intent);
    }
}

/// Derives trade intents from a snapshot and the ledger's remaining budget.
#[derive(Debug, Clone)]
pub struct RoundPlanner {
    config: PlannerConfig,
    constraints: IntentConstraints,
}

impl RoundPlanner {
    pub fn new(config: PlannerConfig, min_order_value: Decimal) -> StrategyResult<Self> {
        config.validate()?;
        if min_order_value <= Decimal::ZERO {
            return Err(StrategyError::Config(format!(
                "min_order_value must be positive, got {min_order_value}"
            )));
        }
        let constraints = IntentConstraints {
            min_order_value,
            bounds: config.price_bounds,
        };
        Ok(Self {
            config,
            constraints,
        })
    }

    pub fn mode(&self) -> StrategyMode {
        self.config.strategy
    }

    pub fn multi_round(&self) -> &MultiRoundConfig {
        &self.config.multi_round
    }

    pub fn constraints(&self) -> &IntentConstraints {
        &self.constraints
    }

    /// Side actually traded given a sampled side.
    pub fn resolve_side(&self, sampled: OrderSide) -> OrderSide {
        if self.config.buy_only {
            OrderSide::Buy
        } else {
            sampled
        }
    }

    /// Sides traded in a multi-round session, BUY first.
    pub fn sides(&self) -> &'static [OrderSide] {
        if self.config.buy_only {
            BUY_ONLY
        } else {
            BOTH_SIDES
        }
    }

    // ========================================================================
    // Single-order mode
    // ========================================================================

    /// One IOC intent sized by `quantity` and capped by the remaining budget.
    ///
    /// BUY quantities are notional, SELL quantities are shares. The intent is
    /// priced at the marginal fill price so one order sweeps every level the
    /// fill plan needs.
    pub fn plan_single(
        &self,
        book: &OrderBookSnapshot,
        spec: &MarketSpec,
        side: OrderSide,
        quantity: Decimal,
        ledger: &BudgetLedger,
    ) -> StrategyResult<RoundPlan> {
        let round = 1;
        if let Some(reason) = book_skip(book.state(), side) {
            return Ok(RoundPlan::skipped(round, side, reason));
        }

        let budget = ledger.remaining(book.token(), side);
        if budget < self.constraints.min_order_value {
            return Ok(RoundPlan::skipped(round, side, SkipReason::BudgetExhausted));
        }

        let target = match side {
            OrderSide::Buy => FillTarget::Notional(quantity.min(budget)),
            OrderSide::Sell => FillTarget::Shares(Size::new(quantity)),
        };
        let fill = match discover_fill(book, side, target, spec, &self.constraints.bounds) {
            Ok(fill) => fill,
            Err(e) => return skip_from_discovery(round, side, e),
        };
        let Some(price) = fill.marginal_price() else {
            return Ok(RoundPlan::skipped(round, side, SkipReason::BelowMinimumOrder));
        };

        // The sweep is priced at the marginal level, so cap notional again at that price
        let notional_cap = match side {
            OrderSide::Buy => quantity.min(budget),
            OrderSide::Sell => budget,
        };
        let affordable = Size::for_notional(notional_cap, price).truncate_dp(SIZE_DP);
        let size = fill.total_size.min(affordable).round_to_lot(spec.lot_size);
        let levels: Vec<Price> = book
            .ladder(side)
            .iter()
            .take(fill.fills.len())
            .map(|q| q.price)
            .collect();

        let mut plan = RoundPlan::empty(round);
        match self.intent(book, side, price, size, round) {
            Ok(intent) => {
                debug!(
                    token = %book.token().short(),
                    %side,
                    %price,
                    %size,
                    cost = %intent.cost(),
                    levels = levels.len(),
                    "Planned single order"
                );
                plan.push(intent, &levels);
            }
            Err(reason) => plan.skips.push((side, reason)),
        }
        Ok(plan)
    }

    // ========================================================================
    // Multi-round mode
    // ========================================================================

    /// Intents for one round of a multi-round session.
    ///
    /// The caller starts the ledger round before planning; the ledger's
    /// remaining budget therefore already includes the per-round cap.
    pub fn plan_round(
        &self,
        book: &OrderBookSnapshot,
        spec: &MarketSpec,
        round: u32,
        ledger: &BudgetLedger,
    ) -> StrategyResult<RoundPlan> {
        let settings = &self.config.multi_round;
        let state = book.state();

        // Threshold scoring measures distance in spreads
        if settings.scoring == ScoringMode::Threshold && !state.is_valid() {
            let reason = match state {
                BookState::Crossed => SkipReason::InvalidBook,
                _ => SkipReason::InsufficientLiquidity,
            };
            return Ok(RoundPlan::skipped(round, OrderSide::Buy, reason));
        }
        if let Some(spread) = book.spread() {
            if spread < settings.min_spread {
                return Ok(RoundPlan::skipped(round, OrderSide::Buy, SkipReason::SpreadTooNarrow));
            }
        }

        let mut plan = RoundPlan::empty(round);
        for &side in self.sides() {
            if let Some(reason) = book_skip(state, side) {
                plan.skips.push((side, reason));
                continue;
            }
            let planned: Vec<(OrderSide, Decimal)> =
                plan.intents.iter().map(|i| (i.side(), i.cost())).collect();
            let budget = ledger.remaining_after(book.token(), side, &planned);
            if budget < self.constraints.min_order_value {
                plan.skips.push((side, SkipReason::BudgetExhausted));
                continue;
            }
            let before = plan.intents.len();
            self.plan_side(book, spec, side, round, budget, &mut plan);
            if plan.intents.len() == before && !plan.skips.iter().any(|(s, _)| *s == side) {
                plan.skips.push((side, SkipReason::BelowMinimumOrder));
            }
        }

        debug!(
            token = %book.token().short(),
            round,
            intents = plan.intents.len(),
            total_cost = %plan.total_cost,
            "Planned round"
        );
        Ok(plan)
    }

    fn plan_side(
        &self,
        book: &OrderBookSnapshot,
        spec: &MarketSpec,
        side: OrderSide,
        round: u32,
        mut budget: Decimal,
        plan: &mut RoundPlan,
    ) {
        let ladder = book.ladder(side);
        let tick = effective_tick(book, spec);
        let band = self.eligible_band(book);
        let min = self.constraints.min_order_value;

        let Some(best) = ladder.first().map(|q| align_price(q.price, side, tick)) else {
            plan.skips.push((side, SkipReason::InsufficientLiquidity));
            return;
        };
        if !self.constraints.bounds.contains(best) {
            plan.skips.push((side, SkipReason::PriceOutOfBounds));
            return;
        }

        // Shares carried from levels too small to trade on their own
        let mut carried = Size::ZERO;
        let mut carried_levels: Vec<Price> = Vec::new();

        for level in ladder {
            if budget < min {
                break;
            }
            let price = align_price(level.price, side, tick);
            if !self.constraints.bounds.contains(price) {
                break;
            }
            if let Some(band) = band {
                if price.distance(best) > band {
                    break;
                }
            }

            let room = Size::for_notional(budget, price).truncate_dp(SIZE_DP) - carried;
            if !room.is_positive() {
                break;
            }
            let take = level.size.min(room).round_to_lot(spec.lot_size);
            if !take.is_positive() {
                break;
            }

            carried = carried + take;
            carried_levels.push(level.price);

            if carried.notional(price) < min {
                continue;
            }
            match self.intent(book, side, price, carried, round) {
                Ok(intent) => {
                    budget -= intent.cost();
                    plan.push(intent, &carried_levels);
                }
                Err(reason) => {
                    plan.skips.push((side, reason));
                    break;
                }
            }
            carried = Size::ZERO;
            carried_levels.clear();
        }
    }

    /// Maximum distance from the touch a level may have, `None` when unbounded.
    fn eligible_band(&self, book: &OrderBookSnapshot) -> Option<Decimal> {
        let settings = &self.config.multi_round;
        match settings.scoring {
            ScoringMode::Greedy => None,
            ScoringMode::Threshold => book.spread().map(|s| s * settings.threshold_fraction),
        }
    }

    fn intent(
        &self,
        book: &OrderBookSnapshot,
        side: OrderSide,
        price: Price,
        size: Size,
        round: u32,
    ) -> Result<TradeIntent, SkipReason> {
        TradeIntent::new(
            book.token().clone(),
            side,
            price,
            size,
            round,
            &self.constraints,
        )
        .map_err(|e| match e {
            CoreError::PriceOutOfBounds { .. } => SkipReason::PriceOutOfBounds,
            _ => SkipReason::BelowMinimumOrder,
        })
    }
}

fn book_skip(state: BookState, side: OrderSide) -> Option<SkipReason> {
    if state.allows(side) {
        return None;
    }
    match state {
        BookState::Crossed => Some(SkipReason::InvalidBook),
        _ => Some(SkipReason::InsufficientLiquidity),
    }
}

fn skip_from_discovery(
    round: u32,
    side: OrderSide,
    err: StrategyError,
) -> StrategyResult<RoundPlan> {
    match err {
        StrategyError::InsufficientLiquidity(_) => Ok(RoundPlan::skipped(
            round,
            side,
            SkipReason::InsufficientLiquidity,
        )),
        StrategyError::PriceOutOfBounds(_) => Ok(RoundPlan::skipped(
            round,
            side,
            SkipReason::PriceOutOfBounds,
        )),
        other => Err(other),
    }
}
