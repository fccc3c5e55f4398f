//! Price discovery by walking one ladder.
//!
//! BUY walks asks and SELL walks bids, best price first, taking whole levels
//! until the last one, which is taken partially. Every level price is moved to
//! the tick grid (up for BUY, down for SELL) before its cost is computed.

use flowbot_core::{
    MarketSpec, OrderBookSnapshot, OrderSide, Price, PriceBounds, Quote, Size, COST_DP, SIZE_DP,
};
use rust_decimal::Decimal;

use crate::error::{StrategyError, StrategyResult};

/// Amount a fill plan must reach.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillTarget {
    /// Quote-currency amount to spend (or receive).
    Notional(Decimal),
    /// Share count.
    Shares(Size),
}

/// Levels needed to reach a target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillPlan {
    pub side: OrderSide,
    /// Best first, prices tick-aligned. Only the last fill may be partial.
    pub fills: Vec<Quote>,
    pub total_size: Size,
    pub total_cost: Decimal,
    /// False when the ladder ran out before the target.
    pub complete: bool,
}

impl FillPlan {
    /// Best fill price.
    pub fn best_price(&self) -> Option<Price> {
        self.fills.first().map(|q| q.price)
    }

    /// Worst fill price; an IOC at this price sweeps every planned level.
    pub fn marginal_price(&self) -> Option<Price> {
        self.fills.last().map(|q| q.price)
    }
}

/// Tick size of the book when the venue reported one, else the market's.
pub fn effective_tick(book: &OrderBookSnapshot, spec: &MarketSpec) -> Price {
    book.tick_size().unwrap_or(spec.tick_size)
}

/// Move a level price onto the tick grid, never in the taker's favour.
pub(crate) fn align_price(price: Price, side: OrderSide, tick: Price) -> Price {
    match side {
        OrderSide::Buy => price.round_up_to_tick(tick),
        OrderSide::Sell => price.round_to_tick(tick),
    }
}

/// Walk the ladder consumed by `side` until `target` is reached.
///
/// Levels outside `bounds` end the walk. Fails with `InsufficientLiquidity`
/// when the ladder is empty and with `PriceOutOfBounds` when even the best
/// level is outside `bounds`.
pub fn discover_fill(
    book: &OrderBookSnapshot,
    side: OrderSide,
    target: FillTarget,
    spec: &MarketSpec,
    bounds: &PriceBounds,
) -> StrategyResult<FillPlan> {
    let ladder = book.ladder(side);
    if ladder.is_empty() {
        return Err(StrategyError::InsufficientLiquidity(format!(
            "no {side} liquidity for {}",
            book.token().short()
        )));
    }

    let tick = effective_tick(book, spec);
    let mut fills = Vec::new();
    let mut total_size = Size::ZERO;
    let mut total_cost = Decimal::ZERO;
    let mut complete = false;

    for level in ladder {
        let price = align_price(level.price, side, tick);
        if !bounds.contains(price) {
            if fills.is_empty() {
                return Err(StrategyError::PriceOutOfBounds(format!(
                    "best {side} price {price} outside [{}, {}]",
                    bounds.min, bounds.max
                )));
            }
            break;
        }

        let wanted = match target {
            FillTarget::Notional(notional) => {
                Size::for_notional(notional - total_cost, price).truncate_dp(SIZE_DP)
            }
            FillTarget::Shares(shares) => shares - total_size,
        };
        let take = wanted.min(level.size).round_to_lot(spec.lot_size);
        if !take.is_positive() {
            complete = true;
            break;
        }

        fills.push(Quote::new(price, take));
        total_size = total_size + take;
        total_cost += take.notional(price);

        if take < level.size || take == wanted {
            complete = true;
            break;
        }
    }

    Ok(FillPlan {
        side,
        fills,
        total_size,
        total_cost: total_cost.round_dp(COST_DP),
        complete,
    })
}
