//! Randomized trading parameters.
//!
//! Quantities are drawn uniformly on a cent grid and intervals on a
//! millisecond grid, both inclusive of the configured bounds, so no float
//! conversion touches a budget amount.

use std::time::Duration;

use flowbot_core::{OrderSide, TokenId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::config::{validate_probability, RangeConfig};
use crate::error::{StrategyError, StrategyResult};

/// Decimal places of a sampled quantity.
const QUANTITY_DP: u32 = 2;

/// Draws quantity, interval, side and market from configured distributions.
#[derive(Debug)]
pub struct DistributionSampler<R = StdRng> {
    rng: R,
}

impl DistributionSampler<StdRng> {
    /// Seeded sampler for reproducible sequences, entropy-seeded otherwise.
    pub fn from_seed(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { rng }
    }
}

impl<R: Rng> DistributionSampler<R> {
    pub fn new(rng: R) -> Self {
        Self { rng }
    }

    /// Uniform quantity in `[min, max]`, rounded to cents.
    pub fn sample_quantity(&mut self, range: &RangeConfig) -> StrategyResult<Decimal> {
        range.validate("quantity")?;
        let scale = Decimal::from(10u64.pow(QUANTITY_DP));
        let lo = to_steps((range.min * scale).ceil())?;
        let hi = to_steps((range.max * scale).floor())?;

        // No grid point inside a very narrow range
        if lo > hi {
            return Ok(range.min);
        }

        let steps = self.rng.gen_range(lo..=hi);
        let value = Decimal::new(steps, QUANTITY_DP);
        Ok(value.clamp(range.min, range.max))
    }

    /// Uniform wait in `[min, max]` seconds, at millisecond granularity.
    pub fn sample_interval(&mut self, range: &RangeConfig) -> StrategyResult<Duration> {
        range.validate("interval")?;
        let lo = to_steps((range.min * dec!(1000)).ceil())?;
        let hi = to_steps((range.max * dec!(1000)).floor())?;
        if lo > hi {
            return Ok(Duration::from_millis(lo.unsigned_abs()));
        }

        let millis = self.rng.gen_range(lo..=hi);
        Ok(Duration::from_millis(millis.unsigned_abs()))
    }

    /// Bernoulli trial: BUY with probability `p_buy`.
    pub fn sample_side(&mut self, p_buy: f64) -> StrategyResult<OrderSide> {
        validate_probability(p_buy)?;
        if self.rng.gen_bool(p_buy) {
            Ok(OrderSide::Buy)
        } else {
            Ok(OrderSide::Sell)
        }
    }

    /// Uniform choice over the pool.
    pub fn sample_market<'a>(&mut self, pool: &'a [TokenId]) -> StrategyResult<&'a TokenId> {
        if pool.is_empty() {
            return Err(StrategyError::Config("market pool is empty".to_string()));
        }
        let idx = self.rng.gen_range(0..pool.len());
        Ok(&pool[idx])
    }
}

fn to_steps(value: Decimal) -> StrategyResult<i64> {
    value
        .to_i64()
        .ok_or_else(|| StrategyError::Config(format!("range bound {value} is out of range")))
}
