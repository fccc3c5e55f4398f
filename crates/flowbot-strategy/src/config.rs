//! Strategy configuration.

use flowbot_core::PriceBounds;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{StrategyError, StrategyResult};

/// Inclusive `[min, max]` range for a sampled value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeConfig {
    pub min: Decimal,
    pub max: Decimal,
}

impl RangeConfig {
    pub fn new(min: Decimal, max: Decimal) -> Self {
        Self { min, max }
    }

    /// Require `0 < min <= max`.
    pub fn validate(&self, name: &str) -> StrategyResult<()> {
        if self.min <= Decimal::ZERO || self.max <= Decimal::ZERO {
            return Err(StrategyError::Config(format!(
                "{name} bounds must be positive, got [{}, {}]",
                self.min, self.max
            )));
        }
        if self.min > self.max {
            return Err(StrategyError::Config(format!(
                "{name} min {} exceeds max {}",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Distributions the sampler draws from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Order quantity: notional for BUY, shares for SELL.
    #[serde(default = "default_quantity")]
    pub quantity: RangeConfig,
    /// Seconds to wait between iterations.
    #[serde(default = "default_interval")]
    pub interval: RangeConfig,
    /// Probability that an iteration buys.
    #[serde(default = "default_p_buy")]
    pub p_buy: f64,
    /// Fixed RNG seed for reproducible sessions.
    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_quantity() -> RangeConfig {
    RangeConfig::new(dec!(1.0), dec!(10.0))
}

fn default_interval() -> RangeConfig {
    RangeConfig::new(dec!(3), dec!(15))
}

fn default_p_buy() -> f64 {
    0.5
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            quantity: default_quantity(),
            interval: default_interval(),
            p_buy: default_p_buy(),
            seed: None,
        }
    }
}

impl SamplingConfig {
    pub fn validate(&self) -> StrategyResult<()> {
        self.quantity.validate("quantity")?;
        self.interval.validate("interval")?;
        validate_probability(self.p_buy)
    }
}

pub(crate) fn validate_probability(p: f64) -> StrategyResult<()> {
    if !p.is_finite() || !(0.0..=1.0).contains(&p) {
        return Err(StrategyError::Config(format!(
            "p_buy must be within [0, 1], got {p}"
        )));
    }
    Ok(())
}

/// Planning strategy.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StrategyMode {
    /// One sweeping intent per iteration.
    #[default]
    Single,
    /// Per-level intents over several budget-bounded rounds.
    MultiRound,
}

/// Which ladder levels a multi-round session may take.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ScoringMode {
    /// Only levels within `threshold_fraction` of the spread beyond the touch.
    #[default]
    Threshold,
    /// Every level, best first.
    Greedy,
}

/// Multi-round configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MultiRoundConfig {
    #[serde(default)]
    pub scoring: ScoringMode,
    /// Fraction of the spread beyond the touch that is eligible in threshold mode.
    #[serde(default = "default_threshold_fraction")]
    pub threshold_fraction: Decimal,
    /// Upper bound on rounds per market per iteration.
    #[serde(default = "default_max_rounds")]
    pub max_rounds: u32,
    /// Markets with a tighter spread are left alone.
    #[serde(default = "default_min_spread")]
    pub min_spread: Decimal,
    /// Fetch a fresh book between rounds instead of removing consumed levels.
    #[serde(default)]
    pub refetch_between_rounds: bool,
}

fn default_threshold_fraction() -> Decimal {
    dec!(0.25)
}

fn default_max_rounds() -> u32 {
    10
}

fn default_min_spread() -> Decimal {
    dec!(0.01)
}

impl Default for MultiRoundConfig {
    fn default() -> Self {
        Self {
            scoring: ScoringMode::default(),
            threshold_fraction: default_threshold_fraction(),
            max_rounds: default_max_rounds(),
            min_spread: default_min_spread(),
            refetch_between_rounds: false,
        }
    }
}

impl MultiRoundConfig {
    pub fn validate(&self) -> StrategyResult<()> {
        if self.threshold_fraction < Decimal::ZERO || self.threshold_fraction > Decimal::ONE {
            return Err(StrategyError::Config(format!(
                "threshold_fraction must be within [0, 1], got {}",
                self.threshold_fraction
            )));
        }
        if self.max_rounds == 0 {
            return Err(StrategyError::Config(
                "max_rounds must be at least 1".to_string(),
            ));
        }
        if self.min_spread < Decimal::ZERO {
            return Err(StrategyError::Config(format!(
                "min_spread must not be negative, got {}",
                self.min_spread
            )));
        }
        Ok(())
    }
}

/// Round planner configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlannerConfig {
    #[serde(default)]
    pub strategy: StrategyMode,
    /// Never sell.
    #[serde(default)]
    pub buy_only: bool,
    #[serde(default)]
    pub price_bounds: PriceBounds,
    #[serde(default)]
    pub multi_round: MultiRoundConfig,
}

impl PlannerConfig {
    pub fn validate(&self) -> StrategyResult<()> {
        self.price_bounds.validate()?;
        self.multi_round.validate()
    }
}
