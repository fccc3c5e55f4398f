//! Order-taking strategy for flowbot.
//!
//! Pure, synchronous building blocks used by the trading loop:
//! - DistributionSampler: Quantity, interval, side and market draws from an injectable RNG
//! - discover_fill: Walks one ladder best-first until a notional or share target is met
//! - RoundPlanner: Turns a snapshot and the remaining budget into validated trade intents,
//!   either as one sweeping order or as per-level orders across rounds

pub mod config;
pub mod discovery;
pub mod error;
pub mod planner;
pub mod sampler;

pub use config::{
    MultiRoundConfig, PlannerConfig, RangeConfig, SamplingConfig, ScoringMode, StrategyMode,
};
pub use discovery::{discover_fill, effective_tick, FillPlan, FillTarget};
pub use error::{StrategyError, StrategyResult};
pub use planner::{RoundPlan, RoundPlanner};
pub use sampler::DistributionSampler;
