//! Trading engine configuration.

use std::time::Duration;

use flowbot_core::MarketSpec;
use flowbot_risk::BudgetCaps;
use flowbot_strategy::{PlannerConfig, SamplingConfig};
use serde::{Deserialize, Serialize};

use crate::error::{ExecutorError, ExecutorResult};
use crate::retry::RetryPolicy;

/// Everything the trading loop needs besides its ports.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub caps: BudgetCaps,
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Markets tried per iteration before giving up on it.
    #[serde(default = "default_market_attempts")]
    pub market_attempts: u32,
    /// Consecutive fatal failures that stop the session (0 = never).
    #[serde(default)]
    pub max_consecutive_fatal: u32,
    #[serde(default = "default_book_timeout_ms")]
    pub book_timeout_ms: u64,
    /// Tick and lot size used when the book carries none.
    #[serde(default)]
    pub market: MarketSpec,
}

fn default_market_attempts() -> u32 {
    5
}

fn default_book_timeout_ms() -> u64 {
    10_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sampling: SamplingConfig::default(),
            planner: PlannerConfig::default(),
            caps: BudgetCaps::default(),
            retry: RetryPolicy::default(),
            market_attempts: default_market_attempts(),
            max_consecutive_fatal: 0,
            book_timeout_ms: default_book_timeout_ms(),
            market: MarketSpec::default(),
        }
    }
}

impl EngineConfig {
    pub fn book_timeout(&self) -> Duration {
        Duration::from_millis(self.book_timeout_ms)
    }

    /// Validate every section; the engine does not start on error.
    pub fn validate(&self) -> ExecutorResult<()> {
        self.sampling.validate()?;
        self.planner.validate()?;
        self.caps.validate()?;
        self.retry.validate()?;
        self.market
            .validate()
            .map_err(|e| ExecutorError::Config(e.to_string()))?;
        if self.market_attempts == 0 {
            return Err(ExecutorError::Config(
                "market_attempts must be at least 1".to_string(),
            ));
        }
        if self.book_timeout_ms == 0 {
            return Err(ExecutorError::Config(
                "book_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
