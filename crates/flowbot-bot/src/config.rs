//! Application configuration.

use std::time::Duration;

use crate::error::{AppError, AppResult};
use flowbot_core::MarketSpec;
use flowbot_executor::{EngineConfig, RetryPolicy};
use flowbot_risk::BudgetCaps;
use flowbot_strategy::{PlannerConfig, SamplingConfig};
use serde::{Deserialize, Serialize};

/// Venue endpoints and HTTP settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    /// Market directory root.
    #[serde(default = "default_gamma_url")]
    pub gamma_url: String,
    /// CLOB REST root, used for `/book`.
    #[serde(default = "default_clob_url")]
    pub clob_url: String,
    /// Order relay endpoint. Required unless running dry.
    #[serde(default)]
    pub order_url: Option<String>,
    /// Environment variable holding the relay bearer token.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,
    /// Markets requested from the directory when no token pool is given.
    #[serde(default = "default_directory_limit")]
    pub directory_limit: u32,
    /// Require canonical-length token ids from the directory.
    #[serde(default = "default_strict_token_ids")]
    pub strict_token_ids: bool,
}

fn default_gamma_url() -> String {
    "https://gamma-api.polymarket.com".to_string()
}

fn default_clob_url() -> String {
    "https://clob.polymarket.com".to_string()
}

fn default_api_key_env() -> String {
    "FLOWBOT_RELAY_API_KEY".to_string()
}

fn default_http_timeout_ms() -> u64 {
    10_000
}

fn default_directory_limit() -> u32 {
    100
}

fn default_strict_token_ids() -> bool {
    true
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            gamma_url: default_gamma_url(),
            clob_url: default_clob_url(),
            order_url: None,
            api_key_env: default_api_key_env(),
            http_timeout_ms: default_http_timeout_ms(),
            directory_limit: default_directory_limit(),
            strict_token_ids: default_strict_token_ids(),
        }
    }
}

impl VenueConfig {
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    /// Relay bearer token from the environment, if set.
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

/// Application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Record intents instead of sending them.
    #[serde(default)]
    pub dry_run: bool,
    /// Ask on the console before every intent.
    #[serde(default)]
    pub manual_approval: bool,
    /// Token pool. Empty means discover from the directory.
    #[serde(default)]
    pub markets: Vec<String>,
    /// Stop after this many iterations (unset = until ctrl-c).
    #[serde(default)]
    pub iterations: Option<u64>,
    /// Write a Prometheus text snapshot here when the session ends.
    #[serde(default)]
    pub metrics_file: Option<String>,
    #[serde(default = "default_market_attempts")]
    pub market_attempts: u32,
    /// Consecutive fatal failures that stop the session (0 = never).
    #[serde(default)]
    pub max_consecutive_fatal: u32,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub planner: PlannerConfig,
    #[serde(default)]
    pub caps: BudgetCaps,
    #[serde(default)]
    pub retry: RetryPolicy,
    /// Fallback tick and lot size.
    #[serde(default)]
    pub market: MarketSpec,
    #[serde(default)]
    pub venue: VenueConfig,
}

fn default_market_attempts() -> u32 {
    5
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            manual_approval: false,
            markets: Vec::new(),
            iterations: None,
            metrics_file: None,
            market_attempts: default_market_attempts(),
            max_consecutive_fatal: 0,
            sampling: SamplingConfig::default(),
            planner: PlannerConfig::default(),
            caps: BudgetCaps::default(),
            retry: RetryPolicy::default(),
            market: MarketSpec::default(),
            venue: VenueConfig::default(),
        }
    }
}

/// Command-line overrides applied on top of the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub iterations: Option<u64>,
    pub dry_run: bool,
    pub buy_only: bool,
    pub manual_approval: bool,
    pub seed: Option<u64>,
}

impl AppConfig {
    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config: {e}")))?;

        toml::from_str(&content).map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))
    }

    /// Flags only ever switch features on; values replace the file's.
    pub fn apply(&mut self, overrides: &Overrides) {
        if overrides.iterations.is_some() {
            self.iterations = overrides.iterations;
        }
        if overrides.seed.is_some() {
            self.sampling.seed = overrides.seed;
        }
        self.dry_run |= overrides.dry_run;
        self.planner.buy_only |= overrides.buy_only;
        self.manual_approval |= overrides.manual_approval;
    }

    /// Configuration handed to the trading loop.
    pub fn engine(&self) -> EngineConfig {
        EngineConfig {
            sampling: self.sampling.clone(),
            planner: self.planner.clone(),
            caps: self.caps.clone(),
            retry: self.retry.clone(),
            market_attempts: self.market_attempts,
            max_consecutive_fatal: self.max_consecutive_fatal,
            book_timeout_ms: self.venue.http_timeout_ms,
            market: self.market,
        }
    }

    pub fn validate(&self) -> AppResult<()> {
        self.engine()
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))?;

        if !self.dry_run && self.venue.order_url.is_none() {
            return Err(AppError::Config(
                "venue.order_url is required unless dry_run is set".to_string(),
            ));
        }
        if self.venue.http_timeout_ms == 0 {
            return Err(AppError::Config(
                "venue.http_timeout_ms must be positive".to_string(),
            ));
        }
        if self.iterations == Some(0) {
            return Err(AppError::Config(
                "iterations must be at least 1 when set".to_string(),
            ));
        }
        Ok(())
    }
}
