//! Application wiring.

use std::sync::Arc;

use flowbot_core::{OrderBookSource, TokenId};
use flowbot_executor::{RelayConfig, RelayGateway, SessionStats, TradingLoop};
use flowbot_registry::{parse_token_list, BookClient, DirectoryClient};
use flowbot_telemetry::Metrics;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::confirm::ConsoleConfirmer;
use crate::error::{AppError, AppResult};

/// Token pool for the session.
///
/// An explicit list (CLI or environment) wins over `markets` in the config
/// file; with neither, tradable markets are loaded from the directory.
/// Duplicates are dropped, first occurrence kept.
pub async fn resolve_pool(explicit: Option<&str>, config: &AppConfig) -> AppResult<Vec<TokenId>> {
    let (pool, source) = match explicit.filter(|list| !list.trim().is_empty()) {
        Some(list) => (parse_token_list(list)?, "explicit"),
        None if !config.markets.is_empty() => (parse_token_list(&config.markets.join(","))?, "config"),
        None => {
            let directory =
                DirectoryClient::new(&config.venue.gamma_url, Some(config.venue.http_timeout()))?;
            let pool = directory
                .fetch_tradable_tokens(config.venue.directory_limit, config.venue.strict_token_ids)
                .await?;
            (pool, "directory")
        }
    };

    if pool.is_empty() {
        return Err(AppError::Config(format!(
            "no tradable markets found ({source})"
        )));
    }
    info!(markets = pool.len(), source, "Token pool resolved");
    Ok(pool)
}

/// Main application.
pub struct Application {
    config: AppConfig,
    pool: Vec<TokenId>,
    cancel: CancellationToken,
}

impl Application {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            pool: Vec::new(),
            cancel: CancellationToken::new(),
        })
    }

    /// Resolve the token pool; must run before [`Application::run`].
    pub async fn load_pool(&mut self, explicit: Option<&str>) -> AppResult<()> {
        self.pool = resolve_pool(explicit, &self.config).await?;
        Ok(())
    }

    pub fn pool(&self) -> &[TokenId] {
        &self.pool
    }

    /// Cancelling stops the session after the current intent resolves.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run until cancelled, the iteration limit, or the circuit breaker.
    pub async fn run(self) -> AppResult<SessionStats> {
        if self.pool.is_empty() {
            return Err(AppError::Config(
                "Token pool not loaded. Call load_pool() first.".to_string(),
            ));
        }

        let timeout = self.config.venue.http_timeout();
        let books: Arc<dyn OrderBookSource> =
            Arc::new(BookClient::new(&self.config.venue.clob_url, Some(timeout))?);
        let engine_config = self.config.engine();

        let (engine, dry_run) = if self.config.dry_run {
            info!("Dry run: intents are recorded, nothing is sent");
            let (engine, gateway) = TradingLoop::dry_run(engine_config, books, self.cancel.clone())?;
            (engine, Some(gateway))
        } else {
            let order_url = self.config.venue.order_url.clone().ok_or_else(|| {
                AppError::Config("venue.order_url is required for live trading".to_string())
            })?;
            let api_key = self.config.venue.api_key();
            if api_key.is_none() {
                warn!(env = %self.config.venue.api_key_env, "Relay API key not set");
            }
            let gateway = RelayGateway::new(RelayConfig {
                order_url,
                api_key,
                timeout,
            })?;
            let engine = TradingLoop::new(engine_config, books, Arc::new(gateway), self.cancel.clone())?;
            (engine, None)
        };

        let mut engine = if self.config.manual_approval {
            info!("Manual approval enabled");
            engine.with_confirmation(Arc::new(ConsoleConfirmer::stdin(self.cancel.clone())))
        } else {
            engine
        };

        let signal = spawn_signal_watcher(self.cancel.clone());
        let result = engine.run(&self.pool, self.config.iterations).await;
        signal.abort();

        let stats = result?;
        if let Some(gateway) = dry_run {
            info!(recorded = gateway.submission_count(), "Dry run complete");
        }
        if let Some(path) = &self.config.metrics_file {
            std::fs::write(path, Metrics::render()?)?;
            info!(path = %path, "Metrics snapshot written");
        }
        Ok(stats)
    }
}

/// Cancel `cancel` on ctrl-c.
fn spawn_signal_watcher(cancel: CancellationToken) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                match result {
                    Ok(()) => {
                        info!("Shutdown signal received");
                        cancel.cancel();
                    }
                    Err(e) => warn!(error = %e, "Failed to listen for ctrl-c"),
                }
            }
            _ = cancel.cancelled() => {}
        }
    })
}
