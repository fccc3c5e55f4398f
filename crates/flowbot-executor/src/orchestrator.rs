//! Trading loop orchestrator.
//!
//! State machine: `Idle -> Sampling -> Planning -> Executing -> Waiting ->
//! Sampling ...`, and any state -> `Stopped` on cancellation, iteration limit
//! or circuit breaker.
//!
//! The loop is strictly sequential. The ledger is owned here and only one
//! intent holds a reservation at any time; every reservation is committed or
//! rolled back before the next intent starts.

use std::sync::Arc;

use flowbot_core::{
    CoreError, OrderBookSnapshot, OrderBookSource, OrderSide, SkipReason, TokenId, TradeIntent,
};
use flowbot_risk::{BudgetLedger, CircuitBreaker, CommitOutcome};
use flowbot_strategy::{DistributionSampler, RoundPlan, RoundPlanner, StrategyMode};
use flowbot_telemetry::Metrics;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::confirm::Confirmation;
use crate::error::{ExecutorError, ExecutorResult};
use crate::gateway::{DryRunGateway, DynGateway};
use crate::retry::RetryController;
use crate::stats::{SessionStats, StopReason};

/// Trading loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Sampling,
    Planning,
    Executing,
    Waiting,
    Stopped(StopReason),
}

impl LoopState {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Sampling => "sampling",
            Self::Planning => "planning",
            Self::Executing => "executing",
            Self::Waiting => "waiting",
            Self::Stopped(_) => "stopped",
        }
    }
}

/// What happened to one sampled market.
enum MarketOutcome {
    /// At least one intent was planned and resolved.
    Attempted,
    /// Nothing to do here; try another market.
    Skipped(SkipReason),
}

/// Sample, plan, execute, wait.
pub struct TradingLoop {
    config: EngineConfig,
    sampler: DistributionSampler,
    planner: RoundPlanner,
    ledger: BudgetLedger,
    retry: RetryController,
    books: Arc<dyn OrderBookSource>,
    confirmation: Option<Arc<dyn Confirmation>>,
    breaker: CircuitBreaker,
    stats: SessionStats,
    state: LoopState,
    cancel: CancellationToken,
}

impl TradingLoop {
    /// Build a loop; the configuration is validated first.
    pub fn new(
        config: EngineConfig,
        books: Arc<dyn OrderBookSource>,
        gateway: DynGateway,
        cancel: CancellationToken,
    ) -> ExecutorResult<Self> {
        config.validate()?;
        let planner = RoundPlanner::new(config.planner.clone(), config.caps.min_order_value)?;
        let sampler = DistributionSampler::from_seed(config.sampling.seed);
        let ledger = BudgetLedger::new(config.caps.clone());
        let retry = RetryController::new(gateway, config.retry.clone());
        let breaker = CircuitBreaker::new(config.max_consecutive_fatal);

        Ok(Self {
            config,
            sampler,
            planner,
            ledger,
            retry,
            books,
            confirmation: None,
            breaker,
            stats: SessionStats::new(),
            state: LoopState::Idle,
            cancel,
        })
    }

    /// Same loop with a recording gateway; nothing is sent to the venue.
    pub fn dry_run(
        config: EngineConfig,
        books: Arc<dyn OrderBookSource>,
        cancel: CancellationToken,
    ) -> ExecutorResult<(Self, Arc<DryRunGateway>)> {
        let gateway = Arc::new(DryRunGateway::new());
        let engine = Self::new(config, books, gateway.clone(), cancel)?;
        Ok((engine, gateway))
    }

    /// Ask `confirmation` before every intent.
    pub fn with_confirmation(mut self, confirmation: Arc<dyn Confirmation>) -> Self {
        self.confirmation = Some(confirmation);
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn ledger(&self) -> &BudgetLedger {
        &self.ledger
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run until cancelled, `iteration_limit` iterations completed, or the
    /// circuit breaker trips. No wait follows the last iteration.
    pub async fn run(
        &mut self,
        pool: &[TokenId],
        iteration_limit: Option<u64>,
    ) -> ExecutorResult<SessionStats> {
        if pool.is_empty() {
            return Err(ExecutorError::Config("token pool is empty".to_string()));
        }
        info!(
            markets = pool.len(),
            ?iteration_limit,
            mode = ?self.planner.mode(),
            gateway = self.retry.gateway().name(),
            "Trading loop starting"
        );

        let reason = loop {
            if self.cancel.is_cancelled() {
                break StopReason::Cancelled;
            }
            if limit_reached(self.stats.iterations, iteration_limit) {
                break StopReason::IterationLimit;
            }

            self.iteration(pool).await?;
            self.stats.iterations += 1;
            Metrics::iteration();
            debug_assert_eq!(self.ledger.outstanding(), Decimal::ZERO);

            if self.breaker.is_tripped() {
                break StopReason::CircuitBreaker;
            }
            if self.cancel.is_cancelled() {
                break StopReason::Cancelled;
            }
            if limit_reached(self.stats.iterations, iteration_limit) {
                break StopReason::IterationLimit;
            }

            self.wait().await?;
        };

        self.set_state(LoopState::Stopped(reason));
        self.stats.finish(reason);
        info!(
            reason = reason.label(),
            iterations = self.stats.iterations,
            "Trading loop stopped"
        );
        self.stats.log_summary();
        Ok(self.stats.clone())
    }

    // ========================================================================
    // Iteration
    // ========================================================================

    /// One iteration: sample markets until one is tradable or attempts run out.
    async fn iteration(&mut self, pool: &[TokenId]) -> ExecutorResult<()> {
        self.ledger.begin_round();

        for attempt in 1..=self.config.market_attempts {
            if self.halted() {
                return Ok(());
            }
            self.set_state(LoopState::Sampling);
            let token = self.sampler.sample_market(pool)?.clone();
            let sampled = self.sampler.sample_side(self.config.sampling.p_buy)?;
            let side = self.planner.resolve_side(sampled);
            let quantity = self.sampler.sample_quantity(&self.config.sampling.quantity)?;
            debug!(
                token = %token.short(),
                %side,
                %quantity,
                attempt,
                "Sampled trade parameters"
            );

            match self.trade_market(&token, side, quantity).await? {
                MarketOutcome::Attempted => return Ok(()),
                MarketOutcome::Skipped(reason) => {
                    self.skip(reason);
                    debug!(
                        token = %token.short(),
                        %side,
                        %reason,
                        attempt,
                        "Market skipped"
                    );
                }
            }
        }

        info!(
            attempts = self.config.market_attempts,
            "No tradable market found this iteration"
        );
        Ok(())
    }

    async fn trade_market(
        &mut self,
        token: &TokenId,
        side: OrderSide,
        quantity: Decimal,
    ) -> ExecutorResult<MarketOutcome> {
        self.set_state(LoopState::Planning);
        let book = match self.fetch_book(token).await {
            Ok(book) => book,
            Err(e) => {
                warn!(token = %token.short(), error = %e, "Order book unavailable");
                return Ok(MarketOutcome::Skipped(SkipReason::BookUnavailable));
            }
        };

        match self.planner.mode() {
            StrategyMode::Single => {
                let plan = self.planner.plan_single(
                    &book,
                    &self.config.market,
                    side,
                    quantity,
                    &self.ledger,
                )?;
                self.stats.rounds += 1;
                Metrics::round("single");
                if plan.is_empty() {
                    return Ok(MarketOutcome::Skipped(empty_plan_reason(&plan)));
                }
                self.execute_plan(&plan).await;
                Ok(MarketOutcome::Attempted)
            }
            StrategyMode::MultiRound => self.multi_round(token, book).await,
        }
    }

    /// Up to `max_rounds` rounds on one market, each under a fresh round cap.
    async fn multi_round(
        &mut self,
        token: &TokenId,
        mut book: OrderBookSnapshot,
    ) -> ExecutorResult<MarketOutcome> {
        let max_rounds = self.planner.multi_round().max_rounds;
        let refetch = self.planner.multi_round().refetch_between_rounds;
        let mut traded = false;

        for round in 1..=max_rounds {
            if self.halted() {
                break;
            }
            self.set_state(LoopState::Planning);
            self.ledger.begin_round();
            let plan = self
                .planner
                .plan_round(&book, &self.config.market, round, &self.ledger)?;

            if plan.is_empty() {
                let reason = empty_plan_reason(&plan);
                if !traded {
                    return Ok(MarketOutcome::Skipped(reason));
                }
                debug!(token = %token.short(), round, %reason, "Multi-round session complete");
                break;
            }

            self.stats.rounds += 1;
            Metrics::round("multi_round");
            info!(
                token = %token.short(),
                round,
                intents = plan.intents.len(),
                total_cost = %plan.total_cost,
                "Executing round"
            );
            self.execute_plan(&plan).await;
            traded = true;

            if round == max_rounds {
                break;
            }
            book = if refetch {
                match self.fetch_book(token).await {
                    Ok(fresh) => fresh,
                    Err(e) => {
                        warn!(token = %token.short(), error = %e, "Refetch failed, ending rounds");
                        break;
                    }
                }
            } else {
                plan.consume(&book)
            };
        }

        Ok(MarketOutcome::Attempted)
    }

    async fn execute_plan(&mut self, plan: &RoundPlan) {
        for (side, reason) in &plan.skips {
            debug!(%side, %reason, round = plan.round, "Side skipped in round");
        }
        for intent in &plan.intents {
            if self.halted() {
                break;
            }
            Metrics::intent_planned(intent.side().as_str());
            self.execute_intent(intent).await;
        }
    }

    /// Confirm, reserve, submit, then commit or roll back.
    async fn execute_intent(&mut self, intent: &TradeIntent) {
        self.set_state(LoopState::Executing);
        let side = intent.side();

        if let Some(confirmation) = &self.confirmation {
            if !confirmation.confirm(intent) {
                info!(intent_id = %intent.id(), "Intent declined");
                self.stats.record_decline();
                Metrics::order_declined(side.as_str());
                return;
            }
        }
        if self.cancel.is_cancelled() {
            return;
        }

        let Some(reservation) = self.ledger.reserve(intent.token(), side, intent.cost()) else {
            self.skip(SkipReason::BudgetExhausted);
            return;
        };
        if reservation.amount() < intent.cost() {
            debug!(
                intent_id = %intent.id(),
                granted = %reservation.amount(),
                cost = %intent.cost(),
                "Reservation short of intent cost"
            );
            self.ledger.rollback(reservation);
            self.skip(SkipReason::BudgetExhausted);
            return;
        }

        let result = self.retry.execute(intent, &self.cancel).await;

        if result.success {
            if let CommitOutcome::Committed(spend) = self.ledger.commit(reservation, intent.id()) {
                self.stats.record_fill(intent, spend);
                Metrics::order_filled(side.as_str(), spend.to_f64().unwrap_or(0.0));
                info!(
                    token = %intent.token().short(),
                    %side,
                    price = %intent.price(),
                    size = %intent.size(),
                    %spend,
                    spent = %self.ledger.spent(intent.token(), side),
                    "Trade executed"
                );
            }
            self.breaker.record_success();
            return;
        }

        self.ledger.rollback(reservation);
        self.stats.record_failure(result.error.as_ref());
        Metrics::order_failed(side.as_str());
        if result.is_fatal_failure() {
            let reason = result
                .error
                .as_ref()
                .map_or_else(|| "unknown".to_string(), |e| e.to_string());
            if self.breaker.record_fatal(&reason) {
                Metrics::breaker_tripped();
            }
        }
    }

    // ========================================================================
    // Helpers
    // ========================================================================

    async fn fetch_book(&self, token: &TokenId) -> flowbot_core::Result<OrderBookSnapshot> {
        match tokio::time::timeout(self.config.book_timeout(), self.books.fetch(token)).await {
            Ok(result) => result,
            Err(_) => Err(CoreError::BookUnavailable(format!(
                "fetch timed out after {}ms",
                self.config.book_timeout_ms
            ))),
        }
    }

    /// Sleep a sampled interval, returning early on cancellation.
    async fn wait(&mut self) -> ExecutorResult<()> {
        let wait = self.sampler.sample_interval(&self.config.sampling.interval)?;
        self.set_state(LoopState::Waiting);
        debug!(wait_ms = wait.as_millis() as u64, "Waiting for next iteration");

        tokio::select! {
            _ = self.cancel.cancelled() => {
                debug!("Wait interrupted by cancellation");
            }
            _ = tokio::time::sleep(wait) => {}
        }
        Ok(())
    }

    fn halted(&self) -> bool {
        self.cancel.is_cancelled() || self.breaker.is_tripped()
    }

    fn skip(&mut self, reason: SkipReason) {
        self.stats.record_skip(reason);
        Metrics::skip(reason.label());
    }

    fn set_state(&mut self, state: LoopState) {
        if self.state != state {
            self.state = state;
            Metrics::loop_state(state.label());
        }
    }
}

fn limit_reached(iterations: u64, limit: Option<u64>) -> bool {
    limit.is_some_and(|limit| iterations >= limit)
}

fn empty_plan_reason(plan: &RoundPlan) -> SkipReason {
    plan.skip_reason().unwrap_or(SkipReason::BelowMinimumOrder)
}
