//! Session statistics.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use flowbot_core::{ExecErrorKind, OrderSide, SkipReason, TokenId, TradeIntent};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::info;

/// Why the trading loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Cancelled,
    IterationLimit,
    CircuitBreaker,
}

impl StopReason {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::IterationLimit => "iteration_limit",
            Self::CircuitBreaker => "circuit_breaker",
        }
    }
}

/// Committed spend and fills for one market.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MarketSummary {
    pub buy_spend: Decimal,
    pub sell_spend: Decimal,
    pub buy_trades: u64,
    pub sell_trades: u64,
}

impl MarketSummary {
    pub fn total_spend(&self) -> Decimal {
        self.buy_spend + self.sell_spend
    }

    pub fn trades(&self) -> u64 {
        self.buy_trades + self.sell_trades
    }
}

/// Counters for one trading session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionStats {
    pub iterations: u64,
    pub rounds: u64,
    pub trades_executed: u64,
    pub trades_failed: u64,
    pub skipped: u64,
    pub declined: u64,
    /// Committed spend across all markets and sides.
    pub volume: Decimal,
    pub markets: BTreeMap<TokenId, MarketSummary>,
    pub skip_reasons: BTreeMap<String, u64>,
    pub failure_kinds: BTreeMap<String, u64>,
    pub stop_reason: Option<StopReason>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            iterations: 0,
            rounds: 0,
            trades_executed: 0,
            trades_failed: 0,
            skipped: 0,
            declined: 0,
            volume: Decimal::ZERO,
            markets: BTreeMap::new(),
            skip_reasons: BTreeMap::new(),
            failure_kinds: BTreeMap::new(),
            stop_reason: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    pub fn record_fill(&mut self, intent: &TradeIntent, spend: Decimal) {
        self.trades_executed += 1;
        self.volume += spend;
        let market = self.markets.entry(intent.token().clone()).or_default();
        match intent.side() {
            OrderSide::Buy => {
                market.buy_spend += spend;
                market.buy_trades += 1;
            }
            OrderSide::Sell => {
                market.sell_spend += spend;
                market.sell_trades += 1;
            }
        }
    }

    pub fn record_failure(&mut self, kind: Option<&ExecErrorKind>) {
        self.trades_failed += 1;
        let label = kind.map_or("unknown", |k| k.label());
        *self.failure_kinds.entry(label.to_string()).or_insert(0) += 1;
    }

    pub fn record_skip(&mut self, reason: SkipReason) {
        self.skipped += 1;
        *self.skip_reasons.entry(reason.label().to_string()).or_insert(0) += 1;
    }

    pub fn record_decline(&mut self) {
        self.declined += 1;
    }

    pub fn skips_for(&self, reason: SkipReason) -> u64 {
        self.skip_reasons.get(reason.label()).copied().unwrap_or(0)
    }

    /// Fills over resolved submissions, 0.0 when nothing was submitted.
    pub fn success_rate(&self) -> f64 {
        let total = self.trades_executed + self.trades_failed;
        if total == 0 {
            return 0.0;
        }
        self.trades_executed as f64 / total as f64
    }

    pub(crate) fn finish(&mut self, reason: StopReason) {
        self.stop_reason = Some(reason);
        self.finished_at = Some(Utc::now());
    }

    /// Log the final summary.
    pub fn log_summary(&self) {
        let duration_secs = self
            .finished_at
            .map(|end| (end - self.started_at).num_seconds())
            .unwrap_or(0);

        info!("========== Session Summary ==========");
        info!(
            stop_reason = self.stop_reason.map_or("running", |r| r.label()),
            duration_secs,
            iterations = self.iterations,
            rounds = self.rounds,
            "Session"
        );
        info!(
            executed = self.trades_executed,
            failed = self.trades_failed,
            skipped = self.skipped,
            declined = self.declined,
            success_rate = %format!("{:.1}%", self.success_rate() * 100.0),
            volume = %self.volume,
            "Trades"
        );
        for (token, market) in &self.markets {
            info!(
                token = %token.short(),
                buy_spend = %market.buy_spend,
                sell_spend = %market.sell_spend,
                trades = market.trades(),
                "Market"
            );
        }
        if !self.skip_reasons.is_empty() {
            info!(reasons = ?self.skip_reasons, "Skips");
        }
        info!("=====================================");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowbot_core::{IntentConstraints, Price, PriceBounds, Size};
    use rust_decimal_macros::dec;

    fn intent(token: &str, side: OrderSide) -> TradeIntent {
        TradeIntent::new(
            TokenId::parse(token).unwrap(),
            side,
            Price::new(dec!(0.50)),
            Size::new(dec!(2)),
            1,
            &IntentConstraints {
                min_order_value: dec!(1),
                bounds: PriceBounds::default(),
            },
        )
        .unwrap()
    }

    #[test]
    fn test_fills_aggregate_per_market() {
        let mut stats = SessionStats::new();
        stats.record_fill(&intent("11", OrderSide::Buy), dec!(1.0));
        stats.record_fill(&intent("11", OrderSide::Sell), dec!(0.8));
        stats.record_fill(&intent("22", OrderSide::Buy), dec!(2.0));

        assert_eq!(stats.trades_executed, 3);
        assert_eq!(stats.volume, dec!(3.8));
        let first = &stats.markets[&TokenId::parse("11").unwrap()];
        assert_eq!(first.buy_spend, dec!(1.0));
        assert_eq!(first.sell_spend, dec!(0.8));
        assert_eq!(first.trades(), 2);
        assert_eq!(first.total_spend(), dec!(1.8));
    }

    #[test]
    fn test_success_rate_and_skips() {
        let mut stats = SessionStats::new();
        assert_eq!(stats.success_rate(), 0.0);

        stats.record_fill(&intent("11", OrderSide::Buy), dec!(1.0));
        stats.record_failure(Some(&ExecErrorKind::Timeout));
        stats.record_skip(SkipReason::BudgetExhausted);
        stats.record_skip(SkipReason::BudgetExhausted);

        assert_eq!(stats.success_rate(), 0.5);
        assert_eq!(stats.skips_for(SkipReason::BudgetExhausted), 2);
        assert_eq!(stats.skips_for(SkipReason::InvalidBook), 0);
        assert_eq!(stats.failure_kinds["timeout"], 1);
    }

    #[test]
    fn test_serializes_for_summary() {
        let mut stats = SessionStats::new();
        stats.record_fill(&intent("11", OrderSide::Buy), dec!(1.0));
        stats.finish(StopReason::IterationLimit);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["stop_reason"], "iteration_limit");
        assert_eq!(json["markets"]["11"]["buy_trades"], 1);
        assert_eq!(json["volume"], "1.0");
    }
}
