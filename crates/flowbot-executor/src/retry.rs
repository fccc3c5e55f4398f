//! Submission retries with exponential backoff.
//!
//! The policy is a pure function of the attempt number and the error kind;
//! the controller owns the async side (per-attempt timeout, cancellable
//! backoff sleep, at-most-once bookkeeping per intent id).

use std::time::{Duration, Instant};

use flowbot_core::{ExecErrorKind, RecentIds, TradeIntent, TradeResult};
use flowbot_telemetry::Metrics;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{ExecutorError, ExecutorResult};
use crate::gateway::DynGateway;

/// Largest backoff exponent; larger attempts are capped by `max_delay_ms` anyway.
const MAX_BACKOFF_EXP: u32 = 20;

/// Outcome of one failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    GiveUp,
}

/// Retry policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Upper bound on one submission round-trip.
    #[serde(default = "default_submit_timeout_ms")]
    pub submit_timeout_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    8_000
}

fn default_submit_timeout_ms() -> u64 {
    10_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            submit_timeout_ms: default_submit_timeout_ms(),
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> ExecutorResult<()> {
        if self.max_attempts == 0 {
            return Err(ExecutorError::Config(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err(ExecutorError::Config(format!(
                "retry.base_delay_ms {} exceeds max_delay_ms {}",
                self.base_delay_ms, self.max_delay_ms
            )));
        }
        if self.submit_timeout_ms == 0 {
            return Err(ExecutorError::Config(
                "retry.submit_timeout_ms must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn submit_timeout(&self) -> Duration {
        Duration::from_millis(self.submit_timeout_ms)
    }

    /// Delay after failed attempt `attempt` (1-based): `base * 2^(attempt-1)`, capped.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(MAX_BACKOFF_EXP);
        let delay = self.base_delay_ms.saturating_mul(1u64 << exp);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }

    /// What to do after attempt `attempt` failed with `kind`.
    pub fn decide(&self, attempt: u32, kind: &ExecErrorKind) -> RetryDecision {
        if !kind.is_retryable() || attempt >= self.max_attempts {
            return RetryDecision::GiveUp;
        }
        RetryDecision::RetryAfter(self.backoff(attempt))
    }
}

/// Resolves each intent to exactly one `TradeResult`.
pub struct RetryController {
    gateway: DynGateway,
    policy: RetryPolicy,
    /// Most recently resolved intent ids.
    resolved: RecentIds,
}

impl RetryController {
    pub fn new(gateway: DynGateway, policy: RetryPolicy) -> Self {
        Self {
            gateway,
            policy,
            resolved: RecentIds::default(),
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn gateway(&self) -> &DynGateway {
        &self.gateway
    }

    /// Submit `intent` until it fills, fails fatally, runs out of attempts or
    /// `cancel` fires during a backoff.
    ///
    /// Every attempt reuses the intent's client order id. An intent id that
    /// was already resolved is refused with `Duplicate` and never sent.
    pub async fn execute(&mut self, intent: &TradeIntent, cancel: &CancellationToken) -> TradeResult {
        let id = intent.id().clone();
        if !self.resolved.insert(id.clone()) {
            warn!(intent_id = %id, "Intent already resolved, not resubmitting");
            return TradeResult::failed(id, ExecErrorKind::Duplicate, 0);
        }

        let timeout = self.policy.submit_timeout();
        let mut attempt = 0;
        loop {
            attempt += 1;
            let started = Instant::now();
            let outcome = match tokio::time::timeout(timeout, self.gateway.submit(intent)).await {
                Ok(outcome) => outcome,
                Err(_) => Err(ExecErrorKind::Timeout),
            };
            let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

            let kind = match outcome {
                Ok(ack) => {
                    Metrics::submit_latency("filled", latency_ms);
                    info!(
                        intent_id = %id,
                        order_id = %ack.order_id,
                        attempt,
                        gateway = self.gateway.name(),
                        "Order filled"
                    );
                    return TradeResult::filled(id, ack.order_id, attempt);
                }
                Err(kind) => kind,
            };
            Metrics::submit_latency("failed", latency_ms);

            match self.policy.decide(attempt, &kind) {
                RetryDecision::GiveUp => {
                    warn!(
                        intent_id = %id,
                        attempt,
                        error = %kind,
                        retryable = kind.is_retryable(),
                        "Order failed"
                    );
                    return TradeResult::failed(id, kind, attempt);
                }
                RetryDecision::RetryAfter(delay) => {
                    Metrics::retry(kind.label());
                    warn!(
                        intent_id = %id,
                        attempt,
                        error = %kind,
                        delay_ms = delay.as_millis() as u64,
                        "Submission failed, retrying"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            debug!(intent_id = %id, "Backoff cancelled");
                            return TradeResult::failed(id, kind, attempt);
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockGateway;
    use flowbot_core::{IntentConstraints, OrderSide, Price, PriceBounds, Size, TokenId};
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn intent() -> TradeIntent {
        TradeIntent::new(
            TokenId::parse("1001").unwrap(),
            OrderSide::Buy,
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

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 4,
            submit_timeout_ms: 1_000,
        }
    }

    fn controller(gateway: &Arc<MockGateway>, policy: RetryPolicy) -> RetryController {
        RetryController::new(gateway.clone(), policy)
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1_000));
        assert_eq!(policy.backoff(3), Duration::from_millis(2_000));
        assert_eq!(policy.backoff(5), Duration::from_millis(8_000));
        assert_eq!(policy.backoff(64), Duration::from_millis(8_000));
    }

    #[test]
    fn test_decide() {
        let policy = RetryPolicy::default();

        assert_eq!(
            policy.decide(1, &ExecErrorKind::RateLimited),
            RetryDecision::RetryAfter(Duration::from_millis(500))
        );
        assert_eq!(
            policy.decide(2, &ExecErrorKind::Network("reset".to_string())),
            RetryDecision::RetryAfter(Duration::from_millis(1_000))
        );
        assert_eq!(
            policy.decide(3, &ExecErrorKind::Timeout),
            RetryDecision::GiveUp
        );
        assert_eq!(
            policy.decide(1, &ExecErrorKind::InsufficientBalance("x".to_string())),
            RetryDecision::GiveUp
        );
        assert_eq!(
            policy.decide(1, &ExecErrorKind::Unclassified("boom".to_string())),
            RetryDecision::GiveUp
        );
    }

    #[test]
    fn test_policy_validation() {
        assert!(RetryPolicy::default().validate().is_ok());

        let mut policy = RetryPolicy::default();
        policy.max_attempts = 0;
        assert!(policy.validate().is_err());

        let mut policy = RetryPolicy::default();
        policy.base_delay_ms = 10_000;
        assert!(policy.validate().is_err());
    }

    #[test]
    fn test_policy_defaults_from_toml() {
        let policy: RetryPolicy = toml::from_str("max_attempts = 5").unwrap();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.base_delay_ms, 500);
        assert_eq!(policy.submit_timeout_ms, 10_000);
    }

    #[tokio::test]
    async fn test_retryable_errors_consume_attempts() {
        let gateway = Arc::new(MockGateway::new());
        gateway.fail_with(ExecErrorKind::Server {
            status: 503,
            message: "busy".to_string(),
        });
        let mut retry = controller(&gateway, fast_policy());

        let result = retry.execute(&intent(), &CancellationToken::new()).await;

        assert!(!result.success);
        assert_eq!(result.attempts, 3);
        assert_eq!(gateway.submission_count(), 3);
        assert!(!result.is_fatal_failure());
    }

    #[tokio::test]
    async fn test_fatal_error_stops_after_one_attempt() {
        let gateway = Arc::new(MockGateway::new());
        gateway.fail_with(ExecErrorKind::InvalidParams("bad size".to_string()));
        let mut retry = controller(&gateway, fast_policy());

        let result = retry.execute(&intent(), &CancellationToken::new()).await;

        assert_eq!(result.attempts, 1);
        assert_eq!(gateway.submission_count(), 1);
        assert!(result.is_fatal_failure());
    }

    #[tokio::test]
    async fn test_retry_then_fill_reuses_client_order_id() {
        let gateway = Arc::new(MockGateway::new());
        gateway.push_error(ExecErrorKind::RateLimited);
        let mut retry = controller(&gateway, fast_policy());
        let intent = intent();

        let result = retry.execute(&intent, &CancellationToken::new()).await;

        assert!(result.success);
        assert_eq!(result.attempts, 2);
        assert_eq!(result.order_id.as_deref(), Some("mock-1"));
        let ids: Vec<_> = gateway.submissions().iter().map(|i| i.id().clone()).collect();
        assert_eq!(ids, vec![intent.id().clone(), intent.id().clone()]);
    }

    #[tokio::test]
    async fn test_attempt_timeout_is_retryable() {
        let gateway = Arc::new(MockGateway::new());
        gateway.set_delay(Duration::from_millis(200));
        let policy = RetryPolicy {
            max_attempts: 2,
            submit_timeout_ms: 10,
            ..fast_policy()
        };
        let mut retry = controller(&gateway, policy);

        let result = retry.execute(&intent(), &CancellationToken::new()).await;

        assert_eq!(result.error, Some(ExecErrorKind::Timeout));
        assert_eq!(result.attempts, 2);
    }

    #[tokio::test]
    async fn test_resolved_intent_is_never_resubmitted() {
        let gateway = Arc::new(MockGateway::new());
        let mut retry = controller(&gateway, fast_policy());
        let intent = intent();
        let cancel = CancellationToken::new();

        assert!(retry.execute(&intent, &cancel).await.success);
        let again = retry.execute(&intent, &cancel).await;

        assert_eq!(again.error, Some(ExecErrorKind::Duplicate));
        assert_eq!(again.attempts, 0);
        assert_eq!(gateway.submission_count(), 1);
    }

    #[tokio::test]
    async fn test_cancel_interrupts_backoff() {
        let gateway = Arc::new(MockGateway::new());
        gateway.fail_with(ExecErrorKind::RateLimited);
        let policy = RetryPolicy {
            base_delay_ms: 60_000,
            max_delay_ms: 60_000,
            ..fast_policy()
        };
        let mut retry = controller(&gateway, policy);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = tokio::time::timeout(
            Duration::from_secs(1),
            retry.execute(&intent(), &cancel),
        )
        .await
        .unwrap();

        assert_eq!(result.attempts, 1);
        assert_eq!(result.error, Some(ExecErrorKind::RateLimited));
    }
}
