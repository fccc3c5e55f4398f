//! Execution gateway port.
//!
//! A gateway submits one IOC order per call. Anything short of a full fill is
//! reported as an error; there is no partial-fill state.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use flowbot_core::{BoxFuture, ExecErrorKind, GatewayAck, TradeIntent};
use parking_lot::Mutex;
use tracing::info;

/// Submits trade intents to the venue.
pub trait ExecutionGateway: Send + Sync {
    /// Submit one intent. Resolves to an ack only on a full fill.
    fn submit<'a>(
        &'a self,
        intent: &'a TradeIntent,
    ) -> BoxFuture<'a, Result<GatewayAck, ExecErrorKind>>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Arc wrapper for gateway trait objects.
pub type DynGateway = Arc<dyn ExecutionGateway>;

// ============================================================================
// DryRunGateway
// ============================================================================

/// Recording sink: every intent is acked as filled and nothing leaves the process.
///
/// Only the most recent `history` intents are kept; the count covers the whole session.
#[derive(Debug)]
pub struct DryRunGateway {
    submitted: Mutex<VecDeque<TradeIntent>>,
    history: usize,
    seq: AtomicU64,
}

impl Default for DryRunGateway {
    fn default() -> Self {
        Self::with_history(DryRunGateway::DEFAULT_HISTORY)
    }
}

impl DryRunGateway {
    pub const DEFAULT_HISTORY: usize = 1024;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(history: usize) -> Self {
        Self {
            submitted: Mutex::new(VecDeque::new()),
            history: history.max(1),
            seq: AtomicU64::new(0),
        }
    }

    /// Most recent intents received, oldest first.
    pub fn submitted(&self) -> Vec<TradeIntent> {
        self.submitted.lock().iter().cloned().collect()
    }

    /// Intents received over the whole session.
    pub fn submission_count(&self) -> usize {
        self.seq.load(Ordering::SeqCst) as usize
    }
}

impl ExecutionGateway for DryRunGateway {
    fn submit<'a>(
        &'a self,
        intent: &'a TradeIntent,
    ) -> BoxFuture<'a, Result<GatewayAck, ExecErrorKind>> {
        Box::pin(async move {
            let n = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
            info!(
                intent_id = %intent.id(),
                token = %intent.token().short(),
                side = %intent.side(),
                price = %intent.price(),
                size = %intent.size(),
                cost = %intent.cost(),
                "[DRY RUN] Order not sent"
            );
            let mut submitted = self.submitted.lock();
            if submitted.len() == self.history {
                submitted.pop_front();
            }
            submitted.push_back(intent.clone());
            drop(submitted);
            Ok(GatewayAck {
                order_id: format!("dry-run-{n}"),
            })
        })
    }

    fn name(&self) -> &'static str {
        "dry_run"
    }
}

// ============================================================================
// MockGateway
// ============================================================================

/// Scripted gateway for tests.
///
/// Scripted results are returned first, in order; afterwards every call gets
/// the fallback result, a fill unless configured otherwise. Every submission
/// is kept, so a mock suits bounded test sessions only.
#[derive(Debug)]
pub struct MockGateway {
    script: Mutex<VecDeque<Result<GatewayAck, ExecErrorKind>>>,
    fallback: Mutex<Option<ExecErrorKind>>,
    delay: Mutex<Option<Duration>>,
    submissions: Mutex<Vec<TradeIntent>>,
    seq: AtomicU64,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(None),
            delay: Mutex::new(None),
            submissions: Mutex::new(Vec::new()),
            seq: AtomicU64::new(0),
        }
    }

    /// Queue one result.
    pub fn push_result(&self, result: Result<GatewayAck, ExecErrorKind>) {
        self.script.lock().push_back(result);
    }

    /// Queue one error.
    pub fn push_error(&self, kind: ExecErrorKind) {
        self.push_result(Err(kind));
    }

    /// Fail every unscripted call with `kind`.
    pub fn fail_with(&self, kind: ExecErrorKind) {
        *self.fallback.lock() = Some(kind);
    }

    /// Sleep before answering each call.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = Some(delay);
    }

    /// Every intent submitted, including retries.
    pub fn submissions(&self) -> Vec<TradeIntent> {
        self.submissions.lock().clone()
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().len()
    }

    fn next_result(&self) -> Result<GatewayAck, ExecErrorKind> {
        if let Some(result) = self.script.lock().pop_front() {
            return result;
        }
        match self.fallback.lock().clone() {
            Some(kind) => Err(kind),
            None => Ok(GatewayAck {
                order_id: format!("mock-{}", self.seq.fetch_add(1, Ordering::SeqCst) + 1),
            }),
        }
    }
}

impl ExecutionGateway for MockGateway {
    fn submit<'a>(
        &'a self,
        intent: &'a TradeIntent,
    ) -> BoxFuture<'a, Result<GatewayAck, ExecErrorKind>> {
        Box::pin(async move {
            self.submissions.lock().push(intent.clone());
            let delay = *self.delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.next_result()
        })
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
