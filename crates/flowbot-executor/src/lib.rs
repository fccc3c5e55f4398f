//! IOC order execution for flowbot.
//!
//! # Key Components
//!
//! - [`TradingLoop`]: Sample, plan, execute, wait; stops on cancellation,
//!   iteration limit or circuit breaker
//! - [`RetryController`]: Per-intent submission with timeout, classified
//!   retries and cancellable exponential backoff
//! - [`ExecutionGateway`]: Submission port, with [`RelayGateway`] for live
//!   trading and [`DryRunGateway`] as a recording sink
//! - [`Confirmation`]: Optional per-intent operator approval
//! - [`SessionStats`]: Counters and per-market spend for the final summary
//!
//! # Per-intent flow (in `TradingLoop`)
//!
//! 1. Confirmation declined -> counted, nothing reserved
//! 2. Reservation below intent cost -> rolled back, skipped as budget exhausted
//! 3. Retry controller resolves the intent exactly once
//! 4. Fill -> commit; failure -> rollback; fatal failure -> circuit breaker

pub mod config;
pub mod confirm;
pub mod error;
pub mod gateway;
pub mod orchestrator;
pub mod relay;
pub mod retry;
pub mod stats;

pub use config::EngineConfig;
pub use confirm::{AutoApprove, Confirmation};
pub use error::{ExecutorError, ExecutorResult};
pub use gateway::{DryRunGateway, DynGateway, ExecutionGateway, MockGateway};
pub use orchestrator::{LoopState, TradingLoop};
pub use relay::{RelayConfig, RelayGateway};
pub use retry::{RetryController, RetryDecision, RetryPolicy};
pub use stats::{MarketSummary, SessionStats, StopReason};
