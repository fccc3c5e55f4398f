//! Prometheus metrics and structured logging for flowbot.
//!
//! - Structured logging with tracing (JSON in production, pretty otherwise)
//! - Prometheus counters for iterations, orders, retries, spend and skips

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
