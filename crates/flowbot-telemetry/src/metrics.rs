//! Prometheus metrics for flowbot.
//!
//! Covers:
//! - Loop iterations and rounds
//! - Planned intents and order outcomes
//! - Retries by error kind
//! - Budget spend per side
//! - Skipped iterations by reason
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A failure means a duplicate metric name,
//! which is a programming error and should crash on first use rather than
//! silently drop samples. It only happens during static initialization.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge_vec, CounterVec, Encoder, HistogramVec, IntCounter, IntCounterVec,
    IntGaugeVec, TextEncoder,
};

use crate::error::{TelemetryError, TelemetryResult};

/// Completed loop iterations.
pub static ITERATIONS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!("flowbot_iterations_total", "Completed trading loop iterations").unwrap()
});

/// Planning rounds run.
/// Labels: mode (single/multi_round)
pub static ROUNDS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!("flowbot_rounds_total", "Planning rounds run", &["mode"]).unwrap()
});

/// Intents produced by the planner.
pub static INTENTS_PLANNED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "flowbot_intents_planned_total",
        "Trade intents produced by the planner",
        &["side"]
    )
    .unwrap()
});

/// Order outcomes.
/// Labels: side, outcome (filled/failed/declined)
pub static ORDERS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "flowbot_orders_total",
        "Order outcomes by side",
        &["side", "outcome"]
    )
    .unwrap()
});

/// Submission retries.
pub static RETRIES_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "flowbot_retries_total",
        "Order submission retries by error kind",
        &["kind"]
    )
    .unwrap()
});

/// Committed spend in quote currency.
pub static SPEND_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "flowbot_spend_total",
        "Committed spend in quote currency",
        &["side"]
    )
    .unwrap()
});

/// Skipped iterations and sides.
pub static SKIPS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "flowbot_skips_total",
        "Skipped iterations or sides by reason",
        &["reason"]
    )
    .unwrap()
});

/// Circuit breaker trips.
pub static BREAKER_TRIPS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "flowbot_breaker_trips_total",
        "Circuit breaker trips on consecutive fatal errors"
    )
    .unwrap()
});

/// Submission round-trip latency in milliseconds.
pub static SUBMIT_LATENCY_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "flowbot_submit_latency_ms",
        "Order submission latency in milliseconds",
        &["outcome"],
        vec![10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0, 10000.0]
    )
    .unwrap()
});

/// Loop state (1 = active).
pub static LOOP_STATE: Lazy<IntGaugeVec> = Lazy::new(|| {
    register_int_gauge_vec!(
        "flowbot_loop_state",
        "Trading loop current state (1=active, 0=inactive)",
        &["state"]
    )
    .unwrap()
});

const LOOP_STATES: [&str; 6] = [
    "idle",
    "sampling",
    "planning",
    "executing",
    "waiting",
    "stopped",
];

/// Metrics facade.
pub struct Metrics;

impl Metrics {
    pub fn iteration() {
        ITERATIONS_TOTAL.inc();
    }

    pub fn round(mode: &str) {
        ROUNDS_TOTAL.with_label_values(&[mode]).inc();
    }

    pub fn intent_planned(side: &str) {
        INTENTS_PLANNED_TOTAL.with_label_values(&[side]).inc();
    }

    /// Record a filled order and its committed spend.
    pub fn order_filled(side: &str, spend: f64) {
        ORDERS_TOTAL.with_label_values(&[side, "filled"]).inc();
        if spend > 0.0 {
            SPEND_TOTAL.with_label_values(&[side]).inc_by(spend);
        }
    }

    pub fn order_failed(side: &str) {
        ORDERS_TOTAL.with_label_values(&[side, "failed"]).inc();
    }

    pub fn order_declined(side: &str) {
        ORDERS_TOTAL.with_label_values(&[side, "declined"]).inc();
    }

    pub fn retry(kind: &str) {
        RETRIES_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn skip(reason: &str) {
        SKIPS_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn breaker_tripped() {
        BREAKER_TRIPS_TOTAL.inc();
    }

    pub fn submit_latency(outcome: &str, latency_ms: f64) {
        SUBMIT_LATENCY_MS
            .with_label_values(&[outcome])
            .observe(latency_ms);
    }

    /// Set the active loop state; every other state is reset to 0.
    pub fn loop_state(state: &str) {
        for s in LOOP_STATES {
            LOOP_STATE.with_label_values(&[s]).set(0);
        }
        LOOP_STATE.with_label_values(&[state]).set(1);
    }

    /// Every registered metric in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let mut buf = Vec::new();
        TextEncoder::new()
            .encode(&prometheus::gather(), &mut buf)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}
