//! Trading loop integration tests.
//!
//! Runs whole sessions against the mock venue:
//! - Live orders through the relay, with retry and rejection
//! - Token pool discovery from the directory
//! - Dry runs and unavailable books

mod integration;
use integration::common::mock_venue::MockVenue;

use flowbot_bot::{AppConfig, Application};
use flowbot_core::{SkipReason, TokenId};
use flowbot_executor::StopReason;
use flowbot_strategy::RangeConfig;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::str::FromStr;

const TOKEN: &str = "1001";
const LONG_A: &str =
    "71321045679252212594626385532706912750332728571942532289631379312455583992563";
const LONG_B: &str =
    "52114319501245915516055106046884209969926127482827954674443846427813813222426";

fn book() -> Value {
    json!({
        "market": "0xabc",
        "asset_id": TOKEN,
        "bids": [{ "price": "0.48", "size": "100" }],
        "asks": [{ "price": "0.50", "size": "100" }],
        "tick_size": "0.01"
    })
}

/// Live session buying 1.0 per iteration from `venue`.
fn config(venue: &MockVenue) -> AppConfig {
    let mut config = AppConfig::default();
    config.markets = vec![TOKEN.to_string()];
    config.iterations = Some(1);
    config.sampling.quantity = RangeConfig::new(dec!(1.0), dec!(1.0));
    config.sampling.interval = RangeConfig::new(dec!(0.001), dec!(0.001));
    config.sampling.p_buy = 1.0;
    config.sampling.seed = Some(11);
    config.retry.base_delay_ms = 1;
    config.retry.max_delay_ms = 2;
    config.venue.gamma_url = venue.url();
    config.venue.clob_url = venue.url();
    config.venue.order_url = Some(venue.order_url());
    config.venue.http_timeout_ms = 2_000;
    config
}

fn decimal_field(order: &Value, field: &str) -> Decimal {
    Decimal::from_str(order[field].as_str().unwrap()).unwrap()
}

async fn run(config: AppConfig) -> flowbot_executor::SessionStats {
    let mut app = Application::new(config).unwrap();
    app.load_pool(None).await.unwrap();
    app.run().await.unwrap()
}

/// One live iteration fetches the book and posts one matched IOC order.
#[tokio::test]
async fn test_live_order_through_relay() {
    let venue = MockVenue::start().await;
    venue.set_book(TOKEN, book());

    let stats = run(config(&venue)).await;

    assert_eq!(stats.iterations, 1);
    assert_eq!(stats.trades_executed, 1);
    assert_eq!(stats.trades_failed, 0);
    assert_eq!(stats.volume, dec!(1.0));
    assert_eq!(stats.stop_reason, Some(StopReason::IterationLimit));

    let orders = venue.orders();
    assert_eq!(orders.len(), 1);
    let order = &orders[0];
    assert_eq!(order["tokenId"], TOKEN);
    assert_eq!(order["side"], "BUY");
    assert_eq!(order["orderType"], "FAK");
    assert_eq!(decimal_field(order, "price"), dec!(0.50));
    assert_eq!(decimal_field(order, "size"), dec!(2));
    assert!(order["clientOrderId"].as_str().is_some());

    let token = TokenId::parse(TOKEN).unwrap();
    assert_eq!(stats.markets[&token].buy_spend, dec!(1.0));

    venue.shutdown().await;
}

/// A 429 is retried with the same client order id, then fills.
#[tokio::test]
async fn test_rate_limited_order_is_retried() {
    let venue = MockVenue::start().await;
    venue.set_book(TOKEN, book());
    venue.push_order_reply(429, json!({ "error": "Too Many Requests" }));

    let stats = run(config(&venue)).await;

    assert_eq!(stats.trades_executed, 1);
    let orders = venue.orders();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0]["clientOrderId"], orders[1]["clientOrderId"]);

    venue.shutdown().await;
}

/// A venue rejection is fatal: no retry, no spend.
#[tokio::test]
async fn test_rejected_order_is_not_retried() {
    let venue = MockVenue::start().await;
    venue.set_book(TOKEN, book());
    venue.push_order_reply(
        200,
        json!({ "success": false, "errorMsg": "order crosses book", "orderID": "", "status": "" }),
    );

    let stats = run(config(&venue)).await;

    assert_eq!(venue.orders().len(), 1);
    assert_eq!(stats.trades_executed, 0);
    assert_eq!(stats.trades_failed, 1);
    assert_eq!(stats.failure_kinds.get("rejected"), Some(&1));
    assert_eq!(stats.volume, Decimal::ZERO);

    venue.shutdown().await;
}

/// An unmatched IOC counts as a failure.
#[tokio::test]
async fn test_unmatched_order_is_failure() {
    let venue = MockVenue::start().await;
    venue.set_book(TOKEN, book());
    venue.push_order_reply(
        200,
        json!({ "success": true, "errorMsg": "", "orderID": "0x1", "status": "unmatched" }),
    );

    let stats = run(config(&venue)).await;

    assert_eq!(stats.trades_failed, 1);
    assert_eq!(stats.failure_kinds.get("not_filled"), Some(&1));

    venue.shutdown().await;
}

/// With no configured markets the pool comes from the directory, a dry run
/// sends nothing to the relay, and the metrics snapshot is written.
#[tokio::test]
async fn test_directory_pool_dry_run() {
    let venue = MockVenue::start().await;
    venue.set_markets(json!([
        {
            "id": "1",
            "question": "Open market",
            "active": true,
            "closed": false,
            "enableOrderBook": true,
            "clobTokenIds": format!("[\"{LONG_A}\", \"{LONG_B}\"]")
        },
        {
            "id": "2",
            "question": "Closed market",
            "active": true,
            "closed": true,
            "enableOrderBook": true,
            "clobTokenIds": "[\"1\", \"2\"]"
        }
    ]));
    venue.set_book(LONG_A, book());
    venue.set_book(LONG_B, book());

    let dir = tempfile::tempdir().unwrap();
    let metrics_path = dir.path().join("flowbot.prom");

    let mut config = config(&venue);
    config.markets.clear();
    config.dry_run = true;
    config.metrics_file = Some(metrics_path.to_str().unwrap().to_string());

    let mut app = Application::new(config).unwrap();
    app.load_pool(None).await.unwrap();
    let pool: Vec<&str> = app.pool().iter().map(|t| t.as_str()).collect();
    assert_eq!(pool, vec![LONG_A, LONG_B]);

    let stats = app.run().await.unwrap();

    assert_eq!(stats.trades_executed, 1);
    assert!(venue.orders().is_empty());
    assert_eq!(venue.book_requests(), 1);

    let metrics = std::fs::read_to_string(&metrics_path).unwrap();
    assert!(metrics.contains("flowbot_iterations_total"));

    venue.shutdown().await;
}

/// Every attempt on a missing book is a skip; nothing is ordered.
#[tokio::test]
async fn test_missing_book_skips_iteration() {
    let venue = MockVenue::start().await;

    let mut config = config(&venue);
    config.market_attempts = 2;

    let stats = run(config).await;

    assert_eq!(stats.iterations, 1);
    assert_eq!(stats.skipped, 2);
    assert_eq!(stats.skips_for(SkipReason::BookUnavailable), 2);
    assert_eq!(venue.book_requests(), 2);
    assert!(venue.orders().is_empty());

    venue.shutdown().await;
}

/// An empty directory is a configuration error before any trading.
#[tokio::test]
async fn test_empty_directory_fails_to_load_pool() {
    let venue = MockVenue::start().await;

    let mut config = config(&venue);
    config.markets.clear();

    let mut app = Application::new(config).unwrap();
    assert!(app.load_pool(None).await.is_err());
    assert!(venue.orders().is_empty());

    venue.shutdown().await;
}
