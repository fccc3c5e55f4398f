//! HTTP clients for the market directory and the CLOB order book.

use std::str::FromStr;
use std::time::Duration;

use flowbot_core::{
    BoxFuture, CoreError, OrderBookSnapshot, OrderBookSource, Price, Quote, Size, TokenId,
};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::{debug, info};

use crate::directory::{tradable_tokens, DirectoryMarket};
use crate::error::{RegistryError, RegistryResult};

/// Default timeout for API requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

fn build_client(timeout: Duration) -> RegistryResult<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| RegistryError::HttpClient(format!("Failed to create HTTP client: {e}")))
}

async fn get_json<T: serde::de::DeserializeOwned>(client: &Client, url: &str) -> RegistryResult<T> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| RegistryError::HttpClient(format!("HTTP request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(RegistryError::HttpClient(format!("HTTP {status}: {body}")));
    }

    response
        .json()
        .await
        .map_err(|e| RegistryError::HttpClient(format!("Failed to parse response: {e}")))
}

// ============================================================================
// DirectoryClient
// ============================================================================

/// Client for the market directory.
pub struct DirectoryClient {
    client: Client,
    base_url: String,
}

impl DirectoryClient {
    /// # Arguments
    /// * `base_url` - Directory root (e.g., "https://gamma-api.polymarket.com")
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> RegistryResult<Self> {
        Ok(Self {
            client: build_client(timeout.unwrap_or(DEFAULT_TIMEOUT))?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn markets_url(&self, limit: u32) -> String {
        format!(
            "{}/markets?active=true&closed=false&limit={limit}",
            self.base_url
        )
    }

    /// Active, open markets as listed by the directory.
    pub async fn fetch_markets(&self, limit: u32) -> RegistryResult<Vec<DirectoryMarket>> {
        let url = self.markets_url(limit);
        debug!(%url, "Fetching active markets");
        get_json(&self.client, &url).await
    }

    /// Token pool of tradable directory markets.
    pub async fn fetch_tradable_tokens(&self, limit: u32, strict: bool) -> RegistryResult<Vec<TokenId>> {
        let markets = self.fetch_markets(limit).await?;
        let pool = tradable_tokens(&markets, strict);
        info!(
            markets = markets.len(),
            tokens = pool.len(),
            "Loaded token pool from directory"
        );
        Ok(pool)
    }
}

// ============================================================================
// BookClient
// ============================================================================

/// Raw `/book` response.
#[derive(Debug, Deserialize)]
pub(crate) struct BookResponse {
    #[serde(default)]
    bids: Vec<RawLevel>,
    #[serde(default)]
    asks: Vec<RawLevel>,
    #[serde(default, deserialize_with = "de_opt_decimal")]
    tick_size: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct RawLevel {
    #[serde(deserialize_with = "de_decimal")]
    price: Decimal,
    #[serde(deserialize_with = "de_decimal")]
    size: Decimal,
}

/// Venue numbers arrive as strings or as JSON numbers.
fn decimal_from_value(value: &Value) -> Result<Decimal, String> {
    match value {
        Value::String(s) => Decimal::from_str(s.trim()).map_err(|e| format!("{s}: {e}")),
        Value::Number(n) => {
            let text = n.to_string();
            Decimal::from_str(&text)
                .or_else(|_| Decimal::from_scientific(&text))
                .map_err(|e| format!("{text}: {e}"))
        }
        other => Err(format!("expected number, got {other}")),
    }
}

fn de_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    decimal_from_value(&value).map_err(serde::de::Error::custom)
}

fn de_opt_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    if value.is_null() {
        return Ok(None);
    }
    decimal_from_value(&value)
        .map(Some)
        .map_err(serde::de::Error::custom)
}

/// Normalise a `/book` response into a snapshot.
pub(crate) fn snapshot_from_response(token: TokenId, raw: BookResponse) -> OrderBookSnapshot {
    let levels = |raw: Vec<RawLevel>| -> Vec<Quote> {
        raw.into_iter()
            .map(|l| Quote::new(Price::new(l.price), Size::new(l.size)))
            .collect()
    };
    let snapshot = OrderBookSnapshot::new(token, levels(raw.bids), levels(raw.asks));
    match raw.tick_size {
        Some(tick) if tick > Decimal::ZERO => snapshot.with_tick_size(Price::new(tick)),
        _ => snapshot,
    }
}

/// Order book source backed by the CLOB REST API.
pub struct BookClient {
    client: Client,
    base_url: String,
}

impl BookClient {
    /// # Arguments
    /// * `base_url` - CLOB root (e.g., "https://clob.polymarket.com")
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> RegistryResult<Self> {
        Ok(Self {
            client: build_client(timeout.unwrap_or(DEFAULT_TIMEOUT))?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn book_url(&self, token: &TokenId) -> String {
        format!("{}/book?token_id={}", self.base_url, token.as_str())
    }

    pub async fn fetch_book(&self, token: &TokenId) -> RegistryResult<OrderBookSnapshot> {
        let raw: BookResponse = get_json(&self.client, &self.book_url(token)).await?;
        let snapshot = snapshot_from_response(token.clone(), raw);
        debug!(
            token = %token.short(),
            bids = snapshot.bids().len(),
            asks = snapshot.asks().len(),
            state = ?snapshot.state(),
            "Fetched order book"
        );
        Ok(snapshot)
    }
}

impl OrderBookSource for BookClient {
    fn fetch<'a>(
        &'a self,
        token: &'a TokenId,
    ) -> BoxFuture<'a, flowbot_core::Result<OrderBookSnapshot>> {
        Box::pin(async move {
            self.fetch_book(token)
                .await
                .map_err(|e| CoreError::BookUnavailable(e.to_string()))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowbot_core::{BookState, OrderSide};
    use rust_decimal_macros::dec;

    fn token() -> TokenId {
        TokenId::parse("1001").unwrap()
    }

    #[test]
    fn test_book_response_with_string_prices() {
        let raw: BookResponse = serde_json::from_str(
            r#"{
                "market": "0xabc",
                "asset_id": "1001",
                "bids": [{"price": "0.38", "size": "50"}, {"price": "0.40", "size": "120.5"}],
                "asks": [{"price": "0.55", "size": "10"}, {"price": "0.50", "size": "20"}],
                "tick_size": "0.01",
                "min_order_size": "5"
            }"#,
        )
        .unwrap();

        let book = snapshot_from_response(token(), raw);

        assert_eq!(book.best_bid().unwrap().price.inner(), dec!(0.40));
        assert_eq!(book.best_ask().unwrap().price.inner(), dec!(0.50));
        assert_eq!(book.ladder(OrderSide::Buy)[1].size.inner(), dec!(10));
        assert_eq!(book.tick_size().unwrap().inner(), dec!(0.01));
        assert_eq!(book.state(), BookState::Valid);
    }

    #[test]
    fn test_book_response_with_numeric_prices() {
        let raw: BookResponse = serde_json::from_str(
            r#"{"bids": [{"price": 0.4, "size": 10}], "asks": [], "tick_size": null}"#,
        )
        .unwrap();

        let book = snapshot_from_response(token(), raw);

        assert_eq!(book.best_bid().unwrap().price.inner(), dec!(0.4));
        assert!(book.tick_size().is_none());
        assert_eq!(book.state(), BookState::NoAsk);
    }

    #[test]
    fn test_bad_level_is_parse_error() {
        let result: Result<BookResponse, _> =
            serde_json::from_str(r#"{"bids": [{"price": "abc", "size": "1"}]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_urls() {
        let books = BookClient::new("https://clob.example.com/", None).unwrap();
        assert_eq!(
            books.book_url(&token()),
            "https://clob.example.com/book?token_id=1001"
        );

        let directory = DirectoryClient::new("https://gamma.example.com", None).unwrap();
        assert_eq!(
            directory.markets_url(100),
            "https://gamma.example.com/markets?active=true&closed=false&limit=100"
        );
    }

    #[tokio::test]
    async fn test_unreachable_book_is_unavailable() {
        let books = BookClient::new("http://127.0.0.1:9", Some(Duration::from_millis(200))).unwrap();

        let err = books.fetch(&token()).await.unwrap_err();

        assert!(matches!(err, CoreError::BookUnavailable(_)));
    }
}
