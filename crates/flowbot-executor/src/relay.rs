//! HTTP order relay gateway.
//!
//! Posts one JSON order per intent to a relay endpoint that owns signing and
//! venue submission. The relay answers with the venue's order response
//! (`success`, `errorMsg`, `orderID`, `status`); only `status = "matched"`
//! counts as a fill.

use std::time::Duration;

use flowbot_core::{BoxFuture, ExecErrorKind, GatewayAck, TradeIntent};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ExecutorError, ExecutorResult};
use crate::gateway::ExecutionGateway;

/// Venue status of a fully matched order.
const MATCHED: &str = "matched";

/// Relay connection settings.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    pub order_url: String,
    /// Sent as a bearer token when set.
    pub api_key: Option<String>,
    pub timeout: Duration,
}

/// Order payload sent to the relay.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RelayOrder<'a> {
    token_id: &'a str,
    price: String,
    size: String,
    side: &'static str,
    order_type: &'static str,
    client_order_id: &'a str,
}

impl<'a> RelayOrder<'a> {
    fn from_intent(intent: &'a TradeIntent) -> Self {
        Self {
            token_id: intent.token().as_str(),
            price: intent.price().to_string(),
            size: intent.size().to_string(),
            side: intent.side().as_venue_str(),
            order_type: intent.tif().as_venue_str(),
            client_order_id: intent.id().as_str(),
        }
    }
}

/// Venue order response.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RelayResponse {
    #[serde(default)]
    success: bool,
    #[serde(rename = "errorMsg", default)]
    error_msg: Option<String>,
    #[serde(rename = "orderID", default)]
    order_id: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

/// Map a non-success HTTP status to an error kind.
pub(crate) fn classify_status(status: StatusCode, body: &str) -> ExecErrorKind {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return ExecErrorKind::RateLimited;
    }
    if status.is_server_error() {
        return ExecErrorKind::Server {
            status: status.as_u16(),
            message: body.to_string(),
        };
    }
    if status.is_client_error() {
        let lower = body.to_ascii_lowercase();
        if lower.contains("balance") || lower.contains("allowance") {
            return ExecErrorKind::InsufficientBalance(body.to_string());
        }
        return ExecErrorKind::InvalidParams(format!("HTTP {status}: {body}"));
    }
    ExecErrorKind::Unclassified(format!("HTTP {status}: {body}"))
}

/// Map a parsed relay response to an ack or an error kind.
pub(crate) fn classify_response(
    response: RelayResponse,
    intent: &TradeIntent,
) -> Result<GatewayAck, ExecErrorKind> {
    if !response.success {
        let message = response
            .error_msg
            .unwrap_or_else(|| "Unknown error".to_string());
        let lower = message.to_ascii_lowercase();
        if lower.contains("balance") || lower.contains("allowance") {
            return Err(ExecErrorKind::InsufficientBalance(message));
        }
        return Err(ExecErrorKind::Rejected(message));
    }

    match response.status.as_deref() {
        Some(status) if status.eq_ignore_ascii_case(MATCHED) => Ok(GatewayAck {
            order_id: response
                .order_id
                .unwrap_or_else(|| intent.id().to_string()),
        }),
        other => Err(ExecErrorKind::NotFilled(
            other.unwrap_or("missing").to_string(),
        )),
    }
}

fn classify_transport(err: &reqwest::Error) -> ExecErrorKind {
    if err.is_timeout() {
        ExecErrorKind::Timeout
    } else if err.is_connect() || err.is_request() {
        ExecErrorKind::Network(err.to_string())
    } else if err.is_decode() {
        ExecErrorKind::Unclassified(format!("Failed to parse response: {err}"))
    } else {
        ExecErrorKind::Network(err.to_string())
    }
}

/// Live gateway posting to the order relay.
pub struct RelayGateway {
    client: Client,
    config: RelayConfig,
}

impl RelayGateway {
    pub fn new(config: RelayConfig) -> ExecutorResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ExecutorError::HttpClient(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    pub fn order_url(&self) -> &str {
        &self.config.order_url
    }

    async fn post(&self, intent: &TradeIntent) -> Result<GatewayAck, ExecErrorKind> {
        let order = RelayOrder::from_intent(intent);
        debug!(
            url = %self.config.order_url,
            intent_id = %intent.id(),
            price = %order.price,
            size = %order.size,
            side = order.side,
            "Posting order to relay"
        );

        let mut request = self.client.post(&self.config.order_url).json(&order);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await.map_err(|e| classify_transport(&e))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let kind = classify_status(status, &body);
            warn!(%status, intent_id = %intent.id(), error = %kind, "Relay returned error status");
            return Err(kind);
        }

        let parsed: RelayResponse = response.json().await.map_err(|e| classify_transport(&e))?;
        classify_response(parsed, intent)
    }
}

impl ExecutionGateway for RelayGateway {
    fn submit<'a>(
        &'a self,
        intent: &'a TradeIntent,
    ) -> BoxFuture<'a, Result<GatewayAck, ExecErrorKind>> {
        Box::pin(self.post(intent))
    }

    fn name(&self) -> &'static str {
        "relay"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowbot_core::{IntentConstraints, OrderSide, Price, PriceBounds, Size, TokenId};
    use rust_decimal_macros::dec;

    fn intent() -> TradeIntent {
        TradeIntent::new(
            TokenId::parse("123456").unwrap(),
            OrderSide::Sell,
            Price::new(dec!(0.40)),
            Size::new(dec!(5)),
            1,
            &IntentConstraints {
                min_order_value: dec!(1),
                bounds: PriceBounds::default(),
            },
        )
        .unwrap()
    }

    fn response(json: &str) -> RelayResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_order_payload() {
        let intent = intent();
        let value = serde_json::to_value(RelayOrder::from_intent(&intent)).unwrap();

        assert_eq!(value["tokenId"], "123456");
        assert_eq!(value["price"], "0.40");
        assert_eq!(value["size"], "5");
        assert_eq!(value["side"], "SELL");
        assert_eq!(value["orderType"], "FAK");
        assert_eq!(value["clientOrderId"], intent.id().as_str());
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ExecErrorKind::RateLimited
        );
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, "upstream"),
            ExecErrorKind::Server { status: 502, .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, "not enough balance / allowance"),
            ExecErrorKind::InsufficientBalance(_)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_REQUEST, "invalid tick size"),
            ExecErrorKind::InvalidParams(_)
        ));
        assert!(classify_status(StatusCode::SERVICE_UNAVAILABLE, "").is_retryable());
        assert!(!classify_status(StatusCode::UNAUTHORIZED, "").is_retryable());
    }

    #[test]
    fn test_classify_matched_response() {
        let intent = intent();
        let ack = classify_response(
            response(r#"{"success": true, "orderID": "0xabc", "status": "matched"}"#),
            &intent,
        )
        .unwrap();
        assert_eq!(ack.order_id, "0xabc");
    }

    #[test]
    fn test_unmatched_ioc_is_not_filled() {
        let intent = intent();
        let err = classify_response(
            response(r#"{"success": true, "orderID": "0xabc", "status": "unmatched"}"#),
            &intent,
        )
        .unwrap_err();
        assert_eq!(err, ExecErrorKind::NotFilled("unmatched".to_string()));
        assert!(!err.is_retryable());

        let missing = classify_response(response(r#"{"success": true}"#), &intent).unwrap_err();
        assert!(matches!(missing, ExecErrorKind::NotFilled(_)));
    }

    #[test]
    fn test_unsuccessful_response_is_rejected() {
        let intent = intent();
        let err = classify_response(
            response(r#"{"success": false, "errorMsg": "order crosses book"}"#),
            &intent,
        )
        .unwrap_err();
        assert_eq!(err, ExecErrorKind::Rejected("order crosses book".to_string()));

        let balance = classify_response(
            response(r#"{"success": false, "errorMsg": "not enough balance"}"#),
            &intent,
        )
        .unwrap_err();
        assert!(matches!(balance, ExecErrorKind::InsufficientBalance(_)));
    }

    #[test]
    fn test_relay_gateway_builds() {
        let gateway = RelayGateway::new(RelayConfig {
            order_url: "http://127.0.0.1:9/order".to_string(),
            api_key: None,
            timeout: Duration::from_secs(1),
        })
        .unwrap();
        assert_eq!(gateway.order_url(), "http://127.0.0.1:9/order");
        assert_eq!(gateway.name(), "relay");
    }
}
