//! Market directory records and the tradable-token filter.

use std::collections::HashSet;

use flowbot_core::TokenId;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use tracing::debug;

use crate::error::{RegistryError, RegistryResult};

/// One market as listed by the directory.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectoryMarket {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub question: String,
    /// Outcome token ids. The directory sends either a list or a JSON-encoded
    /// list inside a string.
    #[serde(rename = "clobTokenIds", default, deserialize_with = "de_token_ids")]
    pub clob_token_ids: Vec<String>,
    #[serde(default)]
    pub active: bool,
    #[serde(default = "default_closed")]
    pub closed: bool,
    #[serde(rename = "enableOrderBook", default)]
    pub enable_order_book: bool,
}

/// Missing `closed` is treated as closed.
fn default_closed() -> bool {
    true
}

impl DirectoryMarket {
    pub fn is_tradable(&self) -> bool {
        self.active && !self.closed && self.enable_order_book
    }
}

fn de_token_ids<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Value::deserialize(deserializer)?;
    Ok(token_ids_from_value(&raw))
}

fn token_ids_from_value(raw: &Value) -> Vec<String> {
    match raw {
        Value::String(encoded) => match serde_json::from_str::<Value>(encoded) {
            Ok(Value::Array(items)) => items.iter().filter_map(scalar_to_string).collect(),
            _ => {
                debug!(value = %encoded, "Failed to decode clobTokenIds string");
                Vec::new()
            }
        },
        Value::Array(items) => items.iter().filter_map(scalar_to_string).collect(),
        _ => Vec::new(),
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Token pool from directory markets.
///
/// Keeps tokens of markets that are active, open and have an order book.
/// Ids must be all digits; `strict` additionally requires the canonical
/// length. Duplicates are dropped, first occurrence wins.
pub fn tradable_tokens(markets: &[DirectoryMarket], strict: bool) -> Vec<TokenId> {
    let mut seen = HashSet::new();
    let mut pool = Vec::new();

    for market in markets.iter().filter(|m| m.is_tradable()) {
        for raw in &market.clob_token_ids {
            let token = match TokenId::parse(raw) {
                Ok(token) if !strict || token.is_canonical() => token,
                _ => {
                    debug!(market = %market.id, token = %raw, "Dropping invalid token id");
                    continue;
                }
            };
            if seen.insert(token.clone()) {
                pool.push(token);
            }
        }
    }
    pool
}

/// Parse a comma or whitespace separated token list (CLI and env input).
pub fn parse_token_list(input: &str) -> RegistryResult<Vec<TokenId>> {
    let mut seen = HashSet::new();
    let mut pool = Vec::new();
    for raw in input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
    {
        let token =
            TokenId::parse(raw).map_err(|e| RegistryError::InvalidToken(format!("{raw}: {e}")))?;
        if seen.insert(token.clone()) {
            pool.push(token);
        }
    }
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG_A: &str =
        "71321045679252212594626385532706912750332728571942532289631379312455583992563";
    const LONG_B: &str =
        "52114319501245915516055106046884209969926127482827954674443846427813813222426";

    fn markets(json: &str) -> Vec<DirectoryMarket> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_token_ids_as_encoded_string_or_list() {
        let parsed = markets(&format!(
            r#"[
                {{"id": "1", "clobTokenIds": "[\"{LONG_A}\", \"{LONG_B}\"]"}},
                {{"id": "2", "clobTokenIds": ["{LONG_A}", 12345]}},
                {{"id": "3", "clobTokenIds": "not json"}},
                {{"id": "4"}}
            ]"#
        ));

        assert_eq!(parsed[0].clob_token_ids, vec![LONG_A, LONG_B]);
        assert_eq!(parsed[1].clob_token_ids, vec![LONG_A.to_string(), "12345".to_string()]);
        assert!(parsed[2].clob_token_ids.is_empty());
        assert!(parsed[3].clob_token_ids.is_empty());
        assert!(parsed[3].closed);
    }

    #[test]
    fn test_filter_requires_active_open_with_book() {
        let parsed = markets(&format!(
            r#"[
                {{"id": "1", "active": true, "closed": false, "enableOrderBook": true,
                  "clobTokenIds": ["{LONG_A}"]}},
                {{"id": "2", "active": true, "closed": true, "enableOrderBook": true,
                  "clobTokenIds": ["{LONG_B}"]}},
                {{"id": "3", "active": false, "closed": false, "enableOrderBook": true,
                  "clobTokenIds": ["{LONG_B}"]}},
                {{"id": "4", "active": true, "closed": false, "enableOrderBook": false,
                  "clobTokenIds": ["{LONG_B}"]}}
            ]"#
        ));

        let pool = tradable_tokens(&parsed, true);

        assert_eq!(pool, vec![TokenId::parse(LONG_A).unwrap()]);
    }

    #[test]
    fn test_filter_validates_and_dedupes() {
        let parsed = markets(&format!(
            r#"[
                {{"id": "1", "active": true, "closed": false, "enableOrderBook": true,
                  "clobTokenIds": ["{LONG_B}", "0xdeadbeef", "777", "{LONG_A}"]}},
                {{"id": "2", "active": true, "closed": false, "enableOrderBook": true,
                  "clobTokenIds": ["{LONG_A}"]}}
            ]"#
        ));

        let strict = tradable_tokens(&parsed, true);
        assert_eq!(
            strict,
            vec![TokenId::parse(LONG_B).unwrap(), TokenId::parse(LONG_A).unwrap()]
        );

        let lenient = tradable_tokens(&parsed, false);
        assert_eq!(lenient.len(), 3);
        assert_eq!(lenient[1].as_str(), "777");
    }

    #[test]
    fn test_parse_token_list() {
        let pool = parse_token_list("101, 202 101\n303").unwrap();
        let ids: Vec<&str> = pool.iter().map(|t| t.as_str()).collect();
        assert_eq!(ids, vec!["101", "202", "303"]);

        assert!(parse_token_list("").unwrap().is_empty());
        assert!(matches!(
            parse_token_list("101,abc"),
            Err(RegistryError::InvalidToken(_))
        ));
    }
}
