//! Market identification and trading granularity.

use crate::decimal::{Price, Size};
use crate::error::{CoreError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Minimum length of a canonical outcome token id (exclusive).
pub const CANONICAL_TOKEN_MIN_LEN: usize = 50;

/// Outcome token identifier.
///
/// An opaque, long decimal string. Only the character set is checked on
/// construction; `is_canonical` additionally checks the venue's length.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TokenId(String);

impl TokenId {
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CoreError::InvalidToken(raw.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    /// True when the id has the length of a real venue token id.
    pub fn is_canonical(&self) -> bool {
        self.0.len() > CANONICAL_TOKEN_MIN_LEN
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Abbreviated form for log lines.
    pub fn short(&self) -> &str {
        let end = self.0.len().min(12);
        &self.0[..end]
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TokenId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for TokenId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<TokenId> for String {
    fn from(id: TokenId) -> Self {
        id.0
    }
}

/// Price and size granularity of one market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketSpec {
    /// Minimum price increment.
    #[serde(default = "default_tick_size")]
    pub tick_size: Price,
    /// Minimum size increment. Zero means sizes are not rounded.
    #[serde(default)]
    pub lot_size: Size,
}

fn default_tick_size() -> Price {
    Price::new(dec!(0.01))
}

impl Default for MarketSpec {
    fn default() -> Self {
        Self {
            tick_size: default_tick_size(),
            lot_size: Size::ZERO,
        }
    }
}

impl MarketSpec {
    pub fn new(tick_size: Price, lot_size: Size) -> Self {
        Self {
            tick_size,
            lot_size,
        }
    }

    pub fn with_tick_size(mut self, tick_size: Price) -> Self {
        self.tick_size = tick_size;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.tick_size.inner().is_sign_negative() {
            return Err(CoreError::InvalidPrice(format!(
                "tick_size must not be negative, got {}",
                self.tick_size
            )));
        }
        if self.lot_size.inner().is_sign_negative() {
            return Err(CoreError::InvalidSize(format!(
                "lot_size must not be negative, got {}",
                self.lot_size
            )));
        }
        Ok(())
    }
}

/// Inclusive band of prices the engine is allowed to trade at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBounds {
    #[serde(default = "default_min_price")]
    pub min: Price,
    #[serde(default = "default_max_price")]
    pub max: Price,
}

fn default_min_price() -> Price {
    Price::new(dec!(0.10))
}

fn default_max_price() -> Price {
    Price::new(dec!(0.90))
}

impl Default for PriceBounds {
    fn default() -> Self {
        Self {
            min: default_min_price(),
            max: default_max_price(),
        }
    }
}

impl PriceBounds {
    pub fn new(min: Decimal, max: Decimal) -> Self {
        Self {
            min: Price::new(min),
            max: Price::new(max),
        }
    }

    /// Bounds covering every valid outcome price.
    pub fn unbounded() -> Self {
        Self::new(Decimal::ZERO, Decimal::ONE)
    }

    #[inline]
    pub fn contains(&self, price: Price) -> bool {
        price >= self.min && price <= self.max
    }

    pub fn validate(&self) -> Result<()> {
        if self.min.inner().is_sign_negative() || self.min > self.max {
            return Err(CoreError::InvalidConfig(format!(
                "price_bounds must satisfy 0 <= min <= max, got [{}, {}]",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG_ID: &str =
        "71321045679252212594626385532706912750332728571942532289631379312455583992563";

    #[test]
    fn test_token_id_accepts_digits() {
        let id = TokenId::parse(LONG_ID).unwrap();
        assert!(id.is_canonical());
        assert_eq!(id.short(), "713210456792");
    }

    #[test]
    fn test_token_id_rejects_non_digits() {
        assert!(TokenId::parse("").is_err());
        assert!(TokenId::parse("0xabc").is_err());
        assert!(TokenId::parse("12 34").is_err());
    }

    #[test]
    fn test_short_token_id_is_not_canonical() {
        let id = TokenId::parse("1001").unwrap();
        assert!(!id.is_canonical());
        assert_eq!(id.short(), "1001");
    }

    #[test]
    fn test_token_id_deserialize_validates() {
        let ok: TokenId = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(ok.as_str(), "42");
        assert!(serde_json::from_str::<TokenId>("\"abc\"").is_err());
    }

    #[test]
    fn test_price_bounds() {
        let bounds = PriceBounds::default();
        assert!(bounds.contains(Price::new(dec!(0.10))));
        assert!(bounds.contains(Price::new(dec!(0.90))));
        assert!(!bounds.contains(Price::new(dec!(0.95))));
        assert!(PriceBounds::new(dec!(0.9), dec!(0.1)).validate().is_err());
    }

    #[test]
    fn test_market_spec_default() {
        let spec = MarketSpec::default();
        assert_eq!(spec.tick_size.inner(), dec!(0.01));
        assert!(spec.lot_size.is_zero());
        assert!(spec.validate().is_ok());
    }
}
