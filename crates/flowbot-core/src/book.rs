//! Order book snapshots and the order book source port.
//!
//! A snapshot is immutable once built; planning rounds derive new snapshots with
//! `without_prices` instead of mutating one in place.

use crate::decimal::{Price, Size};
use crate::error::{CoreError, Result};
use crate::market::TokenId;
use crate::order::OrderSide;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Boxed future for dyn-compatible async trait methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

/// One ladder level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quote {
    pub price: Price,
    pub size: Size,
}

impl Quote {
    pub fn new(price: Price, size: Size) -> Self {
        Self { price, size }
    }

    /// Cost of taking the whole level.
    pub fn notional(&self) -> Decimal {
        self.size.notional(self.price)
    }
}

/// Shape of the top of the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookState {
    /// Both sides present and best bid < best ask.
    Valid,
    NoBid,
    NoAsk,
    Empty,
    /// Best bid >= best ask.
    Crossed,
}

impl BookState {
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Whether the ladder taken by `side` can be walked in this state.
    ///
    /// A crossed book is never walkable.
    pub fn allows(&self, side: OrderSide) -> bool {
        match (self, side) {
            (Self::Valid, _) => true,
            (Self::NoBid, OrderSide::Buy) => true,
            (Self::NoAsk, OrderSide::Sell) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for BookState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Valid => write!(f, "VALID"),
            Self::NoBid => write!(f, "NO_BID"),
            Self::NoAsk => write!(f, "NO_ASK"),
            Self::Empty => write!(f, "EMPTY"),
            Self::Crossed => write!(f, "CROSSED"),
        }
    }
}

/// Read-only view of both ladders of one token at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBookSnapshot {
    token: TokenId,
    /// Descending by price.
    bids: Vec<Quote>,
    /// Ascending by price.
    asks: Vec<Quote>,
    tick_size: Option<Price>,
    fetched_at: DateTime<Utc>,
}

impl OrderBookSnapshot {
    /// Build a snapshot from unordered levels.
    ///
    /// Levels with a non-positive price or size are dropped and both ladders are
    /// sorted best-first.
    pub fn new(token: TokenId, bids: Vec<Quote>, asks: Vec<Quote>) -> Self {
        let mut bids: Vec<Quote> = bids.into_iter().filter(is_live).collect();
        let mut asks: Vec<Quote> = asks.into_iter().filter(is_live).collect();
        bids.sort_by(|a, b| b.price.cmp(&a.price));
        asks.sort_by(|a, b| a.price.cmp(&b.price));
        Self {
            token,
            bids,
            asks,
            tick_size: None,
            fetched_at: Utc::now(),
        }
    }

    pub fn with_tick_size(mut self, tick_size: Price) -> Self {
        self.tick_size = Some(tick_size);
        self
    }

    pub fn token(&self) -> &TokenId {
        &self.token
    }

    pub fn bids(&self) -> &[Quote] {
        &self.bids
    }

    pub fn asks(&self) -> &[Quote] {
        &self.asks
    }

    /// Tick size reported by the venue with this book, if any.
    pub fn tick_size(&self) -> Option<Price> {
        self.tick_size
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn best_bid(&self) -> Option<&Quote> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&Quote> {
        self.asks.first()
    }

    /// Ladder consumed by an order on `side`: asks for BUY, bids for SELL.
    pub fn ladder(&self, side: OrderSide) -> &[Quote] {
        match side {
            OrderSide::Buy => &self.asks,
            OrderSide::Sell => &self.bids,
        }
    }

    pub fn state(&self) -> BookState {
        match (self.best_bid(), self.best_ask()) {
            (None, None) => BookState::Empty,
            (Some(_), None) => BookState::NoAsk,
            (None, Some(_)) => BookState::NoBid,
            (Some(bid), Some(ask)) => {
                if bid.price < ask.price {
                    BookState::Valid
                } else {
                    BookState::Crossed
                }
            }
        }
    }

    /// Midpoint of best bid and best ask. `None` unless the book is valid.
    pub fn mid(&self) -> Option<Decimal> {
        if !self.state().is_valid() {
            return None;
        }
        let bid = self.best_bid()?.price.inner();
        let ask = self.best_ask()?.price.inner();
        Some((bid + ask) / Decimal::TWO)
    }

    /// Best ask minus best bid. `None` unless the book is valid.
    pub fn spread(&self) -> Option<Decimal> {
        if !self.state().is_valid() {
            return None;
        }
        Some(self.best_ask()?.price.inner() - self.best_bid()?.price.inner())
    }

    /// A copy of this snapshot with the given price levels removed from the
    /// ladder consumed by `side`.
    pub fn without_prices(&self, side: OrderSide, prices: &[Price]) -> Self {
        let mut next = self.clone();
        let ladder = match side {
            OrderSide::Buy => &mut next.asks,
            OrderSide::Sell => &mut next.bids,
        };
        ladder.retain(|q| !prices.contains(&q.price));
        next
    }
}

fn is_live(quote: &Quote) -> bool {
    quote.price.is_positive() && quote.size.is_positive()
}

/// Source of order book snapshots.
pub trait OrderBookSource: Send + Sync {
    /// Fetch a fresh snapshot for `token`.
    fn fetch<'a>(&'a self, token: &'a TokenId) -> BoxFuture<'a, Result<OrderBookSnapshot>>;
}

/// Scripted order book source.
///
/// Each token holds a queue of snapshots; a fetch pops the front until a single
/// snapshot is left, which is then returned on every later fetch.
#[derive(Debug, Default)]
pub struct StaticBookSource {
    books: Mutex<HashMap<TokenId, VecDeque<OrderBookSnapshot>>>,
    fetches: AtomicUsize,
}

impl StaticBookSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a snapshot for its token.
    pub fn push(&self, snapshot: OrderBookSnapshot) {
        self.books
            .lock()
            .entry(snapshot.token().clone())
            .or_default()
            .push_back(snapshot);
    }

    pub fn with_book(self, snapshot: OrderBookSnapshot) -> Self {
        self.push(snapshot);
        self
    }

    /// Number of fetches served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl OrderBookSource for StaticBookSource {
    fn fetch<'a>(&'a self, token: &'a TokenId) -> BoxFuture<'a, Result<OrderBookSnapshot>> {
        Box::pin(async move {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            let mut books = self.books.lock();
            let queue = books
                .get_mut(token)
                .ok_or_else(|| CoreError::BookUnavailable(format!("no book for {token}")))?;
            let snapshot = if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            };
            snapshot.ok_or_else(|| CoreError::BookUnavailable(format!("no book for {token}")))
        })
    }
}
