//! Integration tests for flowbot-bot.
//!
//! These tests run the trading loop against a mock venue over real HTTP:
//! - Token pool discovery from the market directory
//! - Book fetches and order submission through the relay
//! - Dry-run sessions

pub mod common;
