//! Budget-constrained randomized order-taking bot.
//!
//! Wires the trading loop to its ports:
//! - Token pool from CLI, environment, config file or the market directory
//! - Order books from the CLOB REST API
//! - Orders through the relay gateway, or the dry-run sink
//! - Optional console approval of each intent

pub mod app;
pub mod config;
pub mod confirm;
pub mod error;

pub use app::{resolve_pool, Application};
pub use config::{AppConfig, Overrides, VenueConfig};
pub use confirm::ConsoleConfirmer;
pub use error::{AppError, AppResult};
