//! Market discovery and order book source for flowbot.
//!
//! - `DirectoryClient`: Active markets from a Gamma-style `/markets` endpoint
//! - `tradable_tokens`: Filters directory markets down to a validated token pool
//! - `BookClient`: CLOB `/book` snapshots behind the `OrderBookSource` port

pub mod client;
pub mod directory;
pub mod error;

pub use client::{BookClient, DirectoryClient};
pub use directory::{parse_token_list, tradable_tokens, DirectoryMarket};
pub use error::{RegistryError, RegistryResult};
