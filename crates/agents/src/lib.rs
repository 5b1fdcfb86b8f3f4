//! # Sentinel Agents
//!
//! The leaf and coordinator agents of the network: analysis specialists,
//! the info distributor, the datastore agent over SQLite, paper execution
//! venues, the trade executor and the user-facing agent.

mod datastore_agent;
mod distributor;
mod feed;
mod oracles;
mod specialists;
mod store;
mod trade;
mod user;
mod venues;

pub use datastore_agent::DataStoreAgent;
pub use distributor::InfoDistributor;
pub use feed::{FeedError, MarketFeed, StaticFeed, UNISWAP_V2_ROUTER};
pub use oracles::{oracle_from_config, HttpOracle, MockOracle};
pub use specialists::*;
pub use store::{SqliteDatastore, TABLES};
pub use trade::{TradeExecutor, MAX_UINT256};
pub use user::UserAgent;
pub use venues::{ExchangeAgent, WalletAgent};
