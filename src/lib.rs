//! Autonomous trading agent for the gSwap concentrated-liquidity DEX:
//! periodic dollar-cost averaging into a preferred token plus circular
//! arbitrage simulated offline against cached pool snapshots.

pub mod balances;
pub mod bundler;
pub mod config;
pub mod detector;
pub mod engine;
pub mod errors;
pub mod executor;
pub mod pathfinder;
pub mod pool_cache;
pub mod profit;
pub mod quoter;
pub mod registry;
pub mod server;
pub mod signer;
pub mod transport;
pub mod types;
