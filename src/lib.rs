//! Arbitrage agent for a two-stablecoin constant-product pool.
//!
//! Pool events are funnelled through a single-flight queue; each queued
//! cycle re-reads the reserves, checks the price divergence, sizes one
//! corrective swap and executes it.

pub mod agent;
pub mod arbitrage;
pub mod config;
pub mod dex;
pub mod errors;
pub mod events;
pub mod models;
pub mod queue;
pub mod utils;
