//! Event-driven sports-totals trading pipeline.
//!
//! Five agents communicate over a bounded, best-effort in-process bus:
//! Oracle ingests live scores, Watcher replicates the Kalshi orderbook,
//! Brain turns the two into trade signals, Sniper executes them, and
//! Shield tracks the resulting risk.

pub mod agents;
pub mod bus;
pub mod config;
pub mod kalshi;
pub mod models;
pub mod risk;
pub mod sports;
pub mod strategy;
pub mod util;
