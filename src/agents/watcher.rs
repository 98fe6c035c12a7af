//! Watcher Agent — Market State.
//!
//! Maintains a real-time local replica of the Kalshi orderbook for every
//! subscribed market, fed by [`crate::kalshi::ws::KalshiWsClient`]. Brain
//! reads this cache directly — no queue hop needed for current best
//! bid/ask — while a copy of every update is also published to the bus for
//! anything else that wants the stream.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::bus::BusHandle;
use crate::kalshi::{KalshiAuth, KalshiWsClient, WsSubscribeHandle};
use crate::models::MarketUpdate;

pub type MarketCache = Arc<RwLock<HashMap<String, MarketUpdate>>>;

pub struct WatcherAgent {
    cache: MarketCache,
    ws: KalshiWsClient,
}

impl WatcherAgent {
    pub fn new(ws_url: String, auth: Arc<KalshiAuth>, bus: BusHandle) -> Self {
        let cache: MarketCache = Arc::new(RwLock::new(HashMap::new()));
        let cache_for_callback = cache.clone();
        let ws = KalshiWsClient::new(ws_url, auth, move |update: MarketUpdate| {
            cache_for_callback.write().insert(update.market_ticker.clone(), update.clone());
            bus.publish_market_update(update);
        });
        Self { cache, ws }
    }

    pub fn cache(&self) -> MarketCache {
        self.cache.clone()
    }

    pub fn subscribe_handle(&self) -> WsSubscribeHandle {
        self.ws.subscribe_handle()
    }

    pub fn seed_subscriptions(&self, tickers: Vec<String>) {
        self.ws.seed_subscriptions(tickers);
    }

    pub async fn run(mut self) {
        tracing::info!("watcher agent starting kalshi websocket stream");
        self.ws.run().await;
    }
}

/// Read the most recent [`MarketUpdate`] for a ticker. O(1), never awaits —
/// safe to call from Brain's hot path.
pub fn get_latest(cache: &MarketCache, ticker: &str) -> Option<MarketUpdate> {
    cache.read().get(ticker).cloned()
}

/// Inject a REST-fetched snapshot into the cache — used by Brain's
/// fallback path when the WS hasn't delivered one yet.
pub fn insert(cache: &MarketCache, update: MarketUpdate) {
    cache.write().insert(update.market_ticker.clone(), update);
}
