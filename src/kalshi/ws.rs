//! Kalshi WebSocket client — real-time orderbook replica.
//!
//! Persistent connection with exponential backoff reconnect (0.5s, doubling,
//! capped at 5s, reset on a clean connect), app-layer ping every 20s with a
//! 10s pong timeout, full re-subscribe on reconnect, and sequence-gap
//! detection (logged only — no auto-refetch; see SPEC_FULL.md §4.6/§9).
//!
//! Mid-session `subscribe()` calls are delivered to the live connection
//! through a command channel so a caller never has to wait for the next
//! incoming message, following the same shape as a polling-cache client
//! that owns its socket and takes commands over an mpsc channel.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;

use super::auth::KalshiAuth;
use crate::models::MarketUpdate;

const PING_INTERVAL: Duration = Duration::from_secs(20);
const PONG_TIMEOUT: Duration = Duration::from_secs(10);
const INITIAL_BACKOFF: Duration = Duration::from_millis(500);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

enum WsCommand {
    Subscribe(Vec<String>),
}

/// Handle passed to callers that need to subscribe tickers at runtime
/// (Brain, once it has matched a game to Kalshi markets).
#[derive(Clone)]
pub struct WsSubscribeHandle {
    cmd_tx: mpsc::UnboundedSender<WsCommand>,
    subscribed: Arc<RwLock<HashSet<String>>>,
}

impl WsSubscribeHandle {
    pub fn subscribe(&self, tickers: Vec<String>) {
        let new_tickers: Vec<String> = {
            let subscribed = self.subscribed.read();
            tickers
                .into_iter()
                .filter(|t| !subscribed.contains(t))
                .collect()
        };
        if new_tickers.is_empty() {
            return;
        }
        {
            let mut subscribed = self.subscribed.write();
            for t in &new_tickers {
                subscribed.insert(t.clone());
            }
        }
        if self.cmd_tx.send(WsCommand::Subscribe(new_tickers)).is_err() {
            tracing::warn!("kalshi ws command channel closed — subscription dropped");
        }
    }
}

#[derive(Debug, Deserialize)]
struct WsEnvelope {
    #[serde(rename = "type")]
    msg_type: String,
    #[serde(default)]
    msg: serde_json::Value,
}

#[derive(Debug, Default, Deserialize)]
struct OrderbookMsg {
    market_ticker: Option<String>,
    #[serde(default)]
    seq: u64,
    #[serde(default)]
    yes: Vec<(i32, i32)>,
    #[serde(default)]
    no: Vec<(i32, i32)>,
}

pub struct KalshiWsClient {
    ws_url: String,
    auth: Arc<KalshiAuth>,
    subscribed: Arc<RwLock<HashSet<String>>>,
    last_seq: HashMap<String, u64>,
    cmd_tx: mpsc::UnboundedSender<WsCommand>,
    cmd_rx: mpsc::UnboundedReceiver<WsCommand>,
    on_update: Box<dyn Fn(MarketUpdate) + Send + Sync>,
}

impl KalshiWsClient {
    pub fn new(
        ws_url: String,
        auth: Arc<KalshiAuth>,
        on_update: impl Fn(MarketUpdate) + Send + Sync + 'static,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        Self {
            ws_url,
            auth,
            subscribed: Arc::new(RwLock::new(HashSet::new())),
            last_seq: HashMap::new(),
            cmd_tx,
            cmd_rx,
            on_update: Box::new(on_update),
        }
    }

    pub fn subscribe_handle(&self) -> WsSubscribeHandle {
        WsSubscribeHandle {
            cmd_tx: self.cmd_tx.clone(),
            subscribed: self.subscribed.clone(),
        }
    }

    /// Seed the initial subscription set before the first connect (for
    /// markets already known at startup). After the connection is live,
    /// use [`WsSubscribeHandle::subscribe`] instead.
    pub fn seed_subscriptions(&self, tickers: Vec<String>) {
        self.subscribed.write().extend(tickers);
    }

    /// Run forever, reconnecting with exponential backoff on any error.
    pub async fn run(&mut self) {
        let mut backoff = INITIAL_BACKOFF;
        loop {
            match self.connect_and_consume().await {
                Ok(()) => backoff = INITIAL_BACKOFF,
                Err(err) => {
                    tracing::warn!(error = %err, backoff_ms = backoff.as_millis(), "kalshi websocket error — reconnecting");
                }
            }
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }

    async fn connect_and_consume(&mut self) -> anyhow::Result<()> {
        let ws_path = reqwest::Url::parse(&self.ws_url)
            .map(|u| u.path().to_string())
            .unwrap_or_else(|_| "/".to_string());
        let headers = self.auth.headers("GET", &ws_path);

        let mut request = self.ws_url.as_str().into_client_request()?;
        for (name, value) in headers {
            request
                .headers_mut()
                .insert(name, HeaderValue::from_str(&value)?);
        }

        let (ws_stream, _) = tokio_tungstenite::connect_async(request).await?;
        tracing::info!("kalshi websocket connected");
        let (mut write, mut read) = ws_stream.split();

        let initial: Vec<String> = self.subscribed.read().iter().cloned().collect();
        if !initial.is_empty() {
            send_subscription(&mut write, &initial).await?;
        }

        let mut ping_interval = tokio::time::interval(PING_INTERVAL);
        ping_interval.tick().await; // first tick fires immediately

        loop {
            tokio::select! {
                _ = ping_interval.tick() => {
                    write.send(Message::Ping(Vec::new())).await?;
                }
                cmd = self.cmd_rx.recv() => {
                    match cmd {
                        Some(WsCommand::Subscribe(tickers)) => {
                            send_subscription(&mut write, &tickers).await?;
                        }
                        None => {}
                    }
                }
                msg = tokio::time::timeout(PONG_TIMEOUT + PING_INTERVAL, read.next()) => {
                    let msg = match msg {
                        Ok(Some(Ok(m))) => m,
                        Ok(Some(Err(e))) => return Err(e.into()),
                        Ok(None) => return Err(anyhow::anyhow!("kalshi websocket stream ended")),
                        Err(_) => return Err(anyhow::anyhow!("kalshi websocket pong timeout")),
                    };
                    match msg {
                        Message::Text(text) => self.handle_message(&text),
                        Message::Close(_) => return Err(anyhow::anyhow!("kalshi websocket closed by peer")),
                        _ => {}
                    }
                }
            }
        }
    }

    fn handle_message(&mut self, raw: &str) {
        let received_at_ns = crate::util::monotonic_ns();
        let envelope: WsEnvelope = match serde_json::from_str(raw) {
            Ok(e) => e,
            Err(_) => {
                tracing::warn!(raw = %truncate(raw, 80), "malformed kalshi ws message");
                return;
            }
        };
        if envelope.msg_type != "orderbook_snapshot" && envelope.msg_type != "orderbook_delta" {
            return;
        }
        let data: OrderbookMsg = match serde_json::from_value(envelope.msg) {
            Ok(d) => d,
            Err(_) => return,
        };
        let Some(ticker) = data.market_ticker else { return };

        let last = self.last_seq.get(&ticker).copied();
        if let Some(last) = last {
            if envelope.msg_type == "orderbook_delta" && data.seq != last + 1 {
                tracing::warn!(
                    ticker = %ticker,
                    expected = last + 1,
                    got = data.seq,
                    "sequence gap on kalshi orderbook — orderbook may be stale"
                );
            }
        }
        self.last_seq.insert(ticker.clone(), data.seq);

        let yes_ask = best_ask(&data.yes);
        let yes_bid = best_bid(&data.yes);
        let no_ask = best_ask(&data.no);
        let no_bid = best_bid(&data.no);
        let yes_volume = yes_ask.and_then(|ask| volume_at(&data.yes, ask)).unwrap_or(0);

        let update = MarketUpdate {
            market_ticker: ticker,
            yes_bid: yes_bid.unwrap_or(0),
            yes_ask: yes_ask.unwrap_or(100),
            no_bid: no_bid.unwrap_or(0),
            no_ask: no_ask.unwrap_or(100),
            yes_volume,
            sequence: data.seq,
            received_at_ns,
        };
        (self.on_update)(update);
    }
}

async fn send_subscription(
    write: &mut (impl SinkExt<Message, Error = tokio_tungstenite::tungstenite::Error> + Unpin),
    tickers: &[String],
) -> anyhow::Result<()> {
    if tickers.is_empty() {
        return Ok(());
    }
    let msg = serde_json::json!({
        "id": uuid::Uuid::new_v4().to_string(),
        "cmd": "subscribe",
        "params": {
            "channels": ["orderbook_delta"],
            "market_tickers": tickers,
        }
    });
    write.send(Message::Text(msg.to_string())).await?;
    tracing::info!(count = tickers.len(), "subscribed to kalshi orderbook channels");
    Ok(())
}

fn best_ask(levels: &[(i32, i32)]) -> Option<i32> {
    levels.iter().filter(|(_, q)| *q > 0).map(|(p, _)| *p).min()
}

fn best_bid(levels: &[(i32, i32)]) -> Option<i32> {
    levels.iter().filter(|(_, q)| *q > 0).map(|(p, _)| *p).max()
}

fn volume_at(levels: &[(i32, i32)], price: i32) -> Option<i32> {
    levels.iter().find(|(p, _)| *p == price).map(|(_, q)| *q)
}

fn truncate(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_ask_ignores_zero_quantity_levels() {
        let levels = vec![(40, 0), (45, 10), (50, 3)];
        assert_eq!(best_ask(&levels), Some(45));
    }

    #[test]
    fn best_bid_picks_highest_nonzero_level() {
        let levels = vec![(10, 5), (20, 0), (15, 2)];
        assert_eq!(best_bid(&levels), Some(15));
    }

    #[test]
    fn volume_at_returns_quantity_for_matching_price() {
        let levels = vec![(45, 10), (50, 3)];
        assert_eq!(volume_at(&levels, 45), Some(10));
        assert_eq!(volume_at(&levels, 99), None);
    }
}
