//! Kalshi REST client.
//!
//! A single `reqwest::Client` is shared for all requests. The connection is
//! pre-warmed at startup and kept alive via a periodic keepalive ping so
//! the Sniper's hot path never pays a TCP/TLS handshake.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use super::auth::KalshiAuth;
use crate::models::Side;

#[derive(Debug, Clone, Deserialize)]
pub struct KalshiMarket {
    pub ticker: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub yes_bid: Option<i32>,
    #[serde(default)]
    pub yes_ask: Option<i32>,
    #[serde(default)]
    pub no_bid: Option<i32>,
    #[serde(default)]
    pub no_ask: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct MarketsResponse {
    #[serde(default)]
    markets: Vec<KalshiMarket>,
}

#[derive(Debug, Deserialize)]
struct MarketResponse {
    market: KalshiMarket,
}

#[derive(Debug, Serialize)]
struct PlaceOrderBody<'a> {
    ticker: &'a str,
    action: &'a str,
    #[serde(rename = "type")]
    order_type: &'a str,
    side: &'a str,
    count: i32,
    limit_price: i32,
    client_order_id: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OrderAck {
    pub order: OrderAckInner,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct OrderAckInner {
    #[serde(default)]
    pub order_id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub count_filled: i32,
    #[serde(default)]
    pub avg_price: Option<i32>,
}

pub struct KalshiRestClient {
    base_url: String,
    sign_prefix: String,
    auth: Arc<KalshiAuth>,
    http: reqwest::Client,
}

impl KalshiRestClient {
    /// Build the client and open/keep-warm the connection pool. DNS is
    /// resolved up front (reqwest resolves on first connect; we force that
    /// connect here with a cheap status call) so the hot path never blocks
    /// on a resolver. `auth` is shared with the Watcher's websocket client.
    pub async fn connect(base_url: &str, auth: Arc<KalshiAuth>) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        let sign_prefix = reqwest::Url::parse(&base_url)
            .context("invalid kalshi base url")?
            .path()
            .trim_end_matches('/')
            .to_string();

        let http = reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(60))
            .timeout(Duration::from_secs(5))
            .connect_timeout(Duration::from_secs(2))
            .build()
            .context("failed to build kalshi http client")?;

        let client = Self {
            base_url,
            sign_prefix,
            auth,
            http,
        };

        client.get_exchange_status().await.context("warm-up request failed")?;
        tracing::info!("kalshi REST connection warmed up");
        Ok(client)
    }

    /// Run forever, pinging the exchange-status endpoint at the configured
    /// cadence to keep the TCP connection alive.
    pub async fn run_keepalive(&self, interval: Duration) {
        loop {
            tokio::time::sleep(interval).await;
            if let Err(err) = self.get_exchange_status().await {
                tracing::warn!(error = %err, "kalshi keepalive ping failed");
            }
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn request<T: for<'de> Deserialize<'de>>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T> {
        let headers = self.auth.headers(method.as_str(), &format!("{}{}", self.sign_prefix, path));
        let mut req = self.http.request(method, self.url(path));
        for (name, value) in headers {
            req = req.header(name, value);
        }
        req = req.header("Content-Type", "application/json");
        if let Some(body) = body {
            req = req.json(&body);
        }
        let resp = req.send().await.context("kalshi request failed")?;
        let resp = resp.error_for_status().context("kalshi returned an error status")?;
        resp.json::<T>().await.context("failed to decode kalshi response")
    }

    pub async fn get_exchange_status(&self) -> Result<serde_json::Value> {
        self.request(reqwest::Method::GET, "/exchange/status", None).await
    }

    pub async fn get_markets(&self, series_ticker: &str, limit: u32) -> Result<Vec<KalshiMarket>> {
        let path = format!("/markets?limit={limit}&series_ticker={series_ticker}");
        let resp: MarketsResponse = self.request(reqwest::Method::GET, &path, None).await?;
        Ok(resp.markets)
    }

    pub async fn get_market(&self, ticker: &str) -> Result<KalshiMarket> {
        let path = format!("/markets/{ticker}");
        let resp: MarketResponse = self.request(reqwest::Method::GET, &path, None).await?;
        Ok(resp.market)
    }

    pub async fn place_order(
        &self,
        ticker: &str,
        side: Side,
        quantity: i32,
        limit_price: i32,
        client_order_id: &str,
    ) -> Result<OrderAck> {
        let body = PlaceOrderBody {
            ticker,
            action: "buy",
            order_type: "limit",
            side: side.as_str(),
            count: quantity,
            limit_price,
            client_order_id,
        };
        let body = serde_json::to_value(body).context("failed to serialize order body")?;
        let sent_at = std::time::Instant::now();
        let ack: OrderAck = self
            .request(reqwest::Method::POST, "/portfolio/orders", Some(body))
            .await?;
        tracing::info!(
            ticker,
            side = side.as_str(),
            quantity,
            limit_price,
            latency_ms = sent_at.elapsed().as_secs_f64() * 1000.0,
            "order placed"
        );
        Ok(ack)
    }
}
