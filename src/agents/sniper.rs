//! Sniper Agent — Order Execution.
//!
//! Consumes trade signals and fires limit orders at Kalshi with the lowest
//! achievable latency. A pre-warmed [`KalshiRestClient`] keeps TCP/TLS
//! handshakes off this path. No retries — a dropped order is cheaper than
//! a stale one.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::bus::BusHandle;
use crate::kalshi::KalshiRestClient;
use crate::models::{FillReport, FillStatus, TradeSignal};
use crate::risk::CircuitBreaker;

pub struct SniperAgent {
    bus: BusHandle,
    rest: Arc<KalshiRestClient>,
    breaker: Mutex<CircuitBreaker>,
}

impl SniperAgent {
    pub fn new(bus: BusHandle, rest: Arc<KalshiRestClient>) -> Self {
        Self {
            bus,
            rest,
            breaker: Mutex::new(CircuitBreaker::new("kalshi_orders", 3)),
        }
    }

    pub async fn run(self, mut trade_signals: mpsc::Receiver<TradeSignal>) {
        tracing::info!("sniper agent running");
        while let Some(signal) = trade_signals.recv().await {
            self.execute(signal).await;
        }
    }

    async fn execute(&self, signal: TradeSignal) {
        let breaker_open = self.breaker.lock().is_open();
        if breaker_open {
            let reason = self.breaker.lock().reason().map(str::to_string);
            tracing::error!(signal_id = %signal.signal_id, reason = ?reason, "sniper circuit breaker open — dropping signal");
            self.publish_fill(&signal, String::new(), FillStatus::Rejected, 0, 0);
            return;
        }

        let client_order_id = format!("cl-{}", &signal.signal_id[..signal.signal_id.len().min(8)]);
        match self
            .rest
            .place_order(&signal.market_ticker, signal.side, signal.quantity, signal.max_price_cents, &client_order_id)
            .await
        {
            Ok(ack) => {
                self.breaker.lock().record_success();
                let status = FillStatus::from_kalshi_str(&ack.order.status);
                let avg_price = ack.order.avg_price.unwrap_or(signal.max_price_cents);
                tracing::info!(
                    signal_id = %signal.signal_id,
                    order_id = %ack.order.order_id,
                    status = %ack.order.status,
                    filled = ack.order.count_filled,
                    price = avg_price,
                    "sniper fill"
                );
                self.publish_fill(&signal, ack.order.order_id, status, ack.order.count_filled, avg_price);
            }
            Err(err) => {
                self.breaker.lock().record_failure(err.to_string());
                tracing::error!(ticker = %signal.market_ticker, error = %err, "sniper order failed");
                self.publish_fill(&signal, String::new(), FillStatus::Rejected, 0, 0);
            }
        }
    }

    fn publish_fill(&self, signal: &TradeSignal, order_id: String, status: FillStatus, filled_qty: i32, avg_price: i32) {
        let filled_at_ns = crate::util::monotonic_ns();
        let report = FillReport {
            signal_id: signal.signal_id.clone(),
            order_id,
            market_ticker: signal.market_ticker.clone(),
            side: signal.side,
            filled_quantity: filled_qty,
            avg_price_cents: avg_price,
            status,
            filled_at_ns,
            latency_ns: filled_at_ns.saturating_sub(signal.generated_at_ns),
        };
        let latency_ms = report.latency_ns as f64 / 1_000_000.0;
        tracing::info!(ticker = %signal.market_ticker, latency_ms, "sniper latency: signal to fill");
        self.bus.publish_fill_report(report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_order_id_truncates_signal_id_to_eight_chars() {
        let signal_id = "abcdefghijklmnop".to_string();
        let client_order_id = format!("cl-{}", &signal_id[..signal_id.len().min(8)]);
        assert_eq!(client_order_id, "cl-abcdefgh");
    }
}
