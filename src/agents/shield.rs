//! Shield Agent — Risk Management.
//!
//! Consumes fill reports and keeps [`RiskState`] current. Halts are one-way
//! from inside this crate — once tripped, only an operator calling
//! `RiskState::resume` clears them. Per-game trade counts are tracked off
//! the market ticker rather than a true game id (the same conflation the
//! upstream risk engine uses); treat the cap as advisory, not exact.

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::config::Settings;
use crate::models::{FillReport, FillStatus, SharedRiskState};

pub struct ShieldAgent {
    risk: SharedRiskState,
    settings: Settings,
    game_trade_count: HashMap<String, u32>,
}

impl ShieldAgent {
    pub fn new(risk: SharedRiskState, settings: Settings) -> Self {
        Self {
            risk,
            settings,
            game_trade_count: HashMap::new(),
        }
    }

    pub async fn run(mut self, mut fill_reports: mpsc::Receiver<FillReport>) {
        tracing::info!("shield agent running");
        while let Some(report) = fill_reports.recv().await {
            self.handle_fill(report);
        }
    }

    fn handle_fill(&mut self, report: FillReport) {
        if !report.status.is_filled_or_partial() {
            tracing::debug!(order_id = %report.order_id, status = ?report.status, "shield ignoring non-fill report");
            return;
        }

        let count = self.game_trade_count.entry(report.market_ticker.clone()).or_insert(0);
        *count += 1;
        let trade_count = *count;

        {
            let mut risk = self.risk.write();
            risk.apply_fill(report.avg_price_cents as i64, report.filled_quantity as i64);

            if risk.is_halted {
                tracing::warn!(order_id = %report.order_id, "shield received a fill while already halted");
                return;
            }

            if risk.daily_realized_pnl_cents <= -(self.settings.max_daily_loss_cents as i64) {
                risk.halt("daily loss limit breached");
                tracing::error!(
                    pnl = risk.daily_realized_pnl_cents,
                    limit = self.settings.max_daily_loss_cents,
                    "shield HALT: daily loss limit breached"
                );
                return;
            }

            if risk.open_exposure_cents >= self.settings.max_open_exposure_cents as i64 {
                risk.halt("open exposure limit breached");
                tracing::error!(
                    exposure = risk.open_exposure_cents,
                    limit = self.settings.max_open_exposure_cents,
                    "shield HALT: open exposure limit breached"
                );
                return;
            }
        }

        if trade_count > self.settings.max_trades_per_game {
            tracing::warn!(
                ticker = %report.market_ticker,
                trade_count,
                limit = self.settings.max_trades_per_game,
                "shield: per-game trade cap exceeded (advisory, not halting)"
            );
        }

        tracing::info!(
            ticker = %report.market_ticker,
            filled = report.filled_quantity,
            price = report.avg_price_cents,
            status = ?report.status,
            "shield recorded fill"
        );
    }
}
