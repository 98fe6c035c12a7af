use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;

/// Shared gate between Brain and the sports feed clients.
///
/// Brain activates a game once Kalshi prices show the next threshold is
/// close (§ crunch time); feed clients read it to pick polling cadence.
/// Cloning shares the same underlying set (`Arc` + `RwLock`), matching the
/// Watcher cache's one-writer-many-readers shape.
#[derive(Clone, Default)]
pub struct CrunchTimeGate {
    active: Arc<RwLock<HashSet<String>>>,
}

impl CrunchTimeGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn activate(&self, game_id: &str) {
        let mut active = self.active.write();
        if active.insert(game_id.to_string()) {
            tracing::info!(game_id, active_count = active.len(), "crunch time gate activated");
        }
    }

    pub fn deactivate(&self, game_id: &str) {
        let mut active = self.active.write();
        if active.remove(game_id) {
            tracing::info!(game_id, active_count = active.len(), "crunch time gate deactivated");
        }
    }

    pub fn is_active(&self, game_id: &str) -> bool {
        self.active.read().contains(game_id)
    }

    pub fn any_active(&self) -> bool {
        !self.active.read().is_empty()
    }
}

/// Owned by Shield. Updated after every fill report; read by Brain before
/// every signal (`is_halted`).
#[derive(Debug, Clone, Default)]
pub struct RiskState {
    pub daily_realized_pnl_cents: i64,
    pub open_exposure_cents: i64,
    pub trades_today: u32,
    pub last_circuit_break_reason: Option<String>,
    pub is_halted: bool,
}

impl RiskState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_fill(&mut self, cost_cents: i64, quantity: i64) {
        self.open_exposure_cents += cost_cents * quantity;
        self.trades_today += 1;
    }

    pub fn apply_settlement(&mut self, pnl_cents: i64, cost_cents: i64, quantity: i64) {
        self.daily_realized_pnl_cents += pnl_cents;
        self.open_exposure_cents -= cost_cents * quantity;
    }

    pub fn halt(&mut self, reason: impl Into<String>) {
        self.is_halted = true;
        self.last_circuit_break_reason = Some(reason.into());
    }

    /// Operator-initiated only — nothing in this crate calls this automatically.
    pub fn resume(&mut self) {
        self.is_halted = false;
        self.last_circuit_break_reason = None;
    }
}

/// Shared, lock-protected `RiskState` handle (Shield writes, Brain reads).
pub type SharedRiskState = Arc<RwLock<RiskState>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn risk_state_tracks_exposure_and_pnl() {
        let mut risk = RiskState::new();
        risk.apply_fill(45, 2);
        assert_eq!(risk.open_exposure_cents, 90);
        assert_eq!(risk.trades_today, 1);

        risk.apply_settlement(10, 45, 2);
        assert_eq!(risk.daily_realized_pnl_cents, 10);
        assert_eq!(risk.open_exposure_cents, 0);
    }

    #[test]
    fn halt_is_one_way_without_explicit_resume() {
        let mut risk = RiskState::new();
        risk.halt("daily loss breached");
        assert!(risk.is_halted);
        risk.apply_fill(10, 1);
        assert!(risk.is_halted, "applying a fill must not clear a halt");
        risk.resume();
        assert!(!risk.is_halted);
    }

    #[test]
    fn crunch_time_gate_activate_is_idempotent() {
        let gate = CrunchTimeGate::new();
        assert!(!gate.is_active("g1"));
        gate.activate("g1");
        gate.activate("g1");
        assert!(gate.is_active("g1"));
        assert!(gate.any_active());
        gate.deactivate("g1");
        assert!(!gate.is_active("g1"));
        assert!(!gate.any_active());
    }
}
