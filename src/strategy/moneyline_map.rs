//! Moneyline market map — per-game winner-market entries.
//!
//! Unlike totals (one entry per score line), a game has at most two
//! moneyline entries: one backing home, one backing away. Signals can fire
//! repeatedly per game (each time the leading team extends its lead),
//! gated by a per-entry cooldown so a burst of quick scores doesn't spam
//! orders.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::models::{Side, Sport};

/// Covers a full CBB possession (shot clock + transition) so consecutive
/// scores by the same team don't each fire their own signal.
pub const SIGNAL_COOLDOWN: Duration = Duration::from_secs(45);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeamSide {
    Home,
    Away,
}

#[derive(Debug, Clone)]
pub struct MoneylineEntry {
    pub market_ticker: String,
    pub team_side: TeamSide,
    pub trade_side: Side,
    last_signaled: Option<Instant>,
}

impl MoneylineEntry {
    pub fn new(market_ticker: String, team_side: TeamSide, trade_side: Side) -> Self {
        Self {
            market_ticker,
            team_side,
            trade_side,
            last_signaled: None,
        }
    }

    pub fn on_cooldown(&self, now: Instant) -> bool {
        match self.last_signaled {
            Some(last) => now.duration_since(last) < SIGNAL_COOLDOWN,
            None => false,
        }
    }

    pub fn mark_signaled(&mut self, now: Instant) {
        self.last_signaled = Some(now);
    }
}

#[derive(Default)]
pub struct MoneylineMap {
    map: HashMap<Sport, HashMap<String, Vec<MoneylineEntry>>>,
}

impl MoneylineMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_game(&mut self, sport: Sport, game_id: String, entries: Vec<MoneylineEntry>) {
        tracing::info!(
            game_id = %game_id,
            sport = sport.as_str(),
            entry_count = entries.len(),
            "registered moneyline entries"
        );
        self.map.entry(sport).or_default().insert(game_id, entries);
    }

    pub fn unregister_game(&mut self, sport: Sport, game_id: &str) {
        if let Some(games) = self.map.get_mut(&sport) {
            games.remove(game_id);
        }
    }

    pub fn get_entries_mut(&mut self, sport: Sport, game_id: &str) -> &mut [MoneylineEntry] {
        self.map
            .get_mut(&sport)
            .and_then(|games| games.get_mut(game_id))
            .map(Vec::as_mut_slice)
            .unwrap_or(&mut [])
    }
}
