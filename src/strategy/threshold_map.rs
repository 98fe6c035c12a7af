//! Score-to-market threshold map.
//!
//! Built at game start from Kalshi market listings. Ticker format:
//! `KXNCAAMBTOTAL-26FEB19WEBBRAD-177` — series, date (`%y%b%d` uppercased),
//! game code, trailing trigger score. The market resolves YES once
//! `total_score >= trigger_score`.
//!
//! Hot path: dict lookup + list scan, O(1) + O(k) with k ~ 10 per game.
//! `already_triggered` is mutated in place — zero allocation after registration.

use std::collections::HashMap;

use crate::models::{Side, Sport};

#[derive(Debug, Clone)]
pub struct ThresholdEntry {
    pub trigger_score: i32,
    pub market_ticker: String,
    pub side: Side,
    pub already_triggered: bool,
}

#[derive(Default)]
pub struct ThresholdMap {
    map: HashMap<Sport, HashMap<String, Vec<ThresholdEntry>>>,
}

impl ThresholdMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_game(&mut self, sport: Sport, game_id: String, entries: Vec<ThresholdEntry>) {
        tracing::info!(
            game_id = %game_id,
            sport = sport.as_str(),
            entry_count = entries.len(),
            "registered threshold entries"
        );
        self.map.entry(sport).or_default().insert(game_id, entries);
    }

    pub fn unregister_game(&mut self, sport: Sport, game_id: &str) {
        if let Some(games) = self.map.get_mut(&sport) {
            games.remove(game_id);
        }
    }

    pub fn get_entries(&self, sport: Sport, game_id: &str) -> &[ThresholdEntry] {
        self.map
            .get(&sport)
            .and_then(|games| games.get(game_id))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn get_entries_mut(&mut self, sport: Sport, game_id: &str) -> &mut [ThresholdEntry] {
        self.map
            .get_mut(&sport)
            .and_then(|games| games.get_mut(game_id))
            .map(Vec::as_mut_slice)
            .unwrap_or(&mut [])
    }
}

/// Extract the trigger score from a total-market ticker:
/// `KXNCAAMBTOTAL-26FEB19WEBBRAD-177` -> `177`.
pub fn trigger_from_ticker(ticker: &str) -> Option<i32> {
    ticker.rsplit('-').next()?.parse().ok()
}

/// Build threshold entries from a list of raw Kalshi market tickers for one
/// game, given the current total score. Used for both basketball and
/// soccer totals — both share the trailing-integer ticker convention.
pub fn build_threshold_entries(current_total: i32, tickers: &[String]) -> Vec<ThresholdEntry> {
    let mut entries: Vec<ThresholdEntry> = tickers
        .iter()
        .filter_map(|ticker| {
            let trigger = trigger_from_ticker(ticker)?;
            Some(ThresholdEntry {
                trigger_score: trigger,
                market_ticker: ticker.clone(),
                side: Side::Yes,
                already_triggered: trigger <= current_total,
            })
        })
        .collect();
    entries.sort_by_key(|e| e.trigger_score);
    entries
}
