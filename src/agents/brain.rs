//! Brain Agent — Strategy & Signal Generation.
//!
//! Consumes [`GameEvent`] from the bus, checks whether any threshold has
//! been crossed, validates edge against the Watcher's market cache, and
//! emits [`TradeSignal`]s.
//!
//! Hot path (every event): dict lookup for the game's threshold list, scan
//! for unmet triggers, dict lookup for current market state, edge check,
//! `try_send` to the signal queue. Market discovery (matching a game to
//! Kalshi tickers) happens once per game, off this path.

use std::collections::HashMap;
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use crate::bus::BusHandle;
use crate::config::MarketsConfig;
use crate::kalshi::{KalshiMarket, KalshiRestClient, WsSubscribeHandle};
use crate::models::{CrunchTimeGate, GameEvent, MarketUpdate, SharedRiskState, Side, Sport, TradeSignal};
use crate::strategy::{
    abbrev_matches_name, calculate_moneyline_edge, has_edge, has_moneyline_edge, max_tradeable_price, parse_title,
    MoneylineEntry, MoneylineMap, TeamSide, ThresholdEntry, ThresholdMap,
};

use super::watcher::MarketCache;

/// YES ask at/above which the next unresolved threshold is considered
/// imminent — the market is pricing roughly a 60% chance of hitting it.
const CRUNCH_TIME_ASK_THRESHOLD: i32 = 60;

/// How long to wait before retrying a failed game registration — Kalshi may
/// not have listed the market yet at first attempt.
const REGISTRATION_RETRY: std::time::Duration = std::time::Duration::from_secs(60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RegistrationState {
    Pending,
    Registered,
    Failed,
}

pub struct BrainAgent {
    bus: BusHandle,
    market_cache: MarketCache,
    ws_subscribe: WsSubscribeHandle,
    rest: std::sync::Arc<KalshiRestClient>,
    threshold_map: ThresholdMap,
    moneyline_map: MoneylineMap,
    markets: MarketsConfig,
    min_edge_cents: i32,
    max_slippage_cents: i32,
    max_spend_per_trade_cents: i32,
    max_quantity: i32,
    risk: SharedRiskState,
    gate: CrunchTimeGate,

    game_state: HashMap<String, (RegistrationState, Option<Instant>)>,
    ml_game_state: HashMap<String, (RegistrationState, Option<Instant>)>,
    prev_scores: HashMap<String, (i32, i32)>,
    todays_markets: HashMap<Sport, Vec<KalshiMarket>>,
    ml_todays_markets: HashMap<Sport, Vec<KalshiMarket>>,
    markets_fetched_date: String,
}

impl BrainAgent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        bus: BusHandle,
        market_cache: MarketCache,
        ws_subscribe: WsSubscribeHandle,
        rest: std::sync::Arc<KalshiRestClient>,
        markets: MarketsConfig,
        min_edge_cents: i32,
        max_slippage_cents: i32,
        max_spend_per_trade_cents: i32,
        max_quantity: i32,
        risk: SharedRiskState,
        gate: CrunchTimeGate,
    ) -> Self {
        Self {
            bus,
            market_cache,
            ws_subscribe,
            rest,
            threshold_map: ThresholdMap::new(),
            moneyline_map: MoneylineMap::new(),
            markets,
            min_edge_cents,
            max_slippage_cents,
            max_spend_per_trade_cents,
            max_quantity,
            risk,
            gate,
            game_state: HashMap::new(),
            ml_game_state: HashMap::new(),
            prev_scores: HashMap::new(),
            todays_markets: HashMap::new(),
            ml_todays_markets: HashMap::new(),
            markets_fetched_date: String::new(),
        }
    }

    pub async fn run(mut self, mut game_events: tokio::sync::mpsc::Receiver<GameEvent>) {
        tracing::info!("brain agent running");
        while let Some(event) = game_events.recv().await {
            self.process_event(event).await;
        }
    }

    async fn process_event(&mut self, event: GameEvent) {
        let prev_scores = self.prev_scores.get(&event.game_id).copied().unwrap_or((0, 0));
        self.prev_scores.insert(event.game_id.clone(), (event.home_score, event.away_score));

        if event.is_final {
            self.threshold_map.unregister_game(event.sport, &event.game_id);
            self.moneyline_map.unregister_game(event.sport, &event.game_id);
            self.gate.deactivate(&event.game_id);
            self.prev_scores.remove(&event.game_id);
            return;
        }

        self.maybe_register_totals(&event).await;
        self.maybe_register_moneyline(&event).await;

        if self.is_registered(&event.game_id) {
            self.check_crunch_time(&event);
        }

        if self.is_registered(&event.game_id) {
            let count = self.threshold_map.get_entries(event.sport, &event.game_id).len();
            for idx in 0..count {
                let should_fire = {
                    let entries = self.threshold_map.get_entries(event.sport, &event.game_id);
                    let entry = &entries[idx];
                    !entry.already_triggered && event.total_score >= entry.trigger_score
                };
                if should_fire {
                    self.evaluate_and_signal(&event, idx).await;
                }
            }
        }

        if self.is_ml_registered(&event.game_id) {
            self.check_moneyline_signal(&event, prev_scores).await;
        }
    }

    fn is_registered(&self, game_id: &str) -> bool {
        matches!(self.game_state.get(game_id), Some((RegistrationState::Registered, _)))
    }

    fn is_ml_registered(&self, game_id: &str) -> bool {
        matches!(self.ml_game_state.get(game_id), Some((RegistrationState::Registered, _)))
    }

    fn quantity_for_price(&self, ask_cents: i32) -> i32 {
        let qty = (self.max_spend_per_trade_cents / ask_cents.max(1)).max(1);
        qty.min(self.max_quantity)
    }

    async fn maybe_register_totals(&mut self, event: &GameEvent) {
        match self.game_state.get(&event.game_id) {
            None => {
                self.game_state.insert(event.game_id.clone(), (RegistrationState::Pending, None));
                self.register_game(event).await;
            }
            Some((RegistrationState::Failed, failed_at)) => {
                let stale = failed_at.map(|t| t.elapsed() >= REGISTRATION_RETRY).unwrap_or(true);
                if stale {
                    self.todays_markets.remove(&event.sport);
                    self.game_state.insert(event.game_id.clone(), (RegistrationState::Pending, None));
                    self.register_game(event).await;
                }
            }
            _ => {}
        }
    }

    async fn maybe_register_moneyline(&mut self, event: &GameEvent) {
        match self.ml_game_state.get(&event.game_id) {
            None => {
                self.ml_game_state.insert(event.game_id.clone(), (RegistrationState::Pending, None));
                self.register_moneyline(event).await;
            }
            Some((RegistrationState::Failed, failed_at)) => {
                let stale = failed_at.map(|t| t.elapsed() >= REGISTRATION_RETRY).unwrap_or(true);
                if stale {
                    self.ml_todays_markets.remove(&event.sport);
                    self.ml_game_state.insert(event.game_id.clone(), (RegistrationState::Pending, None));
                    self.register_moneyline(event).await;
                }
            }
            _ => {}
        }
    }

    fn check_crunch_time(&self, event: &GameEvent) {
        if self.gate.is_active(&event.game_id) {
            return;
        }
        let entries = self.threshold_map.get_entries(event.sport, &event.game_id);
        let lowest = entries.iter().filter(|e| !e.already_triggered).min_by_key(|e| e.trigger_score);
        let Some(lowest) = lowest else { return };

        let Some(market) = crate::agents::watcher::get_latest(&self.market_cache, &lowest.market_ticker) else {
            return;
        };
        if market.yes_ask >= CRUNCH_TIME_ASK_THRESHOLD {
            self.gate.activate(&event.game_id);
            tracing::info!(
                game_id = %event.game_id,
                yes_ask = market.yes_ask,
                ticker = %lowest.market_ticker,
                total = event.total_score,
                trigger = lowest.trigger_score,
                "brain: crunch time activated"
            );
        }
    }

    /// REST fallback for when the WS hasn't delivered a snapshot yet. `None`
    /// on a halted (empty-book) market or a failed request.
    async fn fetch_market_via_rest(&self, ticker: &str) -> Option<MarketUpdate> {
        let market = match self.rest.get_market(ticker).await {
            Ok(m) => m,
            Err(err) => {
                tracing::warn!(ticker, error = %err, "brain: REST fallback failed");
                return None;
            }
        };
        let yes_ask = market.yes_ask.unwrap_or(100);
        let yes_bid = market.yes_bid.unwrap_or(0);
        let no_ask = market.no_ask.unwrap_or(100);
        let no_bid = market.no_bid.unwrap_or(0);
        if yes_ask == 100 && yes_bid == 0 {
            tracing::info!(ticker, "brain: REST fallback got empty book — market likely halted");
            return None;
        }
        let update = MarketUpdate {
            market_ticker: ticker.to_string(),
            yes_bid,
            yes_ask,
            no_bid,
            no_ask,
            yes_volume: 0,
            sequence: 0,
            received_at_ns: crate::util::monotonic_ns(),
        };
        crate::agents::watcher::insert(&self.market_cache, update.clone());
        tracing::info!(ticker, yes_ask, "brain: REST fallback ok");
        Some(update)
    }

    async fn evaluate_and_signal(&mut self, event: &GameEvent, entry_idx: usize) {
        // Set first — at-most-once even if evaluation fails partway through.
        {
            let entries = self.threshold_map.get_entries_mut(event.sport, &event.game_id);
            if entry_idx >= entries.len() {
                return;
            }
            entries[entry_idx].already_triggered = true;
        }
        let entry = self.threshold_map.get_entries(event.sport, &event.game_id)[entry_idx].clone();

        if self.risk.read().is_halted {
            tracing::warn!(ticker = %entry.market_ticker, "brain: shield halted — skipping signal");
            return;
        }

        let market = match crate::agents::watcher::get_latest(&self.market_cache, &entry.market_ticker) {
            Some(m) => m,
            None => match self.fetch_market_via_rest(&entry.market_ticker).await {
                Some(m) => m,
                None => {
                    tracing::warn!(ticker = %entry.market_ticker, "brain: no market data — signal skipped");
                    return;
                }
            },
        };

        let yes_ask = market.yes_ask;
        if !has_edge(yes_ask, self.min_edge_cents, crate::strategy::edge::KALSHI_FEE_RATE) {
            tracing::info!(
                ticker = %entry.market_ticker,
                yes_ask,
                min_edge = self.min_edge_cents,
                "brain: no edge — skipping"
            );
            return;
        }

        let ceiling = max_tradeable_price(self.min_edge_cents, crate::strategy::edge::KALSHI_FEE_RATE);
        let limit_price = (yes_ask + self.max_slippage_cents).min(ceiling);
        let quantity = self.quantity_for_price(yes_ask);

        let signal = TradeSignal {
            signal_id: Uuid::new_v4().to_string(),
            market_ticker: entry.market_ticker.clone(),
            side: entry.side,
            max_price_cents: limit_price,
            quantity,
            game_id: event.game_id.clone(),
            generated_at_ns: crate::util::monotonic_ns(),
        };
        tracing::info!(
            game_id = %event.game_id,
            total = event.total_score,
            trigger = entry.trigger_score,
            ticker = %entry.market_ticker,
            yes_ask,
            limit = limit_price,
            qty = quantity,
            signal_id = %signal.signal_id,
            "brain SIGNAL"
        );
        self.bus.publish_trade_signal(signal);
    }

    async fn check_moneyline_signal(&mut self, event: &GameEvent, prev_scores: (i32, i32)) {
        if self.risk.read().is_halted {
            return;
        }

        let (prev_home, prev_away) = prev_scores;
        let home_scored = event.home_score > prev_home;
        let away_scored = event.away_score > prev_away;
        let lead = event.home_score - event.away_score;
        let now = Instant::now();

        let entries = self.moneyline_map.get_entries_mut(event.sport, &event.game_id);
        for entry in entries {
            if entry.on_cooldown(now) {
                continue;
            }

            let margin = match entry.team_side {
                TeamSide::Home => {
                    if !home_scored || lead <= 0 {
                        continue;
                    }
                    lead
                }
                TeamSide::Away => {
                    if !away_scored || lead >= 0 {
                        continue;
                    }
                    lead.abs()
                }
            };

            let win_prob = estimate_win_prob(margin, event.period, event.sport);
            if win_prob == 0.0 {
                continue;
            }

            let Some(market) = crate::agents::watcher::get_latest(&self.market_cache, &entry.market_ticker) else {
                continue;
            };
            let ask = match entry.trade_side {
                Side::Yes => market.yes_ask,
                Side::No => market.no_ask,
            };
            if !has_moneyline_edge(ask, win_prob, self.min_edge_cents, crate::strategy::edge::KALSHI_FEE_RATE) {
                tracing::debug!(
                    game_id = %event.game_id,
                    margin,
                    win_prob,
                    ask,
                    "brain ML: no edge"
                );
                continue;
            }

            entry.mark_signaled(now);
            let quantity = quantity_for_price_static(ask, self.max_spend_per_trade_cents, self.max_quantity);
            let signal = TradeSignal {
                signal_id: Uuid::new_v4().to_string(),
                market_ticker: entry.market_ticker.clone(),
                side: entry.trade_side,
                max_price_cents: (ask + self.max_slippage_cents).min(97),
                quantity,
                game_id: event.game_id.clone(),
                generated_at_ns: crate::util::monotonic_ns(),
            };
            tracing::info!(
                game_id = %event.game_id,
                margin,
                period = event.period,
                ticker = %entry.market_ticker,
                side = entry.trade_side.as_str(),
                win_prob,
                ask,
                edge = calculate_moneyline_edge(ask, win_prob, crate::strategy::edge::KALSHI_FEE_RATE),
                signal_id = %signal.signal_id,
                "brain ML SIGNAL"
            );
            self.bus.publish_trade_signal(signal);
        }
    }

    async fn register_moneyline(&mut self, event: &GameEvent) {
        let Some(series) = self.markets.moneyline_series(event.sport).map(str::to_string) else {
            self.ml_game_state.insert(event.game_id.clone(), (RegistrationState::Failed, Some(Instant::now())));
            return;
        };

        let today = Utc::now().format("%Y-%m-%d").to_string();
        if !self.ml_todays_markets.contains_key(&event.sport) || self.markets_fetched_date != today {
            self.refresh_ml_markets(event.sport, &series).await;
        }

        let all_markets = self.ml_todays_markets.get(&event.sport).cloned().unwrap_or_default();
        let game_markets = filter_markets_for_game(&all_markets, event);
        if game_markets.is_empty() {
            tracing::warn!(game_id = %event.game_id, home = %event.home_team, away = %event.away_team, "brain ML: no moneyline markets found");
            self.ml_game_state.insert(event.game_id.clone(), (RegistrationState::Failed, Some(Instant::now())));
            return;
        }

        let entries = build_moneyline_entries(&game_markets, event);
        if entries.is_empty() {
            self.ml_game_state.insert(event.game_id.clone(), (RegistrationState::Failed, Some(Instant::now())));
            return;
        }

        let tickers: Vec<String> = {
            let mut seen = std::collections::HashSet::new();
            entries
                .iter()
                .map(|e| e.market_ticker.clone())
                .filter(|t| seen.insert(t.clone()))
                .collect()
        };
        self.ws_subscribe.subscribe(tickers);
        self.moneyline_map.register_game(event.sport, event.game_id.clone(), entries);
        self.ml_game_state.insert(event.game_id.clone(), (RegistrationState::Registered, None));
    }

    async fn refresh_ml_markets(&mut self, sport: Sport, series: &str) {
        match self.rest.get_markets(series, 500).await {
            Ok(markets) => {
                let date_prefix = Utc::now().format("%y%b%d").to_string().to_uppercase();
                let todays: Vec<KalshiMarket> = markets
                    .into_iter()
                    .filter(|m| m.ticker.contains(&format!("-{date_prefix}")))
                    .collect();
                tracing::info!(count = todays.len(), series, date_prefix, "brain ML: fetched today's markets");
                self.ml_todays_markets.insert(sport, todays);
            }
            Err(err) => {
                tracing::error!(sport = sport.as_str(), error = %err, "brain ML: failed to fetch markets");
                self.ml_todays_markets.insert(sport, Vec::new());
            }
        }
    }

    async fn register_game(&mut self, event: &GameEvent) {
        let today = Utc::now().format("%Y-%m-%d").to_string();
        if self.markets_fetched_date != today || !self.todays_markets.contains_key(&event.sport) {
            self.refresh_todays_markets(event.sport).await;
            self.markets_fetched_date = today;
        }

        let all_markets = self.todays_markets.get(&event.sport).cloned().unwrap_or_default();
        let game_markets = filter_markets_for_game(&all_markets, event);
        if game_markets.is_empty() {
            tracing::warn!(
                game_id = %event.game_id,
                home = %event.home_team,
                away = %event.away_team,
                "brain: no kalshi markets found for game — not yet listed?"
            );
            self.game_state.insert(event.game_id.clone(), (RegistrationState::Failed, Some(Instant::now())));
            return;
        }

        let tickers: Vec<String> = game_markets.iter().map(|m| m.ticker.clone()).collect();
        self.ws_subscribe.subscribe(tickers.clone());
        tracing::info!(
            game_id = %event.game_id,
            home = %event.home_team,
            away = %event.away_team,
            count = tickers.len(),
            "brain: subscribed to markets for game"
        );

        let entries = build_threshold_entries_for(event, &tickers);
        if entries.is_empty() {
            tracing::warn!(game_id = %event.game_id, "brain: no threshold entries built");
            self.game_state.insert(event.game_id.clone(), (RegistrationState::Failed, Some(Instant::now())));
            return;
        }

        let unresolved_preview: Vec<i32> = entries.iter().filter(|e| !e.already_triggered).take(5).map(|e| e.trigger_score).collect();
        tracing::info!(
            game_id = %event.game_id,
            count = entries.len(),
            total = event.total_score,
            next_triggers = ?unresolved_preview,
            "brain: registered thresholds"
        );
        self.threshold_map.register_game(event.sport, event.game_id.clone(), entries);
        self.game_state.insert(event.game_id.clone(), (RegistrationState::Registered, None));
    }

    async fn refresh_todays_markets(&mut self, sport: Sport) {
        let Some(series) = self.markets.totals_series(sport).map(str::to_string) else {
            tracing::warn!(sport = sport.as_str(), "brain: no kalshi series pattern configured");
            return;
        };
        match self.rest.get_markets(&series, 1000).await {
            Ok(markets) => {
                let date_prefix = Utc::now().format("%y%b%d").to_string().to_uppercase();
                let todays: Vec<KalshiMarket> = markets
                    .into_iter()
                    .filter(|m| m.ticker.contains(&format!("-{date_prefix}")))
                    .collect();
                tracing::info!(count = todays.len(), series, date_prefix, "brain: fetched today's markets");
                self.todays_markets.insert(sport, todays);
            }
            Err(err) => {
                tracing::error!(sport = sport.as_str(), error = %err, "brain: failed to fetch markets");
                self.todays_markets.insert(sport, Vec::new());
            }
        }
    }
}

fn quantity_for_price_static(ask_cents: i32, max_spend_per_trade_cents: i32, max_quantity: i32) -> i32 {
    (max_spend_per_trade_cents / ask_cents.max(1)).max(1).min(max_quantity)
}

/// Rough win probability for the team currently holding `lead_margin`.
/// Only nonzero in the second half/period — too much variance earlier.
fn estimate_win_prob(lead_margin: i32, period: u32, sport: Sport) -> f64 {
    match sport {
        Sport::NcaaBasketball => {
            if period < 2 {
                return 0.0;
            }
            if lead_margin >= 20 {
                0.97
            } else if lead_margin >= 15 {
                0.93
            } else if lead_margin >= 10 {
                0.86
            } else if lead_margin >= 7 {
                0.78
            } else if lead_margin >= 5 {
                0.68
            } else {
                0.0
            }
        }
        Sport::PremierLeague | Sport::ChampionsLeague => {
            if period < 2 {
                return 0.0;
            }
            if lead_margin >= 3 {
                0.97
            } else if lead_margin >= 2 {
                0.91
            } else if lead_margin >= 1 {
                0.68
            } else {
                0.0
            }
        }
    }
}

/// Build `MoneylineEntry` values from the Kalshi moneyline markets matched
/// to this game. Two Kalshi layouts: a single YES=home/NO=away market, or
/// one market per team (matched by which team's name appears first in the
/// market title).
fn build_moneyline_entries(game_markets: &[KalshiMarket], event: &GameEvent) -> Vec<MoneylineEntry> {
    if game_markets.is_empty() {
        return Vec::new();
    }
    if game_markets.len() == 1 {
        let ticker = game_markets[0].ticker.clone();
        return vec![
            MoneylineEntry::new(ticker.clone(), TeamSide::Home, Side::Yes),
            MoneylineEntry::new(ticker, TeamSide::Away, Side::No),
        ];
    }

    let home_abbrev = event.home_team.to_uppercase();
    let away_abbrev = event.away_team.to_uppercase();
    game_markets
        .iter()
        .take(2)
        .map(|mkt| {
            let title_up = mkt.title.to_uppercase();
            let home_pos = if home_abbrev.chars().count() >= 4 {
                title_up.find(&take(&home_abbrev, 4))
            } else {
                None
            };
            let away_pos = if away_abbrev.chars().count() >= 4 {
                title_up.find(&take(&away_abbrev, 4))
            } else {
                None
            };
            let is_home = match (home_pos, away_pos) {
                (Some(h), Some(a)) => h < a,
                (Some(_), None) => true,
                _ => false,
            };
            if is_home {
                MoneylineEntry::new(mkt.ticker.clone(), TeamSide::Home, Side::Yes)
            } else {
                MoneylineEntry::new(mkt.ticker.clone(), TeamSide::Away, Side::Yes)
            }
        })
        .collect()
}

fn take(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

/// Match today's pre-fetched Kalshi markets to this specific game: group by
/// title (same title = same game), parse each title's team names, and fuzzy
/// match both against the feed's team names.
fn filter_markets_for_game(markets: &[KalshiMarket], event: &GameEvent) -> Vec<KalshiMarket> {
    let home_abbrev = event.home_team.to_uppercase();
    let away_abbrev = event.away_team.to_uppercase();

    let mut groups: HashMap<String, Vec<KalshiMarket>> = HashMap::new();
    for mkt in markets {
        groups.entry(mkt.title.clone()).or_default().push(mkt.clone());
    }

    for (title, group) in &groups {
        let Some((kalshi_away, kalshi_home)) = parse_title(title) else { continue };
        if abbrev_matches_name(&home_abbrev, &kalshi_home) && abbrev_matches_name(&away_abbrev, &kalshi_away) {
            return group.clone();
        }
    }
    Vec::new()
}

/// Build basketball/soccer totals threshold entries — both sports share the
/// trailing-integer ticker convention, so one builder covers both.
fn build_threshold_entries_for(event: &GameEvent, tickers: &[String]) -> Vec<ThresholdEntry> {
    crate::strategy::build_threshold_entries(event.total_score, tickers)
}
