use serde::{Deserialize, Serialize};

/// Sport covered by a feed adapter and a Kalshi series pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sport {
    NcaaBasketball,
    PremierLeague,
    ChampionsLeague,
}

impl Sport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sport::NcaaBasketball => "ncaa_basketball",
            Sport::PremierLeague => "premier_league",
            Sport::ChampionsLeague => "champions_league",
        }
    }
}

/// Which side of a Kalshi binary contract an order trades.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Yes,
    No,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Yes => "yes",
            Side::No => "no",
        }
    }
}

/// Canonical live score update from any sports provider.
///
/// Immutable once constructed — crosses the Oracle → Brain agent boundary.
/// `total_score` is derived at construction time, never set independently,
/// so the invariant `total_score == home_score + away_score` cannot drift.
#[derive(Debug, Clone)]
pub struct GameEvent {
    pub event_id: String,
    pub sport: Sport,
    pub game_id: String,
    pub home_team: String,
    pub away_team: String,
    pub home_score: i32,
    pub away_score: i32,
    pub total_score: i32,
    pub game_clock: String,
    pub period: u32,
    pub is_final: bool,
    pub received_at_ns: u64,
    pub provider: &'static str,
}

impl GameEvent {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        event_id: String,
        sport: Sport,
        game_id: String,
        home_team: String,
        away_team: String,
        home_score: i32,
        away_score: i32,
        game_clock: String,
        period: u32,
        is_final: bool,
        provider: &'static str,
        received_at_ns: u64,
    ) -> Self {
        Self {
            event_id,
            sport,
            game_id,
            home_team,
            away_team,
            home_score,
            away_score,
            total_score: home_score + away_score,
            game_clock,
            period,
            is_final,
            received_at_ns,
            provider,
        }
    }
}

/// Real-time snapshot of a Kalshi orderbook for one contract.
///
/// Mutated in place by the Watcher on every delta — no allocation on the
/// hot path. Prices are in cents on Kalshi's 0-100 scale.
#[derive(Debug, Clone)]
pub struct MarketUpdate {
    pub market_ticker: String,
    pub yes_bid: i32,
    pub yes_ask: i32,
    pub no_bid: i32,
    pub no_ask: i32,
    pub yes_volume: i32,
    pub sequence: u64,
    pub received_at_ns: u64,
}

impl MarketUpdate {
    #[allow(clippy::too_many_arguments)]
    pub fn update_from_delta(
        &mut self,
        yes_bid: i32,
        yes_ask: i32,
        no_bid: i32,
        no_ask: i32,
        yes_volume: i32,
        sequence: u64,
        received_at_ns: u64,
    ) {
        self.yes_bid = yes_bid;
        self.yes_ask = yes_ask;
        self.no_bid = no_bid;
        self.no_ask = no_ask;
        self.yes_volume = yes_volume;
        self.sequence = sequence;
        self.received_at_ns = received_at_ns;
    }
}

/// Signal emitted by Brain, consumed by Sniper.
#[derive(Debug, Clone)]
pub struct TradeSignal {
    pub signal_id: String,
    pub market_ticker: String,
    pub side: Side,
    pub max_price_cents: i32,
    pub quantity: i32,
    pub game_id: String,
    pub generated_at_ns: u64,
}

/// Outcome of an order attempt, as reported by Sniper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FillStatus {
    Filled,
    Partial,
    Rejected,
    Cancelled,
    Unknown,
}

impl FillStatus {
    pub fn from_kalshi_str(s: &str) -> Self {
        match s {
            "filled" => FillStatus::Filled,
            "partial" => FillStatus::Partial,
            "rejected" => FillStatus::Rejected,
            "cancelled" | "canceled" => FillStatus::Cancelled,
            _ => FillStatus::Unknown,
        }
    }

    pub fn is_filled_or_partial(&self) -> bool {
        matches!(self, FillStatus::Filled | FillStatus::Partial)
    }
}

/// Published by Sniper after each order attempt; consumed by Shield.
#[derive(Debug, Clone)]
pub struct FillReport {
    pub signal_id: String,
    pub order_id: String,
    pub market_ticker: String,
    pub side: Side,
    pub filled_quantity: i32,
    pub avg_price_cents: i32,
    pub status: FillStatus,
    pub filled_at_ns: u64,
    pub latency_ns: u64,
}
