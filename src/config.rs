//! Environment-based configuration. All secrets come from environment
//! variables — never hardcoded, matching the teacher's `Config::from_env`
//! pattern (`models.rs`) and this domain's original `config/settings.py`.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::{Context, Result};

use crate::models::Sport;

fn require(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("required environment variable '{key}' is not set"))
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Top-level runtime configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    // --- Kalshi ---
    pub kalshi_api_key_id: String,
    pub kalshi_private_key_path: PathBuf,
    pub kalshi_base_url: String,
    pub kalshi_ws_url: String,
    pub kalshi_demo: bool,

    // --- SportsData.io ---
    pub sportsdata_api_key_ncaa: Option<String>,
    pub sportsdata_api_key_soccer: Option<String>,
    pub sportsdata_base_url_ncaa: String,
    pub sportsdata_base_url_soccer: String,

    // --- Strategy ---
    pub min_edge_cents: i32,
    pub max_price_slippage_cents: i32,
    pub default_quantity: i32,
    pub max_quantity: i32,

    // --- Risk ---
    pub max_daily_loss_cents: i64,
    pub max_open_exposure_cents: i64,
    pub max_trades_per_game: u32,
    pub keepalive_interval_s: f64,

    // --- Polling ---
    pub sports_poll_interval_s: f64,
    /// Cadence when no game is in crunch time — fast `sports_poll_interval_s`
    /// kicks in per-game once the crunch-time gate activates for it.
    pub idle_poll_interval_s: f64,

    // --- Markets (series-ticker patterns, §6/markets.yaml) ---
    pub markets: MarketsConfig,
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();

        let demo = optional("KALSHI_DEMO", "false").to_lowercase();
        let kalshi_demo = matches!(demo.as_str(), "1" | "true" | "yes");
        let (default_base, default_ws) = if kalshi_demo {
            (
                "https://demo-api.kalshi.co/trade-api/v2",
                "wss://demo-api.kalshi.co/trade-api/ws/v2",
            )
        } else {
            (
                "https://api.elections.kalshi.com/trade-api/v2",
                "wss://api.elections.kalshi.com/trade-api/ws/v2",
            )
        };

        Ok(Self {
            kalshi_api_key_id: require("KALSHI_API_KEY_ID")?,
            kalshi_private_key_path: PathBuf::from(require("KALSHI_PRIVATE_KEY_PATH")?),
            kalshi_base_url: optional("KALSHI_BASE_URL", default_base),
            kalshi_ws_url: optional("KALSHI_WS_URL", default_ws),
            kalshi_demo,

            sportsdata_api_key_ncaa: std::env::var("SPORTSDATA_API_KEY_NCAA").ok(),
            sportsdata_api_key_soccer: std::env::var("SPORTSDATA_API_KEY_SOCCER").ok(),
            sportsdata_base_url_ncaa: optional(
                "SPORTSDATA_BASE_URL_NCAA",
                "https://api.sportsdata.io/v3/cbb/scores/json",
            ),
            sportsdata_base_url_soccer: optional(
                "SPORTSDATA_BASE_URL_SOCCER",
                "https://api.sportsdata.io/v3/soccer/scores/json",
            ),

            min_edge_cents: optional("MIN_EDGE_CENTS", "3").parse().unwrap_or(3),
            max_price_slippage_cents: optional("MAX_PRICE_SLIPPAGE_CENTS", "2")
                .parse()
                .unwrap_or(2),
            default_quantity: optional("DEFAULT_QUANTITY", "10").parse().unwrap_or(10),
            max_quantity: optional("MAX_QUANTITY", "50").parse().unwrap_or(50),

            max_daily_loss_cents: optional("MAX_DAILY_LOSS_CENTS", "10000")
                .parse()
                .unwrap_or(10_000),
            max_open_exposure_cents: optional("MAX_OPEN_EXPOSURE_CENTS", "50000")
                .parse()
                .unwrap_or(50_000),
            max_trades_per_game: optional("MAX_TRADES_PER_GAME", "5").parse().unwrap_or(5),
            keepalive_interval_s: optional("KEEPALIVE_INTERVAL_S", "30")
                .parse()
                .unwrap_or(30.0),

            sports_poll_interval_s: optional("SPORTS_POLL_INTERVAL_S", "0.75")
                .parse()
                .unwrap_or(0.75),
            idle_poll_interval_s: optional("IDLE_POLL_INTERVAL_S", "30").parse().unwrap_or(30.0),

            markets: MarketsConfig::load_default(),
        })
    }
}

/// Per-sport Kalshi series-ticker patterns for totals and moneyline markets.
///
/// Backed by a small `markets.yaml`-shaped config (the original's
/// `config/markets.yaml`); falls back to hardcoded defaults so a fresh
/// checkout runs without an extra file on disk.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct MarketsConfig {
    #[serde(default)]
    totals: HashMap<String, String>,
    #[serde(default)]
    moneyline: HashMap<String, String>,
}

const DEFAULT_MARKETS_YAML: &str = r#"
totals:
  ncaa_basketball: KXNCAAMBTOTAL
  premier_league: KXEPLTOTAL
  champions_league: KXUCLTOTAL
moneyline:
  ncaa_basketball: KXNCAAMBGAME
  premier_league: KXEPLGAME
  champions_league: KXUCLGAME
"#;

impl MarketsConfig {
    pub fn load_default() -> Self {
        let path = std::env::var("MARKETS_CONFIG_PATH").unwrap_or_else(|_| "config/markets.yaml".into());
        match std::fs::read_to_string(&path) {
            Ok(text) => serde_yaml::from_str(&text).unwrap_or_else(|err| {
                tracing::warn!(%path, error = %err, "failed to parse markets config, using defaults");
                Self::defaults()
            }),
            Err(_) => Self::defaults(),
        }
    }

    fn defaults() -> Self {
        serde_yaml::from_str(DEFAULT_MARKETS_YAML).expect("default markets config is valid yaml")
    }

    pub fn totals_series(&self, sport: Sport) -> Option<&str> {
        self.totals.get(sport.as_str()).map(String::as_str)
    }

    pub fn moneyline_series(&self, sport: Sport) -> Option<&str> {
        self.moneyline.get(sport.as_str()).map(String::as_str)
    }
}

impl Settings {
    /// Fixed settings for tests (unit and integration) — avoids depending on
    /// process environment variables.
    pub fn test_defaults() -> Self {
        Self {
            kalshi_api_key_id: "test-key".into(),
            kalshi_private_key_path: PathBuf::from("test.pem"),
            kalshi_base_url: "https://demo-api.kalshi.co/trade-api/v2".into(),
            kalshi_ws_url: "wss://demo-api.kalshi.co/trade-api/ws/v2".into(),
            kalshi_demo: true,
            sportsdata_api_key_ncaa: None,
            sportsdata_api_key_soccer: None,
            sportsdata_base_url_ncaa: "https://api.sportsdata.io/v3/cbb/scores/json".into(),
            sportsdata_base_url_soccer: "https://api.sportsdata.io/v3/soccer/scores/json".into(),
            min_edge_cents: 3,
            max_price_slippage_cents: 2,
            default_quantity: 10,
            max_quantity: 50,
            max_daily_loss_cents: 10_000,
            max_open_exposure_cents: 50_000,
            max_trades_per_game: 5,
            keepalive_interval_s: 30.0,
            sports_poll_interval_s: 0.75,
            idle_poll_interval_s: 30.0,
            markets: MarketsConfig::defaults(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_markets_config_covers_all_sports() {
        let cfg = MarketsConfig::defaults();
        assert!(cfg.totals_series(Sport::NcaaBasketball).is_some());
        assert!(cfg.totals_series(Sport::PremierLeague).is_some());
        assert!(cfg.totals_series(Sport::ChampionsLeague).is_some());
        assert!(cfg.moneyline_series(Sport::NcaaBasketball).is_some());
    }
}
