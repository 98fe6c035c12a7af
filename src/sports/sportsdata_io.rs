//! SportsData.io polling adapter — keyed REST, no WebSocket push.
//!
//! Migration note: a future push-based provider (e.g. OpticOdds) replaces
//! this file and the config wiring that points Oracle at it; Oracle itself
//! never changes, since it only depends on [`super::base::SportsFeedClient`].

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use super::base::SportsFeedClient;
use super::normalizer::{sportsdata_ncaa_to_game_event, sportsdata_soccer_to_game_event};
use crate::models::{CrunchTimeGate, GameEvent, Sport};

pub struct SportsDataIoClient {
    sport: Sport,
    api_key: String,
    base_url: String,
    fast_interval: Duration,
    slow_interval: Duration,
    gate: CrunchTimeGate,
    http: Option<reqwest::Client>,
    last_scores: HashMap<String, (i32, i32)>,
    consecutive_errors: u32,
}

impl SportsDataIoClient {
    pub fn new(
        sport: Sport,
        api_key: String,
        base_url: String,
        fast_interval: Duration,
        slow_interval: Duration,
        gate: CrunchTimeGate,
    ) -> Self {
        Self {
            sport,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            fast_interval,
            slow_interval,
            gate,
            http: None,
            last_scores: HashMap::new(),
            consecutive_errors: 0,
        }
    }

    async fn fetch_live_games(&mut self) -> anyhow::Result<Vec<GameEvent>> {
        let http = self.http.as_ref().expect("call startup() first");
        let today = Utc::now().format("%Y-%m-%d").to_string();
        let url = format!("{}/GamesByDate/{today}", self.base_url);
        let received_at_ns = crate::util::monotonic_ns();

        let raw_games: Vec<serde_json::Value> = http
            .get(&url)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let mut results = Vec::new();
        for raw in &raw_games {
            let event = match self.sport {
                Sport::NcaaBasketball => sportsdata_ncaa_to_game_event(raw, received_at_ns),
                Sport::PremierLeague | Sport::ChampionsLeague => {
                    sportsdata_soccer_to_game_event(raw, self.sport, received_at_ns)
                }
            };
            let Some(event) = event else { continue };
            let changed = self.last_scores.get(&event.game_id) != Some(&(event.home_score, event.away_score));
            if changed {
                self.last_scores.insert(event.game_id.clone(), (event.home_score, event.away_score));
                results.push(event);
            }
        }
        Ok(results)
    }
}

#[async_trait]
impl SportsFeedClient for SportsDataIoClient {
    async fn startup(&mut self) -> anyhow::Result<()> {
        self.http = Some(
            reqwest::Client::builder()
                .timeout(Duration::from_secs(4))
                .connect_timeout(Duration::from_secs(2))
                .build()?,
        );
        tracing::info!(feed = self.name(), "feed client initialized");
        Ok(())
    }

    async fn shutdown(&mut self) {
        self.http = None;
    }

    async fn poll_once(&mut self) -> Vec<GameEvent> {
        let poll_start = tokio::time::Instant::now();
        let events = match self.fetch_live_games().await {
            Ok(events) => {
                self.consecutive_errors = 0;
                events
            }
            Err(err) => {
                self.consecutive_errors += 1;
                if self.consecutive_errors == 1 || self.consecutive_errors % 100 == 0 {
                    tracing::warn!(feed = self.name(), error = %err, count = self.consecutive_errors, "poll error");
                }
                Vec::new()
            }
        };

        let interval = if self.gate.any_active() { self.fast_interval } else { self.slow_interval };
        let elapsed = poll_start.elapsed();
        if elapsed < interval {
            tokio::time::sleep(interval - elapsed).await;
        }
        events
    }

    fn name(&self) -> &str {
        match self.sport {
            Sport::NcaaBasketball => "sportsdata_io:ncaa_basketball",
            Sport::PremierLeague => "sportsdata_io:premier_league",
            Sport::ChampionsLeague => "sportsdata_io:champions_league",
        }
    }
}
