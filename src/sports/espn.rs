//! ESPN public scoreboard adapter — free, no API key required. Same
//! `SportsFeedClient` interface as [`super::sportsdata_io::SportsDataIoClient`];
//! Oracle doesn't care which one it's driving.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;

use super::base::SportsFeedClient;
use super::normalizer::espn_to_game_event;
use crate::models::{CrunchTimeGate, GameEvent, Sport};

fn espn_url(sport: Sport) -> &'static str {
    match sport {
        Sport::NcaaBasketball => {
            "https://site.api.espn.com/apis/site/v2/sports/basketball/mens-college-basketball/scoreboard"
        }
        Sport::PremierLeague => "https://site.api.espn.com/apis/site/v2/sports/soccer/eng.1/scoreboard",
        Sport::ChampionsLeague => {
            "https://site.api.espn.com/apis/site/v2/sports/soccer/UEFA.CHAMPIONS/scoreboard"
        }
    }
}

pub struct EspnClient {
    sport: Sport,
    url: &'static str,
    fast_interval: Duration,
    slow_interval: Duration,
    gate: CrunchTimeGate,
    http: Option<reqwest::Client>,
    last_scores: HashMap<String, (i32, i32)>,
    consecutive_errors: u32,
}

impl EspnClient {
    pub fn new(sport: Sport, fast_interval: Duration, slow_interval: Duration, gate: CrunchTimeGate) -> Self {
        Self {
            sport,
            url: espn_url(sport),
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
        let received_at_ns = crate::util::monotonic_ns();
        let body: serde_json::Value = http.get(self.url).send().await?.error_for_status()?.json().await?;

        let mut results = Vec::new();
        for raw in body.get("events").and_then(|v| v.as_array()).into_iter().flatten() {
            let Some(event) = espn_to_game_event(raw, self.sport, received_at_ns) else { continue };
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
impl SportsFeedClient for EspnClient {
    async fn startup(&mut self) -> anyhow::Result<()> {
        self.http = Some(
            reqwest::Client::builder()
                .timeout(Duration::from_secs(4))
                .connect_timeout(Duration::from_secs(2))
                .user_agent("Mozilla/5.0")
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
            Sport::NcaaBasketball => "espn:ncaa_basketball",
            Sport::PremierLeague => "espn:premier_league",
            Sport::ChampionsLeague => "espn:champions_league",
        }
    }
}
