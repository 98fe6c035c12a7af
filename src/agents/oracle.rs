//! Oracle Agent — Data Ingestion.
//!
//! Runs one [`SportsFeedClient`] per sport concurrently and fans their
//! output into the bus's `game_events` channel, deduplicating across
//! providers by `(game_id, home_score, away_score)` — if two feeds deliver
//! the same score update, the second is dropped.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::bus::BusHandle;
use crate::models::GameEvent;
use crate::sports::SportsFeedClient;

type DedupCache = Arc<Mutex<HashMap<String, (i32, i32)>>>;

pub struct OracleAgent {
    bus: BusHandle,
    feeds: Vec<Box<dyn SportsFeedClient>>,
}

impl OracleAgent {
    pub fn new(bus: BusHandle, feeds: Vec<Box<dyn SportsFeedClient>>) -> Self {
        Self { bus, feeds }
    }

    /// Start every feed, then run all of them concurrently until the
    /// process shuts down. One feed dying never stops the others.
    pub async fn run(mut self) {
        for feed in &mut self.feeds {
            if let Err(err) = feed.startup().await {
                tracing::error!(feed = feed.name(), error = %err, "oracle feed failed to start");
            }
        }
        tracing::info!(feed_count = self.feeds.len(), "oracle started feeds");

        let seen: DedupCache = Arc::new(Mutex::new(HashMap::new()));
        let mut handles = Vec::new();
        for feed in self.feeds.into_iter() {
            let bus = self.bus.clone();
            let seen = seen.clone();
            handles.push(tokio::spawn(run_feed(feed, bus, seen)));
        }

        for handle in handles {
            if let Err(err) = handle.await {
                tracing::error!(error = %err, "oracle feed task panicked");
            }
        }
    }
}

async fn run_feed(mut feed: Box<dyn SportsFeedClient>, bus: BusHandle, seen: DedupCache) {
    let name = feed.name().to_string();
    tracing::info!(feed = %name, "oracle starting feed");
    loop {
        let events = feed.poll_once().await;
        for event in events {
            dedup_and_publish(&bus, &seen, event);
        }
    }
}

fn dedup_and_publish(bus: &BusHandle, seen: &DedupCache, event: GameEvent) {
    let scores = (event.home_score, event.away_score);
    {
        let mut seen = seen.lock();
        if seen.get(&event.game_id) == Some(&scores) {
            return; // duplicate — drop silently
        }
        seen.insert(event.game_id.clone(), scores);
    }
    tracing::debug!(
        game_id = %event.game_id,
        sport = event.sport.as_str(),
        home = event.home_score,
        away = event.away_score,
        total = event.total_score,
        provider = event.provider,
        "oracle published"
    );
    bus.publish_game_event(event);
}
