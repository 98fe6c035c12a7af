//! Entrypoint: boots the Tokio runtime, wires every agent together, and
//! runs until SIGINT/SIGTERM.
//!
//! Startup sequence:
//!   1. Load settings from the environment (`.env` + `KALSHI_*`/etc).
//!   2. Initialize Kalshi auth, REST client, Watcher's WS client.
//!   3. Initialize one ESPN feed client per sport.
//!   4. Construct Brain/Shield/Sniper/Oracle, wired to the shared bus.
//!   5. Spawn all five agents, wait for a shutdown signal, then return —
//!      Tokio aborts outstanding tasks on process exit.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use parking_lot::RwLock;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crunchline::agents::{BrainAgent, OracleAgent, ShieldAgent, SniperAgent, WatcherAgent};
use crunchline::bus::EventBus;
use crunchline::config::Settings;
use crunchline::kalshi::{KalshiAuth, KalshiRestClient};
use crunchline::models::{CrunchTimeGate, RiskState, Sport};
use crunchline::sports::{EspnClient, SportsDataIoClient, SportsFeedClient};

fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "crunchline=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let settings = Settings::from_env().context("failed to load settings")?;
    tracing::info!(demo = settings.kalshi_demo, "crunchline starting");

    let bus = EventBus::new();
    let bus_handle = bus.handle();

    let auth = Arc::new(
        KalshiAuth::load(settings.kalshi_api_key_id.clone(), &settings.kalshi_private_key_path)
            .context("failed to load kalshi signing key")?,
    );
    let rest = Arc::new(
        KalshiRestClient::connect(&settings.kalshi_base_url, auth.clone())
            .await
            .context("failed to connect to kalshi REST api")?,
    );

    let gate = CrunchTimeGate::new();
    let risk = Arc::new(RwLock::new(RiskState::new()));

    let watcher = WatcherAgent::new(settings.kalshi_ws_url.clone(), auth.clone(), bus_handle.clone());
    let market_cache = watcher.cache();
    let ws_subscribe = watcher.subscribe_handle();

    let brain = BrainAgent::new(
        bus_handle.clone(),
        market_cache,
        ws_subscribe,
        rest.clone(),
        settings.markets.clone(),
        settings.min_edge_cents,
        settings.max_price_slippage_cents,
        settings.default_quantity * 50, // approx $ budget per trade, see config docs
        settings.max_quantity,
        risk.clone(),
        gate.clone(),
    );

    let shield = ShieldAgent::new(risk.clone(), settings.clone());
    let sniper = SniperAgent::new(bus_handle.clone(), rest.clone());

    let fast_interval = Duration::from_secs_f64(settings.sports_poll_interval_s);
    let slow_interval = Duration::from_secs_f64(settings.idle_poll_interval_s);
    let mut feeds: Vec<Box<dyn SportsFeedClient>> = vec![
        Box::new(EspnClient::new(Sport::NcaaBasketball, fast_interval, slow_interval, gate.clone())),
        Box::new(EspnClient::new(Sport::PremierLeague, fast_interval, slow_interval, gate.clone())),
        Box::new(EspnClient::new(Sport::ChampionsLeague, fast_interval, slow_interval, gate.clone())),
    ];
    // SportsData.io backs the same sports as a second source; Oracle already
    // dedupes GameEvents across feeds by (game_id, home_score, away_score).
    if let Some(key) = settings.sportsdata_api_key_ncaa.clone() {
        feeds.push(Box::new(SportsDataIoClient::new(
            Sport::NcaaBasketball,
            key,
            settings.sportsdata_base_url_ncaa.clone(),
            fast_interval,
            slow_interval,
            gate.clone(),
        )));
    }
    if let Some(key) = settings.sportsdata_api_key_soccer.clone() {
        for sport in [Sport::PremierLeague, Sport::ChampionsLeague] {
            feeds.push(Box::new(SportsDataIoClient::new(
                sport,
                key.clone(),
                settings.sportsdata_base_url_soccer.clone(),
                fast_interval,
                slow_interval,
                gate.clone(),
            )));
        }
    }
    let oracle = OracleAgent::new(bus_handle.clone(), feeds);

    let rest_keepalive = rest.clone();
    let keepalive_interval = Duration::from_secs_f64(settings.keepalive_interval_s);

    let receivers = bus.into_receivers();
    drop(receivers.market_updates_rx); // Brain reads current state from the watcher cache, not this stream
    let game_events_rx = receivers.game_events_rx;
    let trade_signals_rx = receivers.trade_signals_rx;
    let fill_reports_rx = receivers.fill_reports_rx;

    let mut tasks = tokio::task::JoinSet::new();
    tasks.spawn(async move { rest_keepalive.run_keepalive(keepalive_interval).await });
    tasks.spawn(async move { oracle.run().await });
    tasks.spawn(async move { watcher.run().await });
    tasks.spawn(async move { brain.run(game_events_rx).await });
    tasks.spawn(async move { sniper.run(trade_signals_rx).await });
    tasks.spawn(async move { shield.run(fill_reports_rx).await });
    tracing::info!("all agents launched — crunchline is live");

    wait_for_shutdown_signal().await;
    tracing::info!("shutdown signal received — stopping");
    tasks.abort_all();
    while tasks.join_next().await.is_some() {}

    tracing::info!("crunchline stopped cleanly");
    Ok(())
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
