//! Integration tests. Two layers:
//!
//! - Pure-component tests exercising cross-module invariants directly: bus
//!   backpressure, fee-adjusted edge math, the at-most-once threshold latch,
//!   moneyline cooldown, risk-state monotonicity, fuzzy team-name matching.
//! - Full-agent scenario tests that drive `BrainAgent`/`ShieldAgent`/
//!   `WatcherAgent` end to end through an in-process fake Kalshi REST server
//!   (`wiremock`) and a real local websocket server (no outbound network in
//!   either case), observing results only through the public bus/cache API
//!   each agent exposes.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use ed25519_dalek::pkcs8::EncodePrivateKey;
use futures_util::SinkExt;
use parking_lot::RwLock;
use tokio_tungstenite::tungstenite::Message;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crunchline::agents::{watcher, BrainAgent, ShieldAgent, WatcherAgent};
use crunchline::bus::EventBus;
use crunchline::config::Settings;
use crunchline::kalshi::{KalshiAuth, KalshiRestClient};
use crunchline::models::{
    CrunchTimeGate, FillReport, FillStatus, GameEvent, MarketUpdate, RiskState, SharedRiskState, Side, Sport,
};
use crunchline::risk::CircuitBreaker;
use crunchline::strategy::edge::KALSHI_FEE_RATE;
use crunchline::strategy::{
    abbrev_matches_name, build_threshold_entries, has_edge, max_tradeable_price, parse_title, MoneylineEntry,
    TeamSide,
};

// --- Pure-component tests (no agents, no network) -------------------------

fn game_event(game_id: &str, home: i32, away: i32, is_final: bool) -> GameEvent {
    GameEvent::new(
        format!("{game_id}-evt"),
        Sport::NcaaBasketball,
        game_id.to_string(),
        "Home".into(),
        "Away".into(),
        home,
        away,
        "Q2".into(),
        2,
        is_final,
        "test",
        0,
    )
}

#[tokio::test]
async fn game_events_channel_drops_oldest_overflow_without_blocking() {
    let bus = EventBus::new();
    let handle = bus.handle();

    // Capacity is 50 — publish well past it without ever awaiting a receiver.
    for i in 0..80 {
        handle.publish_game_event(game_event(&format!("g{i}"), i, 0, false));
    }
    // No panic, no deadlock: try_send-based publish never blocks a producer.
}

#[test]
fn edge_invariant_holds_at_the_max_tradeable_price_boundary() {
    let min_edge = 3;
    let ceiling = max_tradeable_price(min_edge, KALSHI_FEE_RATE);
    assert!(has_edge(ceiling, min_edge, KALSHI_FEE_RATE));
    assert!(!has_edge(ceiling + 1, min_edge, KALSHI_FEE_RATE));
}

#[test]
fn threshold_entries_mark_already_crossed_lines_so_brain_never_resignals_them() {
    let tickers = vec![
        "KXNCAAMBTOTAL-26FEB19WEBBRAD-120".to_string(),
        "KXNCAAMBTOTAL-26FEB19WEBBRAD-150".to_string(),
    ];
    let entries = build_threshold_entries(130, &tickers);
    let crossed = entries.iter().find(|e| e.trigger_score == 120).unwrap();
    let pending = entries.iter().find(|e| e.trigger_score == 150).unwrap();
    assert!(crossed.already_triggered, "a line at or below the current total must start triggered");
    assert!(!pending.already_triggered);
}

#[test]
fn moneyline_cooldown_blocks_a_second_signal_immediately_after_the_first() {
    let mut entry = MoneylineEntry::new("T-1".into(), TeamSide::Home, Side::Yes);
    let t0 = Instant::now();
    assert!(!entry.on_cooldown(t0));
    entry.mark_signaled(t0);
    assert!(entry.on_cooldown(t0 + Duration::from_secs(1)));
    assert!(!entry.on_cooldown(t0 + Duration::from_secs(46)));
}

#[test]
fn risk_halt_survives_further_fills_until_an_operator_resumes_it() {
    let risk = Arc::new(RwLock::new(RiskState::new()));
    risk.write().halt("daily loss limit breached");
    for _ in 0..5 {
        risk.write().apply_fill(40, 3);
    }
    assert!(risk.read().is_halted, "a halt must not clear itself as fills keep arriving");
    risk.write().resume();
    assert!(!risk.read().is_halted);
}

#[test]
fn circuit_breaker_drops_sniper_traffic_after_the_configured_failure_streak() {
    let mut breaker = CircuitBreaker::new("kalshi_orders", 3);
    breaker.record_failure("timeout");
    breaker.record_failure("timeout");
    assert!(breaker.is_closed(), "two failures must not trip a threshold-3 breaker");
    breaker.record_failure("timeout");
    assert!(breaker.is_open());
}

#[test]
fn crunch_time_gate_toggles_independently_per_game() {
    let gate = CrunchTimeGate::new();
    gate.activate("g1");
    assert!(gate.is_active("g1"));
    assert!(!gate.is_active("g2"));
    gate.deactivate("g1");
    assert!(!gate.any_active());
}

#[test]
fn fuzzy_team_matching_resolves_a_kalshi_title_to_the_feed_reported_teams() {
    let title = "Gardner-Webb at Radford: Total Points";
    let (away, home) = parse_title(title).expect("title has an ' at ' separator");
    assert!(abbrev_matches_name("RADF", &home));
    assert!(abbrev_matches_name("GWEBB", &away) || abbrev_matches_name("GARWEB", &away));
}

#[test]
fn final_game_event_carries_the_is_final_flag_through_construction() {
    let event = game_event("g9", 80, 60, true);
    assert!(event.is_final);
    assert_eq!(event.total_score, 140);
}

// --- Full-agent harness -----------------------------------------------------

/// Captures tracing output into memory so a test can assert on a log line
/// without a real subscriber attached. Installed via `tracing::subscriber::
/// set_default`, which is thread-local — safe alongside `#[tokio::test]`'s
/// default single-threaded runtime, where spawned tasks run on the same OS
/// thread as the test function.
#[derive(Clone, Default)]
struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl std::io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;
    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl LogCapture {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).to_string()
    }
}

/// Generates a throwaway Ed25519 key, writes it as a PKCS8 PEM to the temp
/// dir, and loads it through the same path `KalshiAuth::load` takes in
/// production — there is no in-memory constructor to bypass the file.
fn ephemeral_auth() -> KalshiAuth {
    let signing_key = ed25519_dalek::SigningKey::generate(&mut rand_core::OsRng);
    let pem = signing_key
        .to_pkcs8_pem(pkcs8::LineEnding::LF)
        .expect("encode ephemeral key as pkcs8 pem");
    let path = std::env::temp_dir().join(format!("crunchline-test-{}.pem", uuid::Uuid::new_v4()));
    std::fs::write(&path, pem.as_bytes()).expect("write ephemeral pem to disk");
    let auth = KalshiAuth::load("test-key".into(), &path).expect("load ephemeral kalshi key");
    let _ = std::fs::remove_file(&path);
    auth
}

fn today_date_prefix() -> String {
    chrono::Utc::now().format("%y%b%d").to_string().to_uppercase()
}

fn totals_ticker(trigger: i32) -> String {
    format!("KXNCAAMBTOTAL-{}WEBBRAD-{trigger}", today_date_prefix())
}

fn moneyline_ticker() -> String {
    format!("KXNCAAMBGAME-{}WEBBRAD", today_date_prefix())
}

async fn mount_exchange_status(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/exchange/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({})))
        .mount(server)
        .await;
}

async fn mount_markets(server: &MockServer, series: &str, markets: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path("/markets"))
        .and(query_param("series_ticker", series))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "markets": markets })))
        .mount(server)
        .await;
}

fn kalshi_market_json(ticker: &str, title: &str) -> serde_json::Value {
    serde_json::json!({ "ticker": ticker, "title": title, "yes_bid": null, "yes_ask": null, "no_bid": null, "no_ask": null })
}

fn market_update(ticker: &str, yes_ask: i32, no_ask: i32, sequence: u64) -> MarketUpdate {
    MarketUpdate {
        market_ticker: ticker.to_string(),
        yes_bid: 0,
        yes_ask,
        no_bid: 0,
        no_ask,
        yes_volume: 0,
        sequence,
        received_at_ns: 0,
    }
}

fn totals_event(game_id: &str, home_score: i32, away_score: i32) -> GameEvent {
    GameEvent::new(
        format!("{game_id}-{home_score}-{away_score}"),
        Sport::NcaaBasketball,
        game_id.to_string(),
        "Radford".into(),
        "Gardner-Webb".into(),
        home_score,
        away_score,
        "Q2".into(),
        2,
        false,
        "test",
        0,
    )
}

/// Boots a `KalshiRestClient` against a fresh `wiremock` server and a
/// `BrainAgent` wired to it, returning everything a test needs to drive and
/// observe it. The returned `MockServer` must stay alive for the duration of
/// the test — dropping it tears down the listener.
async fn spawn_brain(
    totals_markets: Option<serde_json::Value>,
    moneyline_markets: Option<serde_json::Value>,
    risk: SharedRiskState,
    min_edge_cents: i32,
    max_slippage_cents: i32,
    max_spend_per_trade_cents: i32,
) -> (MockServer, crunchline::bus::BusHandle, watcher::MarketCache, tokio::sync::mpsc::Receiver<crunchline::models::TradeSignal>) {
    let server = MockServer::start().await;
    mount_exchange_status(&server).await;
    if let Some(markets) = totals_markets {
        mount_markets(&server, "KXNCAAMBTOTAL", markets).await;
    }
    if let Some(markets) = moneyline_markets {
        mount_markets(&server, "KXNCAAMBGAME", markets).await;
    }

    let auth = Arc::new(ephemeral_auth());
    let rest = Arc::new(
        KalshiRestClient::connect(&server.uri(), auth.clone())
            .await
            .expect("connect to mock kalshi rest server"),
    );

    let bus = EventBus::new();
    let bus_handle = bus.handle();
    let watcher_agent = WatcherAgent::new("ws://127.0.0.1:0".into(), auth, bus_handle.clone());
    let cache = watcher_agent.cache();
    let ws_subscribe = watcher_agent.subscribe_handle();
    drop(watcher_agent); // never .run() — no real websocket needed for brain-only tests

    let brain = BrainAgent::new(
        bus_handle.clone(),
        cache.clone(),
        ws_subscribe,
        rest,
        Settings::test_defaults().markets,
        min_edge_cents,
        max_slippage_cents,
        max_spend_per_trade_cents,
        50,
        risk,
        CrunchTimeGate::new(),
    );

    let receivers = bus.into_receivers();
    let game_events_rx = receivers.game_events_rx;
    let trade_signals_rx = receivers.trade_signals_rx;
    tokio::spawn(async move { brain.run(game_events_rx).await });

    (server, bus_handle, cache, trade_signals_rx)
}

#[tokio::test]
async fn threshold_crossing_emits_a_trade_signal_at_the_fee_adjusted_ceiling() {
    let risk: SharedRiskState = Arc::new(RwLock::new(RiskState::new()));
    let totals = serde_json::json!([
        kalshi_market_json(&totals_ticker(171), "Gardner-Webb at Radford: Total Points"),
        kalshi_market_json(&totals_ticker(174), "Gardner-Webb at Radford: Total Points"),
        kalshi_market_json(&totals_ticker(177), "Gardner-Webb at Radford: Total Points"),
    ]);
    let (_server, bus, cache, mut trade_signals_rx) = spawn_brain(Some(totals), None, risk, 3, 2, 500).await;

    watcher::insert(&cache, market_update(&totals_ticker(171), 88, 100, 0));

    // Register at total=170 (below every trigger), then cross 171.
    bus.publish_game_event(totals_event("g-threshold", 100, 70));
    tokio::time::sleep(Duration::from_millis(150)).await;
    bus.publish_game_event(totals_event("g-threshold", 101, 70));

    let signal = tokio::time::timeout(Duration::from_secs(2), trade_signals_rx.recv())
        .await
        .expect("brain should emit a signal once the 171 line is crossed")
        .expect("trade signal channel should stay open");

    assert_eq!(signal.market_ticker, totals_ticker(171));
    assert_eq!(signal.side, Side::Yes);
    assert_eq!(signal.max_price_cents, 90, "min(88+2, 93-3) == 90");
    assert!(signal.quantity >= 1);
}

#[tokio::test]
async fn no_edge_suppresses_the_signal_but_still_latches_the_threshold() {
    let risk: SharedRiskState = Arc::new(RwLock::new(RiskState::new()));
    let totals = serde_json::json!([kalshi_market_json(&totals_ticker(171), "Gardner-Webb at Radford: Total Points")]);
    let (_server, bus, cache, mut trade_signals_rx) = spawn_brain(Some(totals), None, risk, 3, 2, 500).await;

    watcher::insert(&cache, market_update(&totals_ticker(171), 95, 100, 0));

    bus.publish_game_event(totals_event("g-no-edge", 100, 70));
    tokio::time::sleep(Duration::from_millis(150)).await;
    bus.publish_game_event(totals_event("g-no-edge", 101, 70));

    let first = tokio::time::timeout(Duration::from_millis(400), trade_signals_rx.recv()).await;
    assert!(first.is_err(), "a 95c ask leaves no edge at min_edge_cents=3 — no signal should fire");

    // Already-triggered latch means a later event at the same total must not re-evaluate either.
    bus.publish_game_event(totals_event("g-no-edge", 102, 70));
    let second = tokio::time::timeout(Duration::from_millis(400), trade_signals_rx.recv()).await;
    assert!(second.is_err(), "a latched threshold must not re-fire on a later event");
}

#[tokio::test]
async fn crunch_time_gate_activates_once_the_nearest_line_prices_in_range() {
    let risk: SharedRiskState = Arc::new(RwLock::new(RiskState::new()));
    let totals = serde_json::json!([kalshi_market_json(&totals_ticker(171), "Gardner-Webb at Radford: Total Points")]);
    let gate = CrunchTimeGate::new();
    let server = MockServer::start().await;
    mount_exchange_status(&server).await;
    mount_markets(&server, "KXNCAAMBTOTAL", totals).await;
    let auth = Arc::new(ephemeral_auth());
    let rest = Arc::new(KalshiRestClient::connect(&server.uri(), auth.clone()).await.unwrap());
    let bus = EventBus::new();
    let bus_handle = bus.handle();
    let watcher_agent = WatcherAgent::new("ws://127.0.0.1:0".into(), auth, bus_handle.clone());
    let cache = watcher_agent.cache();
    let ws_subscribe = watcher_agent.subscribe_handle();
    drop(watcher_agent);

    watcher::insert(&cache, market_update(&totals_ticker(171), 62, 100, 0));

    let brain = BrainAgent::new(
        bus_handle.clone(),
        cache,
        ws_subscribe,
        rest,
        Settings::test_defaults().markets,
        3,
        2,
        500,
        50,
        risk,
        gate.clone(),
    );
    let receivers = bus.into_receivers();
    tokio::spawn(async move { brain.run(receivers.game_events_rx).await });

    bus_handle.publish_game_event(totals_event("g-crunch", 90, 60)); // total=150, below every trigger
    for _ in 0..20 {
        if gate.is_active("g-crunch") {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(gate.is_active("g-crunch"), "a 62c ask on the nearest unfired line should activate crunch time");
}

#[tokio::test]
async fn shield_halt_suppresses_further_brain_signals() {
    let capture = LogCapture::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(capture.clone())
        .with_max_level(tracing::Level::WARN)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let risk: SharedRiskState = Arc::new(RwLock::new(RiskState::new()));

    let mut shield_settings = Settings::test_defaults();
    shield_settings.max_open_exposure_cents = 100;
    let shield = ShieldAgent::new(risk.clone(), shield_settings);

    let shield_bus = EventBus::new();
    let shield_bus_handle = shield_bus.handle();
    let shield_receivers = shield_bus.into_receivers();
    tokio::spawn(async move { shield.run(shield_receivers.fill_reports_rx).await });

    shield_bus_handle.publish_fill_report(FillReport {
        signal_id: "s1".into(),
        order_id: "o1".into(),
        market_ticker: "T-halt".into(),
        side: Side::Yes,
        filled_quantity: 1,
        avg_price_cents: 150, // 150 * 1 >= max_open_exposure_cents(100) -> halt
        status: FillStatus::Filled,
        filled_at_ns: 0,
        latency_ns: 0,
    });

    for _ in 0..50 {
        if risk.read().is_halted {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(risk.read().is_halted, "a fill past the exposure limit should halt");

    let totals = serde_json::json!([kalshi_market_json(&totals_ticker(171), "Gardner-Webb at Radford: Total Points")]);
    let (_server, bus, cache, mut trade_signals_rx) = spawn_brain(Some(totals), None, risk, 3, 2, 500).await;
    watcher::insert(&cache, market_update(&totals_ticker(171), 88, 100, 0));

    bus.publish_game_event(totals_event("g-halted", 100, 70));
    tokio::time::sleep(Duration::from_millis(150)).await;
    bus.publish_game_event(totals_event("g-halted", 101, 70));

    let result = tokio::time::timeout(Duration::from_millis(500), trade_signals_rx.recv()).await;
    assert!(result.is_err(), "brain must not emit a signal while the shield halt is active");

    let log = capture.contents();
    assert!(
        log.contains("shield halted") || log.contains("HALT"),
        "expected a halt-related warning/error log, got: {log}"
    );
}

/// Spins up a bare local websocket server speaking just enough of the Kalshi
/// orderbook protocol to exercise sequence-gap detection — no real network.
async fn spawn_fake_kalshi_ws(frames: Vec<serde_json::Value>) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let Ok((stream, _)) = listener.accept().await else { return };
        let Ok(mut ws) = tokio_tungstenite::accept_async(stream).await else { return };
        for frame in frames {
            if ws.send(Message::Text(frame.to_string())).await.is_err() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        tokio::time::sleep(Duration::from_secs(3)).await;
    });
    format!("ws://{addr}")
}

#[tokio::test]
async fn websocket_sequence_gap_logs_a_warning_and_cache_converges_on_the_next_frame() {
    let capture = LogCapture::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(capture.clone())
        .with_max_level(tracing::Level::WARN)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let snapshot = serde_json::json!({
        "type": "orderbook_snapshot",
        "msg": { "market_ticker": "T-GAP", "seq": 10, "yes": [[88, 10]], "no": [[12, 10]] },
    });
    let gapped_delta = serde_json::json!({
        "type": "orderbook_delta",
        "msg": { "market_ticker": "T-GAP", "seq": 12, "yes": [[89, 5]], "no": [[11, 5]] },
    });
    let ws_url = spawn_fake_kalshi_ws(vec![snapshot, gapped_delta]).await;

    let auth = Arc::new(ephemeral_auth());
    let bus = EventBus::new();
    let bus_handle = bus.handle();
    let watcher_agent = WatcherAgent::new(ws_url, auth, bus_handle);
    let cache = watcher_agent.cache();
    tokio::spawn(async move { watcher_agent.run().await });

    let mut converged_seq = None;
    for _ in 0..60 {
        if let Some(update) = watcher::get_latest(&cache, "T-GAP") {
            if update.sequence == 12 {
                converged_seq = Some(update.sequence);
                break;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    assert_eq!(converged_seq, Some(12), "cache should converge on the post-gap delta's book");

    let log = capture.contents();
    assert!(log.contains("sequence gap"), "expected a sequence-gap warning log, got: {log}");
}

#[tokio::test]
async fn moneyline_cooldown_allows_a_second_signal_only_after_it_elapses() {
    // MoneylineEntry's cooldown is timed with std::time::Instant, which
    // tokio::time::pause()/advance() cannot fast-forward — this test sleeps
    // real wall-clock time to cross the 45s window.
    let risk: SharedRiskState = Arc::new(RwLock::new(RiskState::new()));
    let moneyline = serde_json::json!([kalshi_market_json(&moneyline_ticker(), "Gardner-Webb at Radford")]);
    let (_server, bus, cache, mut trade_signals_rx) = spawn_brain(None, Some(moneyline), risk, 3, 2, 500).await;

    watcher::insert(&cache, market_update(&moneyline_ticker(), 50, 80, 0));

    bus.publish_game_event(totals_event("g-moneyline", 6, 0)); // home leads by 6, period 2
    let first = tokio::time::timeout(Duration::from_secs(2), trade_signals_rx.recv())
        .await
        .expect("home's growing lead with positive edge should fire a signal")
        .expect("channel open");
    assert_eq!(first.market_ticker, moneyline_ticker());
    assert_eq!(first.side, Side::Yes);

    tokio::time::sleep(Duration::from_secs(1)).await;
    bus.publish_game_event(totals_event("g-moneyline", 10, 0)); // +1s, still on cooldown
    let second = tokio::time::timeout(Duration::from_millis(400), trade_signals_rx.recv()).await;
    assert!(second.is_err(), "a second signal within the 45s cooldown must be suppressed");

    tokio::time::sleep(Duration::from_secs(19)).await;
    bus.publish_game_event(totals_event("g-moneyline", 12, 0)); // +20s, still on cooldown
    let third = tokio::time::timeout(Duration::from_millis(400), trade_signals_rx.recv()).await;
    assert!(third.is_err(), "20s after the first signal is still inside the 45s cooldown");

    tokio::time::sleep(Duration::from_secs(26)).await;
    bus.publish_game_event(totals_event("g-moneyline", 16, 0)); // +46s, cooldown elapsed
    let fourth = tokio::time::timeout(Duration::from_secs(2), trade_signals_rx.recv())
        .await
        .expect("cooldown should have elapsed by now")
        .expect("channel open");
    assert_eq!(fourth.market_ticker, moneyline_ticker());
}
