//! Typed, multi-channel, in-process event bus. All inter-agent traffic goes
//! through this module; there are no direct references between agents other
//! than the Watcher cache handle and the shared risk/gate state.
//!
//! Queue sizing rationale (unchanged from the original):
//!   game_events:    50  — if Oracle falls 50 events behind, data is stale anyway
//!   market_updates: 200 — orderbook deltas arrive faster than score events
//!   trade_signals:  10  — Brain should never queue faster than Sniper can execute
//!   fill_reports:   100 — Shield processes async, conservative cap

use tokio::sync::mpsc;

use crate::models::{FillReport, GameEvent, MarketUpdate, TradeSignal};

const GAME_EVENTS_CAPACITY: usize = 50;
const MARKET_UPDATES_CAPACITY: usize = 200;
const TRADE_SIGNALS_CAPACITY: usize = 10;
const FILL_REPORTS_CAPACITY: usize = 100;

pub struct EventBus {
    game_events_tx: mpsc::Sender<GameEvent>,
    pub game_events_rx: mpsc::Receiver<GameEvent>,
    market_updates_tx: mpsc::Sender<MarketUpdate>,
    pub market_updates_rx: mpsc::Receiver<MarketUpdate>,
    trade_signals_tx: mpsc::Sender<TradeSignal>,
    pub trade_signals_rx: mpsc::Receiver<TradeSignal>,
    fill_reports_tx: mpsc::Sender<FillReport>,
    pub fill_reports_rx: mpsc::Receiver<FillReport>,
}

/// Cloneable publish-only handle. Agents that only ever publish (the sports
/// feed fan-in, Brain, Sniper) hold one of these rather than the full bus.
#[derive(Clone)]
pub struct BusHandle {
    game_events_tx: mpsc::Sender<GameEvent>,
    market_updates_tx: mpsc::Sender<MarketUpdate>,
    trade_signals_tx: mpsc::Sender<TradeSignal>,
    fill_reports_tx: mpsc::Sender<FillReport>,
}

impl EventBus {
    pub fn new() -> Self {
        let (game_events_tx, game_events_rx) = mpsc::channel(GAME_EVENTS_CAPACITY);
        let (market_updates_tx, market_updates_rx) = mpsc::channel(MARKET_UPDATES_CAPACITY);
        let (trade_signals_tx, trade_signals_rx) = mpsc::channel(TRADE_SIGNALS_CAPACITY);
        let (fill_reports_tx, fill_reports_rx) = mpsc::channel(FILL_REPORTS_CAPACITY);
        Self {
            game_events_tx,
            game_events_rx,
            market_updates_tx,
            market_updates_rx,
            trade_signals_tx,
            trade_signals_rx,
            fill_reports_tx,
            fill_reports_rx,
        }
    }

    pub fn handle(&self) -> BusHandle {
        BusHandle {
            game_events_tx: self.game_events_tx.clone(),
            market_updates_tx: self.market_updates_tx.clone(),
            trade_signals_tx: self.trade_signals_tx.clone(),
            fill_reports_tx: self.fill_reports_tx.clone(),
        }
    }

    /// Split into the receiver ends, consuming the bus — each receiver is
    /// handed to exactly one agent task.
    pub fn into_receivers(self) -> BusReceivers {
        BusReceivers {
            game_events_rx: self.game_events_rx,
            market_updates_rx: self.market_updates_rx,
            trade_signals_rx: self.trade_signals_rx,
            fill_reports_rx: self.fill_reports_rx,
        }
    }
}

pub struct BusReceivers {
    pub game_events_rx: mpsc::Receiver<GameEvent>,
    pub market_updates_rx: mpsc::Receiver<MarketUpdate>,
    pub trade_signals_rx: mpsc::Receiver<TradeSignal>,
    pub fill_reports_rx: mpsc::Receiver<FillReport>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl BusHandle {
    /// Non-blocking publish. Drops and logs on a full queue — stale data
    /// is worse than no data, never worth blocking a producer for.
    pub fn publish_game_event(&self, event: GameEvent) {
        if let Err(mpsc::error::TrySendError::Full(event)) = self.game_events_tx.try_send(event) {
            tracing::warn!(game_id = %event.game_id, "game_events queue full — dropping stale event");
        }
    }

    pub fn publish_market_update(&self, update: MarketUpdate) {
        if let Err(mpsc::error::TrySendError::Full(update)) =
            self.market_updates_tx.try_send(update)
        {
            tracing::warn!(ticker = %update.market_ticker, "market_updates queue full — dropping update");
        }
    }

    pub fn publish_trade_signal(&self, signal: TradeSignal) {
        if let Err(mpsc::error::TrySendError::Full(signal)) =
            self.trade_signals_tx.try_send(signal)
        {
            tracing::error!(
                signal_id = %signal.signal_id,
                "trade_signals queue full — signal DROPPED, sniper may be overloaded"
            );
        }
    }

    pub fn publish_fill_report(&self, report: FillReport) {
        if let Err(mpsc::error::TrySendError::Full(report)) =
            self.fill_reports_tx.try_send(report)
        {
            tracing::warn!(order_id = %report.order_id, "fill_reports queue full — dropping fill report");
        }
    }
}
