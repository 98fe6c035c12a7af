pub mod events;
pub mod state;

pub use events::{FillReport, FillStatus, GameEvent, MarketUpdate, Side, Sport, TradeSignal};
pub use state::{CrunchTimeGate, RiskState, SharedRiskState};
