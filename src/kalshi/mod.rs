pub mod auth;
pub mod rest;
pub mod ws;

pub use auth::KalshiAuth;
pub use rest::{KalshiMarket, KalshiRestClient, OrderAck};
pub use ws::{KalshiWsClient, WsSubscribeHandle};
