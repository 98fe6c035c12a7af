pub mod brain;
pub mod oracle;
pub mod shield;
pub mod sniper;
pub mod watcher;

pub use brain::BrainAgent;
pub use oracle::OracleAgent;
pub use shield::ShieldAgent;
pub use sniper::SniperAgent;
pub use watcher::WatcherAgent;
