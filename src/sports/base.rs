//! Abstract interface for sports data feed clients.
//!
//! The Oracle agent depends only on this trait, so swapping or adding a
//! provider (SportsData.io, ESPN, a future push-based feed) never touches
//! Oracle itself.

use async_trait::async_trait;

use crate::models::GameEvent;

#[async_trait]
pub trait SportsFeedClient: Send + Sync {
    /// Initialize connections, pre-warm sessions. Called once before the
    /// first `poll_once`.
    async fn startup(&mut self) -> anyhow::Result<()>;

    async fn shutdown(&mut self);

    /// Poll (or wait for) the next batch of score changes, sleeping for
    /// this client's configured interval internally. Returns only events
    /// whose score actually changed since the last call.
    async fn poll_once(&mut self) -> Vec<GameEvent>;

    fn name(&self) -> &str;
}
