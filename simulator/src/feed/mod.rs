//! Sources of raw feed messages.
//!
//! A source only moves text: framing and validation happen in the pipeline.

pub mod replay;
pub mod ws;

use async_trait::async_trait;
use tokio::sync::mpsc::Sender;

pub use replay::ReplayFeed;
pub use ws::WsFeed;

#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Pushes raw messages into `sender` until the source is exhausted or
    /// the receiver is dropped.
    async fn stream(&self, sender: Sender<String>) -> anyhow::Result<()>;
}
