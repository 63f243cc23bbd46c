use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::Sender;
use tracing::{info, instrument};

use super::FeedSource;

/// Replays newline-delimited raw messages from a capture file.
pub struct ReplayFeed {
    pub path: PathBuf,
    /// Pause after each message; zero replays as fast as the pipeline takes them.
    pub pace: Duration,
}

impl ReplayFeed {
    pub fn new(path: impl Into<PathBuf>, pace: Duration) -> Self {
        Self {
            path: path.into(),
            pace,
        }
    }
}

#[async_trait]
impl FeedSource for ReplayFeed {
    #[instrument(skip(self, sender), fields(path = %self.path.display()))]
    async fn stream(&self, sender: Sender<String>) -> anyhow::Result<()> {
        let file = File::open(&self.path)
            .await
            .with_context(|| format!("open replay file {}", self.path.display()))?;
        let mut lines = BufReader::new(file).lines();
        let mut sent = 0u64;

        while let Some(line) = lines.next_line().await.context("read replay line")? {
            if line.trim().is_empty() {
                continue;
            }
            if sender.send(line).await.is_err() {
                break;
            }
            sent += 1;
            if !self.pace.is_zero() {
                tokio::time::sleep(self.pace).await;
            }
        }

        info!(sent, "replay finished");
        Ok(())
    }
}
