use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::time::Duration;
use tokio::sync::mpsc::Sender;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, instrument, warn};

use super::FeedSource;

/// Live order-book feed over a public websocket.
pub struct WsFeed {
    pub ws_url: String,
    pub symbol: String,
    pub reconnect_delay: Duration,
}

impl WsFeed {
    pub fn new(ws_url: String, symbol: String, reconnect_delay: Duration) -> Self {
        Self {
            ws_url,
            symbol,
            reconnect_delay,
        }
    }

    /// Subscribe request for the full-depth book channel of `symbol`.
    pub fn subscribe_request(symbol: &str) -> serde_json::Value {
        json!({
            "op": "subscribe",
            "args": [{ "channel": "books", "instId": symbol }]
        })
    }

    #[instrument(skip(write))]
    async fn send_subscribe<E>(
        write: &mut (impl futures::Sink<Message, Error = E> + Unpin),
        symbol: &str,
    ) -> anyhow::Result<()>
    where
        E: std::fmt::Debug + Send + Sync + 'static,
    {
        let text = serde_json::to_string(&Self::subscribe_request(symbol))?;
        debug!(payload = %text, "sending subscribe request");

        write
            .send(Message::Text(text.into()))
            .await
            .map_err(|e| anyhow::anyhow!("send subscribe: {:?}", e))?;

        Ok(())
    }
}

#[async_trait]
impl FeedSource for WsFeed {
    /// Reconnects forever; only returns once the pipeline side is gone.
    #[instrument(skip(self, sender), fields(url = %self.ws_url, symbol = %self.symbol))]
    async fn stream(&self, sender: Sender<String>) -> anyhow::Result<()> {
        info!("starting book feed worker");

        loop {
            debug!("connecting to feed websocket");
            match connect_async(&self.ws_url).await {
                Ok((ws, _)) => {
                    info!("websocket connection established");
                    let (mut write, mut read) = ws.split();

                    if let Err(e) = Self::send_subscribe(&mut write, &self.symbol).await {
                        error!(error = ?e, "subscribe failed; retrying connection");
                    } else {
                        while let Some(msg) = read.next().await {
                            let msg = match msg {
                                Ok(m) => m,
                                Err(e) => {
                                    warn!(error = ?e, "websocket stream error");
                                    break;
                                }
                            };

                            if msg.is_ping() || msg.is_pong() {
                                continue;
                            }

                            if msg.is_close() {
                                info!("server closed the connection");
                                break;
                            }

                            if !msg.is_text() {
                                debug!(msg_type = ?msg, "ignoring non-text websocket message");
                                continue;
                            }

                            let raw = match msg.to_text() {
                                Ok(t) => t.to_owned(),
                                Err(e) => {
                                    error!(error = ?e, "failed to extract text from ws message");
                                    continue;
                                }
                            };

                            tracing::trace!(raw = %raw, "received raw websocket message");

                            if sender.send(raw).await.is_err() {
                                info!("pipeline receiver dropped; feed worker stopping");
                                return Ok(());
                            }
                        }
                    }
                }
                Err(e) => {
                    error!(error = ?e, "websocket connection failed");
                }
            }

            if sender.is_closed() {
                return Ok(());
            }

            warn!(interval = ?self.reconnect_delay, "disconnected; attempting reconnection");
            tokio::time::sleep(self.reconnect_delay).await;
        }
    }
}
