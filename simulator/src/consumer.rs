//! Consumption side: polls the hand-off queue on a fixed cadence and
//! publishes the most recent record.

use std::time::{Duration, Instant};

use common::time::elapsed_ms;
use market::latency_window::LatencyWindow;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::{mpsc, watch};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use crate::sink::MetricsSink;
use crate::types::MetricsRecord;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ConsumerStats {
    pub rendered: u64,
    /// Records pulled off the queue but superseded by a newer one in the
    /// same poll.
    pub coalesced: u64,
    pub sink_errors: u64,
}

pub struct Consumer<S> {
    rx: mpsc::Receiver<MetricsRecord>,
    sink: S,
    poll_every: Duration,
    render_latency: LatencyWindow,
    stats: ConsumerStats,
}

impl<S: MetricsSink> Consumer<S> {
    /// `report_every` is the number of renders between render-latency logs.
    pub fn new(
        rx: mpsc::Receiver<MetricsRecord>,
        sink: S,
        poll_every: Duration,
        report_every: usize,
    ) -> Self {
        Self {
            rx,
            sink,
            poll_every,
            render_latency: LatencyWindow::new(report_every),
            stats: ConsumerStats::default(),
        }
    }

    /// Polls until shutdown is signalled or every producer is gone.
    ///
    /// Shutdown is observed between polls, so the loop exits within one
    /// poll interval. Records still queued at that point are dropped.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> (ConsumerStats, S) {
        let mut ticker = interval(self.poll_every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(every_ms = self.poll_every.as_millis() as u64, "consumer started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }

                _ = ticker.tick() => {
                    let (latest, closed) = self.drain_latest();
                    if let Some(record) = latest {
                        self.render(&record);
                    }
                    if closed {
                        info!("producer gone; consumer stopping");
                        break;
                    }
                }
            }
        }

        info!(
            rendered = self.stats.rendered,
            coalesced = self.stats.coalesced,
            "consumer stopped"
        );
        (self.stats, self.sink)
    }

    /// Takes everything currently queued and keeps only the newest record.
    fn drain_latest(&mut self) -> (Option<MetricsRecord>, bool) {
        let mut latest = None;
        let mut taken = 0u64;

        let closed = loop {
            match self.rx.try_recv() {
                Ok(record) => {
                    latest = Some(record);
                    taken += 1;
                }
                Err(TryRecvError::Empty) => break false,
                Err(TryRecvError::Disconnected) => break true,
            }
        };

        if taken > 1 {
            self.stats.coalesced += taken - 1;
            debug!(skipped = taken - 1, "coalesced stale records");
        }
        (latest, closed)
    }

    fn render(&mut self, record: &MetricsRecord) {
        let start = Instant::now();
        if let Err(e) = self.sink.publish(record) {
            self.stats.sink_errors += 1;
            warn!(error = ?e, "sink rejected record");
            return;
        }
        self.render_latency.push(elapsed_ms(start, Instant::now()));
        self.stats.rendered += 1;

        if self.render_latency.len() == self.render_latency.capacity() {
            if let Some(s) = self.render_latency.summary() {
                info!(
                    mean_ms = s.mean_ms,
                    max_ms = s.max_ms,
                    samples = s.samples,
                    "render latency"
                );
            }
            self.render_latency.clear();
        }
    }
}
