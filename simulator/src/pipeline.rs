//! Ingestion side of the simulator.
//!
//! Every feed message runs to completion before the next one is taken:
//!
//! `Received → Decoded → BookApplied → Computed → Dispatched`
//!
//! The book lock is held only inside `apply` and `snapshot`, and the hand-off
//! queue is only touched by a non-blocking `try_send`, so a slow consumer can
//! never stall ingestion.

use std::sync::Arc;
use std::time::{Duration, Instant};

use common::logger::{update_span, warn_if_slow};
use common::time::elapsed_ms;
use market::cost::{self, CostParams};
use market::error::CalcError;
use market::store::OrderBookStore;
use market::types::SmoothedState;
use market::wire::{self, FeedMessage};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::counters::PipelineCounters;
use crate::error::PipelineError;
use crate::reporter::{BenchmarkReporter, LatencyReport, StageLatencies};
use crate::types::MetricsRecord;

/// Budget for one cost-model evaluation before a slow-path warning.
const COMPUTE_BUDGET: Duration = Duration::from_millis(5);

/// How much of the first raw message is echoed to the log.
const PREVIEW_CHARS: usize = 100;

/// What happened to the computed record at the hand-off.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Delivery {
    Queued,
    /// Queue at capacity; the consumer only needs the latest value anyway.
    DroppedFull,
    ConsumerGone,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SkipReason {
    /// Subscribe ack or other control message.
    ControlEvent(String),
    /// Book applied but not usable for a quote; smoothed state kept.
    Uncomputable(CalcError),
}

#[derive(Clone, Debug, PartialEq)]
pub enum UpdateOutcome {
    Dispatched {
        seq: u64,
        record: MetricsRecord,
        delivery: Delivery,
        report: Option<LatencyReport>,
    },
    Skipped(SkipReason),
}

pub struct UpdatePipeline {
    store: Arc<OrderBookStore>,
    params: CostParams,
    state: SmoothedState,
    tx: mpsc::Sender<MetricsRecord>,
    reporter: BenchmarkReporter,
    counters: PipelineCounters,
    seq: u64,
    previewed: bool,
}

impl UpdatePipeline {
    pub fn new(
        store: Arc<OrderBookStore>,
        params: CostParams,
        benchmark_interval: usize,
        tx: mpsc::Sender<MetricsRecord>,
        counters: PipelineCounters,
    ) -> Self {
        Self {
            store,
            params,
            state: SmoothedState::default(),
            tx,
            reporter: BenchmarkReporter::new(benchmark_interval),
            counters,
            seq: 0,
            previewed: false,
        }
    }

    pub fn state(&self) -> &SmoothedState {
        &self.state
    }

    pub fn reporter(&self) -> &BenchmarkReporter {
        &self.reporter
    }

    /// Processes one raw feed message end to end.
    ///
    /// An `Err` means the update was dropped before the book changed.
    pub fn on_message(&mut self, raw: &str) -> Result<UpdateOutcome, PipelineError> {
        let received = Instant::now();
        self.seq += 1;
        let seq = self.seq;

        let span = update_span(seq);
        let _enter = span.enter();

        PipelineCounters::inc(&self.counters.received);

        if !self.previewed {
            self.previewed = true;
            let preview: String = raw.chars().take(PREVIEW_CHARS).collect();
            info!(%preview, "first raw message");
        }

        // Received -> Decoded
        let update = match wire::parse_message(raw) {
            Ok(FeedMessage::Book(update)) => update,
            Ok(FeedMessage::Event(name)) => {
                PipelineCounters::inc(&self.counters.control_events);
                debug!(event = %name, "control message");
                return Ok(UpdateOutcome::Skipped(SkipReason::ControlEvent(name)));
            }
            Err(e) => {
                PipelineCounters::inc(&self.counters.rejected_decode);
                return Err(e.into());
            }
        };
        let decoded = Instant::now();

        // Decoded -> BookApplied
        let applied = self.store.apply(&update).inspect_err(|_| {
            PipelineCounters::inc(&self.counters.rejected_book);
        })?;
        span.record("ts_ms", applied.ts_ms);

        if !applied.dropped.is_empty() {
            PipelineCounters::add(&self.counters.levels_dropped, applied.dropped.len() as u64);
            for e in &applied.dropped {
                warn!(error = %e, "malformed level dropped");
            }
        }

        if let Some((bid, ask)) = self.store.best_levels() {
            debug!(
                bid = bid.price,
                bid_qty = bid.quantity,
                ask = ask.price,
                ask_qty = ask.quantity,
                "top of book"
            );
        }

        // BookApplied -> Computed
        let book = self.store.snapshot();

        let calc_start = Instant::now();
        let result = warn_if_slow("compute", COMPUTE_BUDGET, || {
            cost::compute(&book, &self.state, &self.params)
        });
        let computed = Instant::now();

        let (estimate, next) = match result {
            Ok(v) => v,
            Err(e) => {
                PipelineCounters::inc(&self.counters.skipped_uncomputable);
                debug!(error = %e, "no estimate for this book; keeping prior state");
                return Ok(UpdateOutcome::Skipped(SkipReason::Uncomputable(e)));
            }
        };
        self.state = next;

        // Computed -> Dispatched
        let record = MetricsRecord::new(book.ts_ms, &estimate, elapsed_ms(calc_start, computed));
        let delivery = self.dispatch(record);
        let dispatched = Instant::now();

        let latencies = StageLatencies {
            parse_ms: elapsed_ms(received, decoded),
            process_ms: elapsed_ms(decoded, computed),
            e2e_ms: elapsed_ms(received, dispatched),
        };
        debug!(
            parse_ms = latencies.parse_ms,
            e2e_ms = latencies.e2e_ms,
            slippage_pct = record.slippage_pct,
            net_cost_usd = record.net_cost_usd,
            "update processed"
        );

        let report = self.reporter.record(latencies);
        if let Some(report) = &report {
            PipelineCounters::inc(&self.counters.reports);
            report.emit();
        }

        Ok(UpdateOutcome::Dispatched {
            seq,
            record,
            delivery,
            report,
        })
    }

    fn dispatch(&self, record: MetricsRecord) -> Delivery {
        match self.tx.try_send(record) {
            Ok(()) => {
                PipelineCounters::inc(&self.counters.dispatched);
                Delivery::Queued
            }
            Err(TrySendError::Full(_)) => {
                PipelineCounters::inc(&self.counters.queue_full);
                debug!("hand-off queue full; record dropped");
                Delivery::DroppedFull
            }
            Err(TrySendError::Closed(_)) => {
                PipelineCounters::inc(&self.counters.consumer_gone);
                warn!("consumer gone; record dropped");
                Delivery::ConsumerGone
            }
        }
    }

    /// Drives the pipeline from `feed` until the feed ends or shutdown is
    /// signalled. Bad messages are logged and skipped.
    pub async fn run(
        mut self,
        mut feed: mpsc::Receiver<String>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Self {
        info!("ingestion loop started");

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

                msg = feed.recv() => {
                    let Some(raw) = msg else {
                        info!("feed closed");
                        break;
                    };
                    if let Err(e) = self.on_message(&raw) {
                        warn!(error = %e, "update dropped");
                    }
                }
            }
        }

        if self.reporter.pending() > 0 {
            self.reporter.flush().emit();
        }
        info!(updates = self.reporter.updates(), "ingestion loop stopped");
        self
    }
}
