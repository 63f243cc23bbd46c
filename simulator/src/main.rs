use std::io;
use std::sync::Arc;

use anyhow::Context;
use common::logger::init_tracing;
use market::store::OrderBookStore;
use simulator::{
    config::{AppConfig, OutputFormat},
    consumer::Consumer,
    counters::PipelineCounters,
    feed::{FeedSource, ReplayFeed, WsFeed},
    pipeline::UpdatePipeline,
    sink::{ConsoleSink, DisplayInputs, JsonLinesSink, MetricsSink},
    types::MetricsRecord,
};
use tokio::sync::{mpsc, watch};

/// Raw messages buffered between the transport and the pipeline.
const FEED_BUFFER: usize = 1_024;

fn build_sink(cfg: &AppConfig) -> Box<dyn MetricsSink> {
    match cfg.output {
        OutputFormat::Console => Box::new(ConsoleSink::new(
            io::stdout(),
            DisplayInputs {
                exchange: cfg.exchange.clone(),
                symbol: cfg.symbol.clone(),
                order_type: "market".to_string(),
                quantity: cfg.quantity,
                fee_tier: cfg.fee_tier.clone(),
            },
        )),
        OutputFormat::JsonLines => Box::new(JsonLinesSink::new(io::stdout())),
    }
}

fn build_feed(cfg: &AppConfig) -> Box<dyn FeedSource> {
    match &cfg.replay_path {
        Some(path) => Box::new(ReplayFeed::new(path.clone(), cfg.replay_pace())),
        None => Box::new(WsFeed::new(
            cfg.ws_url.clone(),
            cfg.symbol.clone(),
            cfg.reconnect_delay(),
        )),
    }
}

/// Starts the consumer task on its own poll loop.
fn start_consumer(
    cfg: &AppConfig,
    rx: mpsc::Receiver<MetricsRecord>,
    shutdown: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()> {
    let consumer = Consumer::new(
        rx,
        build_sink(cfg),
        cfg.poll_interval(),
        cfg.benchmark_interval,
    );

    tokio::spawn(async move {
        let (stats, _sink) = consumer.run(shutdown).await;
        tracing::info!(?stats, "consumer finished");
    })
}

/// Starts the transport task feeding raw messages to the pipeline.
fn start_feed(cfg: &AppConfig, tx: mpsc::Sender<String>) {
    let feed = build_feed(cfg);
    tokio::spawn(async move {
        if let Err(e) = feed.stream(tx).await {
            tracing::error!(error = ?e, "feed worker failed");
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let is_production = std::env::var("APP_ENV").unwrap_or_default() == "production";
    init_tracing("simulator", is_production);

    let cfg = AppConfig::from_env();
    tracing::info!(
        exchange = %cfg.exchange,
        symbol = %cfg.symbol,
        quantity = cfg.quantity,
        taker_fee = cfg.taker_fee_rate,
        replay = ?cfg.replay_path,
        "Starting trade cost simulator..."
    );

    let store = Arc::new(OrderBookStore::new());
    let counters = PipelineCounters::default();

    let (record_tx, record_rx) = mpsc::channel::<MetricsRecord>(cfg.queue_capacity);
    let (feed_tx, feed_rx) = mpsc::channel::<String>(FEED_BUFFER);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let consumer_task = start_consumer(&cfg, record_rx, shutdown_rx.clone());

    let pipeline = UpdatePipeline::new(
        store,
        cfg.cost_params(),
        cfg.benchmark_interval,
        record_tx,
        counters.clone(),
    );
    let mut pipeline_task = tokio::spawn(pipeline.run(feed_rx, shutdown_rx));

    start_feed(&cfg, feed_tx);

    let pipeline_done = tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res.context("listen for ctrl-c")?;
            tracing::info!("Shutdown signal received");
            false
        }
        res = &mut pipeline_task => {
            if let Err(e) = res {
                tracing::error!(error = ?e, "ingestion task failed");
            }
            // Give the consumer one poll to show the final record.
            tokio::time::sleep(cfg.poll_interval()).await;
            true
        }
    };

    if shutdown_tx.send(true).is_err() {
        tracing::debug!("no task left to receive shutdown");
    }

    if !pipeline_done {
        if let Err(e) = pipeline_task.await {
            tracing::error!(error = ?e, "ingestion task failed");
        }
    }
    if let Err(e) = consumer_task.await {
        tracing::error!(error = ?e, "consumer task failed");
    }

    tracing::info!(counters = ?counters.snapshot(), "simulator stopped");
    Ok(())
}
