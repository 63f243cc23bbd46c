use std::sync::Arc;

use market::cost::CostParams;
use market::error::{BookError, CalcError};
use market::store::OrderBookStore;
use market::types::{PriceLevel, Side};
use serde_json::json;
use simulator::counters::PipelineCounters;
use simulator::error::PipelineError;
use simulator::pipeline::{Delivery, SkipReason, UpdateOutcome, UpdatePipeline};
use simulator::types::MetricsRecord;
use tokio::sync::mpsc;

// -----------------------
// helpers
// -----------------------

struct Harness {
    store: Arc<OrderBookStore>,
    pipeline: UpdatePipeline,
    records: mpsc::Receiver<MetricsRecord>,
    counters: PipelineCounters,
}

fn harness(quantity: f64, interval: usize) -> Harness {
    let store = Arc::new(OrderBookStore::new());
    let counters = PipelineCounters::default();
    let (tx, records) = mpsc::channel(256);
    let pipeline = UpdatePipeline::new(
        Arc::clone(&store),
        CostParams {
            quantity,
            ..CostParams::default()
        },
        interval,
        tx,
        counters.clone(),
    );
    Harness {
        store,
        pipeline,
        records,
        counters,
    }
}

fn push(bids: serde_json::Value, asks: serde_json::Value, ts: u64) -> String {
    json!({
        "arg": { "channel": "books", "instId": "BTC-USDT" },
        "data": [{ "bids": bids, "asks": asks, "ts": ts.to_string() }]
    })
    .to_string()
}

fn dispatched(out: UpdateOutcome) -> MetricsRecord {
    match out {
        UpdateOutcome::Dispatched { record, .. } => record,
        other => panic!("expected a dispatched record, got {other:?}"),
    }
}

// -----------------------
// scenarios
// -----------------------

#[test]
fn single_level_fill_slippage() {
    let mut h = harness(0.5, 100);

    let out = h
        .pipeline
        .on_message(&push(json!([["100.0", "2.0"]]), json!([["100.2", "1.0"]]), 1))
        .unwrap();
    let record = dispatched(out);

    assert!((record.slippage_pct - 0.0999).abs() < 1e-4);
    assert!((h.pipeline.state().mid_price - 100.1).abs() < 1e-9);
    assert_eq!(record.ts_ms, 1);
    assert!(record.calc_latency_ms >= 0.0);

    // The same record went through the hand-off queue.
    assert_eq!(h.records.try_recv().unwrap(), record);
}

#[test]
fn tombstone_best_ask_is_skipped() {
    let mut h = harness(0.5, 100);

    h.pipeline
        .on_message(&push(
            json!([["100.0", "2.0"]]),
            json!([["100.2", "0.0"], ["100.5", "2.0"]]),
            2,
        ))
        .unwrap();

    let (_, ask) = h.store.best_levels().unwrap();
    assert_eq!(ask, PriceLevel::new(100.5, 2.0));
    assert!((h.pipeline.state().mid_price - 100.25).abs() < 1e-9);
}

#[test]
fn missing_bids_keeps_prior_book() {
    let mut h = harness(0.5, 100);
    h.pipeline
        .on_message(&push(json!([["100.0", "2.0"]]), json!([["100.2", "1.0"]]), 1))
        .unwrap();
    let _ = h.records.try_recv();
    let before = h.store.snapshot();
    let state_before = *h.pipeline.state();

    let raw = json!({ "data": [{ "asks": [["1.0", "1.0"]], "ts": "9" }] }).to_string();
    let err = h.pipeline.on_message(&raw).unwrap_err();

    assert!(matches!(
        err,
        PipelineError::Book(BookError::MissingField("bids"))
    ));
    assert_eq!(h.store.snapshot(), before);
    assert_eq!(*h.pipeline.state(), state_before);
    assert!(h.records.try_recv().is_err());
    assert_eq!(h.counters.snapshot().rejected_book, 1);
}

#[test]
fn empty_ask_side_keeps_prior_state() {
    let mut h = harness(0.5, 100);

    // Skewed top of book moves maker proportion away from 0.5.
    h.pipeline
        .on_message(&push(json!([["100.0", "9.0"]]), json!([["100.2", "1.0"]]), 1))
        .unwrap();
    let prior = *h.pipeline.state();
    assert!(prior.maker_proportion > 0.5);

    let out = h
        .pipeline
        .on_message(&push(json!([["100.0", "2.0"]]), json!([]), 2))
        .unwrap();

    assert_eq!(
        out,
        UpdateOutcome::Skipped(SkipReason::Uncomputable(CalcError::EmptyBook(Side::Ask)))
    );
    assert_eq!(h.pipeline.state().maker_proportion, prior.maker_proportion);
    // The book itself was still replaced.
    assert_eq!(h.store.ts_ms(), 2);
    assert_eq!(h.counters.snapshot().skipped_uncomputable, 1);
}

#[test]
fn report_after_exactly_one_hundred_updates() {
    let mut h = harness(0.5, 100);
    let msg = push(json!([["100.0", "2.0"]]), json!([["100.2", "1.0"]]), 1);

    // Uncomputable and rejected updates do not count toward the window.
    h.pipeline
        .on_message(&push(json!([["100.0", "2.0"]]), json!([]), 1))
        .unwrap();
    assert!(h.pipeline.on_message("{").is_err());

    for i in 1..100 {
        let out = h.pipeline.on_message(&msg).unwrap();
        let UpdateOutcome::Dispatched { report, .. } = out else {
            panic!("update {i} was not dispatched");
        };
        assert!(report.is_none(), "early report at update {i}");
    }
    assert_eq!(h.pipeline.reporter().pending(), 99);

    let UpdateOutcome::Dispatched { report, .. } = h.pipeline.on_message(&msg).unwrap() else {
        panic!("100th update was not dispatched");
    };
    let report = report.expect("report on the 100th computed update");

    assert_eq!(report.update_count, 100);
    for stage in [report.parse, report.process, report.e2e] {
        assert_eq!(stage.unwrap().samples, 100);
    }
    assert_eq!(h.pipeline.reporter().pending(), 0);
    assert_eq!(h.counters.snapshot().reports, 1);
}

#[test]
fn records_follow_book_order() {
    let mut h = harness(0.5, 100);

    for ts in 1..=5u64 {
        let px = 100.0 + ts as f64;
        let out = h
            .pipeline
            .on_message(&push(json!([[px, 1.0]]), json!([[px + 0.2, 1.0]]), ts))
            .unwrap();
        assert!(matches!(
            out,
            UpdateOutcome::Dispatched {
                delivery: Delivery::Queued,
                ..
            }
        ));
    }

    let seen: Vec<u64> = std::iter::from_fn(|| h.records.try_recv().ok())
        .map(|r| r.ts_ms)
        .collect();
    assert_eq!(seen, vec![1, 2, 3, 4, 5]);
}

#[test]
fn malformed_levels_are_counted_but_not_fatal() {
    let mut h = harness(0.5, 100);

    let out = h
        .pipeline
        .on_message(&push(
            json!([["bad", "2.0"], ["100.0", "2.0"]]),
            json!([["100.2"], ["100.2", "1.0"]]),
            3,
        ))
        .unwrap();

    dispatched(out);
    assert_eq!(h.counters.snapshot().levels_dropped, 2);
    assert_eq!(h.store.snapshot().bids, vec![PriceLevel::new(100.0, 2.0)]);
}
