use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Minimal counters for operational visibility.
///
/// Cloning shares the underlying atomics, so the binary can keep a handle
/// while the pipeline owns another.
#[derive(Clone, Default)]
pub struct PipelineCounters {
    pub received: Arc<AtomicU64>,
    pub control_events: Arc<AtomicU64>,

    // drop reasons
    pub rejected_decode: Arc<AtomicU64>,
    pub rejected_book: Arc<AtomicU64>,
    pub levels_dropped: Arc<AtomicU64>,
    pub skipped_uncomputable: Arc<AtomicU64>,

    pub dispatched: Arc<AtomicU64>,
    pub queue_full: Arc<AtomicU64>,
    pub consumer_gone: Arc<AtomicU64>,
    pub reports: Arc<AtomicU64>,
}

/// Plain copy of the counters at one instant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CountersSnapshot {
    pub received: u64,
    pub control_events: u64,
    pub rejected_decode: u64,
    pub rejected_book: u64,
    pub levels_dropped: u64,
    pub skipped_uncomputable: u64,
    pub dispatched: u64,
    pub queue_full: u64,
    pub consumer_gone: u64,
    pub reports: u64,
}

impl PipelineCounters {
    #[inline]
    pub fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        fn load(c: &AtomicU64) -> u64 {
            c.load(Ordering::Relaxed)
        }

        CountersSnapshot {
            received: load(&self.received),
            control_events: load(&self.control_events),
            rejected_decode: load(&self.rejected_decode),
            rejected_book: load(&self.rejected_book),
            levels_dropped: load(&self.levels_dropped),
            skipped_uncomputable: load(&self.skipped_uncomputable),
            dispatched: load(&self.dispatched),
            queue_full: load(&self.queue_full),
            consumer_gone: load(&self.consumer_gone),
            reports: load(&self.reports),
        }
    }
}
