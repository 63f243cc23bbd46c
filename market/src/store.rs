use parking_lot::Mutex;
use tracing::{debug, instrument};

use crate::error::BookError;
use crate::types::{OrderBookSnapshot, PriceLevel, Side};
use crate::wire::{RawBookUpdate, decode_side, decode_timestamp};

/// Result of a successful [`OrderBookStore::apply`].
#[derive(Clone, Debug, PartialEq)]
pub struct ApplyOutcome {
    pub ts_ms: u64,
    pub bid_levels: usize,
    pub ask_levels: usize,
    /// Levels skipped because they were malformed. Always `MalformedLevel`.
    pub dropped: Vec<BookError>,
}

/// Latest full-depth book for one instrument.
///
/// Guarantees:
/// - Each successful `apply` replaces both sides and the timestamp in one
///   critical section, so a reader never sees bids of one update next to
///   asks of another.
/// - A rejected update leaves the previous snapshot untouched.
/// - The lock never escapes: readers get an owned copy.
#[derive(Default)]
pub struct OrderBookStore {
    inner: Mutex<OrderBookSnapshot>,
}

impl OrderBookStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the book with `update`.
    ///
    /// All decoding and validation happens before the lock is taken.
    #[instrument(skip_all, target = "book", level = "debug")]
    pub fn apply(&self, update: &RawBookUpdate) -> Result<ApplyOutcome, BookError> {
        let ts_ms = decode_timestamp(update.ts.as_ref())?;
        let (bids, mut dropped) = decode_side(Side::Bid, update.bids.as_ref())?;
        let (asks, ask_dropped) = decode_side(Side::Ask, update.asks.as_ref())?;
        dropped.extend(ask_dropped);

        let outcome = ApplyOutcome {
            ts_ms,
            bid_levels: bids.len(),
            ask_levels: asks.len(),
            dropped,
        };

        *self.inner.lock() = OrderBookSnapshot { bids, asks, ts_ms };

        debug!(
            ts_ms,
            bids = outcome.bid_levels,
            asks = outcome.ask_levels,
            dropped = outcome.dropped.len(),
            "book replaced"
        );

        Ok(outcome)
    }

    /// Point-in-time copy of the whole book.
    pub fn snapshot(&self) -> OrderBookSnapshot {
        self.inner.lock().clone()
    }

    /// Best live bid and ask, if both sides have one.
    pub fn best_levels(&self) -> Option<(PriceLevel, PriceLevel)> {
        let book = self.inner.lock();
        Some((book.best_bid()?, book.best_ask()?))
    }

    pub fn ts_ms(&self) -> u64 {
        self.inner.lock().ts_ms
    }
}
