use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Bid,
    Ask,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Bid => f.write_str("bid"),
            Side::Ask => f.write_str("ask"),
        }
    }
}

/// One rung of the ladder.
///
/// A level with `quantity <= 0` is a tombstone: the venue is telling us the
/// level was removed. It is kept in the ladder as delivered but never counts
/// as liquidity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PriceLevel {
    pub price: f64,
    pub quantity: f64,
}

impl PriceLevel {
    pub fn new(price: f64, quantity: f64) -> Self {
        Self { price, quantity }
    }

    #[inline]
    pub fn is_live(&self) -> bool {
        self.quantity > 0.0
    }
}

/// Full-depth view of the book at one feed timestamp.
///
/// Bids are expected best-first (descending), asks best-first (ascending).
/// The ladder is stored exactly as delivered; nothing here re-sorts.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OrderBookSnapshot {
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    /// Venue clock, ms since epoch.
    pub ts_ms: u64,
}

impl OrderBookSnapshot {
    pub fn best_bid(&self) -> Option<PriceLevel> {
        first_live(&self.bids).map(|(_, l)| l)
    }

    pub fn best_ask(&self) -> Option<PriceLevel> {
        first_live(&self.asks).map(|(_, l)| l)
    }
}

/// Index and value of the first non-tombstone level.
pub fn first_live(levels: &[PriceLevel]) -> Option<(usize, PriceLevel)> {
    levels
        .iter()
        .copied()
        .enumerate()
        .find(|(_, level)| level.is_live())
}

/// The only memory carried from one update to the next.
///
/// Threaded explicitly through [`crate::cost::compute`]; nothing else
/// mutates it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SmoothedState {
    /// Exponentially smoothed maker share, in `[0, 1]` while inputs are finite.
    pub maker_proportion: f64,
    pub mid_price: f64,
    pub spread: f64,
    pub volatility: f64,
}

impl Default for SmoothedState {
    fn default() -> Self {
        Self {
            maker_proportion: 0.5,
            mid_price: 0.0,
            spread: 0.0,
            volatility: 0.01,
        }
    }
}
