//! Per-tick cost model for a market order of fixed size.
//!
//! [`compute`] is pure: the same book and prior state always yield the same
//! estimate. The only cross-tick memory is the [`SmoothedState`] that the
//! caller threads from one call to the next.

use tracing::warn;

use crate::error::CalcError;
use crate::types::{OrderBookSnapshot, PriceLevel, Side, SmoothedState, first_live};

pub const SECONDS_PER_DAY: f64 = 86_400.0;

/// Floor applied to market impact so it is never reported as zero.
pub const MIN_MARKET_IMPACT_USD: f64 = 0.0001;

/// Weight of the newest maker/taker observation.
const SMOOTHING_ALPHA: f64 = 0.1;

const LOGISTIC_STEEPNESS: f64 = 5.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CostParams {
    /// Target fill quantity, in base units.
    pub quantity: f64,
    pub taker_fee_rate: f64,
    /// Number of consecutive ask slots the fill may walk.
    pub depth_levels: usize,
}

impl Default for CostParams {
    fn default() -> Self {
        Self {
            quantity: 0.0021,
            taker_fee_rate: 0.0015,
            depth_levels: 5,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CostEstimate {
    pub slippage_pct: f64,
    pub fees_usd: f64,
    pub market_impact_usd: f64,
    pub net_cost_usd: f64,
    pub maker_proportion: f64,
    /// Spread over mid; a proxy, not a historical variance.
    pub volatility: f64,
    pub mid_price: f64,
    pub spread: f64,
}

/// Estimates the cost of buying `params.quantity` at market against `book`.
///
/// On error nothing is produced and the caller keeps `prior` as is.
pub fn compute(
    book: &OrderBookSnapshot,
    prior: &SmoothedState,
    params: &CostParams,
) -> Result<(CostEstimate, SmoothedState), CalcError> {
    let (_, best_bid) = first_live(&book.bids).ok_or(CalcError::EmptyBook(Side::Bid))?;
    let (ask_idx, best_ask) = first_live(&book.asks).ok_or(CalcError::EmptyBook(Side::Ask))?;

    let mid_price = (best_bid.price + best_ask.price) / 2.0;
    if !(mid_price.is_finite() && mid_price > 0.0) {
        return Err(CalcError::DegenerateMid(mid_price));
    }
    let spread = best_ask.price - best_bid.price;
    let volatility = spread / mid_price;

    let q = params.quantity;

    let slippage_pct = walk_asks(&book.asks[ask_idx..], q, params.depth_levels)
        .map(|avg| (avg - mid_price) / mid_price * 100.0)
        .unwrap_or(0.0);

    // Flat taker rate: a market order always crosses.
    let fees_usd = q * mid_price * params.taker_fee_rate;

    let market_impact_usd = market_impact(volatility, mid_price, q);

    let net_cost_usd = slippage_pct / 100.0 * q * mid_price + fees_usd + market_impact_usd;

    let raw = raw_maker_proportion(best_bid.quantity, best_ask.quantity);
    if !prior.maker_proportion.is_finite() {
        warn!(
            prior = prior.maker_proportion,
            raw, "non-finite maker proportion; restarting smoothing"
        );
    }
    let maker_proportion = smooth(prior.maker_proportion, raw);

    let estimate = CostEstimate {
        slippage_pct,
        fees_usd,
        market_impact_usd,
        net_cost_usd,
        maker_proportion,
        volatility,
        mid_price,
        spread,
    };

    let next = SmoothedState {
        maker_proportion,
        mid_price,
        spread,
        volatility,
    };

    Ok((estimate, next))
}

/// Quantity-weighted average fill price for `quantity`, walking at most
/// `depth` slots from the front of `asks`.
///
/// Tombstones inside the window are skipped but still use up a slot.
/// Returns `None` if nothing could be filled.
pub fn walk_asks(asks: &[PriceLevel], quantity: f64, depth: usize) -> Option<f64> {
    let mut filled = 0.0;
    let mut notional = 0.0;

    for level in asks.iter().take(depth) {
        if filled >= quantity {
            break;
        }
        if !level.is_live() {
            continue;
        }
        let take = (quantity - filled).min(level.quantity);
        notional += take * level.price;
        filled += take;
    }

    (filled > 0.0).then(|| notional / filled)
}

/// Simplified Almgren-Chriss instantaneous impact with `eta = sigma`.
pub fn market_impact(volatility: f64, mid_price: f64, quantity: f64) -> f64 {
    let sigma = volatility * mid_price;
    let eta = sigma;
    let impact = eta * quantity.powf(1.5) / SECONDS_PER_DAY.sqrt();
    // f64::max drops a NaN operand, so a degenerate input still floors.
    impact.max(MIN_MARKET_IMPACT_USD)
}

/// Logistic of the top-of-book bid share, centred at an even book.
pub fn raw_maker_proportion(bid_qty: f64, ask_qty: f64) -> f64 {
    let total = bid_qty + ask_qty;
    let ratio = if total > 0.0 { bid_qty / total } else { 0.5 };
    logistic(LOGISTIC_STEEPNESS * (ratio - 0.5))
}

/// Exponential smoothing that restarts from `raw` once `prior` has gone
/// non-finite, so a single NaN cannot poison every later tick.
pub fn smooth(prior: f64, raw: f64) -> f64 {
    if prior.is_finite() {
        (1.0 - SMOOTHING_ALPHA) * prior + SMOOTHING_ALPHA * raw
    } else {
        raw
    }
}

fn logistic(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    /// Ascending asks and descending bids; quantities at or below zero are
    /// tombstones.
    fn arb_book() -> impl Strategy<Value = OrderBookSnapshot> {
        (
            1.0..10_000.0f64,
            prop::collection::vec((0.01..5.0f64, -1.0..10.0f64), 0..12),
            prop::collection::vec((0.01..5.0f64, -1.0..10.0f64), 0..12),
        )
            .prop_map(|(anchor, ask_steps, bid_steps)| {
                let mut px = anchor;
                let asks = ask_steps
                    .into_iter()
                    .map(|(step, qty)| {
                        px += step;
                        PriceLevel::new(px, qty)
                    })
                    .collect();
                let mut px = anchor;
                let bids = bid_steps
                    .into_iter()
                    .map(|(step, qty)| {
                        px = (px - step).max(0.01);
                        PriceLevel::new(px, qty)
                    })
                    .collect();
                OrderBookSnapshot { bids, asks, ts_ms: 0 }
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn empty_side_never_changes_state(book in arb_book(), prior in 0.0..=1.0f64) {
            let state = SmoothedState { maker_proportion: prior, ..SmoothedState::default() };
            let no_bid = first_live(&book.bids).is_none();
            let no_ask = first_live(&book.asks).is_none();
            let out = compute(&book, &state, &CostParams::default());
            if no_bid || no_ask {
                prop_assert!(matches!(out, Err(CalcError::EmptyBook(_))));
            } else {
                prop_assert!(out.is_ok());
            }
        }

        #[test]
        fn compute_is_idempotent(book in arb_book(), prior in 0.0..=1.0f64, q in 0.0001..20.0f64) {
            let state = SmoothedState { maker_proportion: prior, ..SmoothedState::default() };
            let p = CostParams { quantity: q, ..CostParams::default() };
            prop_assert_eq!(compute(&book, &state, &p), compute(&book, &state, &p));
        }

        #[test]
        fn tombstones_never_contribute(book in arb_book(), q in 0.0001..20.0f64) {
            let mut stripped = book.clone();
            stripped.bids.retain(PriceLevel::is_live);
            // Keep ask slots so the walk window is unchanged; poison the price instead.
            let mut poisoned = book.clone();
            for level in poisoned.asks.iter_mut().chain(poisoned.bids.iter_mut()) {
                if !level.is_live() {
                    level.price = 1.0e12;
                }
            }
            let p = CostParams { quantity: q, ..CostParams::default() };
            let state = SmoothedState::default();

            prop_assert_eq!(compute(&book, &state, &p), compute(&poisoned, &state, &p));
            prop_assert_eq!(
                compute(&book, &state, &p).map(|(e, _)| e.mid_price),
                compute(&stripped, &state, &p).map(|(e, _)| e.mid_price)
            );
        }

        #[test]
        fn slippage_non_decreasing_in_quantity(
            book in arb_book(),
            q1 in 0.0001..20.0f64,
            extra in 0.0..20.0f64,
        ) {
            let state = SmoothedState::default();
            let small = compute(&book, &state, &CostParams { quantity: q1, ..CostParams::default() });
            let large = compute(&book, &state, &CostParams { quantity: q1 + extra, ..CostParams::default() });
            if let (Ok((a, _)), Ok((b, _))) = (small, large) {
                prop_assert!(b.slippage_pct >= a.slippage_pct - 1e-9,
                    "slippage fell from {} to {}", a.slippage_pct, b.slippage_pct);
            }
        }

        #[test]
        fn smoothing_stays_in_unit_interval(prior in 0.0..=1.0f64, raw in 0.0..=1.0f64) {
            let next = smooth(prior, raw);
            prop_assert!((0.0..=1.0).contains(&next));
        }

        #[test]
        fn maker_proportion_stays_in_unit_interval(
            prior in 0.0..=1.0f64,
            bid_qty in 0.0..1_000.0f64,
            ask_qty in 0.0..1_000.0f64,
        ) {
            let next = smooth(prior, raw_maker_proportion(bid_qty, ask_qty));
            prop_assert!((0.0..=1.0).contains(&next));
        }
    }
}
