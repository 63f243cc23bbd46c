use market::cost::CostEstimate;
use serde::Serialize;

/// One tick's worth of cost estimates, as handed to consumers.
///
/// Built once per computed update and never modified afterwards.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct MetricsRecord {
    /// Venue timestamp of the book this was computed from.
    pub ts_ms: u64,
    pub slippage_pct: f64,
    pub fees_usd: f64,
    pub market_impact_usd: f64,
    pub net_cost_usd: f64,
    pub maker_proportion: f64,
    pub volatility: f64,
    /// Wall time spent inside the cost model.
    pub calc_latency_ms: f64,
}

impl MetricsRecord {
    pub fn new(ts_ms: u64, estimate: &CostEstimate, calc_latency_ms: f64) -> Self {
        Self {
            ts_ms,
            slippage_pct: estimate.slippage_pct,
            fees_usd: estimate.fees_usd,
            market_impact_usd: estimate.market_impact_usd,
            net_cost_usd: estimate.net_cost_usd,
            maker_proportion: estimate.maker_proportion,
            volatility: estimate.volatility,
            calc_latency_ms,
        }
    }
}
