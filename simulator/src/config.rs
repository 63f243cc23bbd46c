use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use market::cost::CostParams;
use tracing::warn;

/// How the consumer publishes records.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    /// Fixed-width table redrawn on every render.
    Console,
    /// One JSON object per line on stdout.
    JsonLines,
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "console" | "table" => Ok(Self::Console),
            "json" | "jsonl" => Ok(Self::JsonLines),
            other => Err(format!("unknown output format `{other}`")),
        }
    }
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    // =========================
    // Feed
    // =========================
    /// Public websocket endpoint of the venue.
    pub ws_url: String,

    /// Venue label shown next to the outputs.
    pub exchange: String,

    /// Instrument subscribed on the book channel.
    pub symbol: String,

    /// When set, messages are replayed from this file instead of the
    /// live websocket.
    pub replay_path: Option<PathBuf>,

    /// Pause between replayed messages.
    pub replay_pace_ms: u64,

    /// Delay before reconnecting a dropped websocket.
    pub reconnect_delay_ms: u64,

    // =========================
    // Cost model
    // =========================
    /// Target fill quantity (base units), ~100 USD of BTC by default.
    pub quantity: f64,

    pub taker_fee_rate: f64,

    /// Display only; fees always use `taker_fee_rate`.
    pub fee_tier: String,

    /// Ask slots the slippage walk may consume.
    pub depth_levels: usize,

    // =========================
    // Pipeline
    // =========================
    /// Computed updates between latency reports; also the size of each
    /// latency window.
    pub benchmark_interval: usize,

    /// Capacity of the hand-off queue to the consumer.
    ///
    /// The producer never waits on it: when full, new records are dropped.
    pub queue_capacity: usize,

    /// Consumer poll cadence.
    pub poll_interval_ms: u64,

    pub output: OutputFormat,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ws_url: "wss://ws.okx.com:8443/ws/v5/public".to_string(),
            exchange: "OKX".to_string(),
            symbol: "BTC-USDT".to_string(),
            replay_path: None,
            replay_pace_ms: 10,
            reconnect_delay_ms: 3_000,

            quantity: 0.0021,
            taker_fee_rate: 0.0015,
            fee_tier: "Regular".to_string(),
            depth_levels: 5,

            benchmark_interval: 100,
            queue_capacity: 64,
            poll_interval_ms: 500,
            output: OutputFormat::Console,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        let d = Self::default();

        let cfg = Self {
            ws_url: env_or("FEED_WS_URL", d.ws_url),
            exchange: env_or("FEED_EXCHANGE", d.exchange),
            symbol: env_or("FEED_SYMBOL", d.symbol),
            replay_path: std::env::var_os("FEED_REPLAY_PATH").map(PathBuf::from),
            replay_pace_ms: env_or("FEED_REPLAY_PACE_MS", d.replay_pace_ms),
            reconnect_delay_ms: env_or("FEED_RECONNECT_MS", d.reconnect_delay_ms),

            quantity: env_or("SIM_QUANTITY", d.quantity),
            taker_fee_rate: env_or("SIM_TAKER_FEE", d.taker_fee_rate),
            fee_tier: env_or("SIM_FEE_TIER", d.fee_tier),
            depth_levels: env_or("SIM_DEPTH_LEVELS", d.depth_levels),

            benchmark_interval: env_or("SIM_BENCHMARK_INTERVAL", d.benchmark_interval),
            queue_capacity: env_or("SIM_QUEUE_CAPACITY", d.queue_capacity),
            poll_interval_ms: env_or("SIM_POLL_INTERVAL_MS", d.poll_interval_ms),
            output: env_or("SIM_OUTPUT", d.output),
        };

        cfg.sanitized()
    }

    /// Replaces values the pipeline cannot work with by their defaults.
    pub fn sanitized(mut self) -> Self {
        let d = Self::default();

        if !(self.quantity.is_finite() && self.quantity > 0.0) {
            warn!(quantity = self.quantity, "quantity must be positive; using default");
            self.quantity = d.quantity;
        }
        if !(self.taker_fee_rate.is_finite() && self.taker_fee_rate >= 0.0) {
            warn!(fee = self.taker_fee_rate, "taker fee must be non-negative; using default");
            self.taker_fee_rate = d.taker_fee_rate;
        }
        if self.depth_levels == 0 {
            warn!("depth_levels must be at least 1; using default");
            self.depth_levels = d.depth_levels;
        }
        if self.benchmark_interval == 0 {
            warn!("benchmark_interval must be at least 1; using default");
            self.benchmark_interval = d.benchmark_interval;
        }
        // tokio's bounded channel panics on zero capacity
        self.queue_capacity = self.queue_capacity.max(1);
        self.poll_interval_ms = self.poll_interval_ms.max(1);

        self
    }

    pub fn cost_params(&self) -> CostParams {
        CostParams {
            quantity: self.quantity,
            taker_fee_rate: self.taker_fee_rate,
            depth_levels: self.depth_levels,
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn replay_pace(&self) -> Duration {
        Duration::from_millis(self.replay_pace_ms)
    }
}

/// Reads `key` from the environment, falling back to `default` when unset
/// or unparseable.
fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => match raw.parse::<T>() {
            Ok(v) => v,
            Err(e) => {
                warn!(key, value = %raw, error = %e, "invalid config value; using default");
                default
            }
        },
        Err(_) => default,
    }
}
