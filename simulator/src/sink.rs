//! Destinations for computed records.
//!
//! The consumer only knows the [`MetricsSink`] trait; which concrete sink is
//! plugged in is decided at startup.

use std::io::Write;

use anyhow::Context;
use tokio::sync::mpsc::UnboundedSender;

use crate::types::MetricsRecord;

pub trait MetricsSink: Send + 'static {
    fn publish(&mut self, record: &MetricsRecord) -> anyhow::Result<()>;
}

impl MetricsSink for Box<dyn MetricsSink> {
    fn publish(&mut self, record: &MetricsRecord) -> anyhow::Result<()> {
        (**self).publish(record)
    }
}

/// Static inputs echoed next to the outputs.
#[derive(Clone, Debug)]
pub struct DisplayInputs {
    pub exchange: String,
    pub symbol: String,
    pub order_type: String,
    pub quantity: f64,
    pub fee_tier: String,
}

/// Renders each record as a fixed-width two-column table.
pub struct ConsoleSink<W> {
    out: W,
    inputs: DisplayInputs,
    clear_screen: bool,
}

impl<W: Write + Send + 'static> ConsoleSink<W> {
    pub fn new(out: W, inputs: DisplayInputs) -> Self {
        Self {
            out,
            inputs,
            clear_screen: true,
        }
    }

    /// Appends tables instead of redrawing in place.
    pub fn without_clear(mut self) -> Self {
        self.clear_screen = false;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn render(&mut self, r: &MetricsRecord) -> std::io::Result<()> {
        let i = &self.inputs;
        let out = &mut self.out;

        if self.clear_screen {
            write!(out, "\x1b[2J\x1b[1;1H")?;
        }
        writeln!(out, "===== Trade Simulator: Real-Time Trading Costs =====")?;
        writeln!(out, "| {:<32}| {:<30}|", "Inputs", "Outputs")?;
        writeln!(out, "|{:-<33}|{:-<31}|", "", "")?;
        row(out, "Exchange", &i.exchange, "Slippage", &format!("{:.4} %", r.slippage_pct))?;
        row(out, "Symbol", &i.symbol, "Fees", &format!("{:.4} USD", r.fees_usd))?;
        row(
            out,
            "Order Type",
            &i.order_type,
            "Market Impact",
            &format!("{:.4} USD", r.market_impact_usd),
        )?;
        row(
            out,
            "Quantity",
            &format!("{}", i.quantity),
            "Net Cost",
            &format!("{:.4} USD", r.net_cost_usd),
        )?;
        row(
            out,
            "Volatility",
            &format!("{:.4}", r.volatility),
            "Maker/Taker",
            &format!("{:.4}", r.maker_proportion),
        )?;
        row(
            out,
            "Fee Tier",
            &i.fee_tier,
            "Latency",
            &format!("{:.4} ms", r.calc_latency_ms),
        )?;
        writeln!(out, "{:=<66}", "")?;
        out.flush()
    }
}

fn row(out: &mut impl Write, lk: &str, lv: &str, rk: &str, rv: &str) -> std::io::Result<()> {
    writeln!(out, "| {:<12}{:<20}| {:<15}{:<15}|", format!("{lk}:"), lv, format!("{rk}:"), rv)
}

impl<W: Write + Send + 'static> MetricsSink for ConsoleSink<W> {
    fn publish(&mut self, record: &MetricsRecord) -> anyhow::Result<()> {
        self.render(record).context("render console table")
    }
}

/// One JSON object per line.
pub struct JsonLinesSink<W> {
    out: W,
}

impl<W: Write + Send + 'static> JsonLinesSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send + 'static> MetricsSink for JsonLinesSink<W> {
    fn publish(&mut self, record: &MetricsRecord) -> anyhow::Result<()> {
        serde_json::to_writer(&mut self.out, record).context("serialize record")?;
        self.out.write_all(b"\n").context("write record")?;
        self.out.flush().context("flush record")
    }
}

/// Forwards records to another in-process queue.
pub struct ChannelSink {
    tx: UnboundedSender<MetricsRecord>,
}

impl ChannelSink {
    pub fn new(tx: UnboundedSender<MetricsRecord>) -> Self {
        Self { tx }
    }
}

impl MetricsSink for ChannelSink {
    fn publish(&mut self, record: &MetricsRecord) -> anyhow::Result<()> {
        self.tx
            .send(*record)
            .map_err(|_| anyhow::anyhow!("downstream receiver dropped"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> MetricsRecord {
        MetricsRecord {
            ts_ms: 1,
            slippage_pct: 0.0999,
            fees_usd: 0.0751,
            market_impact_usd: 0.0001,
            net_cost_usd: 0.125,
            maker_proportion: 0.5,
            volatility: 0.002,
            calc_latency_ms: 0.01,
        }
    }

    fn inputs() -> DisplayInputs {
        DisplayInputs {
            exchange: "OKX".into(),
            symbol: "BTC-USDT".into(),
            order_type: "market".into(),
            quantity: 0.5,
            fee_tier: "Regular".into(),
        }
    }

    #[test]
    fn console_table_shows_inputs_and_outputs() {
        let mut sink = ConsoleSink::new(Vec::new(), inputs()).without_clear();
        sink.publish(&record()).unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        assert!(text.starts_with("===== Trade Simulator"));
        assert!(text.contains("Exchange:   OKX"));
        assert!(text.contains("Slippage:      0.0999 %"));
        assert!(text.contains("Fee Tier:   Regular"));
        assert!(!text.contains('\x1b'));
    }

    #[test]
    fn json_lines_are_parseable() {
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.publish(&record()).unwrap();
        sink.publish(&record()).unwrap();

        let text = String::from_utf8(sink.into_inner()).unwrap();
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let v: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(v["fees_usd"], 0.0751);
    }

    #[test]
    fn channel_sink_reports_closed_receiver() {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let mut sink = ChannelSink::new(tx);
        sink.publish(&record()).unwrap();
        drop(rx);
        assert!(sink.publish(&record()).is_err());
    }
}
