use std::fmt;

use market::latency_window::{LatencySummary, LatencyWindow};
use tracing::info;

/// Stage timings for one computed update.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StageLatencies {
    /// Raw text to framed record.
    pub parse_ms: f64,
    /// Framed record to computed estimate (book apply + cost model).
    pub process_ms: f64,
    /// Receipt to hand-off.
    pub e2e_ms: f64,
}

/// Aggregate over one reporting window. A `None` stage had no samples.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatencyReport {
    /// Computed updates seen so far, including this window.
    pub update_count: u64,
    pub parse: Option<LatencySummary>,
    pub process: Option<LatencySummary>,
    pub e2e: Option<LatencySummary>,
}

impl LatencyReport {
    pub fn emit(&self) {
        info!(
            update = self.update_count,
            parse_mean_ms = %Mean(self.parse),
            process_mean_ms = %Mean(self.process),
            e2e_mean_ms = %Mean(self.e2e),
            e2e_max_ms = %Max(self.e2e),
            samples = self.e2e.map_or(0, |s| s.samples),
            "latency benchmark"
        );
    }
}

impl fmt::Display for LatencyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Benchmark (update #{}): parse={} process={} e2e={}",
            self.update_count,
            Mean(self.parse),
            Mean(self.process),
            Mean(self.e2e)
        )
    }
}

struct Mean(Option<LatencySummary>);

impl fmt::Display for Mean {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(s) => write!(f, "{:.4}ms", s.mean_ms),
            None => f.write_str("no data"),
        }
    }
}

struct Max(Option<LatencySummary>);

impl fmt::Display for Max {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(s) => write!(f, "{:.4}ms", s.max_ms),
            None => f.write_str("no data"),
        }
    }
}

/// Collects stage latencies and produces a report every `interval`
/// computed updates.
///
/// Purely observational: it never feeds back into the calculation.
pub struct BenchmarkReporter {
    interval: u64,
    updates: u64,
    parse: LatencyWindow,
    process: LatencyWindow,
    e2e: LatencyWindow,
}

impl BenchmarkReporter {
    pub fn new(interval: usize) -> Self {
        let interval = interval.max(1);
        Self {
            interval: interval as u64,
            updates: 0,
            parse: LatencyWindow::new(interval),
            process: LatencyWindow::new(interval),
            e2e: LatencyWindow::new(interval),
        }
    }

    /// Records one update. Returns a report (and clears the windows) when
    /// this update completes a window.
    pub fn record(&mut self, latencies: StageLatencies) -> Option<LatencyReport> {
        self.parse.push(latencies.parse_ms);
        self.process.push(latencies.process_ms);
        self.e2e.push(latencies.e2e_ms);
        self.updates += 1;

        (self.updates % self.interval == 0).then(|| self.flush())
    }

    /// Summarises whatever is buffered and clears every window.
    pub fn flush(&mut self) -> LatencyReport {
        let report = LatencyReport {
            update_count: self.updates,
            parse: self.parse.summary(),
            process: self.process.summary(),
            e2e: self.e2e.summary(),
        };
        self.parse.clear();
        self.process.clear();
        self.e2e.clear();
        report
    }

    /// Samples buffered since the last report.
    pub fn pending(&self) -> usize {
        self.e2e.len()
    }

    pub fn updates(&self) -> u64 {
        self.updates
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lat(ms: f64) -> StageLatencies {
        StageLatencies {
            parse_ms: ms,
            process_ms: ms * 2.0,
            e2e_ms: ms * 3.0,
        }
    }

    #[test]
    fn reports_exactly_on_interval() {
        let mut r = BenchmarkReporter::new(100);

        for i in 0..99 {
            assert!(r.record(lat(i as f64)).is_none());
        }
        let report = r.record(lat(99.0)).expect("report on 100th update");

        // mean of 0..=99
        let parse = report.parse.unwrap();
        assert_eq!(parse.samples, 100);
        assert!((parse.mean_ms - 49.5).abs() < 1e-9);
        assert_eq!(parse.max_ms, 99.0);
        assert!((report.e2e.unwrap().mean_ms - 148.5).abs() < 1e-9);
        assert_eq!(report.update_count, 100);
        assert_eq!(r.pending(), 0);
    }

    #[test]
    fn second_window_starts_fresh() {
        let mut r = BenchmarkReporter::new(2);
        r.record(lat(100.0));
        r.record(lat(100.0));
        r.record(lat(1.0));
        let report = r.record(lat(3.0)).unwrap();
        assert_eq!(report.parse.unwrap().mean_ms, 2.0);
        assert_eq!(report.update_count, 4);
    }

    #[test]
    fn empty_flush_reports_no_data() {
        let mut r = BenchmarkReporter::new(10);
        let report = r.flush();
        assert_eq!(report.parse, None);
        assert_eq!(
            report.to_string(),
            "Benchmark (update #0): parse=no data process=no data e2e=no data"
        );
        report.emit();
    }
}
