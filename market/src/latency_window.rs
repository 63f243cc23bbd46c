use std::collections::VecDeque;

/// A latency sample tagged with its insertion order.
#[derive(Clone, Copy, Debug)]
struct Sample {
    seq: u64,
    ms: f64,
}

/// Aggregate of one window at report time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LatencySummary {
    pub samples: usize,
    pub mean_ms: f64,
    pub max_ms: f64,
}

/// Fixed-capacity window of latency samples with O(1) max().
///
/// Once full, each push evicts the oldest sample, so memory never grows
/// past `capacity` between reports.
pub struct LatencyWindow {
    /// All samples in the window (oldest first)
    samples: VecDeque<Sample>,

    /// Monotonic deque of decreasing values; the front is the window max
    max_queue: VecDeque<Sample>,

    capacity: usize,
    next_seq: u64,
}

impl LatencyWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            max_queue: VecDeque::new(),
            capacity,
            next_seq: 0,
        }
    }

    pub fn push(&mut self, ms: f64) {
        if self.samples.len() == self.capacity {
            self.evict_oldest();
        }

        let sample = Sample {
            seq: self.next_seq,
            ms,
        };
        self.next_seq += 1;

        self.samples.push_back(sample);

        while let Some(back) = self.max_queue.back() {
            if back.ms < ms {
                self.max_queue.pop_back();
            } else {
                break;
            }
        }
        self.max_queue.push_back(sample);
    }

    fn evict_oldest(&mut self) {
        let Some(removed) = self.samples.pop_front() else {
            return;
        };
        if let Some(max_front) = self.max_queue.front() {
            if max_front.seq == removed.seq {
                self.max_queue.pop_front();
            }
        }
    }

    pub fn mean(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let sum: f64 = self.samples.iter().map(|s| s.ms).sum();
        Some(sum / self.samples.len() as f64)
    }

    pub fn max(&self) -> Option<f64> {
        self.max_queue.front().map(|s| s.ms)
    }

    pub fn summary(&self) -> Option<LatencySummary> {
        Some(LatencySummary {
            samples: self.len(),
            mean_ms: self.mean()?,
            max_ms: self.max()?,
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.max_queue.clear();
    }
}
