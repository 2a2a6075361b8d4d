/// Pipeline statistics
///
/// Counters are written from the hot paths with relaxed increments and read
/// cross-thread by operators; readers accept arbitrarily stale views. Each
/// counter sits on its own cache line.

use crossbeam_utils::CachePadded;
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};

const LATENCY_WINDOW_SIZE: usize = 10_000;

#[derive(Debug, Default)]
pub struct PipelineCounters {
    pub packets_received: CachePadded<AtomicU64>,
    pub packets_released: CachePadded<AtomicU64>,
    pub packets_dropped_queue_full: CachePadded<AtomicU64>,
    pub duplicates: CachePadded<AtomicU64>,
    pub gaps_detected: CachePadded<AtomicU64>,
    pub gaps_filled: CachePadded<AtomicU64>,
    pub out_of_order: CachePadded<AtomicU64>,
    pub resequenced: CachePadded<AtomicU64>,
    pub reorder_overflows: CachePadded<AtomicU64>,
    pub current_state: CachePadded<AtomicU8>,
    pub next_expected: CachePadded<AtomicU64>,
}

impl PipelineCounters {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn bump(counter: &CachePadded<AtomicU64>) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn read(counter: &CachePadded<AtomicU64>) -> u64 {
        counter.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> CountersSnapshot {
        CountersSnapshot {
            packets_received: Self::read(&self.packets_received),
            packets_released: Self::read(&self.packets_released),
            packets_dropped_queue_full: Self::read(&self.packets_dropped_queue_full),
            duplicates: Self::read(&self.duplicates),
            gaps_detected: Self::read(&self.gaps_detected),
            gaps_filled: Self::read(&self.gaps_filled),
            out_of_order: Self::read(&self.out_of_order),
            resequenced: Self::read(&self.resequenced),
            reorder_overflows: Self::read(&self.reorder_overflows),
            current_state: self.current_state.load(Ordering::Relaxed),
            next_expected: Self::read(&self.next_expected),
        }
    }
}

/// Point-in-time view of the counters; plain values, safe to hold anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountersSnapshot {
    pub packets_received: u64,
    pub packets_released: u64,
    pub packets_dropped_queue_full: u64,
    pub duplicates: u64,
    pub gaps_detected: u64,
    pub gaps_filled: u64,
    pub out_of_order: u64,
    pub resequenced: u64,
    pub reorder_overflows: u64,
    pub current_state: u8,
    pub next_expected: u64,
}

impl fmt::Display for CountersSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "recv={} released={} dropped={} dup={} gaps={} filled={} ooo={} reseq={} overflow={} next_expected={}",
            self.packets_received,
            self.packets_released,
            self.packets_dropped_queue_full,
            self.duplicates,
            self.gaps_detected,
            self.gaps_filled,
            self.out_of_order,
            self.resequenced,
            self.reorder_overflows,
            self.next_expected,
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LatencyStats {
    pub min: u64,
    pub max: u64,
    pub mean: f64,
    pub p50: u64,
    pub p99: u64,
}

/// Sliding window of latency samples in tick units. Thread-private; the
/// consumer shell owns one for end-to-end measurements.
#[derive(Debug, Clone)]
pub struct LatencyWindow {
    samples: VecDeque<u64>,
    window: usize,
}

impl LatencyWindow {
    pub fn new() -> Self {
        Self::with_window(LATENCY_WINDOW_SIZE)
    }

    pub fn with_window(window: usize) -> Self {
        LatencyWindow {
            samples: VecDeque::with_capacity(window),
            window,
        }
    }

    pub fn record(&mut self, ticks: u64) {
        if self.samples.len() >= self.window {
            self.samples.pop_front();
        }
        self.samples.push_back(ticks);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn stats(&self) -> Option<LatencyStats> {
        if self.samples.is_empty() {
            return None;
        }

        let mut sorted: Vec<u64> = self.samples.iter().copied().collect();
        sorted.sort_unstable();

        let min = sorted[0];
        let max = sorted[sorted.len() - 1];
        let mean = sorted.iter().sum::<u64>() as f64 / sorted.len() as f64;
        let p50 = sorted[sorted.len() / 2];
        let p99 = sorted[(sorted.len() * 99) / 100];

        Some(LatencyStats {
            min,
            max,
            mean,
            p50,
            p99,
        })
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }
}

impl Default for LatencyWindow {
    fn default() -> Self {
        Self::new()
    }
}
