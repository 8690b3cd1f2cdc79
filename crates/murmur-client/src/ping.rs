use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::Duration;

use murmur_proto::Ping;
use parking_lot::Mutex;
use tokio::time::Instant;

pub const PING_WINDOW: usize = 12;
pub const DEFAULT_PING_INTERVAL: Duration = Duration::from_secs(5);

/// The most recent round-trip samples in milliseconds. Once full, each push
/// evicts the oldest sample.
#[derive(Debug, Clone, Default)]
pub struct PingWindow {
    samples: [f32; PING_WINDOW],
    len: usize,
    next: usize,
}

impl PingWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, sample: f32) {
        self.samples[self.next] = sample;
        self.next = (self.next + 1) % PING_WINDOW;
        self.len = (self.len + 1).min(PING_WINDOW);
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = f32> + '_ {
        let start = (self.next + PING_WINDOW - self.len) % PING_WINDOW;
        (0..self.len).map(move |offset| self.samples[(start + offset) % PING_WINDOW])
    }

    pub fn mean(&self) -> Option<f64> {
        if self.is_empty() {
            return None;
        }
        Some(self.iter().map(f64::from).sum::<f64>() / self.len as f64)
    }

    /// Population variance, recomputed from the buffer so nothing
    /// accumulates between inserts.
    pub fn variance(&self) -> Option<f64> {
        let mean = self.mean()?;
        let sum_sq: f64 = self
            .iter()
            .map(|sample| {
                let delta = f64::from(sample) - mean;
                delta * delta
            })
            .sum();
        Some(sum_sq / self.len as f64)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PingStats {
    pub average_ms: f32,
    pub variance_ms: f32,
    /// Samples currently in the window.
    pub samples: u32,
    /// Replies received, including ones that carried no usable timestamp.
    pub received: u32,
    pub sent: u32,
}

impl PingStats {
    /// Pings that went unanswered (or are still in flight).
    pub fn missing(&self) -> u32 {
        self.sent.saturating_sub(self.received)
    }
}

fn pack_stats(average: f32, variance: f32) -> u64 {
    u64::from(average.to_bits()) << 32 | u64::from(variance.to_bits())
}

fn unpack_stats(packed: u64) -> (f32, f32) {
    (f32::from_bits((packed >> 32) as u32), f32::from_bits(packed as u32))
}

/// Ping bookkeeping for one connection. Written by the ping loop (sends) and
/// the dispatch loop (replies); read by anyone.
#[derive(Debug)]
pub struct PingTracker {
    epoch: Instant,
    window: Mutex<PingWindow>,
    // average and variance published together
    stats: AtomicU64,
    samples: AtomicU32,
    received: AtomicU32,
    sent: AtomicU32,
}

impl Default for PingTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PingTracker {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
            window: Mutex::new(PingWindow::new()),
            stats: AtomicU64::new(pack_stats(0.0, 0.0)),
            samples: AtomicU32::new(0),
            received: AtomicU32::new(0),
            sent: AtomicU32::new(0),
        }
    }

    fn now_micros(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_micros()).unwrap_or(u64::MAX)
    }

    /// Builds the next ping and counts it as sent.
    pub fn next_ping(&self) -> Ping {
        self.sent.fetch_add(1, Ordering::AcqRel);
        let stats = self.stats();
        Ping {
            timestamp: Some(self.now_micros()),
            tcp_packets: Some(stats.received),
            tcp_ping_avg: Some(stats.average_ms),
            tcp_ping_var: Some(stats.variance_ms),
            ..Ping::default()
        }
    }

    /// Folds a reply into the window. Returns the round-trip time when the
    /// reply carried a usable timestamp.
    pub fn record_reply(&self, reply: &Ping) -> Option<f32> {
        self.received.fetch_add(1, Ordering::AcqRel);
        let sent_at = reply.timestamp?;
        let now = self.now_micros();
        if sent_at > now {
            return None;
        }
        let rtt_ms = (now - sent_at) as f32 / 1000.0;

        let mut window = self.window.lock();
        window.push(rtt_ms);
        let average = window.mean().unwrap_or_default() as f32;
        let variance = window.variance().unwrap_or_default() as f32;
        self.stats
            .store(pack_stats(average, variance), Ordering::Release);
        self.samples.store(window.len() as u32, Ordering::Release);
        Some(rtt_ms)
    }

    pub fn stats(&self) -> PingStats {
        let (average_ms, variance_ms) = unpack_stats(self.stats.load(Ordering::Acquire));
        PingStats {
            average_ms,
            variance_ms,
            samples: self.samples.load(Ordering::Acquire),
            received: self.received.load(Ordering::Acquire),
            sent: self.sent.load(Ordering::Acquire),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test_timeout::timeout]
    fn window_keeps_the_latest_twelve() {
        let mut window = PingWindow::new();
        for sample in 1..=15 {
            window.push(sample as f32);
        }
        assert_eq!(window.len(), PING_WINDOW);
        let held: Vec<f32> = window.iter().collect();
        assert_eq!(held, (4..=15).map(|s| s as f32).collect::<Vec<_>>());
        // mean of 4..=15
        assert_eq!(window.mean(), Some(9.5));
    }

    #[test_timeout::timeout]
    fn variance_is_population_variance_over_the_window() {
        let mut window = PingWindow::new();
        for sample in [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0] {
            window.push(sample);
        }
        assert_eq!(window.mean(), Some(5.0));
        assert_eq!(window.variance(), Some(4.0));
    }

    #[test_timeout::timeout]
    fn statistics_do_not_drift_over_long_runs() {
        let mut window = PingWindow::new();
        for i in 0..1_000_000u32 {
            window.push(if i % 2 == 0 { 1.0e6 } else { 0.001 });
        }
        for _ in 0..PING_WINDOW {
            window.push(5.0);
        }
        assert_eq!(window.mean(), Some(5.0));
        assert_eq!(window.variance(), Some(0.0));
    }

    #[test_timeout::timeout]
    fn empty_window_has_no_statistics() {
        let window = PingWindow::new();
        assert!(window.is_empty());
        assert_eq!(window.mean(), None);
        assert_eq!(window.variance(), None);
    }

    #[test_timeout::tokio_timeout_test(paused)]
    async fn reply_round_trip_is_measured_against_the_epoch() {
        let tracker = PingTracker::new();
        let ping = tracker.next_ping();
        tokio::time::advance(Duration::from_millis(40)).await;

        let rtt = tracker.record_reply(&ping).unwrap();
        assert!((rtt - 40.0).abs() < 0.5, "rtt {rtt}");

        let stats = tracker.stats();
        assert_eq!(stats.sent, 1);
        assert_eq!(stats.received, 1);
        assert_eq!(stats.samples, 1);
        assert!((stats.average_ms - 40.0).abs() < 0.5);
        assert_eq!(stats.variance_ms, 0.0);
    }

    #[test_timeout::tokio_timeout_test(paused)]
    async fn unusable_replies_count_but_add_no_sample() {
        let tracker = PingTracker::new();
        tokio::time::advance(Duration::from_millis(5)).await;

        assert_eq!(tracker.record_reply(&Ping::default()), None);
        let future = Ping {
            timestamp: Some(u64::MAX / 2),
            ..Ping::default()
        };
        assert_eq!(tracker.record_reply(&future), None);

        let stats = tracker.stats();
        assert_eq!(stats.received, 2);
        assert_eq!(stats.samples, 0);
        assert_eq!(stats.average_ms, 0.0);
    }

    #[test_timeout::tokio_timeout_test(paused)]
    async fn missed_replies_show_as_a_counter_gap() {
        let tracker = PingTracker::new();
        let first = tracker.next_ping();
        tracker.next_ping();
        tokio::time::advance(Duration::from_millis(10)).await;
        tracker.record_reply(&first);

        let stats = tracker.stats();
        assert_eq!(stats.missing(), 1);
        assert_eq!(stats.samples, 1);
    }

    #[test_timeout::timeout]
    fn packed_statistics_round_trip() {
        assert_eq!(unpack_stats(pack_stats(12.25, 0.5)), (12.25, 0.5));
    }
}
