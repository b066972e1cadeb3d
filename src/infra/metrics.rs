//! Lock-free metrics for tracking cycles, rewards and provider latency
//!
//! Recording is lock-free. `report()` swaps the latency histograms to zero;
//! the totals are monotonic and never reset.
//!
//! NOTE: All atomics use Relaxed ordering. These are statistical counters
//! only; nothing coordinates on them.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::info;

/// Upstream call latency bucket boundaries (milliseconds)
/// Buckets: ≤5, ≤10, ≤25, ≤50, ≤100, ≤250, ≤500, ≤1000, ≤2500, ≤5000, >5000
const BUCKET_BOUNDS: [u64; 10] = [5, 10, 25, 50, 100, 250, 500, 1000, 2500, 5000];
const NUM_BUCKETS: usize = 11;

/// Compute bucket index for a latency value using binary search
#[inline]
fn bucket_index(latency_ms: u64) -> usize {
    BUCKET_BOUNDS.partition_point(|&bound| bound < latency_ms)
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Swap all buckets to zero and return their values
#[inline]
fn swap_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    let mut result = [0u64; NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.swap(0, Ordering::Relaxed);
    }
    result
}

/// Compute percentile from histogram buckets
/// Returns the upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = (total as f64 * percentile) as u64;
    let mut cumulative = 0u64;

    // Upper bounds for each bucket (last bucket uses 2x the previous bound)
    const BUCKET_UPPER_BOUNDS: [u64; NUM_BUCKETS] =
        [5, 10, 25, 50, 100, 250, 500, 1000, 2500, 5000, 10000];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[NUM_BUCKETS - 1]
}

/// Latency histogram that resets on every report
struct LatencyHistogram {
    buckets: [AtomicU64; NUM_BUCKETS],
    sum_ms: AtomicU64,
    max_ms: AtomicU64,
}

impl LatencyHistogram {
    fn new() -> Self {
        Self {
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            sum_ms: AtomicU64::new(0),
            max_ms: AtomicU64::new(0),
        }
    }

    #[inline]
    fn record(&self, latency_ms: u64) {
        self.buckets[bucket_index(latency_ms)].fetch_add(1, Ordering::Relaxed);
        self.sum_ms.fetch_add(latency_ms, Ordering::Relaxed);
        update_atomic_max(&self.max_ms, latency_ms);
    }

    fn take(&self) -> LatencySnapshot {
        let buckets = swap_buckets(&self.buckets);
        let sum = self.sum_ms.swap(0, Ordering::Relaxed);
        let max_ms = self.max_ms.swap(0, Ordering::Relaxed);
        let count: u64 = buckets.iter().sum();
        LatencySnapshot {
            buckets,
            count,
            avg_ms: if count > 0 { sum / count } else { 0 },
            max_ms,
            p50_ms: percentile_from_buckets(&buckets, 0.50),
            p99_ms: percentile_from_buckets(&buckets, 0.99),
        }
    }
}

/// Lock-free metrics collector
///
/// All recording operations are lock-free using atomics.
/// The `report()` method atomically swaps periodic counters to get a snapshot.
pub struct Metrics {
    /// Users currently in the directory
    users_registered: AtomicU64,
    /// Completed tracking cycles (monotonic)
    tracking_cycles_total: AtomicU64,
    /// Wall-clock duration of the last tracking cycle
    last_cycle_duration_ms: AtomicU64,
    /// Locations appended by the tracker or on request (monotonic)
    locations_tracked_total: AtomicU64,
    /// Users whose tracking failed (monotonic)
    tracking_failures_total: AtomicU64,
    /// Per-user reward computations finished successfully (monotonic)
    reward_computations_total: AtomicU64,
    /// Per-user reward computations that failed (monotonic)
    reward_failures_total: AtomicU64,
    /// Rewards inserted (monotonic)
    rewards_granted_total: AtomicU64,
    /// Rewards dropped by the insert-time uniqueness check (monotonic)
    duplicate_rewards_rejected_total: AtomicU64,
    /// Reward oracle calls (monotonic)
    oracle_calls_total: AtomicU64,
    /// Reward oracle calls that failed (monotonic)
    oracle_failures_total: AtomicU64,
    /// Reward oracle latency (reset on report)
    oracle_latency: LatencyHistogram,
    /// GPS provider latency (reset on report)
    gps_latency: LatencyHistogram,
    /// Last report time (only accessed from reporter, not atomic)
    last_report_time: parking_lot::Mutex<Instant>,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            users_registered: AtomicU64::new(0),
            tracking_cycles_total: AtomicU64::new(0),
            last_cycle_duration_ms: AtomicU64::new(0),
            locations_tracked_total: AtomicU64::new(0),
            tracking_failures_total: AtomicU64::new(0),
            reward_computations_total: AtomicU64::new(0),
            reward_failures_total: AtomicU64::new(0),
            rewards_granted_total: AtomicU64::new(0),
            duplicate_rewards_rejected_total: AtomicU64::new(0),
            oracle_calls_total: AtomicU64::new(0),
            oracle_failures_total: AtomicU64::new(0),
            oracle_latency: LatencyHistogram::new(),
            gps_latency: LatencyHistogram::new(),
            last_report_time: parking_lot::Mutex::new(Instant::now()),
        }
    }

    #[inline]
    pub fn set_users_registered(&self, count: u64) {
        self.users_registered.store(count, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_tracking_cycle(&self, duration_ms: u64) {
        self.tracking_cycles_total.fetch_add(1, Ordering::Relaxed);
        self.last_cycle_duration_ms.store(duration_ms, Ordering::Relaxed);
    }

    /// Record a location fetched from the GPS provider and appended to a user
    #[inline]
    pub fn record_location_tracked(&self, gps_latency_ms: u64) {
        self.locations_tracked_total.fetch_add(1, Ordering::Relaxed);
        self.gps_latency.record(gps_latency_ms);
    }

    #[inline]
    pub fn record_tracking_failure(&self) {
        self.tracking_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_reward_computation(&self, ok: bool) {
        if ok {
            self.reward_computations_total.fetch_add(1, Ordering::Relaxed);
        } else {
            self.reward_failures_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record the outcome of an insert-if-absent on a user's rewards
    #[inline]
    pub fn record_reward_insert(&self, inserted: bool) {
        if inserted {
            self.rewards_granted_total.fetch_add(1, Ordering::Relaxed);
        } else {
            self.duplicate_rewards_rejected_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_oracle_call(&self, latency_ms: u64, ok: bool) {
        self.oracle_calls_total.fetch_add(1, Ordering::Relaxed);
        if !ok {
            self.oracle_failures_total.fetch_add(1, Ordering::Relaxed);
        }
        self.oracle_latency.record(latency_ms);
    }

    pub fn tracking_cycles_total(&self) -> u64 {
        self.tracking_cycles_total.load(Ordering::Relaxed)
    }

    pub fn locations_tracked_total(&self) -> u64 {
        self.locations_tracked_total.load(Ordering::Relaxed)
    }

    pub fn rewards_granted_total(&self) -> u64 {
        self.rewards_granted_total.load(Ordering::Relaxed)
    }

    pub fn duplicate_rewards_rejected_total(&self) -> u64 {
        self.duplicate_rewards_rejected_total.load(Ordering::Relaxed)
    }

    pub fn oracle_calls_total(&self) -> u64 {
        self.oracle_calls_total.load(Ordering::Relaxed)
    }

    pub fn reward_failures_total(&self) -> u64 {
        self.reward_failures_total.load(Ordering::Relaxed)
    }

    /// Calculate and return metrics summary, then reset periodic counters
    ///
    /// This is the only method that resets counters. It uses atomic swap
    /// to get a consistent snapshot while allowing concurrent updates.
    pub fn report(&self) -> MetricsSummary {
        let oracle = self.oracle_latency.take();
        let gps = self.gps_latency.take();

        // Calculate elapsed time and reset
        let elapsed = {
            let mut last = self.last_report_time.lock();
            let elapsed = last.elapsed();
            *last = Instant::now();
            elapsed
        };

        let oracle_calls_per_sec = if elapsed.as_secs_f64() > 0.0 {
            oracle.count as f64 / elapsed.as_secs_f64()
        } else {
            0.0
        };

        MetricsSummary {
            users_registered: self.users_registered.load(Ordering::Relaxed),
            tracking_cycles_total: self.tracking_cycles_total.load(Ordering::Relaxed),
            last_cycle_duration_ms: self.last_cycle_duration_ms.load(Ordering::Relaxed),
            locations_tracked_total: self.locations_tracked_total.load(Ordering::Relaxed),
            tracking_failures_total: self.tracking_failures_total.load(Ordering::Relaxed),
            reward_computations_total: self.reward_computations_total.load(Ordering::Relaxed),
            reward_failures_total: self.reward_failures_total.load(Ordering::Relaxed),
            rewards_granted_total: self.rewards_granted_total.load(Ordering::Relaxed),
            duplicate_rewards_rejected_total: self
                .duplicate_rewards_rejected_total
                .load(Ordering::Relaxed),
            oracle_calls_total: self.oracle_calls_total.load(Ordering::Relaxed),
            oracle_failures_total: self.oracle_failures_total.load(Ordering::Relaxed),
            oracle_calls_per_sec,
            oracle_lat_buckets: oracle.buckets,
            oracle_lat_avg_ms: oracle.avg_ms,
            oracle_lat_max_ms: oracle.max_ms,
            oracle_lat_p50_ms: oracle.p50_ms,
            oracle_lat_p99_ms: oracle.p99_ms,
            gps_lat_buckets: gps.buckets,
            gps_lat_avg_ms: gps.avg_ms,
            gps_lat_max_ms: gps.max_ms,
            gps_lat_p99_ms: gps.p99_ms,
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

struct LatencySnapshot {
    buckets: [u64; NUM_BUCKETS],
    count: u64,
    avg_ms: u64,
    max_ms: u64,
    p50_ms: u64,
    p99_ms: u64,
}

/// Number of histogram buckets (exported for Prometheus formatting)
pub const METRICS_NUM_BUCKETS: usize = NUM_BUCKETS;

/// Exported bucket bounds for Prometheus formatting
pub const METRICS_BUCKET_BOUNDS: [u64; 10] = BUCKET_BOUNDS;

#[derive(Debug)]
pub struct MetricsSummary {
    pub users_registered: u64,
    pub tracking_cycles_total: u64,
    pub last_cycle_duration_ms: u64,
    pub locations_tracked_total: u64,
    pub tracking_failures_total: u64,
    pub reward_computations_total: u64,
    pub reward_failures_total: u64,
    pub rewards_granted_total: u64,
    pub duplicate_rewards_rejected_total: u64,
    pub oracle_calls_total: u64,
    pub oracle_failures_total: u64,
    pub oracle_calls_per_sec: f64,
    /// Reward oracle latency histogram buckets
    /// Bounds: ≤5, ≤10, ≤25, ≤50, ≤100, ≤250, ≤500, ≤1000, ≤2500, ≤5000, >5000 ms
    pub oracle_lat_buckets: [u64; NUM_BUCKETS],
    pub oracle_lat_avg_ms: u64,
    pub oracle_lat_max_ms: u64,
    pub oracle_lat_p50_ms: u64,
    pub oracle_lat_p99_ms: u64,
    /// GPS provider latency histogram buckets (same bounds)
    pub gps_lat_buckets: [u64; NUM_BUCKETS],
    pub gps_lat_avg_ms: u64,
    pub gps_lat_max_ms: u64,
    pub gps_lat_p99_ms: u64,
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            users = %self.users_registered,
            cycles = %self.tracking_cycles_total,
            last_cycle_ms = %self.last_cycle_duration_ms,
            locations_tracked = %self.locations_tracked_total,
            tracking_failures = %self.tracking_failures_total,
            rewards_granted = %self.rewards_granted_total,
            reward_failures = %self.reward_failures_total,
            oracle_calls_per_sec = format!("{:.1}", self.oracle_calls_per_sec),
            oracle_p50_ms = %self.oracle_lat_p50_ms,
            oracle_p99_ms = %self.oracle_lat_p99_ms,
            gps_p99_ms = %self.gps_lat_p99_ms,
            "metrics"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_new() {
        let metrics = Metrics::new();
        assert_eq!(metrics.tracking_cycles_total(), 0);
        assert_eq!(metrics.rewards_granted_total(), 0);
        assert_eq!(metrics.oracle_calls_total(), 0);
    }

    #[test]
    fn test_record_reward_insert() {
        let metrics = Metrics::new();

        metrics.record_reward_insert(true);
        metrics.record_reward_insert(true);
        metrics.record_reward_insert(false);

        assert_eq!(metrics.rewards_granted_total(), 2);
        assert_eq!(metrics.duplicate_rewards_rejected_total(), 1);
    }

    #[test]
    fn test_report() {
        let metrics = Metrics::new();

        metrics.record_oracle_call(100, true);
        metrics.record_oracle_call(200, true);
        metrics.record_oracle_call(300, false);
        metrics.record_tracking_cycle(1234);
        metrics.set_users_registered(7);

        let summary = metrics.report();

        assert_eq!(summary.oracle_calls_total, 3);
        assert_eq!(summary.oracle_failures_total, 1);
        assert_eq!(summary.oracle_lat_avg_ms, 200); // (100+200+300)/3
        assert_eq!(summary.oracle_lat_max_ms, 300);
        assert_eq!(summary.tracking_cycles_total, 1);
        assert_eq!(summary.last_cycle_duration_ms, 1234);
        assert_eq!(summary.users_registered, 7);

        // Periodic histograms are reset, monotonic counters are not
        let again = metrics.report();
        assert_eq!(again.oracle_lat_max_ms, 0);
        assert_eq!(again.oracle_lat_avg_ms, 0);
        assert_eq!(again.oracle_calls_total, 3);
    }

    #[test]
    fn test_report_empty() {
        let metrics = Metrics::new();
        let summary = metrics.report();

        assert_eq!(summary.oracle_lat_avg_ms, 0);
        assert_eq!(summary.oracle_lat_p99_ms, 0);
        assert_eq!(summary.gps_lat_max_ms, 0);
    }

    #[test]
    fn test_concurrent_updates() {
        use std::sync::Arc;
        use std::thread;

        let metrics = Arc::new(Metrics::new());
        let mut handles = vec![];

        // Spawn 10 threads, each recording 1000 oracle calls
        for _ in 0..10 {
            let m = metrics.clone();
            handles.push(thread::spawn(move || {
                for i in 0..1000 {
                    m.record_oracle_call(i as u64, true);
                }
            }));
        }

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(metrics.oracle_calls_total(), 10_000);
    }

    #[test]
    fn test_bucket_index() {
        assert_eq!(bucket_index(0), 0);
        assert_eq!(bucket_index(5), 0);
        assert_eq!(bucket_index(6), 1);
        assert_eq!(bucket_index(1000), 7);
        assert_eq!(bucket_index(5000), 9);
        assert_eq!(bucket_index(5001), 10); // overflow
    }

    #[test]
    fn test_percentile_computation() {
        let metrics = Metrics::new();

        // 100 calls, all at 40ms (bucket 3, ≤50)
        for _ in 0..100 {
            metrics.record_oracle_call(40, true);
        }

        let summary = metrics.report();
        assert_eq!(summary.oracle_lat_p50_ms, 50);
        assert_eq!(summary.oracle_lat_p99_ms, 50);
    }
}
