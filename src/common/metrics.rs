//! Coordinator metrics
//!
//! Lock-free counters and latency histograms rendered in the Prometheus
//! text exposition format at `GET /metrics`.

use std::fmt::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Histogram bucket boundaries for latency measurements (in milliseconds)
const LATENCY_BUCKETS: [f64; 11] = [
    1.0, 5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 5000.0,
];

/// A simple histogram implementation for latency tracking
#[derive(Debug)]
pub struct Histogram {
    buckets: Vec<AtomicU64>,
    boundaries: Vec<f64>,
    sum: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    /// Create a new histogram with default latency buckets
    pub fn new() -> Self {
        Self::with_buckets(&LATENCY_BUCKETS)
    }

    /// Create a histogram with custom bucket boundaries
    pub fn with_buckets(boundaries: &[f64]) -> Self {
        let buckets = (0..=boundaries.len()).map(|_| AtomicU64::new(0)).collect();
        Self {
            buckets,
            boundaries: boundaries.to_vec(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Record a value in the histogram
    pub fn observe(&self, value: f64) {
        let bucket_idx = self
            .boundaries
            .iter()
            .position(|&boundary| value <= boundary)
            .unwrap_or(self.boundaries.len());

        self.buckets[bucket_idx].fetch_add(1, Ordering::Relaxed);
        // Stored as microseconds for precision
        self.sum
            .fetch_add((value * 1000.0) as u64, Ordering::Relaxed);
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_duration(&self, elapsed: Duration) {
        self.observe(elapsed.as_secs_f64() * 1000.0);
    }

    /// Cumulative bucket counts, `+Inf` last
    pub fn get_buckets(&self) -> Vec<(f64, u64)> {
        let mut cumulative = 0u64;
        let mut result = Vec::with_capacity(self.boundaries.len() + 1);

        for (i, &boundary) in self.boundaries.iter().enumerate() {
            cumulative += self.buckets[i].load(Ordering::Relaxed);
            result.push((boundary, cumulative));
        }

        cumulative += self.buckets[self.boundaries.len()].load(Ordering::Relaxed);
        result.push((f64::INFINITY, cumulative));

        result
    }

    /// Get sum of all observed values
    pub fn sum(&self) -> f64 {
        self.sum.load(Ordering::Relaxed) as f64 / 1000.0
    }

    /// Get count of observations
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

/// Monotonic counter
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Counters for the write and broadcast paths
#[derive(Debug)]
pub struct CoordinatorMetrics {
    pub single_key_requests: Counter,
    pub single_key_failures: Counter,
    pub validation_failures: Counter,
    pub primary_failures: Counter,
    pub replica_failures: Counter,
    pub quorum_unmet: Counter,
    pub broadcast_requests: Counter,
    pub broadcast_partition_failures: Counter,
    pub broadcast_timeouts: Counter,
    pub collections_created: Counter,
    pub provisioning_races: Counter,
    pub write_latency: Histogram,
    pub broadcast_latency: Histogram,
    start_time: Instant,
}

impl CoordinatorMetrics {
    pub fn new() -> Self {
        Self {
            single_key_requests: Counter::new(),
            single_key_failures: Counter::new(),
            validation_failures: Counter::new(),
            primary_failures: Counter::new(),
            replica_failures: Counter::new(),
            quorum_unmet: Counter::new(),
            broadcast_requests: Counter::new(),
            broadcast_partition_failures: Counter::new(),
            broadcast_timeouts: Counter::new(),
            collections_created: Counter::new(),
            provisioning_races: Counter::new(),
            write_latency: Histogram::new(),
            broadcast_latency: Histogram::new(),
            start_time: Instant::now(),
        }
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Generate Prometheus-compatible metrics output
    pub fn to_prometheus(&self) -> String {
        let mut out = String::new();

        let counters: [(&str, &str, &Counter); 11] = [
            ("minidoc_single_key_requests_total", "Single-key mutations received", &self.single_key_requests),
            ("minidoc_single_key_failures_total", "Single-key mutations that failed", &self.single_key_failures),
            ("minidoc_validation_failures_total", "Requests rejected before routing", &self.validation_failures),
            ("minidoc_primary_failures_total", "Failures on the primary copy", &self.primary_failures),
            ("minidoc_replica_failures_total", "Failures on secondary copies", &self.replica_failures),
            ("minidoc_quorum_unmet_total", "Writes that did not reach the acknowledgement threshold", &self.quorum_unmet),
            ("minidoc_broadcast_requests_total", "Broadcast operations received", &self.broadcast_requests),
            ("minidoc_broadcast_partition_failures_total", "Failed partitions across broadcasts", &self.broadcast_partition_failures),
            ("minidoc_broadcast_timeouts_total", "Partitions that timed out during broadcasts", &self.broadcast_timeouts),
            ("minidoc_collections_created_total", "Collections created on demand", &self.collections_created),
            ("minidoc_provisioning_races_total", "Concurrent creations resolved as already existing", &self.provisioning_races),
        ];

        for (name, help, counter) in counters {
            let _ = writeln!(out, "# HELP {} {}", name, help);
            let _ = writeln!(out, "# TYPE {} counter", name);
            let _ = writeln!(out, "{} {}", name, counter.get());
        }

        write_histogram(
            &mut out,
            "minidoc_write_latency_ms",
            "Single-key mutation latency",
            &self.write_latency,
        );
        write_histogram(
            &mut out,
            "minidoc_broadcast_latency_ms",
            "Broadcast operation latency",
            &self.broadcast_latency,
        );

        let _ = writeln!(out, "# HELP minidoc_uptime_seconds Coordinator uptime");
        let _ = writeln!(out, "# TYPE minidoc_uptime_seconds gauge");
        let _ = writeln!(out, "minidoc_uptime_seconds {}", self.uptime_seconds());

        out
    }
}

impl Default for CoordinatorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

fn write_histogram(out: &mut String, name: &str, help: &str, histogram: &Histogram) {
    let _ = writeln!(out, "# HELP {} {}", name, help);
    let _ = writeln!(out, "# TYPE {} histogram", name);
    for (boundary, count) in histogram.get_buckets() {
        if boundary.is_infinite() {
            let _ = writeln!(out, "{}_bucket{{le=\"+Inf\"}} {}", name, count);
        } else {
            let _ = writeln!(out, "{}_bucket{{le=\"{}\"}} {}", name, boundary, count);
        }
    }
    let _ = writeln!(out, "{}_sum {}", name, histogram.sum());
    let _ = writeln!(out, "{}_count {}", name, histogram.count());
}
