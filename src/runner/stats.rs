//! Request statistics: per-endpoint counters, a bucketed response-time
//! distribution, and the periodic console table the operator watches during a
//! run.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Sliding window (seconds) for the current-RPS estimate.
const RPS_WINDOW_SECS: u64 = 10;

/// Assumed mean response time until the first samples land; keeps the
/// user-count estimate from collapsing to zero at ramp start.
pub const DEFAULT_AVG_RESPONSE_TIME_SECS: f64 = 0.5;

/// Bucketing for the response-time distribution: full precision under 100 ms,
/// then progressively coarser so the map stays small on long runs.
fn round_response_time(ms: f64) -> u64 {
    let ms = ms.round().max(0.0) as u64;
    if ms < 100 {
        ms
    } else if ms < 1_000 {
        (ms + 5) / 10 * 10
    } else if ms < 10_000 {
        (ms + 50) / 100 * 100
    } else {
        (ms + 500) / 1_000 * 1_000
    }
}

fn percentile(buckets: &BTreeMap<u64, u64>, total: u64, p: f64) -> u64 {
    if total == 0 {
        return 0;
    }
    let threshold = (total as f64 * p).ceil() as u64;
    let mut seen = 0;
    for (bucket, count) in buckets {
        seen += count;
        if seen >= threshold {
            return *bucket;
        }
    }
    buckets.keys().next_back().copied().unwrap_or(0)
}

#[derive(Debug)]
struct EndpointStats {
    requests: u64,
    failures: u64,
    total_ms: f64,
    min_ms: f64,
    max_ms: f64,
    response_times: BTreeMap<u64, u64>,
    last_error: Option<String>,
    window: VecDeque<Instant>,
}

impl Default for EndpointStats {
    fn default() -> Self {
        Self {
            requests: 0,
            failures: 0,
            total_ms: 0.0,
            min_ms: f64::INFINITY,
            max_ms: 0.0,
            response_times: BTreeMap::new(),
            last_error: None,
            window: VecDeque::new(),
        }
    }
}

impl EndpointStats {
    fn record(&mut self, elapsed: Duration, error: Option<String>) {
        let ms = elapsed.as_secs_f64() * 1000.0;
        self.requests += 1;
        self.total_ms += ms;
        self.min_ms = self.min_ms.min(ms);
        self.max_ms = self.max_ms.max(ms);
        *self.response_times.entry(round_response_time(ms)).or_insert(0) += 1;
        if let Some(error) = error {
            self.failures += 1;
            self.last_error = Some(error);
        }
        let now = Instant::now();
        self.window.push_back(now);
        if let Some(cutoff) = now.checked_sub(Duration::from_secs(RPS_WINDOW_SECS)) {
            while self.window.front().is_some_and(|t| *t < cutoff) {
                self.window.pop_front();
            }
        }
    }

    fn current_rps(&self, now: Instant) -> f64 {
        let recent = match now.checked_sub(Duration::from_secs(RPS_WINDOW_SECS)) {
            Some(cutoff) => self.window.iter().filter(|t| **t >= cutoff).count(),
            None => self.window.len(),
        };
        recent as f64 / RPS_WINDOW_SECS as f64
    }

    fn row(&self, name: &str, now: Instant) -> EndpointRow {
        EndpointRow {
            name: name.to_string(),
            requests: self.requests,
            failures: self.failures,
            avg_ms: if self.requests > 0 {
                self.total_ms / self.requests as f64
            } else {
                0.0
            },
            min_ms: if self.min_ms.is_finite() { self.min_ms } else { 0.0 },
            max_ms: self.max_ms,
            p50_ms: percentile(&self.response_times, self.requests, 0.50),
            p95_ms: percentile(&self.response_times, self.requests, 0.95),
            current_rps: self.current_rps(now),
            last_error: self.last_error.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EndpointRow {
    pub name: String,
    pub requests: u64,
    pub failures: u64,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub p50_ms: u64,
    pub p95_ms: u64,
    pub current_rps: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub total: EndpointRow,
    pub rows: Vec<EndpointRow>,
}

/// Shared by every worker, the shape tick, the console reporter, and the
/// status API.
pub struct StatsRegistry {
    started_at: DateTime<Utc>,
    entries: RwLock<BTreeMap<String, EndpointStats>>,
}

impl Default for StatsRegistry {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            entries: RwLock::new(BTreeMap::new()),
        }
    }
}

impl StatsRegistry {
    pub fn record(&self, name: &str, elapsed: Duration, error: Option<String>) {
        self.entries
            .write()
            .entry(name.to_string())
            .or_default()
            .record(elapsed, error);
    }

    /// Mean response time in seconds across every endpoint, feeding the
    /// users-per-rps estimate; falls back to
    /// [`DEFAULT_AVG_RESPONSE_TIME_SECS`] before any data exists.
    pub fn avg_response_time_secs(&self) -> f64 {
        let entries = self.entries.read();
        let requests: u64 = entries.values().map(|e| e.requests).sum();
        let total_ms: f64 = entries.values().map(|e| e.total_ms).sum();
        if requests == 0 || total_ms <= 0.0 {
            DEFAULT_AVG_RESPONSE_TIME_SECS
        } else {
            total_ms / requests as f64 / 1000.0
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let now = Instant::now();
        let entries = self.entries.read();

        let mut total = EndpointStats::default();
        let mut total_buckets: BTreeMap<u64, u64> = BTreeMap::new();
        for stats in entries.values() {
            total.requests += stats.requests;
            total.failures += stats.failures;
            total.total_ms += stats.total_ms;
            total.min_ms = total.min_ms.min(stats.min_ms);
            total.max_ms = total.max_ms.max(stats.max_ms);
            for (bucket, count) in &stats.response_times {
                *total_buckets.entry(*bucket).or_insert(0) += count;
            }
        }
        total.response_times = total_buckets;
        let total_rps = entries.values().map(|e| e.current_rps(now)).sum::<f64>();
        let mut total_row = total.row("Aggregated", now);
        total_row.current_rps = total_rps;

        StatsSnapshot {
            started_at: self.started_at,
            elapsed_secs: (Utc::now() - self.started_at).num_milliseconds() as f64 / 1000.0,
            total: total_row,
            rows: entries
                .iter()
                .map(|(name, stats)| stats.row(name, now))
                .collect(),
        }
    }

    /// The rolling console table, prefixed with run timing.
    pub fn report(&self) {
        let snapshot = self.snapshot();
        let now = Utc::now();
        info!("Started at: {}", self.started_at.format("%Y-%m-%d %H:%M:%S"));
        info!("Current time: {}", now.format("%Y-%m-%d %H:%M:%S"));
        info!("Test duration: {:.0}s", snapshot.elapsed_secs);
        info!(
            "{:<50} {:>8} {:>8} {:>8} {:>8} {:>8} {:>7} {:>7} {:>7}",
            "Name", "reqs", "fails", "avg", "min", "max", "p50", "p95", "rps"
        );
        for row in snapshot.rows.iter().chain(std::iter::once(&snapshot.total)) {
            info!(
                "{:<50} {:>8} {:>8} {:>8.0} {:>8.0} {:>8.0} {:>7} {:>7} {:>7.1}",
                row.name,
                row.requests,
                row.failures,
                row.avg_ms,
                row.min_ms,
                row.max_ms,
                row.p50_ms,
                row.p95_ms,
                row.current_rps,
            );
        }
    }

    /// Per-endpoint failure summary, printed once at the end of a run.
    pub fn failure_report(&self) {
        let entries = self.entries.read();
        let failed: Vec<_> = entries.iter().filter(|(_, e)| e.failures > 0).collect();
        if failed.is_empty() {
            return;
        }
        info!("Failures:");
        for (name, stats) in failed {
            info!(
                "{:<50} {:>8} last: {}",
                name,
                stats.failures,
                stats.last_error.as_deref().unwrap_or("-"),
            );
        }
    }
}

/// Reprints the stats table every `interval_secs` until cancelled.
pub async fn run_reporter(
    stats: Arc<StatsRegistry>,
    interval_secs: u64,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs.max(1)));
    // The immediate first tick would print an empty table.
    interval.tick().await;
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => stats.report(),
        }
    }
}
