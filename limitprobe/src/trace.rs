use crate::probe::ProbeResult;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::fmt::Write;
use std::time::Duration;

/// Rounding granularities and the queuing threshold used when ordering and
/// rendering a trace.
///
/// The defaults are tuned to typical scheduler jitter: wide enough to make
/// two runs of the same scenario comparable, narrow enough to keep the
/// temporal structure of the batches visible. Retune them when the target
/// environment has different latency characteristics.
#[derive(Debug, Clone, Copy)]
pub struct TimingPolicy {
    /// Bucket applied to probe start times, the primary sort key.
    pub start_bucket: Duration,
    /// Bucket applied to probe durations, the secondary sort key.
    pub duration_bucket: Duration,
    /// At or above this duration a probe counts as queued by the limiter.
    pub delay_threshold: Duration,
}

impl Default for TimingPolicy {
    fn default() -> Self {
        Self {
            start_bucket: Duration::from_millis(10),
            duration_bucket: Duration::from_millis(1),
            delay_threshold: Duration::from_secs(1),
        }
    }
}

impl TimingPolicy {
    /// Total order over probe results that is stable across runs.
    ///
    /// Raw timestamps from concurrently dispatched probes are never
    /// bit-identical between runs, so the comparator only looks at bucketed
    /// start and duration, falling back to status and key to break ties.
    pub fn compare(&self, a: &ProbeResult, b: &ProbeResult) -> Ordering {
        self.start_slot(a)
            .cmp(&self.start_slot(b))
            .then_with(|| self.duration_slot(a).cmp(&self.duration_slot(b)))
            .then_with(|| a.status.cmp(&b.status))
            .then_with(|| a.key.cmp(&b.key))
    }

    /// A queued probe: the limiter held the request instead of deciding
    /// immediately.
    pub fn is_delayed(&self, result: &ProbeResult) -> bool {
        result.duration >= self.delay_threshold
    }

    pub fn rounded_start(&self, result: &ProbeResult) -> DateTime<Utc> {
        let bucket_us = self.start_bucket.as_micros().max(1) as i64;
        DateTime::from_timestamp_micros(self.start_slot(result) * bucket_us)
            .unwrap_or(result.start)
    }

    pub fn rounded_duration(&self, result: &ProbeResult) -> Duration {
        let bucket_ns = self.duration_bucket.as_nanos().max(1);
        let slots = self.duration_slot(result);
        Duration::from_nanos((slots * bucket_ns) as u64)
    }

    fn start_slot(&self, result: &ProbeResult) -> i64 {
        let bucket_us = self.start_bucket.as_micros().max(1) as i64;
        (result.start.timestamp_micros() + bucket_us / 2).div_euclid(bucket_us)
    }

    fn duration_slot(&self, result: &ProbeResult) -> u128 {
        let bucket_ns = self.duration_bucket.as_nanos().max(1);
        (result.duration.as_nanos() + bucket_ns / 2) / bucket_ns
    }
}

/// Column header matching the per-result lines of [`render`].
pub fn header() -> String {
    format!(
        "{}   {:<15} {:<10} {:>20} {}",
        "  ", "URL", "Start time", "Duration", ""
    )
}

/// Renders a batch of results as a deterministic, diffable trace.
///
/// Results are sorted with [`TimingPolicy::compare`] and printed one per
/// line: accept/reject symbol, key, bucketed start time, bucketed duration,
/// and a `*` marker on queued probes. Only bucketed values appear in the
/// output, so runs differing by sub-bucket jitter render byte-identically.
pub fn render(results: &[ProbeResult], policy: &TimingPolicy) -> String {
    let mut sorted: Vec<&ProbeResult> = results.iter().collect();
    sorted.sort_by(|a, b| policy.compare(a, b));

    let mut out = String::new();
    for result in sorted {
        let symbol = if result.is_accepted() { "✅" } else { "❌" };
        let mark = if policy.is_delayed(result) { "*" } else { "" };
        let start = policy.rounded_start(result).format("%M:%S%.3f");
        let duration = humantime::format_duration(policy.rounded_duration(result));
        let _ = writeln!(
            out,
            "{}   {:<15} {:<10} {:>20} {}",
            symbol,
            result.key,
            start.to_string(),
            duration.to_string(),
            mark
        );
    }
    out
}
