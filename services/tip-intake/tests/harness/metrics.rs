// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Metrics collection for abuse simulation results.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Collects metrics during abuse simulation.
#[derive(Debug, Default)]
pub struct AttackMetrics {
    /// Start time of the attack
    start_time: Option<Instant>,
    /// End time of the attack
    end_time: Option<Instant>,
    /// Count of submissions by outcome
    outcomes: HashMap<Outcome, usize>,
    /// Count of submissions by anonymous ID
    per_submitter: HashMap<String, usize>,
    /// Latency samples (microseconds)
    latencies: Vec<u64>,
}

/// Possible outcomes for a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Success,
    Redacted,
    Rejected,
    RateLimited,
    Banned,
    Invalid,
    Error,
}

impl Outcome {
    pub fn from_label(label: &str) -> Self {
        match label {
            "success" => Self::Success,
            "redacted" => Self::Redacted,
            "rejected" => Self::Rejected,
            "rate_limited" => Self::RateLimited,
            "banned" => Self::Banned,
            "invalid" => Self::Invalid,
            _ => Self::Error,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Success | Self::Redacted)
    }
}

impl AttackMetrics {
    /// Create a new metrics collector.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark the start of an attack.
    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Mark the end of an attack.
    pub fn finish(&mut self) {
        self.end_time = Some(Instant::now());
    }

    /// Record a submission outcome.
    pub fn record(&mut self, outcome: Outcome, anon_id: &str, latency: Duration) {
        *self.outcomes.entry(outcome).or_insert(0) += 1;
        *self.per_submitter.entry(anon_id.to_string()).or_insert(0) += 1;
        self.latencies.push(latency.as_micros() as u64);
    }

    pub fn total(&self) -> usize {
        self.outcomes.values().sum()
    }

    pub fn count(&self, outcome: Outcome) -> usize {
        self.outcomes.get(&outcome).copied().unwrap_or(0)
    }

    pub fn accepted(&self) -> usize {
        self.count(Outcome::Success) + self.count(Outcome::Redacted)
    }

    pub fn duration(&self) -> Duration {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => end.duration_since(start),
            (Some(start), None) => start.elapsed(),
            _ => Duration::ZERO,
        }
    }

    /// Ratio of submissions that were not accepted.
    pub fn block_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (total - self.accepted()) as f64 / total as f64
    }

    /// Get median latency in microseconds.
    pub fn median_latency_us(&self) -> u64 {
        if self.latencies.is_empty() {
            return 0;
        }
        let mut sorted = self.latencies.clone();
        sorted.sort_unstable();
        sorted[sorted.len() / 2]
    }

    pub fn unique_submitters(&self) -> usize {
        self.per_submitter.len()
    }

    /// Generate a summary report.
    pub fn report(&self) -> MetricsReport {
        MetricsReport {
            total: self.total(),
            accepted: self.accepted(),
            redacted: self.count(Outcome::Redacted),
            rejected: self.count(Outcome::Rejected),
            rate_limited: self.count(Outcome::RateLimited),
            banned: self.count(Outcome::Banned),
            invalid: self.count(Outcome::Invalid),
            errors: self.count(Outcome::Error),
            duration_ms: self.duration().as_millis() as u64,
            block_rate: self.block_rate(),
            median_latency_us: self.median_latency_us(),
            unique_submitters: self.unique_submitters(),
        }
    }
}

/// Summary report of abuse metrics.
#[derive(Debug, Clone)]
pub struct MetricsReport {
    pub total: usize,
    pub accepted: usize,
    pub redacted: usize,
    pub rejected: usize,
    pub rate_limited: usize,
    pub banned: usize,
    pub invalid: usize,
    pub errors: usize,
    pub duration_ms: u64,
    pub block_rate: f64,
    pub median_latency_us: u64,
    pub unique_submitters: usize,
}

impl std::fmt::Display for MetricsReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "=== Abuse Metrics Report ===")?;
        writeln!(f, "Duration:          {} ms", self.duration_ms)?;
        writeln!(f, "Total Submissions: {}", self.total)?;
        writeln!(f)?;
        writeln!(f, "--- Outcomes ---")?;
        writeln!(f, "Accepted:          {}", self.accepted)?;
        writeln!(f, "  of which redacted: {}", self.redacted)?;
        writeln!(f, "Rejected:          {}", self.rejected)?;
        writeln!(f, "Rate Limited:      {}", self.rate_limited)?;
        writeln!(f, "Banned:            {}", self.banned)?;
        writeln!(f, "Invalid:           {}", self.invalid)?;
        writeln!(f, "Errors:            {}", self.errors)?;
        writeln!(f, "Block Rate:        {:.1}%", self.block_rate * 100.0)?;
        writeln!(f)?;
        writeln!(f, "Median latency:    {} us", self.median_latency_us)?;
        writeln!(f, "Unique submitters: {}", self.unique_submitters)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_collection() {
        let mut metrics = AttackMetrics::new();
        metrics.start();

        metrics.record(Outcome::Success, "user_a", Duration::from_micros(100));
        metrics.record(Outcome::Redacted, "user_a", Duration::from_micros(150));
        metrics.record(Outcome::RateLimited, "user_b", Duration::from_micros(50));

        metrics.finish();

        assert_eq!(metrics.total(), 3);
        assert_eq!(metrics.accepted(), 2);
        assert_eq!(metrics.unique_submitters(), 2);
    }

    #[test]
    fn test_block_rate() {
        let mut metrics = AttackMetrics::new();
        for _ in 0..3 {
            metrics.record(Outcome::Success, "user_a", Duration::ZERO);
        }
        for _ in 0..7 {
            metrics.record(Outcome::RateLimited, "user_a", Duration::ZERO);
        }

        assert!((metrics.block_rate() - 0.7).abs() < 0.01);
    }
}
