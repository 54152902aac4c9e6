//! Aggregation of per-transaction outcomes into a run summary.
//!
//! Each worker owns its own collector and records into it without any
//! synchronization; the engine merges the collectors once after every
//! worker has joined, so the summary never sees a torn read.

use std::fmt;
use std::time::Duration;

use crate::engine::{Outcome, TxnKind};

/// Counters and latency samples for one transaction type.
#[derive(Debug, Default, Clone)]
pub struct TxnStats {
    pub attempted: u64,
    pub committed: u64,
    /// Deliberate rollbacks (the 1% invalid-item New-Order path).
    pub rolled_back: u64,
    /// Retry budget exhausted or non-retryable failure.
    pub aborted: u64,
    /// Conflict retries across all attempts.
    pub retries: u64,
    latencies: Vec<Duration>,
}

impl TxnStats {
    fn record(&mut self, outcome: Outcome, latency: Duration, retries: u32) {
        self.attempted += 1;
        self.retries += u64::from(retries);
        match outcome {
            Outcome::Committed => self.committed += 1,
            Outcome::RolledBack => self.rolled_back += 1,
            Outcome::Aborted => self.aborted += 1,
        }
        self.latencies.push(latency);
    }

    fn merge(&mut self, other: TxnStats) {
        self.attempted += other.attempted;
        self.committed += other.committed;
        self.rolled_back += other.rolled_back;
        self.aborted += other.aborted;
        self.retries += other.retries;
        self.latencies.extend(other.latencies);
    }

    pub fn mean_latency(&self) -> Duration {
        if self.latencies.is_empty() {
            return Duration::ZERO;
        }
        self.latencies.iter().sum::<Duration>() / self.latencies.len() as u32
    }

    /// Latency percentile in [0.0, 1.0] over the recorded samples.
    pub fn percentile(&self, p: f64) -> Duration {
        if self.latencies.is_empty() {
            return Duration::ZERO;
        }
        let mut sorted = self.latencies.clone();
        sorted.sort_unstable();
        let rank = ((sorted.len() - 1) as f64 * p).round() as usize;
        sorted[rank]
    }
}

/// Per-type statistics for a whole run.
#[derive(Debug, Default, Clone)]
pub struct StatsCollector {
    kinds: [TxnStats; 5],
    /// Wall-clock span of the run; set by the engine after all workers join.
    pub wall: Duration,
}

impl StatsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, kind: TxnKind, outcome: Outcome, latency: Duration, retries: u32) {
        self.kinds[kind as usize].record(outcome, latency, retries);
    }

    /// Folds another worker's collector into this one.
    pub fn merge(&mut self, other: StatsCollector) {
        for (mine, theirs) in self.kinds.iter_mut().zip(other.kinds) {
            mine.merge(theirs);
        }
    }

    pub fn kind(&self, kind: TxnKind) -> &TxnStats {
        &self.kinds[kind as usize]
    }

    pub fn total_attempted(&self) -> u64 {
        self.kinds.iter().map(|k| k.attempted).sum()
    }

    pub fn total_committed(&self) -> u64 {
        self.kinds.iter().map(|k| k.committed).sum()
    }

    pub fn total_aborted(&self) -> u64 {
        self.kinds.iter().map(|k| k.aborted).sum()
    }

    /// Committed transactions per second over the wall-clock window.
    pub fn throughput(&self) -> f64 {
        if self.wall.is_zero() {
            return 0.0;
        }
        self.total_committed() as f64 / self.wall.as_secs_f64()
    }
}

impl fmt::Display for StatsCollector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:=^78}", " benchmark summary ")?;
        writeln!(
            f,
            "wall clock {:.2}s | attempted {} | committed {} | throughput {:.1} txn/s",
            self.wall.as_secs_f64(),
            self.total_attempted(),
            self.total_committed(),
            self.throughput()
        )?;
        writeln!(
            f,
            "{:<13} {:>9} {:>9} {:>11} {:>8} {:>8} {:>8} {:>8} {:>8} {:>8}",
            "type", "attempted", "committed", "rolled-back", "aborted", "retries", "mean", "p50", "p95", "p99"
        )?;
        for kind in TxnKind::ALL {
            let s = self.kind(kind);
            writeln!(
                f,
                "{:<13} {:>9} {:>9} {:>11} {:>8} {:>8} {:>7.1}ms {:>6.1}ms {:>6.1}ms {:>6.1}ms",
                kind.name(),
                s.attempted,
                s.committed,
                s.rolled_back,
                s.aborted,
                s.retries,
                s.mean_latency().as_secs_f64() * 1000.0,
                s.percentile(0.5).as_secs_f64() * 1000.0,
                s.percentile(0.95).as_secs_f64() * 1000.0,
                s.percentile(0.99).as_secs_f64() * 1000.0,
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_totals() {
        let mut stats = StatsCollector::new();
        stats.record(TxnKind::NewOrder, Outcome::Committed, Duration::from_millis(2), 0);
        stats.record(TxnKind::NewOrder, Outcome::RolledBack, Duration::from_millis(1), 1);
        stats.record(TxnKind::Payment, Outcome::Aborted, Duration::from_millis(9), 5);
        assert_eq!(stats.total_attempted(), 3);
        assert_eq!(stats.total_committed(), 1);
        assert_eq!(stats.total_aborted(), 1);
        assert_eq!(stats.kind(TxnKind::NewOrder).rolled_back, 1);
        assert_eq!(stats.kind(TxnKind::Payment).retries, 5);
    }

    #[test]
    fn test_merge_folds_worker_collectors() {
        let mut a = StatsCollector::new();
        let mut b = StatsCollector::new();
        a.record(TxnKind::Delivery, Outcome::Committed, Duration::from_millis(3), 0);
        b.record(TxnKind::Delivery, Outcome::Committed, Duration::from_millis(5), 2);
        b.record(TxnKind::StockLevel, Outcome::Committed, Duration::from_millis(1), 0);
        a.merge(b);
        assert_eq!(a.kind(TxnKind::Delivery).attempted, 2);
        assert_eq!(a.kind(TxnKind::Delivery).retries, 2);
        assert_eq!(a.kind(TxnKind::StockLevel).committed, 1);
    }

    #[test]
    fn test_percentiles() {
        let mut stats = StatsCollector::new();
        for ms in 1..=100 {
            stats.record(
                TxnKind::Payment,
                Outcome::Committed,
                Duration::from_millis(ms),
                0,
            );
        }
        let s = stats.kind(TxnKind::Payment);
        assert_eq!(s.percentile(0.0), Duration::from_millis(1));
        assert_eq!(s.percentile(1.0), Duration::from_millis(100));
        assert!(s.percentile(0.5) >= Duration::from_millis(49));
        assert!(s.percentile(0.5) <= Duration::from_millis(52));
        assert_eq!(s.mean_latency(), Duration::from_micros(50_500));
    }

    #[test]
    fn test_empty_stats_are_quiet() {
        let stats = StatsCollector::new();
        assert_eq!(stats.throughput(), 0.0);
        assert_eq!(stats.kind(TxnKind::NewOrder).percentile(0.99), Duration::ZERO);
    }
}
