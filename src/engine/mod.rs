//! The concurrent transaction driver.
//!
//! A fixed pool of worker threads simulates TPC-C terminals: each worker is
//! bound to one home warehouse for its lifetime, owns its database
//! connection and random stream, and loops picking a transaction type by
//! the fixed weighted mix, drawing parameters, executing, and recording the
//! outcome. Serialization conflicts reported by the database are retried
//! with freshly drawn parameters up to a bounded count; exhausting the
//! budget records an abort, never a process failure.
//!
//! Cancellation is cooperative: the wall-clock deadline and the transaction
//! budget are both checked at the top of the loop, so in-flight
//! transactions always run to completion before a worker stops.

pub mod profiles;

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::db::{Database, DbError};
use crate::rng::TpccRng;
use crate::stats::StatsCollector;
use crate::BenchError;

pub use profiles::TxnInput;

/// The five TPC-C transaction profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnKind {
    NewOrder,
    Payment,
    OrderStatus,
    Delivery,
    StockLevel,
}

impl TxnKind {
    pub const ALL: [TxnKind; 5] = [
        TxnKind::NewOrder,
        TxnKind::Payment,
        TxnKind::OrderStatus,
        TxnKind::Delivery,
        TxnKind::StockLevel,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TxnKind::NewOrder => "New-Order",
            TxnKind::Payment => "Payment",
            TxnKind::OrderStatus => "Order-Status",
            TxnKind::Delivery => "Delivery",
            TxnKind::StockLevel => "Stock-Level",
        }
    }

    /// Weighted pick: New-Order 45%, Payment 43%, the rest 4% each.
    fn pick(rng: &mut TpccRng) -> TxnKind {
        match rng.uniform(1, 100) {
            1..=45 => TxnKind::NewOrder,
            46..=88 => TxnKind::Payment,
            89..=92 => TxnKind::OrderStatus,
            93..=96 => TxnKind::Delivery,
            _ => TxnKind::StockLevel,
        }
    }
}

/// How a finished transaction instance ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Committed,
    /// Deliberate rollback (invalid-item New-Order, empty name match).
    RolledBack,
    /// Retry budget exhausted or a non-retryable failure.
    Aborted,
}

/// Run parameters for the driver.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub warehouses: i64,
    pub workers: usize,
    pub seed: u64,
    /// Global transaction budget across all workers.
    pub transactions: Option<u64>,
    /// Wall-clock deadline; workers finish their in-flight transaction.
    pub duration: Option<Duration>,
    /// Conflict retries per transaction instance before counting an abort.
    pub max_retries: u32,
}

/// Drives the weighted transaction mix against the database under test.
pub struct TransactionEngine<'a, D: Database> {
    db: &'a D,
    config: EngineConfig,
}

impl<'a, D: Database> TransactionEngine<'a, D> {
    pub fn new(db: &'a D, config: EngineConfig) -> Result<Self, BenchError> {
        if config.warehouses < 1 {
            return Err(BenchError::Generation(format!(
                "scale factor must be at least 1, got {}",
                config.warehouses
            )));
        }
        if config.workers == 0 {
            return Err(BenchError::Generation("worker count must be at least 1".into()));
        }
        if config.transactions.is_none() && config.duration.is_none() {
            return Err(BenchError::Generation(
                "either a transaction budget or a duration is required".into(),
            ));
        }
        Ok(Self { db, config })
    }

    /// Runs the benchmark and returns the merged statistics after every
    /// worker has joined.
    pub fn run(&self) -> Result<StatsCollector, BenchError> {
        let stop = AtomicBool::new(false);
        let issued = AtomicU64::new(0);
        let start = Instant::now();

        info!(
            workers = self.config.workers,
            warehouses = self.config.warehouses,
            transactions = self.config.transactions,
            duration_secs = self.config.duration.map(|d| d.as_secs()),
            "starting benchmark"
        );

        let results: Vec<Result<StatsCollector, DbError>> = thread::scope(|scope| {
            let handles: Vec<_> = (0..self.config.workers)
                .map(|index| {
                    let stop = &stop;
                    let issued = &issued;
                    scope.spawn(move || self.worker(index, stop, issued, start))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("worker thread panicked"))
                .collect()
        });

        let mut stats = StatsCollector::new();
        for result in results {
            stats.merge(result?);
        }
        stats.wall = start.elapsed();
        info!(
            committed = stats.total_committed(),
            aborted = stats.total_aborted(),
            "benchmark finished"
        );
        Ok(stats)
    }

    fn worker(
        &self,
        index: usize,
        stop: &AtomicBool,
        issued: &AtomicU64,
        start: Instant,
    ) -> Result<StatsCollector, DbError> {
        let mut rng = TpccRng::for_worker(self.config.seed, index);
        let mut conn = self.db.connect()?;
        // Terminal affinity: this worker's home warehouse for the whole run.
        let home_w = (index as i64 % self.config.warehouses) + 1;
        let mut stats = StatsCollector::new();

        loop {
            // Cooperative cancellation point; never interrupts a
            // transaction already in flight.
            if stop.load(Ordering::Relaxed) {
                break;
            }
            if let Some(deadline) = self.config.duration {
                if start.elapsed() >= deadline {
                    stop.store(true, Ordering::Relaxed);
                    break;
                }
            }
            if let Some(budget) = self.config.transactions {
                if issued.fetch_add(1, Ordering::Relaxed) >= budget {
                    stop.store(true, Ordering::Relaxed);
                    break;
                }
            }

            let kind = TxnKind::pick(&mut rng);
            let begun = Instant::now();
            let (outcome, retries) = self.run_one(&mut conn, &mut rng, kind, home_w);
            stats.record(kind, outcome, begun.elapsed(), retries);
        }
        Ok(stats)
    }

    /// Executes one transaction instance, retrying conflicts with freshly
    /// drawn parameters.
    fn run_one<C: crate::db::Connection>(
        &self,
        conn: &mut C,
        rng: &mut TpccRng,
        kind: TxnKind,
        home_w: i64,
    ) -> (Outcome, u32) {
        let mut retries = 0;
        loop {
            let input = TxnInput::build(kind, rng, home_w, self.config.warehouses);
            match profiles::execute(conn, &input) {
                Ok(outcome) => return (outcome, retries),
                Err(err) if err.is_conflict() && retries < self.config.max_retries => {
                    retries += 1;
                    debug!(kind = kind.name(), retries, "conflict, retrying");
                }
                Err(err) => {
                    if err.is_conflict() {
                        debug!(kind = kind.name(), "retry budget exhausted");
                    } else {
                        warn!(kind = kind.name(), error = %err, "transaction failed");
                    }
                    return (Outcome::Aborted, retries);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mix_weights_within_rounding() {
        let mut rng = TpccRng::new(21);
        let mut counts = [0u32; 5];
        let draws = 100_000;
        for _ in 0..draws {
            counts[TxnKind::pick(&mut rng) as usize] += 1;
        }
        let share = |kind: TxnKind| counts[kind as usize] as f64 / draws as f64;
        assert!((share(TxnKind::NewOrder) - 0.45).abs() < 0.01);
        assert!((share(TxnKind::Payment) - 0.43).abs() < 0.01);
        assert!((share(TxnKind::OrderStatus) - 0.04).abs() < 0.005);
        assert!((share(TxnKind::Delivery) - 0.04).abs() < 0.005);
        assert!((share(TxnKind::StockLevel) - 0.04).abs() < 0.005);
    }

    #[test]
    fn test_config_validation() {
        struct NoDb;
        impl Database for NoDb {
            type Conn = Never;
            fn connect(&self) -> Result<Never, DbError> {
                Err(DbError::Failed("unreachable".into()))
            }
        }
        struct Never;
        impl crate::db::Connection for Never {
            fn execute(&mut self, _: &str, _: &[crate::db::Value]) -> Result<usize, DbError> {
                unreachable!()
            }
            fn query(
                &mut self,
                _: &str,
                _: &[crate::db::Value],
            ) -> Result<Vec<crate::db::Row>, DbError> {
                unreachable!()
            }
            fn begin(&mut self) -> Result<(), DbError> {
                unreachable!()
            }
            fn commit(&mut self) -> Result<(), DbError> {
                unreachable!()
            }
            fn rollback(&mut self) -> Result<(), DbError> {
                unreachable!()
            }
        }

        let good = EngineConfig {
            warehouses: 1,
            workers: 1,
            seed: 0,
            transactions: Some(10),
            duration: None,
            max_retries: 3,
        };
        assert!(TransactionEngine::new(&NoDb, good.clone()).is_ok());
        let mut bad = good.clone();
        bad.workers = 0;
        assert!(TransactionEngine::new(&NoDb, bad).is_err());
        let mut bad = good.clone();
        bad.warehouses = 0;
        assert!(TransactionEngine::new(&NoDb, bad).is_err());
        let mut bad = good;
        bad.transactions = None;
        assert!(TransactionEngine::new(&NoDb, bad).is_err());
    }
}
