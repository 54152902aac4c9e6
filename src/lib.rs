//! TPC-C benchmark driver for databases under test.
//!
//! Populates a schema with scale-dependent synthetic data, drives the five
//! TPC-C transaction profiles from concurrent simulated terminals, and
//! verifies afterwards that the data still satisfies the twelve cross-table
//! consistency invariants.
//!
//! # Architecture
//!
//! The crate is organized around four stages:
//!
//! - **DataGenerator**: lazy, seed-deterministic row streams with TPC-C's
//!   cardinalities and skew, bulk-loaded by **SchemaLoader**
//! - **TransactionEngine**: a fixed pool of worker terminals issuing the
//!   weighted transaction mix with bounded conflict retry
//! - **StatsCollector**: per-worker outcome and latency aggregation,
//!   merged after all workers join
//! - **ConsistencyChecker**: twelve read-only invariant checks over the
//!   quiescent final state
//!
//! The database under test sits behind the [`db::Database`] and
//! [`db::Connection`] traits; [`sqlite::SqliteDatabase`] is the shipped
//! implementation.
//!
//! # Quick Start
//!
//! ```
//! use tpcc_bench::DataGenerator;
//!
//! // Scale factor 1 (one warehouse), fixed seed: fully deterministic.
//! let gen = DataGenerator::new(1, 42).unwrap();
//! assert_eq!(gen.districts().count(), 10);
//! let first = gen.customers().next().unwrap();
//! assert_eq!((first.c_w_id, first.c_d_id, first.c_id), (1, 1, 1));
//! ```

pub mod check;
pub mod db;
pub mod engine;
pub mod generator;
pub mod loader;
pub mod model;
pub mod rng;
pub mod sqlite;
pub mod stats;

pub use check::{CheckResult, ConsistencyChecker};
pub use db::{Connection, Database, DbError};
pub use engine::{EngineConfig, Outcome, TransactionEngine, TxnKind};
pub use generator::DataGenerator;
pub use loader::SchemaLoader;
pub use rng::TpccRng;
pub use sqlite::SqliteDatabase;
pub use stats::StatsCollector;

use thiserror::Error;

/// Fatal errors of the benchmark stages.
///
/// Conflicts, exhausted retries and invalid-item rollbacks are outcomes
/// recorded in the statistics, not errors; consistency violations are
/// reported by the checker. Everything here stops the current stage.
#[derive(Debug, Error)]
pub enum BenchError {
    /// Invalid scale factor or run configuration.
    #[error("generation failed: {0}")]
    Generation(String),
    /// Bulk load failed; fatal for init mode.
    #[error("load failed: {0}")]
    Load(#[source] DbError),
    /// Any other database failure outside the retryable paths.
    #[error(transparent)]
    Db(#[from] DbError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
