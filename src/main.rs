//! CLI for initializing, driving and verifying a TPC-C database.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tpcc_bench::{
    loader, BenchError, Connection, ConsistencyChecker, Database, DataGenerator, EngineConfig,
    SchemaLoader, SqliteDatabase, TransactionEngine,
};

#[derive(Parser)]
#[command(name = "tpcc-bench", about = "TPC-C benchmark driver", version)]
struct Cli {
    /// Path of the SQLite database under test.
    #[arg(long, default_value = "tpcc.db")]
    db: PathBuf,

    /// Scale factor: number of warehouses.
    #[arg(long, short, default_value_t = 1)]
    scale: i64,

    /// Random seed; fixed seed plus fixed worker count reproduces a run.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Enable per-transaction debug logging.
    #[arg(long, short)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the schema and bulk-load the generated population.
    Init {
        /// Also export the generated rows as headerless CSV files.
        #[arg(long)]
        csv_out: Option<PathBuf>,
    },
    /// Run the concurrent transaction mix and print a summary.
    Benchmark {
        /// Number of worker terminals.
        #[arg(long, short, default_value_t = 4)]
        workers: usize,

        /// Global transaction budget across all workers.
        #[arg(long, short, default_value_t = 1000)]
        transactions: u64,

        /// Wall-clock limit in seconds; overrides the transaction budget.
        #[arg(long)]
        duration: Option<u64>,

        /// Conflict retries per transaction before counting an abort.
        #[arg(long, default_value_t = 5)]
        max_retries: u32,
    },
    /// Run the twelve consistency checks against the current state.
    Check,
    /// Print per-table row counts.
    Stats,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    match run(&cli) {
        Ok(code) => code,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode, BenchError> {
    let db = SqliteDatabase::new(&cli.db);

    match &cli.command {
        Command::Init { csv_out } => {
            info!(scale = cli.scale, db = %cli.db.display(), "initializing database");
            let gen = DataGenerator::new(cli.scale, cli.seed)?;
            if let Some(dir) = csv_out {
                loader::export_csv(&gen, dir)?;
                info!(dir = %dir.display(), "wrote CSV export");
            }
            db.create_schema().map_err(BenchError::Load)?;
            let mut conn = db.connect().map_err(BenchError::Load)?;
            let summary = SchemaLoader::new(&mut conn).load_all(&gen)?;
            info!(rows = summary.total_rows(), "load complete");
            Ok(ExitCode::SUCCESS)
        }
        Command::Benchmark {
            workers,
            transactions,
            duration,
            max_retries,
        } => {
            let config = EngineConfig {
                warehouses: cli.scale,
                workers: *workers,
                seed: cli.seed,
                transactions: duration.is_none().then_some(*transactions),
                duration: duration.map(Duration::from_secs),
                max_retries: *max_retries,
            };
            let engine = TransactionEngine::new(&db, config)?;
            let stats = engine.run()?;
            print!("{stats}");
            Ok(ExitCode::SUCCESS)
        }
        Command::Check => {
            let mut conn = db.connect()?;
            let checker = ConsistencyChecker::new(cli.scale);
            let results = checker.run_all(&mut conn);
            let mut failed = 0;
            for result in &results {
                if result.passed() {
                    println!("check {:>2} {:<40} PASS", result.id, result.name);
                } else {
                    failed += 1;
                    println!("check {:>2} {:<40} FAIL", result.id, result.name);
                    for violation in &result.violations {
                        match violation.district {
                            Some(d) => println!(
                                "    warehouse {} district {}: {}",
                                violation.warehouse, d, violation.detail
                            ),
                            None => println!(
                                "    warehouse {}: {}",
                                violation.warehouse, violation.detail
                            ),
                        }
                    }
                }
            }
            if failed > 0 {
                error!(failed, "consistency checks failed");
                Ok(ExitCode::FAILURE)
            } else {
                info!("all consistency checks passed");
                Ok(ExitCode::SUCCESS)
            }
        }
        Command::Stats => {
            let mut conn = db.connect()?;
            for table in tpcc_bench::sqlite::TABLES {
                let rows = conn.query(&format!("SELECT COUNT(*) FROM {table}"), &[])?;
                let count = match rows.first().and_then(|r| r.first()) {
                    Some(tpcc_bench::db::Value::Int(n)) => *n,
                    _ => 0,
                };
                println!("{table:<12} {count:>12}");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}
