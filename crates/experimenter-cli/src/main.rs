//! Thin demo binary: load a declarative document, stand up its work table,
//! fill it from its own keyfield product, and run a no-op routine against it
//! so the full claim/run/finalize cycle can be exercised end to end.
//!
//! Mirrors the teacher's `chem-cli` in spirit: a minimal binary that wires
//! the library crates together rather than reimplementing any of their
//! logic.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use experimenter_core::traits::Keyfields;
use experimenter_core::{ResultProcessor, WorkTableManager};
use experimenter_domain::{ExperimenterConfig, RoutineOutcome};
use experimenter_persistence::{dialect_for, DbConfig};
use experimenter_worker::{Custom, ExecuteOptions, ExperimentRoutine, WorkerPool};

#[derive(Parser)]
#[command(name = "experimenter-cli", about = "Declarative experiment table demo")]
struct Cli {
    /// Path to the YAML document describing the database and table.
    #[arg(long)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the main table, its logtables, and the emissions table if enabled.
    Init,
    /// Fill the table from the Cartesian product of its declared keyfields.
    Fill,
    /// Claim and run every `created` row with a logging no-op routine.
    Run {
        #[arg(long, default_value_t = 1)]
        n_jobs: u32,
        #[arg(long, default_value_t = -1)]
        max_experiments: i64,
        #[arg(long, default_value_t = false)]
        random_order: bool,
    },
}

struct LoggingRoutine;

#[async_trait]
impl ExperimentRoutine for LoggingRoutine {
    async fn run(&self, id: i64, keyfields: &Keyfields, _processor: &dyn ResultProcessor, _custom: &Custom) -> RoutineOutcome {
        log::info!("experiment {id}: {keyfields:?}");
        RoutineOutcome::Done
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let experimenter = ExperimenterConfig::from_path(&cli.config)?;
    experimenter_persistence::config::init_dotenv();
    let db = DbConfig::from_env()?;
    let pool = experimenter_persistence::build_pool(experimenter.provider, &db).await?;
    let dialect = dialect_for(experimenter.provider);

    let manager = experimenter_persistence::SqlWorkTableManager::new(pool.clone(), dialect.clone(), experimenter.codecarbon_enabled);

    match cli.command {
        Command::Init => {
            manager.ensure_schema(&experimenter.schema).await?;
            println!("table {:?} ready", experimenter.schema.table_name);
        }
        Command::Fill => {
            manager.ensure_schema(&experimenter.schema).await?;
            let mut values_by_key = HashMap::new();
            for kf in &experimenter.schema.keyfields {
                values_by_key.insert(kf.name.clone(), kf.domain.values());
            }
            let inserted = manager.fill_from_product(&experimenter.schema, &values_by_key, &[]).await?;
            println!("inserted {inserted} rows");
        }
        Command::Run { n_jobs, max_experiments, random_order } => {
            manager.ensure_schema(&experimenter.schema).await?;
            let worker_pool = WorkerPool::with_codecarbon(
                pool,
                dialect,
                experimenter.schema.clone(),
                experimenter.codecarbon_enabled,
            );
            let opts = ExecuteOptions {
                n_jobs,
                max_experiments,
                random_order,
                name: "experimenter-cli".to_string(),
            };
            worker_pool.execute(Arc::new(LoggingRoutine), opts, Arc::new(Custom::new())).await;
            println!("run finished");
        }
    }

    Ok(())
}
