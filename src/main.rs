//! Thin demo binary wiring the workspace crates together: load a
//! declarative document, stand up its table, fill it from the product of
//! its keyfields, and run every row through a logging no-op routine.
//!
//! `experimenter-cli` offers the same operations split into subcommands;
//! this binary runs all three in sequence for a quick end-to-end check,
//! in the same spirit as the teacher's bundled-demo root `main.rs`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use experimenter::AppConfig;
use experimenter_core::traits::Keyfields;
use experimenter_core::{ResultProcessor, WorkTableManager};
use experimenter_domain::RoutineOutcome;
use experimenter_worker::{Custom, ExecuteOptions, ExperimentRoutine, WorkerPool};

#[derive(Parser)]
#[command(name = "experimenter", about = "Run a declarative experiment document end to end")]
struct Args {
    /// Path to the YAML document describing the database and table.
    config: PathBuf,

    #[arg(long, default_value_t = 1)]
    n_jobs: u32,
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
    let args = Args::parse();

    let app = AppConfig::load(&args.config)?;
    let pool = app.connect().await?;
    let dialect = app.dialect();

    let manager = experimenter_persistence::SqlWorkTableManager::new(
        pool.clone(),
        dialect.clone(),
        app.experimenter.codecarbon_enabled,
    );
    manager.ensure_schema(&app.experimenter.schema).await?;

    let mut values_by_key = HashMap::new();
    for kf in &app.experimenter.schema.keyfields {
        values_by_key.insert(kf.name.clone(), kf.domain.values());
    }
    let inserted = manager
        .fill_from_product(&app.experimenter.schema, &values_by_key, &[])
        .await?;
    log::info!("inserted {inserted} rows into {:?}", app.experimenter.schema.table_name);

    let worker_pool = WorkerPool::with_codecarbon(
        pool,
        dialect,
        app.experimenter.schema.clone(),
        app.experimenter.codecarbon_enabled,
    );
    let opts = ExecuteOptions {
        n_jobs: args.n_jobs,
        max_experiments: -1,
        random_order: false,
        name: "experimenter-demo".to_string(),
    };
    worker_pool.execute(Arc::new(LoggingRoutine), opts, Arc::new(Custom::new())).await;

    Ok(())
}
