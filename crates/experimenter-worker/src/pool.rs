use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use experimenter_core::dialect::SqlDialect;
use experimenter_core::{CoreError, ExperimentDispatcher, ResultProcessor};
use experimenter_domain::{RoutineOutcome, TableSchema};
use experimenter_persistence::{SqlExperimentDispatcher, SqlResultProcessor};
use futures::FutureExt;
use log::{error, info, warn};
use sqlx::AnyPool;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::routine::{Custom, ExperimentRoutine};

/// Policy for one call to [`WorkerPool::execute`] (§4.6).
#[derive(Debug, Clone)]
pub struct ExecuteOptions {
    /// Number of concurrently running workers.
    pub n_jobs: u32,
    /// Upper bound on the number of experiments to run. `-1` means
    /// unbounded: each worker loops until the Dispatcher reports
    /// `NoExperimentsLeft`.
    pub max_experiments: i64,
    /// Passed through to the Dispatcher's claim order.
    pub random_order: bool,
    /// Written to the `name` column before the routine runs.
    pub name: String,
}

impl Default for ExecuteOptions {
    fn default() -> Self {
        Self {
            n_jobs: 1,
            max_experiments: -1,
            random_order: false,
            name: String::new(),
        }
    }
}

/// Drives the claim/run/finalize loop against a database-backed work table
/// (§4.6). Holds no per-experiment state; every interaction goes through the
/// pool and the schema, matching the "no shared in-memory state between
/// workers" requirement of §5.
pub struct WorkerPool {
    pool: AnyPool,
    dialect: Arc<dyn SqlDialect>,
    schema: TableSchema,
    codecarbon_enabled: bool,
}

impl WorkerPool {
    pub fn new(pool: AnyPool, dialect: Arc<dyn SqlDialect>, schema: TableSchema) -> Self {
        Self { pool, dialect, schema, codecarbon_enabled: false }
    }

    /// Same as [`WorkerPool::new`], but with the emissions tracker flag
    /// (§4.1, §10.3 `CodeCarbon` section) threaded through to every
    /// `ResultProcessor` the pool hands to a routine, so `write_emissions`
    /// is available whenever the configured schema enabled it.
    pub fn with_codecarbon(pool: AnyPool, dialect: Arc<dyn SqlDialect>, schema: TableSchema, codecarbon_enabled: bool) -> Self {
        Self { pool, dialect, schema, codecarbon_enabled }
    }

    /// Runs `routine` to completion according to `opts`. Returns once every
    /// spawned worker has finished (for `max_experiments == -1`, that means
    /// every worker independently observed `NoExperimentsLeft`).
    pub async fn execute<R>(&self, routine: Arc<R>, opts: ExecuteOptions, custom: Arc<Custom>)
    where
        R: ExperimentRoutine + 'static,
    {
        let n_jobs = opts.n_jobs.max(1);
        let mut tasks = JoinSet::new();

        if opts.max_experiments < 0 {
            for _ in 0..n_jobs {
                let ctx = self.task_context();
                let routine = routine.clone();
                let custom = custom.clone();
                let opts = opts.clone();
                tasks.spawn(async move { ctx.worker_loop(routine, custom, opts).await });
            }
        } else {
            // §4.6: "schedule exactly M single-claim tasks across N workers" ---
            // M tasks are queued, but at most N run a claim at once.
            let total = opts.max_experiments as usize;
            let permits = Arc::new(Semaphore::new(n_jobs as usize));
            for _ in 0..total {
                let ctx = self.task_context();
                let routine = routine.clone();
                let custom = custom.clone();
                let opts = opts.clone();
                let permits = permits.clone();
                tasks.spawn(async move {
                    let _permit = permits.acquire_owned().await.expect("semaphore is never closed");
                    match ctx.execution_wrapper(&routine, &custom, &opts).await {
                        Ok(()) | Err(CoreError::NoExperimentsLeft) => {}
                        Err(e) => warn!("single-claim task on {} failed: {e}", ctx.schema.table_name),
                    }
                });
            }
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(join_err) = joined {
                error!("worker task panicked outside the routine boundary: {join_err}");
            }
        }

        info!("all configured executions finished for table {}", self.schema.table_name);
    }

    /// Pulls a single `paused` experiment by id and resumes it (§4.6
    /// `unpause_experiment`).
    pub async fn unpause(&self, routine: Arc<dyn ExperimentRoutine>, id: i64, custom: &Custom) -> Result<(), CoreError> {
        let dispatcher = SqlExperimentDispatcher::new(self.pool.clone(), self.dialect.clone());
        let keyfields = dispatcher.resume(&self.schema, id).await?;
        let processor = SqlResultProcessor::new(self.pool.clone(), self.schema.clone(), self.codecarbon_enabled);
        run_and_finalize(&*routine, &processor, id, &self.schema, &keyfields, custom).await
    }

    fn task_context(&self) -> WorkerContext {
        WorkerContext {
            pool: self.pool.clone(),
            dialect: self.dialect.clone(),
            schema: self.schema.clone(),
            codecarbon_enabled: self.codecarbon_enabled,
        }
    }
}

/// The `'static` slice of a [`WorkerPool`] a spawned task actually needs.
struct WorkerContext {
    pool: AnyPool,
    dialect: Arc<dyn SqlDialect>,
    schema: TableSchema,
    codecarbon_enabled: bool,
}

impl WorkerContext {
    async fn worker_loop<R>(&self, routine: Arc<R>, custom: Arc<Custom>, opts: ExecuteOptions)
    where
        R: ExperimentRoutine + 'static,
    {
        loop {
            match self.execution_wrapper(&*routine, &custom, &opts).await {
                Ok(()) => continue,
                Err(CoreError::NoExperimentsLeft) => break,
                Err(e) => {
                    warn!("worker loop on {} stopping after claim error: {e}", self.schema.table_name);
                    break;
                }
            }
        }
    }

    async fn execution_wrapper(
        &self,
        routine: &(dyn ExperimentRoutine + '_),
        custom: &Custom,
        opts: &ExecuteOptions,
    ) -> Result<(), CoreError> {
        let dispatcher = SqlExperimentDispatcher::new(self.pool.clone(), self.dialect.clone());
        let (id, keyfields) = dispatcher.claim_next(&self.schema, opts.random_order).await?;

        let processor = SqlResultProcessor::new(self.pool.clone(), self.schema.clone(), self.codecarbon_enabled);
        processor.set_name(id, &opts.name).await?;
        processor.set_machine(id, &local_hostname()).await?;

        run_and_finalize(routine, &processor, id, &self.schema, &keyfields, custom).await
    }
}

/// Invokes `routine`, catching any panic so the row is always finalized
/// (§4.6: "wraps `f` in a try/finally that always attempts to finalize the
/// row's status"). A panic is translated into `RoutineOutcome::Error`, the
/// same as an explicit error return.
async fn run_and_finalize(
    routine: &(dyn ExperimentRoutine + '_),
    processor: &SqlResultProcessor,
    id: i64,
    schema: &TableSchema,
    keyfields: &experimenter_core::traits::Keyfields,
    custom: &Custom,
) -> Result<(), CoreError> {
    let outcome = match AssertUnwindSafe(routine.run(id, keyfields, processor, custom))
        .catch_unwind()
        .await
    {
        Ok(outcome) => outcome,
        Err(panic) => {
            let message = panic_message(&panic);
            error!("experiment {id} in {} panicked: {message}", schema.table_name);
            RoutineOutcome::Error(message)
        }
    };
    processor.finalize(id, schema, outcome).await
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "experiment routine panicked with a non-string payload".to_string()
    }
}

/// Hostname written to the `machine` column (§4.6). No hostname-lookup crate
/// appears anywhere in the corpus this is grounded on, so this falls back to
/// the `HOSTNAME` environment variable rather than adding one.
fn local_hostname() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}
