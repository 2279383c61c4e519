//! experimenter-worker: the process-pool-across-revisions design note (§9)
//! re-expressed over tokio tasks. Drives the claim/run/finalize loop of §4.6
//! against the `experimenter-core` traits implemented by
//! `experimenter-persistence`.

pub mod pool;
pub mod routine;

pub use pool::{ExecuteOptions, WorkerPool};
pub use routine::{Custom, ExperimentRoutine};
