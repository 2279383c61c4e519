use std::collections::HashMap;

use async_trait::async_trait;
use experimenter_domain::schema::{KeyValue, TableSchema};
use experimenter_domain::{RoutineOutcome, StatusFilter};

use crate::errors::CoreError;
use crate::fill::Assignment;

/// A fully specified keyfield assignment, as handed to the user routine.
pub type Keyfields = HashMap<String, KeyValue>;

/// Creates the main table and its logtables/emissions child if absent,
/// validates an existing table's structure, and performs the Cartesian
/// product / explicit-row backfill with dedup (§4.2).
#[async_trait]
pub trait WorkTableManager: Send + Sync {
    /// Idempotently creates the main table, logtables, and (if enabled) the
    /// emissions child table; validates an existing main table's column set
    /// against `schema` and fails with `CoreError::SchemaMismatch` on
    /// mismatch.
    async fn ensure_schema(&self, schema: &TableSchema) -> Result<(), CoreError>;

    /// Computes the product of `values_by_key`, cross-joins with `fixed`,
    /// deduplicates against existing rows, and inserts the remainder as
    /// `created`. Returns the number of rows actually inserted.
    async fn fill_from_product(
        &self,
        schema: &TableSchema,
        values_by_key: &HashMap<String, Vec<KeyValue>>,
        fixed: &[Assignment],
    ) -> Result<usize, CoreError>;

    /// Deduplicates and inserts a list of fully specified assignments
    /// without any product expansion (§4.2 fill from explicit rows).
    async fn fill_from_rows(
        &self,
        schema: &TableSchema,
        rows: &[Assignment],
    ) -> Result<usize, CoreError>;

    /// Inserts exactly one assignment with `status = created_for_execution`
    /// (§4.2 add single experiment).
    async fn add_single_experiment(
        &self,
        schema: &TableSchema,
        assignment: &Assignment,
    ) -> Result<i64, CoreError>;

    /// Deletes rows matching `filter` and re-inserts them as `created`,
    /// preserving their keyfield values (§3 Lifecycle, reset operations).
    async fn reset_experiments(
        &self,
        schema: &TableSchema,
        filter: StatusFilter,
    ) -> Result<usize, CoreError>;

    /// Drops the main table; logtable and emissions rows cascade.
    async fn delete_table(&self, schema: &TableSchema) -> Result<(), CoreError>;

    /// All rows of the main table as ordered, column-keyed records (§10.5).
    async fn get_table(
        &self,
        schema: &TableSchema,
    ) -> Result<Vec<indexmap::IndexMap<String, serde_json::Value>>, CoreError>;

    /// All rows of the named logtable.
    async fn get_logtable(
        &self,
        schema: &TableSchema,
        suffix: &str,
    ) -> Result<Vec<indexmap::IndexMap<String, serde_json::Value>>, CoreError>;

    /// All rows of the emissions child table (§4.2, §10.5). Fails if the
    /// tracker was never enabled for this schema.
    async fn get_codecarbon_table(
        &self,
        schema: &TableSchema,
    ) -> Result<Vec<indexmap::IndexMap<String, serde_json::Value>>, CoreError>;
}

/// Hands the next `created` row to exactly one caller and supports
/// pause/resume (§4.3).
#[async_trait]
pub trait ExperimentDispatcher: Send + Sync {
    /// Claims the next `created` row (random order if `random_order` is
    /// set), transitioning it to `running` and returning its id and
    /// keyfields. Fails with `CoreError::NoExperimentsLeft` when none remain.
    async fn claim_next(
        &self,
        schema: &TableSchema,
        random_order: bool,
    ) -> Result<(i64, Keyfields), CoreError>;

    /// Resumes a `paused` row with the given id, transitioning it back to
    /// `running`. Fails with `CoreError::NoPausedExperiment` if the row is
    /// not currently paused.
    async fn resume(&self, schema: &TableSchema, id: i64) -> Result<Keyfields, CoreError>;
}

/// Bound to one (experiment id, schema); mediates every write that row
/// receives during its run (§4.4).
#[async_trait]
pub trait ResultProcessor: Send + Sync {
    /// Writes result columns (and, if enabled, their `_timestamp` siblings)
    /// in a single `UPDATE`. Fails with `CoreError::InvalidResultField` if a
    /// key is not a declared resultfield.
    async fn process_results(
        &self,
        id: i64,
        schema: &TableSchema,
        results: HashMap<String, serde_json::Value>,
    ) -> Result<(), CoreError>;

    /// Appends one row per logtable entry within a single transaction.
    /// Fails with `CoreError::InvalidLogtable`/`InvalidLogtableColumn` if the
    /// logtable or one of its columns is undeclared.
    async fn process_logs(
        &self,
        id: i64,
        schema: &TableSchema,
        logs: HashMap<String, HashMap<String, serde_json::Value>>,
    ) -> Result<(), CoreError>;

    /// Writes the row's final status from a `RoutineOutcome`, setting
    /// `end_date` for terminal outcomes (§11: not for `Paused`) and `error`
    /// for `RoutineOutcome::Error`.
    async fn finalize(
        &self,
        id: i64,
        schema: &TableSchema,
        outcome: RoutineOutcome,
    ) -> Result<(), CoreError>;

    async fn write_error(&self, id: i64, text: &str) -> Result<(), CoreError>;
    async fn set_machine(&self, id: i64, host: &str) -> Result<(), CoreError>;
    async fn set_name(&self, id: i64, tag: &str) -> Result<(), CoreError>;

    /// Appends one row to the emissions child table with the experiment id
    /// foreign key, the offline flag, and the tracker's raw data (§4.4, §6).
    /// Fails with `CoreError::CodecarbonNotEnabled` if the schema's tracker
    /// flag was never turned on.
    async fn write_emissions(
        &self,
        id: i64,
        schema: &TableSchema,
        data: serde_json::Value,
        offline: bool,
    ) -> Result<(), CoreError>;
}
