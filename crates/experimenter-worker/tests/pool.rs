use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use experimenter_adapters::SqliteDialect;
use experimenter_core::dialect::SqlDialect;
use experimenter_core::traits::Keyfields;
use experimenter_core::{ResultProcessor, WorkTableManager};
use experimenter_domain::schema::{KeyValue, Keyfield, Resultfield, TableSchema, ValueDomain};
use experimenter_domain::RoutineOutcome;
use experimenter_persistence::SqlWorkTableManager;
use experimenter_worker::{Custom, ExecuteOptions, ExperimentRoutine, WorkerPool};
use sqlx::any::{install_default_drivers, AnyPoolOptions};

fn schema() -> TableSchema {
    TableSchema {
        table_name: "experiments".into(),
        keyfields: vec![Keyfield {
            name: "value".into(),
            sql_type: "INTEGER".into(),
            domain: ValueDomain::Interval { start: 0, stop: 100, step: 1 },
        }],
        resultfields: vec![Resultfield { name: "doubled".into(), sql_type: "INTEGER".into() }],
        logtables: vec![],
        result_timestamps: false,
    }
}

async fn memory_pool() -> sqlx::AnyPool {
    install_default_drivers();
    // A bare `sqlite::memory:` opens an independent, unshared database per
    // pooled connection; with several workers claiming rows concurrently on
    // different connections, each would see its own empty table. Pin the
    // pool to a single connection so every worker shares one database.
    AnyPoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap()
}

struct Doubler {
    runs: Arc<AtomicUsize>,
}

#[async_trait]
impl ExperimentRoutine for Doubler {
    async fn run(&self, id: i64, keyfields: &Keyfields, processor: &dyn ResultProcessor, _custom: &Custom) -> RoutineOutcome {
        self.runs.fetch_add(1, Ordering::SeqCst);
        let value = match keyfields.get("value") {
            Some(KeyValue::Integer(v)) => *v,
            _ => return RoutineOutcome::Error("missing keyfield".into()),
        };
        let mut results = HashMap::new();
        results.insert("doubled".to_string(), serde_json::json!(value * 2));
        if let Err(e) = processor.process_results(id, &schema(), results).await {
            return RoutineOutcome::Error(e.to_string());
        }
        RoutineOutcome::Done
    }
}

struct AlwaysPanics;

#[async_trait]
impl ExperimentRoutine for AlwaysPanics {
    async fn run(&self, _id: i64, _keyfields: &Keyfields, _processor: &dyn ResultProcessor, _custom: &Custom) -> RoutineOutcome {
        panic!("boom @#$%&/\\()=");
    }
}

struct AlwaysErrors;

#[async_trait]
impl ExperimentRoutine for AlwaysErrors {
    async fn run(&self, _id: i64, _keyfields: &Keyfields, _processor: &dyn ResultProcessor, _custom: &Custom) -> RoutineOutcome {
        RoutineOutcome::Error("boom @#$%&/\\()=".to_string())
    }
}

struct AlwaysPauses;

#[async_trait]
impl ExperimentRoutine for AlwaysPauses {
    async fn run(&self, _id: i64, _keyfields: &Keyfields, _processor: &dyn ResultProcessor, _custom: &Custom) -> RoutineOutcome {
        RoutineOutcome::Paused
    }
}

#[tokio::test]
async fn concurrent_workers_claim_every_row_exactly_once() {
    let pool = memory_pool().await;
    let dialect: Arc<dyn SqlDialect> = Arc::new(SqliteDialect);
    let schema = schema();

    let manager = SqlWorkTableManager::new(pool.clone(), dialect.clone(), false);
    manager.ensure_schema(&schema).await.unwrap();
    let mut values_by_key = HashMap::new();
    values_by_key.insert("value".to_string(), schema.keyfields[0].domain.values());
    manager.fill_from_product(&schema, &values_by_key, &[]).await.unwrap();

    let runs = Arc::new(AtomicUsize::new(0));
    let routine = Arc::new(Doubler { runs: runs.clone() });
    let worker_pool = WorkerPool::new(pool.clone(), dialect, schema.clone());
    let opts = ExecuteOptions { n_jobs: 8, max_experiments: -1, random_order: false, name: "batch".into() };
    worker_pool.execute(routine, opts, Arc::new(Custom::new())).await;

    assert_eq!(runs.load(Ordering::SeqCst), 100);
    let rows = manager.get_table(&schema).await.unwrap();
    assert_eq!(rows.len(), 100);
    assert!(rows.iter().all(|r| r["status"] == "done"));
    assert!(rows.iter().all(|r| r["name"] == "batch"));
}

#[tokio::test]
async fn panicking_routine_is_captured_as_an_error_row() {
    let pool = memory_pool().await;
    let dialect: Arc<dyn SqlDialect> = Arc::new(SqliteDialect);
    let schema = TableSchema {
        table_name: "experiments".into(),
        keyfields: vec![Keyfield {
            name: "value".into(),
            sql_type: "INTEGER".into(),
            domain: ValueDomain::Explicit(vec![KeyValue::Integer(1)]),
        }],
        resultfields: vec![],
        logtables: vec![],
        result_timestamps: false,
    };

    let manager = SqlWorkTableManager::new(pool.clone(), dialect.clone(), false);
    manager.ensure_schema(&schema).await.unwrap();
    let mut values_by_key = HashMap::new();
    values_by_key.insert("value".to_string(), vec![KeyValue::Integer(1)]);
    manager.fill_from_product(&schema, &values_by_key, &[]).await.unwrap();

    let worker_pool = WorkerPool::new(pool.clone(), dialect, schema.clone());
    let opts = ExecuteOptions { n_jobs: 1, max_experiments: -1, random_order: false, name: "crash".into() };
    worker_pool.execute(Arc::new(AlwaysPanics), opts, Arc::new(Custom::new())).await;

    let rows = manager.get_table(&schema).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["status"], "error");
    assert!(rows[0]["error"].as_str().unwrap().contains("boom @#$%&/\\()="));
}

#[tokio::test]
async fn erroring_routine_writes_the_diagnostic_and_status() {
    let pool = memory_pool().await;
    let dialect: Arc<dyn SqlDialect> = Arc::new(SqliteDialect);
    let schema = TableSchema {
        table_name: "experiments".into(),
        keyfields: vec![Keyfield {
            name: "value".into(),
            sql_type: "INTEGER".into(),
            domain: ValueDomain::Explicit(vec![KeyValue::Integer(1)]),
        }],
        resultfields: vec![],
        logtables: vec![],
        result_timestamps: false,
    };

    let manager = SqlWorkTableManager::new(pool.clone(), dialect.clone(), false);
    manager.ensure_schema(&schema).await.unwrap();
    let mut values_by_key = HashMap::new();
    values_by_key.insert("value".to_string(), vec![KeyValue::Integer(1)]);
    manager.fill_from_product(&schema, &values_by_key, &[]).await.unwrap();

    let worker_pool = WorkerPool::new(pool.clone(), dialect, schema.clone());
    let opts = ExecuteOptions { n_jobs: 1, max_experiments: -1, random_order: false, name: "err".into() };
    worker_pool.execute(Arc::new(AlwaysErrors), opts, Arc::new(Custom::new())).await;

    let rows = manager.get_table(&schema).await.unwrap();
    assert_eq!(rows[0]["status"], "error");
    assert_eq!(rows[0]["error"], "boom @#$%&/\\()=");
}

#[tokio::test]
async fn paused_experiment_can_be_resumed() {
    let pool = memory_pool().await;
    let dialect: Arc<dyn SqlDialect> = Arc::new(SqliteDialect);
    let schema = TableSchema {
        table_name: "experiments".into(),
        keyfields: vec![Keyfield {
            name: "value".into(),
            sql_type: "INTEGER".into(),
            domain: ValueDomain::Explicit(vec![KeyValue::Integer(1)]),
        }],
        resultfields: vec![],
        logtables: vec![],
        result_timestamps: false,
    };

    let manager = SqlWorkTableManager::new(pool.clone(), dialect.clone(), false);
    manager.ensure_schema(&schema).await.unwrap();
    let mut values_by_key = HashMap::new();
    values_by_key.insert("value".to_string(), vec![KeyValue::Integer(1)]);
    manager.fill_from_product(&schema, &values_by_key, &[]).await.unwrap();

    let worker_pool = WorkerPool::new(pool.clone(), dialect, schema.clone());
    let opts = ExecuteOptions { n_jobs: 1, max_experiments: -1, random_order: false, name: "pause".into() };
    worker_pool.execute(Arc::new(AlwaysPauses), opts, Arc::new(Custom::new())).await;

    let rows = manager.get_table(&schema).await.unwrap();
    assert_eq!(rows[0]["status"], "paused");
    assert_eq!(rows[0]["end_date"], serde_json::Value::Null);

    let id = rows[0]["id"].as_i64().unwrap();
    worker_pool.unpause(Arc::new(AlwaysErrors), id, &Custom::new()).await.unwrap();

    let rows = manager.get_table(&schema).await.unwrap();
    assert_eq!(rows[0]["status"], "error");
}
