use std::collections::HashMap;
use std::sync::Arc;

use experimenter_adapters::SqliteDialect;
use experimenter_core::dialect::SqlDialect;
use experimenter_core::{ExperimentDispatcher, ResultProcessor, WorkTableManager};
use experimenter_domain::schema::{KeyValue, Keyfield, Resultfield, TableSchema, ValueDomain};
use experimenter_domain::{RoutineOutcome, Status, StatusFilter};
use experimenter_persistence::{SqlExperimentDispatcher, SqlResultProcessor, SqlWorkTableManager};
use sqlx::any::{install_default_drivers, AnyPoolOptions};

fn schema() -> TableSchema {
    TableSchema {
        table_name: "experiments".into(),
        keyfields: vec![
            Keyfield {
                name: "value".into(),
                sql_type: "INTEGER".into(),
                domain: ValueDomain::Interval { start: 1, stop: 11, step: 1 },
            },
            Keyfield {
                name: "exponent".into(),
                sql_type: "INTEGER".into(),
                domain: ValueDomain::Explicit(vec![
                    KeyValue::Integer(1),
                    KeyValue::Integer(2),
                    KeyValue::Integer(3),
                ]),
            },
        ],
        resultfields: vec![
            Resultfield { name: "sin".into(), sql_type: "REAL".into() },
            Resultfield { name: "cos".into(), sql_type: "REAL".into() },
        ],
        logtables: vec![],
        result_timestamps: false,
    }
}

async fn memory_pool() -> sqlx::AnyPool {
    install_default_drivers();
    AnyPoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap()
}

#[tokio::test]
async fn fill_from_product_creates_thirty_rows() {
    let pool = memory_pool().await;
    let dialect: Arc<dyn SqlDialect> = Arc::new(SqliteDialect);
    let manager = SqlWorkTableManager::new(pool.clone(), dialect, false);
    let schema = schema();

    manager.ensure_schema(&schema).await.unwrap();

    let mut values_by_key = HashMap::new();
    values_by_key.insert("value".to_string(), schema.keyfields[0].domain.values());
    values_by_key.insert("exponent".to_string(), schema.keyfields[1].domain.values());

    let inserted = manager
        .fill_from_product(&schema, &values_by_key, &[])
        .await
        .unwrap();
    assert_eq!(inserted, 30);

    let rows = manager.get_table(&schema).await.unwrap();
    assert_eq!(rows.len(), 30);
    assert!(rows.iter().all(|r| r["status"] == "created"));
}

#[tokio::test]
async fn refill_is_idempotent() {
    let pool = memory_pool().await;
    let dialect: Arc<dyn SqlDialect> = Arc::new(SqliteDialect);
    let manager = SqlWorkTableManager::new(pool.clone(), dialect, false);
    let schema = schema();
    manager.ensure_schema(&schema).await.unwrap();

    let mut values_by_key = HashMap::new();
    values_by_key.insert("value".to_string(), schema.keyfields[0].domain.values());
    values_by_key.insert("exponent".to_string(), schema.keyfields[1].domain.values());

    manager.fill_from_product(&schema, &values_by_key, &[]).await.unwrap();
    let second = manager.fill_from_product(&schema, &values_by_key, &[]).await.unwrap();
    assert_eq!(second, 0);

    let rows = manager.get_table(&schema).await.unwrap();
    assert_eq!(rows.len(), 30);
}

#[tokio::test]
async fn claim_run_and_finalize_round_trip() {
    let pool = memory_pool().await;
    let dialect: Arc<dyn SqlDialect> = Arc::new(SqliteDialect);
    let manager = SqlWorkTableManager::new(pool.clone(), dialect.clone(), false);
    let schema = schema();
    manager.ensure_schema(&schema).await.unwrap();

    let mut values_by_key = HashMap::new();
    values_by_key.insert("value".to_string(), vec![KeyValue::Integer(1)]);
    values_by_key.insert("exponent".to_string(), vec![KeyValue::Integer(1)]);
    manager.fill_from_product(&schema, &values_by_key, &[]).await.unwrap();

    let dispatcher = SqlExperimentDispatcher::new(pool.clone(), dialect);
    let (id, keyfields) = dispatcher.claim_next(&schema, false).await.unwrap();
    assert_eq!(keyfields.get("value"), Some(&KeyValue::Integer(1)));

    let processor = SqlResultProcessor::new(pool.clone(), schema.clone(), false);
    let mut results = HashMap::new();
    results.insert("sin".to_string(), serde_json::json!(0.841));
    results.insert("cos".to_string(), serde_json::json!(0.540));
    processor.process_results(id, &schema, results).await.unwrap();
    processor.finalize(id, &schema, RoutineOutcome::Done).await.unwrap();

    let rows = manager.get_table(&schema).await.unwrap();
    let row = rows.iter().find(|r| r["id"] == id).unwrap();
    assert_eq!(row["status"], Status::Done.as_sql_str());
    assert!(row["end_date"] != serde_json::Value::Null);
}

#[tokio::test]
async fn claiming_with_no_rows_left_fails() {
    let pool = memory_pool().await;
    let dialect: Arc<dyn SqlDialect> = Arc::new(SqliteDialect);
    let manager = SqlWorkTableManager::new(pool.clone(), dialect.clone(), false);
    let schema = schema();
    manager.ensure_schema(&schema).await.unwrap();

    let dispatcher = SqlExperimentDispatcher::new(pool, dialect);
    let err = dispatcher.claim_next(&schema, false).await.unwrap_err();
    assert!(matches!(err, experimenter_core::CoreError::NoExperimentsLeft));
}

#[tokio::test]
async fn codecarbon_table_is_created_only_when_enabled() {
    let pool = memory_pool().await;
    let dialect: Arc<dyn SqlDialect> = Arc::new(SqliteDialect);
    let schema = schema();

    let disabled = SqlWorkTableManager::new(pool.clone(), dialect.clone(), false);
    disabled.ensure_schema(&schema).await.unwrap();
    let err = disabled.get_codecarbon_table(&schema).await.unwrap_err();
    assert!(matches!(err, experimenter_core::CoreError::CodecarbonNotEnabled(_)));

    let enabled_pool = memory_pool().await;
    let enabled = SqlWorkTableManager::new(enabled_pool, dialect, true);
    enabled.ensure_schema(&schema).await.unwrap();
    let rows = enabled.get_codecarbon_table(&schema).await.unwrap();
    assert!(rows.is_empty());
}

#[tokio::test]
async fn write_emissions_appends_a_row_only_when_enabled() {
    let schema = schema();

    let disabled_pool = memory_pool().await;
    let disabled_dialect: Arc<dyn SqlDialect> = Arc::new(SqliteDialect);
    let disabled_manager = SqlWorkTableManager::new(disabled_pool.clone(), disabled_dialect.clone(), false);
    disabled_manager.ensure_schema(&schema).await.unwrap();
    let mut values_by_key = HashMap::new();
    values_by_key.insert("value".to_string(), vec![KeyValue::Integer(1)]);
    values_by_key.insert("exponent".to_string(), vec![KeyValue::Integer(1)]);
    disabled_manager.fill_from_product(&schema, &values_by_key, &[]).await.unwrap();
    let disabled_dispatcher = SqlExperimentDispatcher::new(disabled_pool.clone(), disabled_dialect);
    let (id, _) = disabled_dispatcher.claim_next(&schema, false).await.unwrap();
    let disabled_processor = SqlResultProcessor::new(disabled_pool, schema.clone(), false);
    let err = disabled_processor
        .write_emissions(id, &schema, serde_json::json!({"energy_kwh": 0.01}), false)
        .await
        .unwrap_err();
    assert!(matches!(err, experimenter_core::CoreError::CodecarbonNotEnabled(_)));

    let enabled_pool = memory_pool().await;
    let enabled_dialect: Arc<dyn SqlDialect> = Arc::new(SqliteDialect);
    let enabled_manager = SqlWorkTableManager::new(enabled_pool.clone(), enabled_dialect.clone(), true);
    enabled_manager.ensure_schema(&schema).await.unwrap();
    enabled_manager.fill_from_product(&schema, &values_by_key, &[]).await.unwrap();
    let enabled_dispatcher = SqlExperimentDispatcher::new(enabled_pool.clone(), enabled_dialect);
    let (id, _) = enabled_dispatcher.claim_next(&schema, false).await.unwrap();
    let enabled_processor = SqlResultProcessor::new(enabled_pool, schema.clone(), true);
    enabled_processor
        .write_emissions(id, &schema, serde_json::json!({"energy_kwh": 0.01}), true)
        .await
        .unwrap();

    let rows = enabled_manager.get_codecarbon_table(&schema).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["experiment_id"], id);
    assert_ne!(rows[0]["offline"], serde_json::Value::Null);
    assert!(rows[0]["data"].as_str().unwrap().contains("energy_kwh"));
}

#[tokio::test]
async fn reset_round_trip_preserves_the_keyfield_tuple_set() {
    let pool = memory_pool().await;
    let dialect: Arc<dyn SqlDialect> = Arc::new(SqliteDialect);
    let manager = SqlWorkTableManager::new(pool.clone(), dialect.clone(), false);
    let schema = schema();
    manager.ensure_schema(&schema).await.unwrap();

    let mut values_by_key = HashMap::new();
    values_by_key.insert("value".to_string(), schema.keyfields[0].domain.values());
    values_by_key.insert("exponent".to_string(), schema.keyfields[1].domain.values());
    manager.fill_from_product(&schema, &values_by_key, &[]).await.unwrap();

    let dispatcher = SqlExperimentDispatcher::new(pool.clone(), dialect);
    let processor = SqlResultProcessor::new(pool.clone(), schema.clone(), false);
    for _ in 0..30 {
        let (id, _) = dispatcher.claim_next(&schema, false).await.unwrap();
        processor.finalize(id, &schema, RoutineOutcome::Done).await.unwrap();
    }
    let before = tuple_set(&manager.get_table(&schema).await.unwrap());

    let reinserted = manager.reset_experiments(&schema, StatusFilter::Specific(Status::Done)).await.unwrap();
    assert_eq!(reinserted, 30);

    let after_reset = manager.get_table(&schema).await.unwrap();
    assert!(after_reset.iter().all(|r| r["status"] == "created"));
    assert_eq!(tuple_set(&after_reset), before);

    // execute again: every row should reach done a second time.
    for _ in 0..30 {
        let (id, _) = dispatcher.claim_next(&schema, false).await.unwrap();
        processor.finalize(id, &schema, RoutineOutcome::Done).await.unwrap();
    }
    let after_rerun = manager.get_table(&schema).await.unwrap();
    assert!(after_rerun.iter().all(|r| r["status"] == "done"));
    assert_eq!(tuple_set(&after_rerun), before);
}

fn tuple_set(
    rows: &[indexmap::IndexMap<String, serde_json::Value>],
) -> std::collections::BTreeSet<(i64, i64)> {
    rows.iter()
        .map(|r| (r["value"].as_i64().unwrap(), r["exponent"].as_i64().unwrap()))
        .collect()
}

#[tokio::test]
async fn add_single_experiment_is_marked_created_for_execution() {
    let pool = memory_pool().await;
    let dialect: Arc<dyn SqlDialect> = Arc::new(SqliteDialect);
    let manager = SqlWorkTableManager::new(pool.clone(), dialect, false);
    let schema = schema();
    manager.ensure_schema(&schema).await.unwrap();

    let mut assignment = experimenter_core::fill::Assignment::new();
    assignment.insert("value".to_string(), KeyValue::Integer(7));
    assignment.insert("exponent".to_string(), KeyValue::Integer(2));
    let id = manager.add_single_experiment(&schema, &assignment).await.unwrap();

    let rows = manager.get_table(&schema).await.unwrap();
    let row = rows.iter().find(|r| r["id"] == id).unwrap();
    assert_eq!(row["status"], Status::CreatedForExecution.as_sql_str());
}

#[tokio::test]
async fn fill_from_rows_skips_duplicates_without_product_expansion() {
    let pool = memory_pool().await;
    let dialect: Arc<dyn SqlDialect> = Arc::new(SqliteDialect);
    let manager = SqlWorkTableManager::new(pool.clone(), dialect, false);
    let schema = schema();
    manager.ensure_schema(&schema).await.unwrap();

    let mut row_a = experimenter_core::fill::Assignment::new();
    row_a.insert("value".to_string(), KeyValue::Integer(1));
    row_a.insert("exponent".to_string(), KeyValue::Integer(1));
    let mut row_b = experimenter_core::fill::Assignment::new();
    row_b.insert("value".to_string(), KeyValue::Integer(2));
    row_b.insert("exponent".to_string(), KeyValue::Integer(1));

    let inserted = manager.fill_from_rows(&schema, &[row_a.clone(), row_b]).await.unwrap();
    assert_eq!(inserted, 2);

    let reinserted = manager.fill_from_rows(&schema, &[row_a]).await.unwrap();
    assert_eq!(reinserted, 0);

    let rows = manager.get_table(&schema).await.unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn ensure_schema_rejects_a_table_whose_columns_have_drifted() {
    let pool = memory_pool().await;
    let dialect: Arc<dyn SqlDialect> = Arc::new(SqliteDialect);
    let manager = SqlWorkTableManager::new(pool.clone(), dialect, false);
    let schema = schema();
    manager.ensure_schema(&schema).await.unwrap();

    let mut drifted = schema.clone();
    drifted.keyfields.push(Keyfield {
        name: "extra".into(),
        sql_type: "INTEGER".into(),
        domain: ValueDomain::Explicit(vec![KeyValue::Integer(1)]),
    });

    let err = manager.ensure_schema(&drifted).await.unwrap_err();
    match err {
        experimenter_core::CoreError::SchemaMismatch { table, expected, found } => {
            assert_eq!(table, "experiments");
            assert!(expected.contains(&"extra".to_string()));
            assert!(!found.contains(&"extra".to_string()));
        }
        other => panic!("expected SchemaMismatch, got {other:?}"),
    }

    // the existing table and its rows are untouched by a rejected mismatch check.
    let rows = manager.get_table(&schema).await.unwrap();
    assert_eq!(rows.len(), 0);
}
