//! DDL synthesis for the main table, its logtables, and the emissions child
//! table (§3 column order, §4.2 ensure schema).

use experimenter_core::dialect::SqlDialect;
use experimenter_domain::schema::TableSchema;

/// `CREATE TABLE IF NOT EXISTS <table> (...)` with the fixed column order
/// from §3: id, keyfields, creation_date, status, start_date, name, machine,
/// resultfields (+ timestamps), end_date, error.
pub fn create_main_table_sql(schema: &TableSchema, dialect: &dyn SqlDialect) -> String {
    let mut cols = vec![format!("id {}", dialect.autoincrement_column_ddl())];
    for kf in &schema.keyfields {
        cols.push(format!("{} {}", kf.name, kf.sql_type));
    }
    cols.push("creation_date TIMESTAMP".to_string());
    cols.push("status VARCHAR(32)".to_string());
    cols.push("start_date TIMESTAMP".to_string());
    cols.push("name VARCHAR(255)".to_string());
    cols.push("machine VARCHAR(255)".to_string());
    for rf in &schema.resultfields {
        cols.push(format!("{} {}", rf.name, rf.sql_type));
        if schema.result_timestamps {
            cols.push(format!("{} VARCHAR(255)", rf.timestamp_column()));
        }
    }
    cols.push("end_date TIMESTAMP".to_string());
    cols.push("error TEXT".to_string());

    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        schema.table_name,
        cols.join(", ")
    )
}

/// `CREATE TABLE IF NOT EXISTS <table>__<suffix> (...)` with an
/// `experiment_id` FK cascading on delete and a `timestamp` column, plus the
/// logtable's declared columns (§3 Logtable, §4.2 ensure schema).
pub fn create_logtable_sql(
    schema: &TableSchema,
    suffix: &str,
    dialect: &dyn SqlDialect,
) -> String {
    let logtable = schema
        .logtable_by_suffix(suffix)
        .expect("logtable suffix must be declared in schema");
    let mut cols = vec![format!("id {}", dialect.autoincrement_column_ddl())];
    cols.push(format!(
        "experiment_id INTEGER NOT NULL REFERENCES {}(id) ON DELETE CASCADE",
        schema.table_name
    ));
    cols.push("timestamp TIMESTAMP".to_string());
    for (name, sql_type) in &logtable.columns {
        cols.push(format!("{name} {sql_type}"));
    }
    format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        logtable.table_name(&schema.table_name),
        cols.join(", ")
    )
}

/// `CREATE TABLE IF NOT EXISTS <table>_codecarbon (...)` (§4.2 ensure
/// schema, §6 emissions child table). Created independently of the main
/// table's column-set check (§11 Open Question decision).
pub fn create_emissions_table_sql(schema: &TableSchema, dialect: &dyn SqlDialect) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {}_codecarbon (id {}, experiment_id INTEGER NOT NULL REFERENCES {}(id) ON DELETE CASCADE, timestamp TIMESTAMP, offline BOOLEAN, data TEXT)",
        schema.table_name,
        dialect.autoincrement_column_ddl(),
        schema.table_name,
    )
}

pub fn emissions_table_name(schema: &TableSchema) -> String {
    format!("{}_codecarbon", schema.table_name)
}
