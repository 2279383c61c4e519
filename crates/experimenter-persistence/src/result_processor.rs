use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use experimenter_core::{CoreError, ResultProcessor};
use experimenter_domain::{RoutineOutcome, TableSchema};
use log::error;
use sqlx::AnyPool;

use crate::ddl::emissions_table_name;

/// `ResultProcessor` implementation over a `sqlx::AnyPool`, bound to the
/// table it writes into (§4.4). A new instance is created per claimed row by
/// the worker that owns it; the row id is passed to every method rather than
/// stored, since a single processor could in principle be reused, but the
/// worker pool never does so concurrently (§5).
pub struct SqlResultProcessor {
    pool: AnyPool,
    schema: TableSchema,
    codecarbon_enabled: bool,
}

impl SqlResultProcessor {
    pub fn new(pool: AnyPool, schema: TableSchema, codecarbon_enabled: bool) -> Self {
        Self { pool, schema, codecarbon_enabled }
    }

    async fn write_error_and_fail(&self, id: i64, diagnostic: &str) -> Result<(), CoreError> {
        error!("row {id} in {}: {diagnostic}", self.schema.table_name);
        self.write_error(id, diagnostic).await
    }
}

#[async_trait]
impl ResultProcessor for SqlResultProcessor {
    async fn process_results(
        &self,
        id: i64,
        schema: &TableSchema,
        results: HashMap<String, serde_json::Value>,
    ) -> Result<(), CoreError> {
        for key in results.keys() {
            if schema.resultfield_by_name(key).is_none() {
                let diagnostic = format!("invalid result field {key:?}");
                self.write_error_and_fail(id, &diagnostic).await?;
                return Err(CoreError::InvalidResultField(key.clone()));
            }
        }

        let now = Utc::now().naive_utc();
        let mut set_clauses = Vec::new();
        let mut bind_values: Vec<(String, serde_json::Value)> = Vec::new();
        for (key, value) in &results {
            set_clauses.push(format!("{key} = ?"));
            bind_values.push((key.clone(), value.clone()));
            if schema.result_timestamps {
                let rf = schema.resultfield_by_name(key).expect("validated above");
                set_clauses.push(format!("{} = ?", rf.timestamp_column()));
                bind_values.push((rf.timestamp_column(), serde_json::Value::String(now.to_string())));
            }
        }
        if set_clauses.is_empty() {
            return Ok(());
        }

        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?",
            schema.table_name,
            set_clauses.join(", ")
        );
        let mut q = sqlx::query(&sql);
        for (_, value) in &bind_values {
            q = bind_json_value(q, value);
        }
        q = q.bind(id);
        q.execute(&self.pool)
            .await
            .map_err(|e| CoreError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn process_logs(
        &self,
        id: i64,
        schema: &TableSchema,
        logs: HashMap<String, HashMap<String, serde_json::Value>>,
    ) -> Result<(), CoreError> {
        for (suffix, columns) in &logs {
            let logtable = match schema.logtable_by_suffix(suffix) {
                Some(lt) => lt,
                None => {
                    let diagnostic = format!("invalid logtable {suffix:?}");
                    self.write_error_and_fail(id, &diagnostic).await?;
                    return Err(CoreError::InvalidLogtable(suffix.clone()));
                }
            };
            for column in columns.keys() {
                if !logtable.columns.contains_key(column) {
                    let diagnostic = format!("invalid logtable column {suffix:?}.{column:?}");
                    self.write_error_and_fail(id, &diagnostic).await?;
                    return Err(CoreError::InvalidLogtableColumn {
                        logtable: suffix.clone(),
                        column: column.clone(),
                    });
                }
            }
        }

        let now = Utc::now().naive_utc();
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CoreError::Connection(e.to_string()))?;
        for (suffix, columns) in &logs {
            let logtable = schema.logtable_by_suffix(suffix).expect("validated above");
            let mut col_names: Vec<String> = vec!["experiment_id".into(), "timestamp".into()];
            col_names.extend(columns.keys().cloned());
            let placeholders: Vec<&str> = col_names.iter().map(|_| "?").collect();
            let sql = format!(
                "INSERT INTO {} ({}) VALUES ({})",
                logtable.table_name(&schema.table_name),
                col_names.join(", "),
                placeholders.join(", "),
            );
            let mut q = sqlx::query(&sql).bind(id).bind(now.to_string());
            for value in columns.values() {
                q = bind_json_value(q, value);
            }
            q.execute(&mut *tx)
                .await
                .map_err(|e| CoreError::Connection(e.to_string()))?;
        }
        tx.commit().await.map_err(|e| CoreError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn finalize(
        &self,
        id: i64,
        schema: &TableSchema,
        outcome: RoutineOutcome,
    ) -> Result<(), CoreError> {
        let status = outcome.status();
        let now = Utc::now().naive_utc();
        if status.is_terminal() {
            sqlx::query(&format!(
                "UPDATE {} SET status = ?, end_date = ? WHERE id = ?",
                schema.table_name
            ))
            .bind(status.as_sql_str())
            .bind(now.to_string())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::Connection(e.to_string()))?;
        } else {
            sqlx::query(&format!("UPDATE {} SET status = ? WHERE id = ?", schema.table_name))
                .bind(status.as_sql_str())
                .bind(id)
                .execute(&self.pool)
                .await
                .map_err(|e| CoreError::Connection(e.to_string()))?;
        }

        if let RoutineOutcome::Error(text) = outcome {
            self.write_error(id, &text).await?;
        }
        Ok(())
    }

    async fn write_error(&self, id: i64, text: &str) -> Result<(), CoreError> {
        sqlx::query(&format!("UPDATE {} SET error = ? WHERE id = ?", self.schema.table_name))
            .bind(text)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn set_machine(&self, id: i64, host: &str) -> Result<(), CoreError> {
        sqlx::query(&format!("UPDATE {} SET machine = ? WHERE id = ?", self.schema.table_name))
            .bind(host)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn set_name(&self, id: i64, tag: &str) -> Result<(), CoreError> {
        sqlx::query(&format!("UPDATE {} SET name = ? WHERE id = ?", self.schema.table_name))
            .bind(tag)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn write_emissions(
        &self,
        id: i64,
        schema: &TableSchema,
        data: serde_json::Value,
        offline: bool,
    ) -> Result<(), CoreError> {
        if !self.codecarbon_enabled {
            return Err(CoreError::CodecarbonNotEnabled(schema.table_name.clone()));
        }
        let now = Utc::now().naive_utc();
        sqlx::query(&format!(
            "INSERT INTO {} (experiment_id, timestamp, offline, data) VALUES (?, ?, ?, ?)",
            emissions_table_name(schema)
        ))
        .bind(id)
        .bind(now.to_string())
        .bind(offline)
        .bind(data.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| CoreError::Connection(e.to_string()))?;
        Ok(())
    }
}

fn bind_json_value<'q>(
    query: sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>>,
    value: &'q serde_json::Value,
) -> sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>> {
    match value {
        serde_json::Value::Null => query.bind(None::<String>),
        serde_json::Value::Bool(b) => query.bind(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                query.bind(i)
            } else {
                query.bind(n.as_f64().unwrap_or_default())
            }
        }
        serde_json::Value::String(s) => query.bind(s.as_str()),
        other => query.bind(other.to_string()),
    }
}
