use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use experimenter_core::dialect::SqlDialect;
use experimenter_core::fill::{canonical_tuple, cross_join, dedup_against_existing, product, Assignment};
use experimenter_core::{CoreError, WorkTableManager};
use experimenter_domain::schema::{KeyValue, TableSchema};
use experimenter_domain::{Status, StatusFilter};
use log::{debug, info, warn};
use sqlx::any::AnyRow;
use sqlx::{AnyPool, Row};

use crate::ddl::{create_emissions_table_sql, create_logtable_sql, create_main_table_sql, emissions_table_name};
use crate::row::{bind_key_value, key_value_from_row, row_to_json_map};

/// `WorkTableManager` implementation over a `sqlx::AnyPool`, generic over
/// the dialect that supplies backend-specific DDL/introspection SQL.
pub struct SqlWorkTableManager {
    pool: AnyPool,
    dialect: Arc<dyn SqlDialect>,
    codecarbon_enabled: bool,
}

impl SqlWorkTableManager {
    pub fn new(pool: AnyPool, dialect: Arc<dyn SqlDialect>, codecarbon_enabled: bool) -> Self {
        Self {
            pool,
            dialect,
            codecarbon_enabled,
        }
    }

    async fn table_exists(&self, table: &str) -> Result<bool, CoreError> {
        let query = self.dialect.table_exists_query(table);
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CoreError::Connection(e.to_string()))?;
        Ok(!rows.is_empty())
    }

    async fn existing_columns(&self, table: &str) -> Result<Vec<String>, CoreError> {
        let query = self.dialect.column_names_query(table);
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CoreError::Connection(e.to_string()))?;
        Ok(rows
            .iter()
            .filter_map(|r| r.try_get::<String, _>(0).ok())
            .collect())
    }

    async fn existing_keyfield_tuples(
        &self,
        schema: &TableSchema,
    ) -> Result<HashSet<Vec<String>>, CoreError> {
        let key_names = schema.keyfield_names();
        let select_cols = key_names.join(", ");
        let query = format!("SELECT {select_cols} FROM {}", schema.table_name);
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CoreError::Connection(e.to_string()))?;

        let mut out = HashSet::with_capacity(rows.len());
        for row in &rows {
            let mut tuple = Vec::with_capacity(schema.keyfields.len());
            for kf in &schema.keyfields {
                let v = key_value_from_row(row, &kf.name, &kf.sql_type);
                tuple.push(v.canonical_string());
            }
            out.insert(tuple);
        }
        Ok(out)
    }

    async fn insert_assignments(
        &self,
        schema: &TableSchema,
        assignments: &[Assignment],
        status: Status,
    ) -> Result<usize, CoreError> {
        if assignments.is_empty() {
            return Ok(0);
        }
        let key_names: Vec<String> = schema.keyfield_names().into_iter().map(String::from).collect();
        let placeholders: Vec<&str> = key_names.iter().map(|_| "?").collect();
        let insert_sql = format!(
            "INSERT INTO {} ({}, status, creation_date) VALUES ({}, ?, ?)",
            schema.table_name,
            key_names.join(", "),
            placeholders.join(", "),
        );

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CoreError::Connection(e.to_string()))?;
        let now = Utc::now().naive_utc();
        for assignment in assignments {
            let mut q = sqlx::query(&insert_sql);
            for name in &key_names {
                let value = assignment
                    .get(name)
                    .expect("assignment already validated to cover all keyfields");
                q = bind_key_value(q, value);
            }
            q = q.bind(status.as_sql_str()).bind(now.to_string());
            q.execute(&mut *tx)
                .await
                .map_err(|e| CoreError::Connection(e.to_string()))?;
        }
        tx.commit().await.map_err(|e| CoreError::Connection(e.to_string()))?;
        info!(
            "inserted {} row(s) into {} with status {:?}",
            assignments.len(),
            schema.table_name,
            status.as_sql_str()
        );
        Ok(assignments.len())
    }
}

#[async_trait]
impl WorkTableManager for SqlWorkTableManager {
    async fn ensure_schema(&self, schema: &TableSchema) -> Result<(), CoreError> {
        if !self.table_exists(&schema.table_name).await? {
            let sql = create_main_table_sql(schema, self.dialect.as_ref());
            debug!("creating main table: {sql}");
            sqlx::query(&sql)
                .execute(&self.pool)
                .await
                .map_err(|e| CoreError::Connection(e.to_string()))?;
        } else {
            let declared = schema.declared_columns();
            let mut found = self.existing_columns(&schema.table_name).await?;
            let fixed: HashSet<&str> = [
                "id",
                "creation_date",
                "status",
                "start_date",
                "name",
                "machine",
                "end_date",
                "error",
            ]
            .into_iter()
            .collect();
            found.retain(|c| !fixed.contains(c.as_str()));

            let mut declared_sorted = declared.clone();
            declared_sorted.sort();
            let mut found_sorted = found.clone();
            found_sorted.sort();
            if declared_sorted != found_sorted {
                return Err(CoreError::SchemaMismatch {
                    table: schema.table_name.clone(),
                    expected: declared,
                    found,
                });
            }
        }

        for logtable in &schema.logtables {
            if !self.table_exists(&logtable.table_name(&schema.table_name)).await? {
                let sql = create_logtable_sql(schema, &logtable.suffix, self.dialect.as_ref());
                debug!("creating logtable: {sql}");
                sqlx::query(&sql)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| CoreError::Connection(e.to_string()))?;
            }
        }

        if self.codecarbon_enabled {
            let emissions_table = emissions_table_name(schema);
            if !self.table_exists(&emissions_table).await? {
                let sql = create_emissions_table_sql(schema, self.dialect.as_ref());
                debug!("creating emissions child table: {sql}");
                sqlx::query(&sql)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| CoreError::Connection(e.to_string()))?;
            }
        }

        Ok(())
    }

    async fn fill_from_product(
        &self,
        schema: &TableSchema,
        values_by_key: &HashMap<String, Vec<KeyValue>>,
        fixed: &[Assignment],
    ) -> Result<usize, CoreError> {
        let ordered_product_keys: Vec<String> = values_by_key.keys().cloned().collect();
        let combos = if ordered_product_keys.is_empty() {
            Vec::new()
        } else {
            product(&ordered_product_keys, values_by_key)?
        };
        let all_keys: Vec<String> = schema.keyfield_names().into_iter().map(String::from).collect();
        let joined = cross_join(&combos, fixed, &all_keys)?;

        let total_before_dedup = joined.len();
        let existing = self.existing_keyfield_tuples(schema).await?;
        let fresh = dedup_against_existing(&all_keys, joined, &existing);
        if fresh.len() < total_before_dedup {
            warn!(
                "dedup skipped {} combination(s) already present in {}",
                total_before_dedup - fresh.len(),
                schema.table_name
            );
        }
        self.insert_assignments(schema, &fresh, Status::Created).await
    }

    async fn fill_from_rows(
        &self,
        schema: &TableSchema,
        rows: &[Assignment],
    ) -> Result<usize, CoreError> {
        let all_keys: Vec<String> = schema.keyfield_names().into_iter().map(String::from).collect();
        for row in rows {
            let mut got: Vec<String> = row.keys().cloned().collect();
            got.sort();
            let mut expected = all_keys.clone();
            expected.sort();
            if got != expected {
                return Err(CoreError::IncompleteCombination {
                    expected: all_keys.clone(),
                    got: row.keys().cloned().collect(),
                });
            }
        }
        let total_before_dedup = rows.len();
        let existing = self.existing_keyfield_tuples(schema).await?;
        let fresh = dedup_against_existing(&all_keys, rows.to_vec(), &existing);
        if fresh.len() < total_before_dedup {
            warn!(
                "dedup skipped {} combination(s) already present in {}",
                total_before_dedup - fresh.len(),
                schema.table_name
            );
        }
        self.insert_assignments(schema, &fresh, Status::Created).await
    }

    async fn add_single_experiment(
        &self,
        schema: &TableSchema,
        assignment: &Assignment,
    ) -> Result<i64, CoreError> {
        self.insert_assignments(schema, std::slice::from_ref(assignment), Status::CreatedForExecution)
            .await?;
        let select_cols = schema.keyfield_names().join(" = ? AND ") + " = ?";
        let query = format!(
            "SELECT id FROM {} WHERE {} ORDER BY id DESC LIMIT 1",
            schema.table_name, select_cols
        );
        let mut q = sqlx::query(&query);
        for kf in &schema.keyfields {
            let v = assignment.get(&kf.name).expect("validated above");
            q = bind_key_value(q, v);
        }
        let row: AnyRow = q
            .fetch_one(&self.pool)
            .await
            .map_err(|e| CoreError::Connection(e.to_string()))?;
        row.try_get::<i64, _>(0).map_err(|e| CoreError::Connection(e.to_string()))
    }

    async fn reset_experiments(
        &self,
        schema: &TableSchema,
        filter: StatusFilter,
    ) -> Result<usize, CoreError> {
        let key_names: Vec<String> = schema.keyfield_names().into_iter().map(String::from).collect();
        let select_cols = key_names.join(", ");

        let (select_sql, delete_sql): (String, String) = match filter {
            StatusFilter::All => (
                format!("SELECT {select_cols} FROM {}", schema.table_name),
                format!("DELETE FROM {}", schema.table_name),
            ),
            StatusFilter::Specific(status) => (
                format!(
                    "SELECT {select_cols} FROM {} WHERE status = '{}'",
                    schema.table_name,
                    status.as_sql_str()
                ),
                format!(
                    "DELETE FROM {} WHERE status = '{}'",
                    schema.table_name,
                    status.as_sql_str()
                ),
            ),
        };

        let rows = sqlx::query(&select_sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CoreError::Connection(e.to_string()))?;
        let mut assignments = Vec::with_capacity(rows.len());
        for row in &rows {
            let mut assignment = Assignment::new();
            for kf in &schema.keyfields {
                assignment.insert(kf.name.clone(), key_value_from_row(row, &kf.name, &kf.sql_type));
            }
            assignments.push(assignment);
        }

        sqlx::query(&delete_sql)
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::Connection(e.to_string()))?;

        self.insert_assignments(schema, &assignments, Status::Created).await
    }

    async fn delete_table(&self, schema: &TableSchema) -> Result<(), CoreError> {
        sqlx::query(&format!("DROP TABLE IF EXISTS {}", schema.table_name))
            .execute(&self.pool)
            .await
            .map_err(|e| CoreError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn get_table(
        &self,
        schema: &TableSchema,
    ) -> Result<Vec<indexmap::IndexMap<String, serde_json::Value>>, CoreError> {
        let mut columns = vec!["id".to_string()];
        columns.extend(schema.keyfield_names().into_iter().map(String::from));
        columns.extend(["creation_date", "status", "start_date", "name", "machine"].map(String::from));
        for rf in &schema.resultfields {
            columns.push(rf.name.clone());
            if schema.result_timestamps {
                columns.push(rf.timestamp_column());
            }
        }
        columns.extend(["end_date", "error"].map(String::from));

        let query = format!("SELECT {} FROM {} ORDER BY id ASC", columns.join(", "), schema.table_name);
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CoreError::Connection(e.to_string()))?;
        Ok(rows.iter().map(|r| row_to_json_map(r, &columns)).collect())
    }

    async fn get_logtable(
        &self,
        schema: &TableSchema,
        suffix: &str,
    ) -> Result<Vec<indexmap::IndexMap<String, serde_json::Value>>, CoreError> {
        let logtable = schema
            .logtable_by_suffix(suffix)
            .ok_or_else(|| CoreError::InvalidLogtable(suffix.to_string()))?;
        let mut columns = vec!["id".to_string(), "experiment_id".to_string(), "timestamp".to_string()];
        columns.extend(logtable.columns.keys().cloned());

        let query = format!(
            "SELECT {} FROM {} ORDER BY id ASC",
            columns.join(", "),
            logtable.table_name(&schema.table_name)
        );
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CoreError::Connection(e.to_string()))?;
        Ok(rows.iter().map(|r| row_to_json_map(r, &columns)).collect())
    }

    async fn get_codecarbon_table(
        &self,
        schema: &TableSchema,
    ) -> Result<Vec<indexmap::IndexMap<String, serde_json::Value>>, CoreError> {
        if !self.codecarbon_enabled {
            return Err(CoreError::CodecarbonNotEnabled(schema.table_name.clone()));
        }
        let columns: Vec<String> = ["id", "experiment_id", "timestamp", "offline", "data"]
            .into_iter()
            .map(String::from)
            .collect();
        let query = format!(
            "SELECT {} FROM {} ORDER BY id ASC",
            columns.join(", "),
            emissions_table_name(schema)
        );
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| CoreError::Connection(e.to_string()))?;
        Ok(rows.iter().map(|r| row_to_json_map(r, &columns)).collect())
    }
}
