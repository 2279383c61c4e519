use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use experimenter_core::dialect::{PullOrder, SqlDialect};
use experimenter_core::traits::Keyfields;
use experimenter_core::{CoreError, ExperimentDispatcher};
use experimenter_domain::schema::TableSchema;
use log::debug;
use sqlx::{AnyPool, Row};

use crate::row::key_value_from_row;

/// `ExperimentDispatcher` implementation over a `sqlx::AnyPool` (§4.3).
pub struct SqlExperimentDispatcher {
    pool: AnyPool,
    dialect: Arc<dyn SqlDialect>,
}

impl SqlExperimentDispatcher {
    pub fn new(pool: AnyPool, dialect: Arc<dyn SqlDialect>) -> Self {
        Self { pool, dialect }
    }
}

#[async_trait]
impl ExperimentDispatcher for SqlExperimentDispatcher {
    async fn claim_next(
        &self,
        schema: &TableSchema,
        random_order: bool,
    ) -> Result<(i64, Keyfields), CoreError> {
        let order = if random_order { PullOrder::Random } else { PullOrder::Id };
        let pull_query = self.dialect.build_pull_query(&schema.table_name, order);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CoreError::Connection(e.to_string()))?;

        let id_row = sqlx::query(&pull_query)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| CoreError::Connection(e.to_string()))?;
        let id: i64 = match id_row {
            Some(row) => row.try_get(0).map_err(|e| CoreError::Connection(e.to_string()))?,
            None => return Err(CoreError::NoExperimentsLeft),
        };

        let now = Utc::now().naive_utc();
        sqlx::query(&format!(
            "UPDATE {} SET status = 'running', start_date = ? WHERE id = ?",
            schema.table_name
        ))
        .bind(now.to_string())
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| CoreError::Connection(e.to_string()))?;

        let key_cols = schema.keyfield_names().join(", ");
        let row = sqlx::query(&format!(
            "SELECT {key_cols} FROM {} WHERE id = ?",
            schema.table_name
        ))
        .bind(id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| CoreError::Connection(e.to_string()))?;

        let mut keyfields = Keyfields::new();
        for kf in &schema.keyfields {
            keyfields.insert(kf.name.clone(), key_value_from_row(&row, &kf.name, &kf.sql_type));
        }

        tx.commit().await.map_err(|e| CoreError::Connection(e.to_string()))?;
        debug!("claimed experiment {id} from {}", schema.table_name);
        Ok((id, keyfields))
    }

    async fn resume(&self, schema: &TableSchema, id: i64) -> Result<Keyfields, CoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| CoreError::Connection(e.to_string()))?;

        let key_cols = schema.keyfield_names().join(", ");
        let row = sqlx::query(&format!(
            "SELECT {key_cols} FROM {} WHERE id = ? AND status = 'paused'",
            schema.table_name
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| CoreError::Connection(e.to_string()))?;

        let row = match row {
            Some(row) => row,
            None => return Err(CoreError::NoPausedExperiment(id)),
        };

        let mut keyfields = Keyfields::new();
        for kf in &schema.keyfields {
            keyfields.insert(kf.name.clone(), key_value_from_row(&row, &kf.name, &kf.sql_type));
        }

        sqlx::query(&format!(
            "UPDATE {} SET status = 'running' WHERE id = ?",
            schema.table_name
        ))
        .bind(id)
        .execute(&mut *tx)
        .await
        .map_err(|e| CoreError::Connection(e.to_string()))?;

        tx.commit().await.map_err(|e| CoreError::Connection(e.to_string()))?;
        debug!("resumed experiment {id} in {}", schema.table_name);
        Ok(keyfields)
    }
}
