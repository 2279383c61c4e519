//! Root application configuration: the declarative document (schema and
//! execution policy) plus the environment-based connection parameters,
//! bundled together for the demo binary.
//!
//! The pool construction and `ensure_database_exists` logic this used to
//! carry directly now lives in `experimenter_persistence::pool`, generalized
//! from a Postgres-only pool to one spanning both providers; this module
//! only wires the pieces together.

use std::path::Path;
use std::sync::Arc;

use experimenter_core::dialect::SqlDialect;
use experimenter_domain::ExperimenterConfig;
use experimenter_persistence::{config::init_dotenv, dialect_for, DbConfig};
use sqlx::AnyPool;

use crate::AppError;

/// Everything the demo binary needs to stand up a work table and run
/// experiments against it: the validated document plus connection
/// parameters read from the environment.
pub struct AppConfig {
    pub experimenter: ExperimenterConfig,
    pub db: DbConfig,
}

impl AppConfig {
    pub fn load(document_path: impl AsRef<Path>) -> Result<Self, AppError> {
        let experimenter = ExperimenterConfig::from_path(document_path)?;
        init_dotenv();
        let db = DbConfig::from_env()?;
        Ok(Self { experimenter, db })
    }

    pub async fn connect(&self) -> Result<AnyPool, AppError> {
        experimenter_persistence::build_pool(self.experimenter.provider, &self.db)
            .await
            .map_err(Into::into)
    }

    pub fn dialect(&self) -> Arc<dyn SqlDialect> {
        dialect_for(self.experimenter.provider)
    }
}
