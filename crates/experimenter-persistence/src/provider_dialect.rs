use std::sync::Arc;

use experimenter_adapters::{PostgresDialect, SqliteDialect};
use experimenter_core::dialect::SqlDialect;
use experimenter_domain::config::Provider;

/// Picks the concrete dialect for a configured provider (§4.5). Kept in
/// persistence rather than domain/core so that neither depends on
/// `experimenter-adapters` for what is otherwise a pure data-model crate.
pub fn dialect_for(provider: Provider) -> Arc<dyn SqlDialect> {
    match provider {
        Provider::EmbeddedSingleFile => Arc::new(SqliteDialect),
        Provider::Networked => Arc::new(PostgresDialect),
    }
}
