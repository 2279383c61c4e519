//! experimenter-adapters: concrete `SqlDialect` implementations.
//!
//! `experimenter-core` defines the dialect seam in terms of pure SQL-string
//! generation; this crate supplies the two dialects the rest of the
//! workspace needs (§4.5): the embedded single-file backend (SQLite) and
//! the networked backend (Postgres), both ultimately driven through a
//! `sqlx::AnyPool` by `experimenter-persistence`.

mod postgres;
mod sqlite;

pub use postgres::PostgresDialect;
pub use sqlite::SqliteDialect;

#[cfg(test)]
mod tests {
    use super::*;
    use experimenter_core::dialect::{PullOrder, SqlDialect};

    #[test]
    fn postgres_pull_query_locks_the_row() {
        let q = PostgresDialect.build_pull_query("experiments", PullOrder::Id);
        assert!(q.contains("FOR UPDATE"));
        assert!(q.contains("ORDER BY id ASC"));
    }

    #[test]
    fn sqlite_pull_query_has_no_row_lock() {
        let q = SqliteDialect.build_pull_query("experiments", PullOrder::Random);
        assert!(!q.contains("FOR UPDATE"));
        assert!(q.contains("RANDOM()"));
    }
}
