use experimenter_core::dialect::SqlDialect;

/// The embedded single-file backend (§4.5). Uses
/// `INTEGER PRIMARY KEY AUTOINCREMENT`, `RANDOM()` ordering, no row-level
/// locking (the engine serializes writers at the transaction level
/// instead), and `sqlite_master`/`pragma_table_info` introspection.
#[derive(Debug, Default, Clone, Copy)]
pub struct SqliteDialect;

impl SqlDialect for SqliteDialect {
    fn autoincrement_column_ddl(&self) -> &'static str {
        "INTEGER PRIMARY KEY AUTOINCREMENT"
    }

    fn random_order_expression(&self) -> &'static str {
        "RANDOM()"
    }

    fn last_insert_id_expression(&self) -> Option<&'static str> {
        Some("last_insert_rowid()")
    }

    fn supports_returning(&self) -> bool {
        // sqlx's SQLite driver supports RETURNING since SQLite 3.35; the
        // Any-pool path still prefers last_insert_rowid() for portability
        // with older embedded files.
        false
    }

    fn supports_row_locking(&self) -> bool {
        false
    }

    fn table_exists_query(&self, table: &str) -> String {
        format!("SELECT name FROM sqlite_master WHERE type = 'table' AND name = '{table}'")
    }

    fn column_names_query(&self, table: &str) -> String {
        format!("SELECT name FROM pragma_table_info('{table}')")
    }
}
