use experimenter_core::dialect::SqlDialect;

/// The networked backend (§4.5). Uses `SERIAL` autoincrement, `RAND()`-style
/// ordering via `RANDOM()` (Postgres' own random function shares the name
/// with SQLite's, unlike MySQL's `RAND()`), `FOR UPDATE` row locking, and
/// `information_schema` introspection.
#[derive(Debug, Default, Clone, Copy)]
pub struct PostgresDialect;

impl SqlDialect for PostgresDialect {
    fn autoincrement_column_ddl(&self) -> &'static str {
        "SERIAL PRIMARY KEY"
    }

    fn random_order_expression(&self) -> &'static str {
        "RANDOM()"
    }

    fn last_insert_id_expression(&self) -> Option<&'static str> {
        None
    }

    fn supports_returning(&self) -> bool {
        true
    }

    fn supports_row_locking(&self) -> bool {
        true
    }

    fn table_exists_query(&self, table: &str) -> String {
        format!(
            "SELECT column_name FROM information_schema.columns WHERE table_name = '{table}' LIMIT 1"
        )
    }

    fn column_names_query(&self, table: &str) -> String {
        format!(
            "SELECT column_name FROM information_schema.columns WHERE table_name = '{table}'"
        )
    }
}
