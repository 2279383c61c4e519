/// Order in which the claim protocol (§4.3.1) selects the next `created`
/// row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PullOrder {
    /// Ascending by `id` — the default, FIFO up to commit order.
    Id,
    /// A backend-specific random function (`RANDOM()` embedded, `RAND()`
    /// networked).
    Random,
}

/// Abstracts the differences between the embedded (single-file) and
/// networked SQL backends (§4.5). Everything here is pure string/SQL
/// generation — no connection or row type appears in this trait, so
/// `experimenter-core` stays free of any concrete driver dependency;
/// `experimenter-persistence` executes the strings this trait produces
/// against a `sqlx::AnyPool`.
pub trait SqlDialect: Send + Sync {
    /// The bound-parameter placeholder token. `sqlx::Any` normalizes this to
    /// `?` for both backends it supports, but the method is kept so a
    /// dialect can be asked for it directly rather than hardcoding `?` at
    /// every call site.
    fn placeholder(&self) -> &'static str {
        "?"
    }

    /// The DDL fragment used for the synthetic autoincrement primary key
    /// column, e.g. `INTEGER PRIMARY KEY AUTOINCREMENT` (embedded) or
    /// `SERIAL PRIMARY KEY` (networked).
    fn autoincrement_column_ddl(&self) -> &'static str;

    /// The SQL function used for `ORDER BY` when random ordering is
    /// requested.
    fn random_order_expression(&self) -> &'static str;

    /// An expression (or statement) that retrieves the id generated by the
    /// most recent insert on this connection, when the backend does not
    /// support `RETURNING id` directly.
    fn last_insert_id_expression(&self) -> Option<&'static str>;

    /// Whether `INSERT ... RETURNING id` is supported natively; when true,
    /// persistence prefers it over `last_insert_id_expression`.
    fn supports_returning(&self) -> bool;

    /// Builds the `SELECT id FROM <table> WHERE status = 'created' ORDER BY
    /// ... [FOR UPDATE]` query body used by the claim protocol (§4.3.1).
    /// The networked backend appends `FOR UPDATE`; the embedded backend
    /// relies on transaction serialization instead.
    fn build_pull_query(&self, table: &str, order: PullOrder) -> String {
        let order_clause = match order {
            PullOrder::Id => "id ASC".to_string(),
            PullOrder::Random => self.random_order_expression().to_string(),
        };
        let mut query = format!(
            "SELECT id FROM {table} WHERE status = 'created' ORDER BY {order_clause} LIMIT 1"
        );
        if self.supports_row_locking() {
            query.push_str(" FOR UPDATE");
        }
        query
    }

    /// Whether `SELECT ... FOR UPDATE` is meaningful on this backend
    /// (networked: yes; embedded single-file engines serialize writers at
    /// the transaction level instead, §4.3.1).
    fn supports_row_locking(&self) -> bool;

    /// A query that returns one row per column of `table` if it exists, zero
    /// rows otherwise — used to implement `table_exists`.
    fn table_exists_query(&self, table: &str) -> String;

    /// A query returning one row per declared column name of `table`, used
    /// to validate an existing table's structure (§4.2 ensure schema).
    fn column_names_query(&self, table: &str) -> String;
}
