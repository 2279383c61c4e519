use experimenter_adapters::{PostgresDialect, SqliteDialect};
use experimenter_core::dialect::{PullOrder, SqlDialect};

fn generic_pull_query(dialect: &dyn SqlDialect, table: &str) -> String {
    dialect.build_pull_query(table, PullOrder::Id)
}

#[test]
fn both_dialects_satisfy_the_trait_object_seam() {
    let pg = generic_pull_query(&PostgresDialect, "experiments");
    let lite = generic_pull_query(&SqliteDialect, "experiments");

    assert!(pg.contains("FOR UPDATE"));
    assert!(!lite.contains("FOR UPDATE"));
    assert!(pg.starts_with("SELECT id FROM experiments"));
    assert!(lite.starts_with("SELECT id FROM experiments"));
}
