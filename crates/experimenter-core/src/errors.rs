use thiserror::Error;

/// The taxonomy of §7: Schema, Fill, Connection, Dispatch, Write and User
/// kinds. Config-kind errors live in `experimenter_domain::DomainError`
/// instead, since they arise purely from parsing the declarative document.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("table {table:?} has wrong structure: expected columns {expected:?}, found {found:?}")]
    SchemaMismatch {
        table: String,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("fill produced an empty result")]
    EmptyFill,

    #[error("keyfield {0:?} is assigned by both the product and a fixed assignment")]
    DuplicateKeyAcrossSources(String),

    #[error("combination does not cover the declared keyfield set: expected {expected:?}, got {got:?}")]
    IncompleteCombination {
        expected: Vec<String>,
        got: Vec<String>,
    },

    #[error("connection error: {0}")]
    Connection(String),

    #[error("no experiments left")]
    NoExperimentsLeft,

    #[error("no such paused experiment: {0}")]
    NoPausedExperiment(i64),

    #[error("invalid result field {0:?}")]
    InvalidResultField(String),

    #[error("invalid logtable {0:?}")]
    InvalidLogtable(String),

    #[error("invalid logtable column {logtable:?}.{column:?}")]
    InvalidLogtableColumn { logtable: String, column: String },

    #[error("experiment routine failed: {0}")]
    UserRoutineFailed(String),

    #[error("emissions tracking is not enabled for table {0:?}")]
    CodecarbonNotEnabled(String),
}
