use thiserror::Error;

/// Config-kind failures: everything that can go wrong while turning a
/// declarative document into a validated [`crate::ExperimenterConfig`].
#[derive(Debug, Error)]
pub enum DomainError {
    #[error("could not read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config document: {0}")]
    InvalidDocument(#[from] serde_yaml::Error),

    #[error("unsupported database provider {0:?}")]
    UnsupportedProvider(String),

    #[error("logtable {logtable:?} does not nest under table {table:?}")]
    LogtableNotNested { logtable: String, table: String },

    #[error("invalid logtable definition for {0:?}: {1}")]
    InvalidLogtable(String, String),

    #[error("invalid keyfield {name:?}: {reason}")]
    InvalidKeyfield { name: String, reason: String },

    #[error("invalid column definition: {0}")]
    InvalidColumn(String),
}
