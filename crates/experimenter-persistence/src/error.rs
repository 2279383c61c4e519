use thiserror::Error;

/// Connection-kind failures (§7): pool construction, provider-if-not-exists
/// creation, and everything `sqlx` itself reports that is not already
/// classified as a `CoreError`.
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database connection error: {0}")]
    Connection(#[from] sqlx::Error),

    #[error("configuration document error: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("DATABASE_URL / DATABASE_PATH not set for provider {0:?}")]
    MissingEnv(String),

    #[error(transparent)]
    Core(#[from] experimenter_core::CoreError),
}
