//! Environment-based connection configuration (§10.3), ported from the
//! teacher's `DbConfig::from_env` convention.

use std::env;

use dotenvy::dotenv;
use once_cell::sync::Lazy;

use crate::error::PersistenceError;

static DOTENV_LOADED: Lazy<()> = Lazy::new(|| {
    let _ = dotenv();
});

pub fn init_dotenv() {
    Lazy::force(&DOTENV_LOADED);
}

/// Connection parameters for either provider. Which fields apply depends on
/// `experimenter_domain::config::Provider`: the networked backend reads
/// `url`/`min_connections`/`max_connections`; the embedded backend reads
/// only `path`.
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: Option<String>,
    pub path: Option<String>,
    pub min_connections: u32,
    pub max_connections: u32,
}

impl DbConfig {
    pub fn from_env() -> Result<Self, PersistenceError> {
        Lazy::force(&DOTENV_LOADED);
        let url = env::var("DATABASE_URL").ok();
        let path = env::var("DATABASE_PATH").ok();
        let min_connections = env::var("DATABASE_MIN_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(2);
        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(16);
        Ok(Self {
            url,
            path,
            min_connections,
            max_connections,
        })
    }

    pub fn networked_url(&self) -> Result<&str, PersistenceError> {
        self.url
            .as_deref()
            .ok_or_else(|| PersistenceError::MissingEnv("networked".into()))
    }

    pub fn embedded_path(&self) -> Result<&str, PersistenceError> {
        self.path
            .as_deref()
            .ok_or_else(|| PersistenceError::MissingEnv("embedded-single-file".into()))
    }
}
