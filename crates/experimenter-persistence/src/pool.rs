//! Pool construction for both providers, unified behind `sqlx::AnyPool`
//! (§4.5, §10.2). Ported from the teacher's `create_pool`/
//! `ensure_database_exists` pair, generalized from a Postgres-only pool to
//! the `Any` driver that also opens SQLite files.

use experimenter_domain::config::Provider;
use log::{info, warn};
use sqlx::any::{install_default_drivers, AnyPoolOptions};
use sqlx::AnyPool;

use crate::config::DbConfig;
use crate::error::PersistenceError;

/// Builds a pool appropriate to `provider`. For the networked backend, if
/// the target database does not exist, attempts to create it by connecting
/// to the server's maintenance database and retries once — same retry
/// shape as the teacher's `create_pool`.
pub async fn build_pool(provider: Provider, cfg: &DbConfig) -> Result<AnyPool, PersistenceError> {
    install_default_drivers();
    match provider {
        Provider::EmbeddedSingleFile => {
            let path = cfg.embedded_path()?;
            let url = format!("sqlite://{path}?mode=rwc");
            info!("opening embedded database at {path}");
            Ok(AnyPoolOptions::new()
                .min_connections(cfg.min_connections)
                .max_connections(cfg.max_connections)
                .connect(&url)
                .await?)
        }
        Provider::Networked => {
            let url = cfg.networked_url()?;
            match AnyPoolOptions::new()
                .min_connections(cfg.min_connections)
                .max_connections(cfg.max_connections)
                .connect(url)
                .await
            {
                Ok(pool) => Ok(pool),
                Err(sqlx::Error::Database(db_err))
                    if db_err.code().as_deref() == Some("3D000") =>
                {
                    warn!("target database not found, attempting to create it");
                    ensure_database_exists(url).await?;
                    Ok(AnyPoolOptions::new()
                        .min_connections(cfg.min_connections)
                        .max_connections(cfg.max_connections)
                        .connect(url)
                        .await?)
                }
                Err(e) => Err(e.into()),
            }
        }
    }
}

/// Connects to the server's `postgres` maintenance database and issues
/// `CREATE DATABASE` for the target name, same identifier-safety check as
/// the teacher's `ensure_database_exists`.
async fn ensure_database_exists(full_url: &str) -> Result<(), PersistenceError> {
    let (base, db_name) = match full_url.rfind('/') {
        Some(pos) => {
            let (b, tail) = full_url.split_at(pos);
            let db_part = &tail[1..];
            let db_only = db_part.split('?').next().unwrap_or(db_part);
            (b.to_string(), db_only.to_string())
        }
        None => return Ok(()),
    };
    if db_name.is_empty() {
        return Ok(());
    }
    let admin_url = if base.ends_with("/postgres") || db_name == "postgres" {
        full_url.to_string()
    } else {
        format!("{base}/postgres")
    };

    if let Ok(admin_pool) = AnyPoolOptions::new().max_connections(1).connect(&admin_url).await {
        use sqlx::Row;
        let exists: i64 = sqlx::query("SELECT COUNT(*) FROM pg_database WHERE datname = ?")
            .bind(&db_name)
            .fetch_one(&admin_pool)
            .await?
            .try_get(0)?;
        if exists == 0 {
            if db_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            {
                let create_stmt = format!("CREATE DATABASE \"{}\"", db_name.replace('"', ""));
                sqlx::query(&create_stmt).execute(&admin_pool).await?;
                info!("database {db_name:?} created automatically");
            } else {
                warn!("refusing to auto-create database with unsafe name {db_name:?}");
            }
        }
    }
    Ok(())
}
