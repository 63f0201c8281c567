mod memory;
mod pg;
mod user;

use crate::prelude::*;
use crate::Result;
use serde::Deserialize;
use sqlx::postgres::PgPoolOptions;

pub(crate) use memory::MemoryDb;
pub(crate) use pg::PgDatabase;

#[derive(Deserialize)]
pub(crate) struct Config {
    pub(crate) url: url::Url,

    #[serde(default = "default_database_pool_size")]
    pub(crate) pool_size: u32,
}

fn default_database_pool_size() -> u32 {
    // Postgres instance has 100 connections limit.
    // However, we also reserve 2 connections for ad-hoc db administration purposes
    // via pg_admin, for example.
    98
}

#[derive(Debug, thiserror::Error)]
pub(crate) enum DbError {
    #[error("Failed to connect to the database")]
    Connect { source: sqlx::Error },

    #[error("Failed to run database migrations")]
    Migrate { source: sqlx::migrate::MigrateError },

    #[error(transparent)]
    Query {
        #[from]
        source: sqlx::Error,
    },
}

pub(crate) async fn init(cfg: Config) -> Result<PgDatabase> {
    let pool = PgPoolOptions::new()
        .max_connections(cfg.pool_size)
        .connect(cfg.url.as_str())
        .with_duration_log("Connecting to the database")
        .await
        .map_err(err_ctx!(DbError::Connect))?;

    sqlx::migrate!()
        .run(&pool)
        .with_duration_log("Running database migrations")
        .await
        .map_err(err_ctx!(DbError::Migrate))?;

    Ok(PgDatabase::new(pool))
}
