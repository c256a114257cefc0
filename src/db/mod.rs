//! Persistence seam.
//!
//! Handlers and services only see [`Store`]; the Postgres implementation is
//! used whenever `DATABASE_URL` is set, the in-memory one otherwise and in
//! tests.

mod memory;
mod postgres;

use std::sync::Arc;

use anyhow::Context;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use crate::auth::repo::UserStore;
use crate::config::AppConfig;
use crate::recipes::repo::RecipeStore;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("{field} already exists")]
    Duplicate { field: &'static str },

    /// A referenced row is missing or belongs to someone else.
    #[error("invalid {field} reference {id}")]
    InvalidReference { field: &'static str, id: i64 },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

pub trait Store: UserStore + RecipeStore {}

impl<T: UserStore + RecipeStore> Store for T {}

/// Opens the configured store and applies pending migrations.
pub async fn connect(config: &AppConfig) -> anyhow::Result<Arc<dyn Store>> {
    let Some(url) = config.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set; using the in-memory store, data is lost on exit");
        return Ok(Arc::new(MemoryStore::new()));
    };

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(url)
        .await
        .context("connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("run migrations")?;

    Ok(Arc::new(PgStore::new(pool)))
}

/// Sorted and deduplicated copy of a list of ids.
pub(crate) fn unique_ids(ids: &[i64]) -> Vec<i64> {
    let mut out = ids.to_vec();
    out.sort_unstable();
    out.dedup();
    out
}
