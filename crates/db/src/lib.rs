//! Persistence for LDR samples and forecasts.
//!
//! - [`store`]: the [`SampleStore`] / [`ForecastStore`] seams the daemon
//!   talks to, plus the PostgreSQL-backed [`PgStore`].
//! - [`memory`]: an in-process [`MemoryStore`] for tests and for running
//!   without a database.
//! - [`repositories`]: the SQL itself, one unit struct per table.

pub mod error;
pub mod memory;
pub mod models;
pub mod repositories;
pub mod store;

use sqlx::postgres::PgPoolOptions;

pub use error::StoreError;
pub use memory::MemoryStore;
pub use store::{ForecastStore, PgStore, SampleStore};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Verify the database answers a trivial query.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply pending schema migrations.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("../../db/migrations").run(pool).await
}
