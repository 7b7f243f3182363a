//! Job persistence for the render pipeline.
//!
//! Exposes the [`JobStore`] trait — the single source of truth for job
//! state — and its two backends:
//!
//! - [`PgJobStore`]: PostgreSQL via sqlx, used when `DATABASE_URL` is
//!   configured. Claims use `FOR UPDATE SKIP LOCKED` so multiple server
//!   instances can share one queue.
//! - [`MemoryJobStore`]: a mutex-guarded map for single-process mode and
//!   for the test suites.
//!
//! Both backends publish every successful mutation to the
//! [`ProgressBus`](estudio_events::ProgressBus); nothing else mutates job
//! state.

pub mod memory;
pub mod postgres;
pub mod store;

pub use memory::MemoryJobStore;
pub use postgres::PgJobStore;
pub use store::{CancelOutcome, JobStore};

use estudio_core::CoreError;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

/// Maximum connections in the Postgres pool.
const MAX_CONNECTIONS: u32 = 10;

/// Create a connection pool for the given database URL.
pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect(database_url)
        .await
}

/// Verify the database is reachable.
pub async fn health_check(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply pending migrations from `crates/db/migrations`.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

/// Map a sqlx error onto the domain taxonomy.
///
/// Connectivity problems become `Unavailable` (callers answer 503 and
/// background loops back off); everything else is `Internal`.
pub(crate) fn store_error(err: sqlx::Error) -> CoreError {
    match &err {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            CoreError::Unavailable(format!("job store unreachable: {err}"))
        }
        _ => CoreError::Internal(format!("job store error: {err}")),
    }
}
