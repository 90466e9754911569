//! Postgres implementations of the fabula collaborator seams.
//!
//! Repository structs (`StateRepo`, `ArtifactRepo`, `QueueRepo`) carry the
//! raw SQL; thin adapter types (`PgStateStore`, `PgArtifactStore`,
//! `PgWorkQueue`) implement the `fabula-core` traits over a shared pool.

use sqlx::postgres::PgPoolOptions;

pub mod models;
pub mod repositories;

pub use repositories::artifact_repo::PgArtifactStore;
pub use repositories::queue_repo::PgWorkQueue;
pub use repositories::state_repo::PgStateStore;

/// Shared connection pool type.
pub type DbPool = sqlx::PgPool;

/// Default maximum number of pooled connections.
const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Connect to Postgres with the default pool sizing.
pub async fn connect(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(DEFAULT_MAX_CONNECTIONS)
        .connect(database_url)
        .await
}

/// Run the embedded migrations for the engine's own tables
/// (`pipeline_state`, `pipeline_jobs`).
pub async fn migrate(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
