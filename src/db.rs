//! Database module
//!
//! Connection pool setup and schema creation for the PostgreSQL providers.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::Config;
use crate::identity::IDENTITY_SCHEMA;

/// Build a connection pool from configuration
pub async fn connect(config: &Config) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await?;

    tracing::info!(
        max_connections = config.database_max_connections,
        "Database pool created"
    );

    Ok(pool)
}

/// Simple connectivity check
pub async fn verify_connection(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;

    Ok(())
}

/// Create the identity tables if they do not exist yet
pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in IDENTITY_SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }

    tracing::debug!(statements = IDENTITY_SCHEMA.len(), "Identity schema ready");
    Ok(())
}
