//! Database Layer
//!
//! `PostgreSQL` and Redis connections.

use std::time::Duration;

use anyhow::Result;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

/// Create `PostgreSQL` connection pool with health configuration.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        // Keep minimum connections warm to prevent cold-start latency
        .min_connections(2)
        .max_connections(10)
        // Prevent hanging requests on pool exhaustion
        .acquire_timeout(Duration::from_secs(5))
        // Clean up idle connections to prevent stale connection issues
        .idle_timeout(Duration::from_secs(600))
        // Validate connections before use to catch stale/broken connections
        .test_before_acquire(true)
        .connect(database_url)
        .await?;

    info!("Connected to PostgreSQL");
    Ok(pool)
}

/// Run database migrations.
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations completed");
    Ok(())
}

/// Create Redis client.
pub async fn create_redis_client(redis_url: &str) -> Result<fred::clients::Client> {
    use fred::prelude::*;

    let config = Config::from_url(redis_url)?;
    let client = Client::new(config, None, None, None);
    client.connect();
    client.wait_for_connect().await?;

    info!("Connected to Redis");
    Ok(client)
}

/// Create a second Redis connection for pub/sub subscriptions.
///
/// A connection in subscriber mode cannot issue regular commands, so the
/// pairing bridge gets its own.
pub async fn create_subscriber_client(client: &fred::clients::Client) -> Result<fred::clients::Client> {
    use fred::prelude::*;

    let subscriber = client.clone_new();
    subscriber.connect();
    subscriber.wait_for_connect().await?;

    info!("Connected Redis pub/sub subscriber");
    Ok(subscriber)
}
