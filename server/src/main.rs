//! `WaRelay` Server - Main Entry Point
//!
//! WhatsApp API gateway: command publisher, event relay, webhook dispatcher
//! and pairing stream, wired against Redis and `PostgreSQL`.

use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::info;

use wa_server::streams::consumer::EventConsumer;
use wa_server::streams::producer::StreamProducer;
use wa_server::webhooks::delivery::RetryPolicy;
use wa_server::webhooks::registry::{PgWebhookRegistry, WebhookRegistry};
use wa_server::{api, config, db, pairing};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "wa_server=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    // Load configuration
    dotenvy::dotenv().ok();
    let config = config::Config::from_env()?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Starting WaRelay Server"
    );

    // Initialize database
    let db_pool = db::create_pool(&config.database_url).await?;
    db::run_migrations(&db_pool).await?;

    // Initialize Redis: one command connection, one pub/sub connection
    let redis = db::create_redis_client(&config.redis_url).await?;
    let subscriber = db::create_subscriber_client(&redis).await?;

    let registry = Arc::new(PgWebhookRegistry::new(db_pool));
    let http = reqwest::Client::builder().build()?;
    let producer = StreamProducer::new(redis.clone());
    let channels = pairing::SessionChannels::new(subscriber);

    // Start the event consumer loop
    let shutdown = CancellationToken::new();
    let consumer_registry: Arc<dyn WebhookRegistry> = registry.clone();
    let consumer = EventConsumer::new(
        redis,
        consumer_registry,
        http.clone(),
        RetryPolicy::default(),
        config.consumer_group.clone(),
        config.consumer_name.clone(),
    );
    let consumer_handle = tokio::spawn(consumer.run(shutdown.clone()));

    // Build application state and router
    let state = api::AppState::new(registry, producer, channels, http, config.clone());
    let app = api::create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    info!(address = %config.bind_address, "Server listening");

    // Graceful shutdown handler
    let shutdown_signal = {
        let shutdown = shutdown.clone();
        async move {
            tokio::signal::ctrl_c()
                .await
                .expect("Failed to install CTRL+C signal handler");
            info!("Received shutdown signal, cleaning up...");
            shutdown.cancel();
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    // Let the consumer settle its in-flight batch before exiting
    shutdown.cancel();
    if let Err(e) = consumer_handle.await {
        tracing::error!("Consumer task ended abnormally: {}", e);
    }

    info!("Server shutdown complete");

    Ok(())
}
