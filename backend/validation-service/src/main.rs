use std::sync::Arc;

use db_pool::{create_pool as create_pg_pool, DbConfig};
use event_bus::topology::{declare_exchanges, declare_queue, DOCUMENT_UPLOADED_QUEUE};
use event_bus::{AmqpOutboxPublisher, ConsumerRuntime};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transactional_outbox::{OutboxProcessor, SqlxOutboxRepository};
use validation_service::{Config, ValidationHandler};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::error!("configuration loading failed: {e}");
            eprintln!("ERROR: failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!("starting validation-service v{}", env!("CARGO_PKG_VERSION"));

    let mut db_cfg = DbConfig::from_env("validation-service").unwrap_or_default();
    if db_cfg.database_url.is_empty() {
        db_cfg.database_url = config.database.url.clone();
    }
    db_cfg.log_config();

    let db_pool = match create_pg_pool(db_cfg).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("database pool creation failed: {e}");
            eprintln!("ERROR: failed to create database pool: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = db_pool::migrate(&db_pool, "./migrations").await {
        tracing::error!("database migration failed: {e}");
        eprintln!("ERROR: failed to run database migrations: {e}");
        std::process::exit(1);
    }

    let amqp_pool = match event_bus::pool::create_pool(&config.broker.url) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("AMQP pool creation failed: {e}");
            eprintln!("ERROR: failed to create AMQP pool: {e}");
            std::process::exit(1);
        }
    };

    let declare_channel = event_bus::pool::channel(&amqp_pool).await?;
    declare_exchanges(&declare_channel).await?;
    declare_queue(&declare_channel, &DOCUMENT_UPLOADED_QUEUE).await?;

    let outbox_repository = Arc::new(SqlxOutboxRepository::new(db_pool.clone()));
    if config.publisher.enabled {
        let publisher = Arc::new(
            AmqpOutboxPublisher::new(amqp_pool.clone())
                .with_publish_timeout(std::time::Duration::from_secs(5)),
        );
        let processor = OutboxProcessor::new(
            outbox_repository.clone(),
            publisher,
            config.publisher.batch_size,
            config.publisher.backoff(),
        )
        .with_poll_interval(config.publisher.polling_interval)
        .with_metrics(transactional_outbox::metrics::OutboxMetrics::new("validation-service"));

        tokio::spawn(async move {
            if let Err(e) = processor.start().await {
                tracing::error!("outbox processor exited: {e}");
            }
        });
    } else {
        tracing::warn!("outbox publisher disabled via PUBLISHER_ENABLED=false");
    }

    let handler = Arc::new(ValidationHandler::new(db_pool.clone(), outbox_repository));
    let consumer_channel = event_bus::pool::channel(&amqp_pool).await?;
    let runtime = ConsumerRuntime::new(
        consumer_channel,
        DOCUMENT_UPLOADED_QUEUE.queue,
        handler,
        config.consumer.to_consumer_config(),
    );

    let shutdown = CancellationToken::new();
    let shutdown_signal = shutdown.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("shutdown signal received");
        shutdown_signal.cancel();
    });

    runtime.run(shutdown).await?;
    Ok(())
}
