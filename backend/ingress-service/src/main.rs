use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use db_pool::{create_pool as create_pg_pool, DbConfig};
use event_bus::topology::{declare_exchanges, declare_queue, DOCUMENT_UPLOADED_QUEUE};
use event_bus::AmqpOutboxPublisher;
use ingress_service::handlers;
use ingress_service::Config;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use transactional_outbox::{BackoffConfig, OutboxProcessor, SqlxOutboxRepository};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,actix_web=debug,sqlx=warn".into()),
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

    tracing::info!("starting ingress-service v{}", env!("CARGO_PKG_VERSION"));

    let mut db_cfg = DbConfig::from_env("ingress-service").unwrap_or_default();
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

    {
        let channel = event_bus::pool::channel(&amqp_pool)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("failed to open AMQP channel for topology declaration: {e}");
                eprintln!("ERROR: failed to open AMQP channel: {e}");
                std::process::exit(1);
            });
        declare_exchanges(&channel).await.unwrap_or_else(|e| {
            tracing::error!("failed to declare broker exchanges: {e}");
            eprintln!("ERROR: failed to declare broker exchanges: {e}");
            std::process::exit(1);
        });
        declare_queue(&channel, &DOCUMENT_UPLOADED_QUEUE)
            .await
            .unwrap_or_else(|e| {
                tracing::error!("failed to declare document.uploaded.q: {e}");
                eprintln!("ERROR: failed to declare document.uploaded.q: {e}");
                std::process::exit(1);
            });
    }

    let outbox_repository = Arc::new(SqlxOutboxRepository::new(db_pool.clone()));
    if config.publisher.enabled {
        let publisher = Arc::new(
            AmqpOutboxPublisher::new(amqp_pool.clone())
                .with_publish_timeout(std::time::Duration::from_secs(5)),
        );
        let backoff = BackoffConfig {
            initial_delay: config.publisher.initial_retry_delay,
            max_delay: config.publisher.max_retry_delay,
            max_retries: config.publisher.max_retries,
        };
        let processor = OutboxProcessor::new(
            outbox_repository.clone(),
            publisher,
            config.publisher.batch_size,
            backoff,
        )
        .with_poll_interval(config.publisher.polling_interval)
        .with_metrics(transactional_outbox::metrics::OutboxMetrics::new("ingress-service"));

        tokio::spawn(async move {
            if let Err(e) = processor.start().await {
                tracing::error!("outbox processor exited: {e}");
            }
        });
    } else {
        tracing::warn!("outbox publisher disabled via PUBLISHER_ENABLED=false");
    }

    let bind_address = format!("{}:{}", config.app.host, config.app.port);
    tracing::info!(bind_address = %bind_address, "starting HTTP server");

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(db_pool.clone()))
            .app_data(web::Data::new(SqlxOutboxRepository::new(db_pool.clone())))
            .wrap(correlation::CorrelationIdMiddleware)
            .route("/health", web::get().to(handlers::health))
            .service(
                web::resource("/documents")
                    .route(web::post().to(handlers::create_document)),
            )
            .service(
                web::resource("/documents/{id}")
                    .route(web::get().to(handlers::get_document)),
            )
    })
    .bind(&bind_address)?
    .run()
    .await
}
