/*!
 * Ingest Service
 *
 * The entry point of the delivery pipeline: accepts an event over HTTP,
 * resolves the target subscription through the cache-aside subscription
 * cache, and durably enqueues a delivery job before replying. No outbound
 * delivery happens on this path.
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use redis::Client;
use serde_json::{Value, json};
use tokio::signal;
use tokio::sync::Mutex;
use tracing::{info, warn};

use hookrelay_ingest::config;
use hookrelay_ingest::handlers;
use hookrelay_ingest::metrics;

use config::IngestConfig;
use handlers::AppState;
use hookrelay_job_queue::JobQueue;
use hookrelay_subscription_cache::SubscriptionCache;

#[derive(Clone)]
struct ServiceState {
    ready: Arc<AtomicBool>,
}

#[tokio::main]
async fn main() -> Result<()> {
    hookrelay_common::init_tracing();

    info!("starting hookrelay ingest service");

    let config = IngestConfig::from_env().context("failed to load configuration")?;

    info!(queue = %config.queue_name, "configuration loaded");

    let db_pool = hookrelay_common::create_pool(&config.database_url, 10)
        .await
        .context("failed to create database pool")?;
    hookrelay_common::db::run_migrations(&db_pool)
        .await
        .context("failed to run database migrations")?;

    let redis_client = Client::open(config.redis_url()).context("failed to create redis client")?;
    let conn = redis::aio::ConnectionManager::new(redis_client)
        .await
        .context("failed to connect to redis")?;

    let cache = SubscriptionCache::new(conn.clone(), db_pool.clone(), config.sc_cache_ttl_secs);
    let queue = JobQueue::new(conn.clone(), config.queue_name.clone());

    // Embedded scheduler: ingest also promotes due delayed jobs, so a
    // delayed retry isn't left stranded if every delivery-worker process is
    // momentarily down. Harmless to run redundantly (see JobQueue::promote_due_jobs).
    {
        let scheduler_queue = JobQueue::new(conn, config.queue_name.clone());
        let poll_interval = std::time::Duration::from_millis(500);
        let shutdown_rx = tokio::sync::broadcast::channel::<()>(1).1;
        tokio::spawn(hookrelay_job_queue::run_scheduler(
            scheduler_queue,
            poll_interval,
            shutdown_rx,
        ));
    }

    let app_state = Arc::new(AppState {
        cache: Mutex::new(cache),
        queue: Mutex::new(queue),
    });

    let service_state = ServiceState {
        ready: Arc::new(AtomicBool::new(true)),
    };

    let app = hookrelay_ingest::app(app_state, config.max_payload_bytes);

    let health_app = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .route("/metrics", get(metrics_handler))
        .with_state(service_state.clone());

    let health_addr = format!("0.0.0.0:{}", config.health_port);
    tokio::spawn(async move {
        let listener = match tokio::net::TcpListener::bind(&health_addr).await {
            Ok(listener) => listener,
            Err(err) => {
                warn!(%err, "failed to bind health server");
                return;
            }
        };
        info!(addr = %health_addr, "health server listening");
        if let Err(err) = axum::serve(listener, health_app).await {
            warn!(%err, "health server stopped");
        }
    });

    let metrics_addr = format!("0.0.0.0:{}", config.metrics_port);
    tokio::spawn(async move {
        let metrics_app = Router::new().route("/metrics", get(metrics_handler));
        match tokio::net::TcpListener::bind(&metrics_addr).await {
            Ok(listener) => {
                info!(addr = %metrics_addr, "metrics server listening");
                if let Err(err) = axum::serve(listener, metrics_app).await {
                    warn!(%err, "metrics server stopped");
                }
            }
            Err(err) => warn!(%err, "failed to bind metrics server"),
        }
    });

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind ingest server to {addr}"))?;

    info!(addr = %addr, "ingest is READY");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("ingest server failed")?;

    info!("hookrelay ingest stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    info!("received shutdown signal");
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "hookrelay-ingest",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn readiness_check(State(state): State<ServiceState>) -> (StatusCode, Json<Value>) {
    if state.ready.load(Ordering::SeqCst) {
        (StatusCode::OK, Json(json!({ "ready": true, "service": "hookrelay-ingest" })))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "ready": false, "service": "hookrelay-ingest" })),
        )
    }
}

async fn metrics_handler() -> Result<String, (StatusCode, String)> {
    metrics::render_metrics().map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
