/*!
 * Retention Sweeper Service
 *
 * Periodically deletes `delivery_logs` rows older than `RETENTION_HOURS`.
 * Runs as a standalone process; never blocks ingest or delivery, since it
 * only ever issues an indexed bulk delete in its own transaction.
 */

use anyhow::{Context, Result};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use tracing::{info, warn};

mod config;
mod metrics;
mod sweep;

use config::SweeperConfig;

#[tokio::main]
async fn main() -> Result<()> {
    hookrelay_common::init_tracing();

    info!("starting hookrelay retention sweeper");

    let config = SweeperConfig::from_env().context("failed to load configuration")?;

    info!(
        retention_hours = config.retention_hours,
        interval = ?config.sweep_interval,
        "configuration loaded"
    );

    let pool = hookrelay_common::create_pool(&config.database_url, 5)
        .await
        .context("failed to create database pool")?;
    hookrelay_common::db::run_migrations(&pool)
        .await
        .context("failed to run database migrations")?;

    let health_app = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(health_check));

    let health_addr = format!("0.0.0.0:{}", config.health_port);
    tokio::spawn(async move {
        match tokio::net::TcpListener::bind(&health_addr).await {
            Ok(listener) => {
                info!(addr = %health_addr, "health server listening");
                if let Err(err) = axum::serve(listener, health_app).await {
                    warn!(%err, "health server stopped");
                }
            }
            Err(err) => warn!(%err, "failed to bind health server"),
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

    sweep::run_periodically(&pool, config.retention_hours, config.sweep_interval).await;

    Ok(())
}

/// The sweeper has no readiness distinction from liveness: once the
/// process is up, its next sweep always runs on schedule regardless of the
/// previous sweep's outcome.
async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "hookrelay-retention-sweeper",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn metrics_handler() -> Result<String, (StatusCode, String)> {
    metrics::render_metrics().map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
