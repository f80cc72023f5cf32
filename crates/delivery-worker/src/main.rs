/*!
 * Delivery Worker Service
 *
 * Consumes delivery jobs from the job store and attempts webhook delivery
 * with bounded, scheduled retries. See `worker::process_job` for the
 * attempt protocol.
 *
 * ## Architecture
 *
 * ```text
 * Main Process
 *     |
 *     +--> Scheduler task: promotes due delayed jobs onto the ready queue
 *     |                    and sweeps timed-out processing-list entries
 *     |
 *     +--> Worker Pool (WORKER_COUNT tokio tasks)
 *          +--> Worker 1: dequeue -> HTTP POST -> log -> retry-or-finish
 *          +--> Worker 2: dequeue -> HTTP POST -> log -> retry-or-finish
 *          ...
 *          +--> Worker N
 * ```
 */

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use redis::Client;
use serde_json::{Value, json};
use tokio::signal;
use tokio::sync::Barrier;
use tracing::{error, info, warn};

use hookrelay_delivery_worker::config;
use hookrelay_delivery_worker::delivery;
use hookrelay_delivery_worker::metrics;
use hookrelay_delivery_worker::worker;

use config::DeliveryConfig;
use delivery::WebhookDelivery;
use hookrelay_job_queue::JobQueue;
use hookrelay_subscription_cache::SubscriptionCache;

#[derive(Clone)]
struct ServiceState {
    ready: Arc<AtomicBool>,
    workers_initialized: Arc<AtomicUsize>,
    worker_count: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    hookrelay_common::init_tracing();

    info!("starting hookrelay delivery worker");

    let config = DeliveryConfig::from_env().context("failed to load configuration")?;

    info!(
        workers = config.worker_count,
        max_attempts = config.max_attempts,
        http_timeout = ?config.http_timeout,
        "configuration loaded"
    );

    let db_pool = hookrelay_common::create_pool(&config.database_url, 20)
        .await
        .context("failed to create database pool")?;
    hookrelay_common::db::run_migrations(&db_pool)
        .await
        .context("failed to run database migrations")?;

    let webhook_delivery = Arc::new(
        WebhookDelivery::new(config.http_timeout).context("failed to create HTTP client")?,
    );

    let service_state = ServiceState {
        ready: Arc::new(AtomicBool::new(false)),
        workers_initialized: Arc::new(AtomicUsize::new(0)),
        worker_count: config.worker_count,
    };

    let health_state = service_state.clone();
    let health_port = config.health_port;
    tokio::spawn(async move {
        if let Err(err) = start_health_server(health_port, health_state).await {
            error!(%err, "health server failed");
        }
    });

    let metrics_port = config.metrics_port;
    tokio::spawn(async move {
        let app = Router::new().route("/metrics", get(metrics_handler));
        match tokio::net::TcpListener::bind(format!("0.0.0.0:{metrics_port}")).await {
            Ok(listener) => {
                if let Err(err) = axum::serve(listener, app).await {
                    warn!(%err, "metrics server error");
                }
            }
            Err(err) => warn!(%err, "failed to bind metrics server"),
        }
    });

    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    // Scheduler: promotes due delayed jobs and sweeps timed-out processing
    // entries, shared across all workers' consumer ids.
    {
        let redis_client = Client::open(config.redis_url()).context("failed to create redis client")?;
        let conn = redis::aio::ConnectionManager::new(redis_client)
            .await
            .context("failed to connect scheduler to redis")?;
        let scheduler_queue = JobQueue::new(conn, config.queue_name.clone());
        let poll_interval = Duration::from_millis(config.scheduler_poll_interval_ms);
        let shutdown_rx = shutdown_tx.subscribe();
        let visibility_timeout = chrono::Duration::seconds(config.visibility_timeout_secs as i64);
        let worker_count = config.worker_count;

        tokio::spawn(async move {
            run_scheduler(scheduler_queue, poll_interval, worker_count, visibility_timeout, shutdown_rx).await;
        });
    }

    let init_barrier = Arc::new(Barrier::new(config.worker_count + 1));
    let mut handles = Vec::with_capacity(config.worker_count);

    for worker_id in 0..config.worker_count {
        let config = config.clone();
        let db_pool = db_pool.clone();
        let webhook_delivery = Arc::clone(&webhook_delivery);
        let shutdown_rx = shutdown_tx.subscribe();
        let barrier = Arc::clone(&init_barrier);
        let state = service_state.clone();

        let handle = tokio::spawn(async move {
            let redis_client = match Client::open(config.redis_url()) {
                Ok(client) => client,
                Err(err) => {
                    error!(worker_id, %err, "failed to create redis client");
                    return;
                }
            };

            let conn = match redis::aio::ConnectionManager::new(redis_client).await {
                Ok(conn) => conn,
                Err(err) => {
                    error!(worker_id, %err, "failed to connect to redis");
                    return;
                }
            };

            let queue = JobQueue::new(conn.clone(), config.queue_name.clone());
            let cache = SubscriptionCache::new(conn, db_pool.clone(), config.sc_cache_ttl_secs);

            state.workers_initialized.fetch_add(1, Ordering::SeqCst);
            barrier.wait().await;

            worker::run(
                worker_id,
                queue,
                cache,
                db_pool,
                webhook_delivery,
                config,
                shutdown_rx,
            )
            .await;
        });

        handles.push(handle);
    }

    info!(count = config.worker_count, "waiting for workers to initialize");
    init_barrier.wait().await;
    service_state.ready.store(true, Ordering::SeqCst);
    info!(count = config.worker_count, "delivery worker is READY");

    let mut worker_panicked = false;
    let shutdown_reason = tokio::select! {
        _ = signal::ctrl_c() => "received Ctrl+C",
        _ = async {
            for handle in &mut handles {
                if let Err(join_err) = handle.await {
                    if join_err.is_panic() {
                        worker_panicked = true;
                    }
                }
            }
        } => "all workers stopped",
    };

    // A worker panic means the job store was unreachable past its bounded
    // retry budget (spec.md §7, JobStoreUnavailable): exit nonzero so a
    // process supervisor restarts us, rather than limping on short-handed.
    if worker_panicked {
        error!("a worker panicked, exiting for supervisor restart");
        std::process::exit(1);
    }

    info!(reason = shutdown_reason, "shutting down delivery worker");
    let _ = shutdown_tx.send(());

    let _ = tokio::time::timeout(Duration::from_secs(10), async {
        for handle in handles {
            let _ = handle.await;
        }
    })
    .await;

    info!("hookrelay delivery worker stopped");
    Ok(())
}

async fn run_scheduler(
    mut queue: JobQueue,
    poll_interval: Duration,
    worker_count: usize,
    visibility_timeout: chrono::Duration,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = queue.promote_due_jobs().await {
                    warn!(%err, "scheduler promote tick failed");
                }
                for worker_id in 0..worker_count {
                    let consumer_id = format!("worker-{worker_id}");
                    if let Err(err) = queue.sweep_visibility_timeouts(&consumer_id, visibility_timeout).await {
                        warn!(%err, consumer_id, "visibility-timeout sweep failed");
                    }
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}

async fn start_health_server(port: u16, state: ServiceState) -> Result<()> {
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
        .with_state(state);

    let addr = format!("0.0.0.0:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind health server to {addr}"))?;

    info!(addr = %addr, "health server listening");
    axum::serve(listener, app).await.context("health server failed")?;
    Ok(())
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "hookrelay-delivery-worker",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}

async fn readiness_check(State(state): State<ServiceState>) -> (StatusCode, Json<Value>) {
    let is_ready = state.ready.load(Ordering::SeqCst);
    let workers_init = state.workers_initialized.load(Ordering::SeqCst);

    if is_ready {
        (
            StatusCode::OK,
            Json(json!({
                "ready": true,
                "service": "hookrelay-delivery-worker",
                "workers_initialized": workers_init,
                "workers_total": state.worker_count,
            })),
        )
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "ready": false,
                "service": "hookrelay-delivery-worker",
                "workers_initialized": workers_init,
                "workers_total": state.worker_count,
            })),
        )
    }
}

async fn metrics_handler() -> Result<String, (StatusCode, String)> {
    metrics::render_metrics().map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
