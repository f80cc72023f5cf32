//! Per-worker job loop: dequeue, attempt, log, retry-or-finish.
//!
//! Grounded on the teacher's `webhook-delivery/src/main.rs` `worker_loop`
//! shape (BRPOP-equivalent, metrics per attempt, structured logging), but
//! departs from it on the retry path per the REDESIGN decision in
//! SPEC_FULL.md §4.2: instead of sleeping in-process and looping on the same
//! job, a retry re-enqueues a brand new `DeliveryJob` onto the job store's
//! delayed structure and returns, so the next attempt re-reads the
//! subscription's current target_url at dequeue time.

use chrono::Duration as ChronoDuration;
use sqlx::PgPool;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use hookrelay_domain::{repository, Outcome};
use hookrelay_job_queue::JobQueue;
use hookrelay_subscription_cache::SubscriptionCache;

use crate::config::DeliveryConfig;
use crate::delivery::WebhookDelivery;
use crate::metrics;

/// Consecutive job-store failures tolerated before this worker gives up
/// and panics, per spec.md §7's `JobStoreUnavailable` policy for DW:
/// "after bounded retries, crash and let the supervisor restart".
const MAX_CONSECUTIVE_QUEUE_ERRORS: u32 = 10;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    worker_id: usize,
    mut queue: JobQueue,
    mut cache: SubscriptionCache,
    pool: PgPool,
    delivery: std::sync::Arc<WebhookDelivery>,
    config: DeliveryConfig,
    mut shutdown: broadcast::Receiver<()>,
) {
    let consumer_id = format!("worker-{worker_id}");
    info!(worker_id, "worker entering dequeue loop");
    let mut consecutive_queue_errors = 0u32;

    loop {
        if shutdown.try_recv().is_ok() {
            info!(worker_id, "worker received shutdown signal");
            break;
        }

        let job = match queue.dequeue_blocking(&consumer_id, 5).await {
            Ok(Some(job)) => {
                consecutive_queue_errors = 0;
                job
            }
            Ok(None) => {
                consecutive_queue_errors = 0;
                continue;
            }
            Err(err) => {
                consecutive_queue_errors += 1;
                error!(
                    worker_id,
                    %err,
                    attempt = consecutive_queue_errors,
                    "failed to dequeue job, backing off"
                );
                if consecutive_queue_errors >= MAX_CONSECUTIVE_QUEUE_ERRORS {
                    panic!(
                        "worker {worker_id} lost the job store after {consecutive_queue_errors} consecutive errors"
                    );
                }
                tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                continue;
            }
        };

        metrics::JOBS_CONSUMED_TOTAL
            .with_label_values(&[&worker_id.to_string()])
            .inc();

        match process_job(&job, &mut cache, &mut queue, &pool, &delivery, &config).await {
            Ok(()) => {
                if let Err(err) = queue.ack(&consumer_id, &job).await {
                    error!(worker_id, webhook_id = %job.webhook_id, %err, "failed to ack job");
                }
            }
            Err(err) => {
                // A DS or JS failure here means the attempt (and any retry
                // re-enqueue) may not be durable. Do not ack: leave the job
                // in the processing list so the visibility-timeout sweep
                // redelivers it, per spec.md §7's StoreUnavailable/
                // JobStoreUnavailable policy.
                error!(worker_id, webhook_id = %job.webhook_id, %err, "failed to process job, leaving unacked for redelivery");
            }
        }
    }
}

/// Implements the attempt protocol of spec.md §4.2 exactly, step for step.
async fn process_job(
    job: &hookrelay_domain::DeliveryJob,
    cache: &mut SubscriptionCache,
    queue: &mut JobQueue,
    pool: &PgPool,
    delivery: &WebhookDelivery,
    config: &DeliveryConfig,
) -> anyhow::Result<()> {
    // Step 1: resolve subscription via SC. Absent subscription -> silent drop.
    let subscription = cache.get(job.subscription_id).await?;
    let Some(subscription) = subscription else {
        warn!(
            webhook_id = %job.webhook_id,
            subscription_id = %job.subscription_id,
            "subscription not found, dropping job"
        );
        return Ok(());
    };

    // Steps 2-3: send the attempt.
    let result = delivery.attempt(job, &subscription.target_url).await;

    metrics::ATTEMPT_DURATION
        .with_label_values(&[if result.success { "success" } else { "failure" }])
        .observe(result.duration.as_secs_f64());
    if let Some(status_code) = result.status_code {
        metrics::HTTP_RESPONSES_TOTAL
            .with_label_values(&[&status_code.to_string()])
            .inc();
    }

    // Step 4: success is terminal.
    if result.success {
        metrics::ATTEMPTS_TOTAL.with_label_values(&["success"]).inc();
        repository::insert_delivery_log(
            pool,
            job.webhook_id,
            job.subscription_id,
            &subscription.target_url,
            job.attempt as i32,
            Outcome::Success,
            result.status_code,
            None,
        )
        .await?;

        info!(
            webhook_id = %job.webhook_id,
            subscription_id = %job.subscription_id,
            attempt = job.attempt,
            status_code = ?result.status_code,
            outcome = "Success",
            "delivery attempt succeeded"
        );
        return Ok(());
    }

    // Step 5: transient failure with attempts remaining -> retry.
    if job.attempt < config.max_attempts {
        metrics::ATTEMPTS_TOTAL.with_label_values(&["failed_attempt"]).inc();
        repository::insert_delivery_log(
            pool,
            job.webhook_id,
            job.subscription_id,
            &subscription.target_url,
            job.attempt as i32,
            Outcome::FailedAttempt,
            result.status_code,
            result.error.as_deref(),
        )
        .await?;

        let delay = config.backoff_for_attempt(job.attempt);
        let next_job = job.next_attempt();

        metrics::RETRIES_TOTAL
            .with_label_values(&[&job.subscription_id.to_string()])
            .inc();

        warn!(
            webhook_id = %job.webhook_id,
            subscription_id = %job.subscription_id,
            attempt = job.attempt,
            next_attempt = next_job.attempt,
            delay_secs = delay.as_secs(),
            outcome = "Failed Attempt",
            "scheduling retry"
        );

        queue
            .enqueue_in(next_job, ChronoDuration::from_std(delay)?)
            .await?;
        return Ok(());
    }

    // Step 6: exhausted retries -> terminal failure.
    metrics::ATTEMPTS_TOTAL.with_label_values(&["failure"]).inc();
    repository::insert_delivery_log(
        pool,
        job.webhook_id,
        job.subscription_id,
        &subscription.target_url,
        job.attempt as i32,
        Outcome::Failure,
        result.status_code,
        result.error.as_deref(),
    )
    .await?;

    error!(
        webhook_id = %job.webhook_id,
        subscription_id = %job.subscription_id,
        attempt = job.attempt,
        status_code = ?result.status_code,
        outcome = "Failure",
        "delivery permanently failed"
    );

    debug!(webhook_id = %job.webhook_id, "no further retries scheduled");
    Ok(())
}
