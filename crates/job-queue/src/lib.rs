//! Redis-backed durable job queue (the "JS" component).
//!
//! No teacher file implements a delayed queue: the teacher's `JobConsumer`
//! (crates/webhook-delivery/src/consumer.rs) only has an undelayed `BRPOP`
//! list and an unused `requeue` helper. This module generalizes that shape
//! with two more Redis structures so retries can be scheduled without an
//! in-process sleep:
//!
//! - ready queue: list `<queue>`, consumed with `BRPOP`/`BRPOPLPUSH`
//!   (teacher's `JobConsumer::consume`)
//! - delayed queue: sorted set `<queue>:delayed`, score = due-at-millis
//! - processing list: `<queue>:processing:<consumer>`, holding jobs that
//!   have been popped but not yet acknowledged
//! - processing times: hash `<queue>:processing:<consumer>:times`, job key
//!   -> moved-to-processing-at millis, used by the visibility-timeout sweep

use std::time::{SystemTime, UNIX_EPOCH};

use chrono::Duration;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use hookrelay_domain::DeliveryJob;

#[derive(Debug, Error)]
pub enum JobQueueError {
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("job serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, JobQueueError>;

/// Wire envelope stored in every Redis structure. `key` lets the
/// visibility-timeout sweep correlate a processing-list entry with its
/// timestamp in the companion times hash without re-parsing `job`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Envelope {
    key: String,
    job: DeliveryJob,
}

impl Envelope {
    fn new(job: DeliveryJob) -> Self {
        let key = format!("{}:{}", job.webhook_id, job.attempt);
        Self { key, job }
    }
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_millis() as i64
}

pub struct JobQueue {
    conn: ConnectionManager,
    queue_name: String,
}

impl JobQueue {
    pub fn new(conn: ConnectionManager, queue_name: impl Into<String>) -> Self {
        Self {
            conn,
            queue_name: queue_name.into(),
        }
    }

    fn delayed_key(&self) -> String {
        format!("{}:delayed", self.queue_name)
    }

    fn processing_key(&self, consumer_id: &str) -> String {
        format!("{}:processing:{}", self.queue_name, consumer_id)
    }

    fn processing_times_key(&self, consumer_id: &str) -> String {
        format!("{}:processing:{}:times", self.queue_name, consumer_id)
    }

    /// Enqueue a job for immediate delivery.
    pub async fn enqueue(&mut self, job: DeliveryJob) -> Result<()> {
        let envelope = Envelope::new(job);
        let json = serde_json::to_string(&envelope)?;

        debug!(key = %envelope.key, "enqueueing job onto ready list");
        self.conn.lpush::<_, _, ()>(&self.queue_name, json).await?;
        Ok(())
    }

    /// Schedule a job to become ready after `delay`.
    pub async fn enqueue_in(&mut self, job: DeliveryJob, delay: Duration) -> Result<()> {
        let envelope = Envelope::new(job);
        let json = serde_json::to_string(&envelope)?;
        let due_at = now_millis() + delay.num_milliseconds().max(0);

        debug!(key = %envelope.key, due_at, "scheduling delayed job");
        self.conn
            .zadd::<_, _, _, ()>(self.delayed_key(), json, due_at)
            .await?;
        Ok(())
    }

    /// Move due members of the delayed sorted set onto the ready list.
    /// Races between multiple schedulers are harmless: `ZREM` returns 0 for
    /// an item another scheduler already claimed, so it's simply skipped.
    pub async fn promote_due_jobs(&mut self) -> Result<usize> {
        let due_at = now_millis();
        let due: Vec<String> = self
            .conn
            .zrangebyscore(self.delayed_key(), 0, due_at)
            .await?;

        let mut promoted = 0usize;
        for json in due {
            let removed: i64 = self.conn.zrem(self.delayed_key(), &json).await?;
            if removed == 0 {
                continue;
            }
            self.conn.lpush::<_, _, ()>(&self.queue_name, &json).await?;
            promoted += 1;
        }

        if promoted > 0 {
            debug!(promoted, "promoted delayed jobs to ready queue");
        }
        Ok(promoted)
    }

    /// Block up to `timeout_secs` for the next ready job, atomically moving
    /// it into this consumer's processing list. `timeout_secs` of 0 blocks
    /// forever.
    pub async fn dequeue_blocking(
        &mut self,
        consumer_id: &str,
        timeout_secs: usize,
    ) -> Result<Option<DeliveryJob>> {
        let processing_key = self.processing_key(consumer_id);
        let json: Option<String> = self
            .conn
            .brpoplpush(&self.queue_name, &processing_key, timeout_secs as f64)
            .await?;

        let Some(json) = json else {
            return Ok(None);
        };

        let envelope: Envelope = serde_json::from_str(&json)?;
        self.conn
            .hset::<_, _, _, ()>(
                self.processing_times_key(consumer_id),
                &envelope.key,
                now_millis(),
            )
            .await?;

        debug!(key = %envelope.key, attempt = envelope.job.attempt, "dequeued job");
        Ok(Some(envelope.job))
    }

    /// Remove a job from the processing list after its attempt completes
    /// (success, terminal failure, or hand-off to a retry re-enqueue).
    pub async fn ack(&mut self, consumer_id: &str, job: &DeliveryJob) -> Result<()> {
        let envelope = Envelope::new(job.clone());
        let json = serde_json::to_string(&envelope)?;

        self.conn
            .lrem::<_, _, ()>(self.processing_key(consumer_id), 1, json)
            .await?;
        self.conn
            .hdel::<_, _, ()>(self.processing_times_key(consumer_id), &envelope.key)
            .await?;
        Ok(())
    }

    /// Re-queue any processing-list entry older than `timeout` back onto
    /// the ready list. Resolves spec.md's "implementation-defined" visibility
    /// timeout: `BRPOPLPUSH` removes items from the ready list immediately,
    /// so a crashed consumer's in-flight job needs an explicit sweep rather
    /// than relying on Redis to redeliver it.
    pub async fn sweep_visibility_timeouts(
        &mut self,
        consumer_id: &str,
        timeout: Duration,
    ) -> Result<usize> {
        let processing_key = self.processing_key(consumer_id);
        let times_key = self.processing_times_key(consumer_id);

        let entries: Vec<String> = self.conn.lrange(&processing_key, 0, -1).await?;
        let cutoff = now_millis() - timeout.num_milliseconds().max(0);

        let mut requeued = 0usize;
        for json in entries {
            let envelope: Envelope = match serde_json::from_str(&json) {
                Ok(e) => e,
                Err(_) => continue,
            };

            let moved_at: Option<i64> = self.conn.hget(&times_key, &envelope.key).await?;
            let Some(moved_at) = moved_at else {
                continue;
            };

            if moved_at > cutoff {
                continue;
            }

            let removed: i64 = self.conn.lrem(&processing_key, 1, &json).await?;
            if removed == 0 {
                continue;
            }

            self.conn.hdel::<_, _, ()>(&times_key, &envelope.key).await?;
            self.conn.lpush::<_, _, ()>(&self.queue_name, &json).await?;
            requeued += 1;
            warn!(key = %envelope.key, "requeued job past visibility timeout");
        }

        Ok(requeued)
    }
}

/// Runs `promote_due_jobs` on an interval. Spawned once per delivery-worker
/// process, per spec.md §4.4.
pub async fn run_scheduler(
    mut queue: JobQueue,
    poll_interval: std::time::Duration,
    mut shutdown: tokio::sync::broadcast::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    info!(interval_ms = poll_interval.as_millis() as u64, "scheduler started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(err) = queue.promote_due_jobs().await {
                    warn!(%err, "scheduler promote tick failed");
                }
            }
            _ = shutdown.recv() => {
                info!("scheduler shutting down");
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use uuid::Uuid;

    fn sample_job() -> DeliveryJob {
        DeliveryJob::first_attempt(
            Uuid::new_v4(),
            json!({"hello": "world"}),
            Some("order.created".to_string()),
            None,
            Uuid::new_v4(),
        )
    }

    #[test]
    fn envelope_key_is_stable_for_same_webhook_and_attempt() {
        let job = sample_job();
        let e1 = Envelope::new(job.clone());
        let e2 = Envelope::new(job);
        assert_eq!(e1.key, e2.key);
    }

    #[test]
    fn envelope_roundtrips_through_json() {
        let job = sample_job();
        let envelope = Envelope::new(job);
        let json = serde_json::to_string(&envelope).unwrap();
        let decoded: Envelope = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded.key, envelope.key);
        assert_eq!(decoded.job.webhook_id, envelope.job.webhook_id);
    }
}
