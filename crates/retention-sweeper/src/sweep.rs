//! Periodic log-retention sweep — spec.md §4.5.
//!
//! Grounded on hook0's `old_events_cleanup.rs`: a startup grace period, a
//! `sleep(period) { try sweep }` loop that logs and continues on failure
//! rather than panicking, one transaction per sweep with an explicit
//! rollback on error so a transient failure never retries half-committed.

use std::time::{Duration, Instant};

use chrono::Duration as ChronoDuration;
use sqlx::PgPool;
use tracing::{error, info, trace};

use hookrelay_domain::repository;

use crate::metrics;

const STARTUP_GRACE_PERIOD: Duration = Duration::from_secs(20);

pub async fn run_periodically(pool: &PgPool, retention_hours: i64, period: Duration) {
    tokio::time::sleep(STARTUP_GRACE_PERIOD).await;

    loop {
        match sweep_once(pool, retention_hours).await {
            Ok(deleted) => {
                metrics::SWEEPS_TOTAL.with_label_values(&["success"]).inc();
                metrics::ROWS_DELETED_TOTAL.inc_by(deleted);
                info!(deleted, "retention sweep complete");
            }
            Err(err) => {
                metrics::SWEEPS_TOTAL.with_label_values(&["failure"]).inc();
                error!(%err, "retention sweep failed, will retry next tick");
            }
        }

        tokio::time::sleep(period).await;
    }
}

async fn sweep_once(pool: &PgPool, retention_hours: i64) -> Result<u64, sqlx::Error> {
    trace!("starting retention sweep");
    let start = Instant::now();

    let mut tx = pool.begin().await?;
    let result = repository::purge_old_delivery_logs(
        &mut tx,
        ChronoDuration::hours(retention_hours),
    )
    .await;

    match result {
        Ok(deleted) => {
            tx.commit().await?;
            info!(deleted, elapsed = ?start.elapsed(), "purged old delivery logs");
            Ok(deleted)
        }
        Err(err) => {
            tx.rollback().await?;
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grace_period_is_nonzero() {
        assert!(STARTUP_GRACE_PERIOD > Duration::from_secs(0));
    }
}
