//! Durable-store repository functions.
//!
//! Spec.md places subscription CRUD out of scope as "a thin wrapper...
//! gains nothing from being re-specified". These functions are that thin
//! wrapper's persistence layer: a real CRUD HTTP surface would call them and
//! then push the result through the subscription cache's `cache()` /
//! `invalidate()` per spec.md §6.2. Integration tests call them directly in
//! place of such a surface.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::delivery::{DeliveryLog, Outcome};
use crate::subscription::{Subscription, SubscriptionRecord};

pub async fn insert_subscription(pool: &PgPool, sub: &Subscription) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO subscriptions (id, target_url, secret, events)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(sub.id)
    .bind(&sub.target_url)
    .bind(&sub.secret)
    .bind(&sub.events)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn update_subscription_target_url(
    pool: &PgPool,
    id: Uuid,
    target_url: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE subscriptions SET target_url = $1, updated_at = now() WHERE id = $2")
        .bind(target_url)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Deletion cascades the cache (the caller must call `SC.invalidate(id)`
/// afterward) but never deletes prior delivery logs.
pub async fn delete_subscription(pool: &PgPool, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM subscriptions WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn fetch_subscription(
    pool: &PgPool,
    id: Uuid,
) -> Result<Option<Subscription>, sqlx::Error> {
    let row: Option<SubscriptionRecord> =
        sqlx::query_as("SELECT id, target_url, secret, events, created_at, updated_at FROM subscriptions WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await?;

    Ok(row.map(Subscription::from))
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_delivery_log(
    pool: &PgPool,
    webhook_id: Uuid,
    subscription_id: Uuid,
    target_url: &str,
    attempt_number: i32,
    outcome: Outcome,
    status_code: Option<i32>,
    error: Option<&str>,
) -> Result<DeliveryLog, sqlx::Error> {
    let log = DeliveryLog {
        id: Uuid::new_v4(),
        webhook_id,
        subscription_id,
        target_url: target_url.to_string(),
        timestamp: Utc::now(),
        attempt_number,
        outcome,
        status_code,
        error: error.map(str::to_string),
    };

    sqlx::query(
        r#"
        INSERT INTO delivery_logs
            (id, webhook_id, subscription_id, target_url, timestamp, attempt_number, outcome, status_code, error)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (webhook_id, attempt_number) DO NOTHING
        "#,
    )
    .bind(log.id)
    .bind(log.webhook_id)
    .bind(log.subscription_id)
    .bind(&log.target_url)
    .bind(log.timestamp)
    .bind(log.attempt_number)
    .bind(log.outcome.as_str())
    .bind(log.status_code)
    .bind(&log.error)
    .execute(pool)
    .await?;

    Ok(log)
}

pub async fn fetch_delivery_logs(
    pool: &PgPool,
    webhook_id: Uuid,
) -> Result<Vec<DeliveryLog>, sqlx::Error> {
    sqlx::query_as(
        "SELECT id, webhook_id, subscription_id, target_url, timestamp, attempt_number, outcome, status_code, error
         FROM delivery_logs WHERE webhook_id = $1 ORDER BY attempt_number ASC",
    )
    .bind(webhook_id)
    .fetch_all(pool)
    .await
}

/// Deletes every `delivery_logs` row older than `now - retention`, in the
/// caller's transaction. Returns the number of rows deleted.
pub async fn purge_old_delivery_logs(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    retention: chrono::Duration,
) -> Result<u64, sqlx::Error> {
    let cutoff = Utc::now() - retention;

    let result = sqlx::query("DELETE FROM delivery_logs WHERE timestamp < $1")
        .bind(cutoff)
        .execute(&mut **tx)
        .await?;

    Ok(result.rows_affected())
}
