use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Authoritative subscription record, owned by the durable store.
///
/// `events` is advisory metadata only: the delivery worker never filters on
/// it (filtering, if required, belongs in the ingest handler).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Subscription {
    pub id: Uuid,
    pub target_url: String,
    pub secret: Option<String>,
    pub events: Option<Vec<String>>,
}

/// Row shape returned by `SELECT ... FROM subscriptions`, with timestamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct SubscriptionRecord {
    pub id: Uuid,
    pub target_url: String,
    pub secret: Option<String>,
    pub events: Option<Vec<String>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SubscriptionRecord> for Subscription {
    fn from(row: SubscriptionRecord) -> Self {
        Self {
            id: row.id,
            target_url: row.target_url,
            secret: row.secret,
            events: row.events,
        }
    }
}
