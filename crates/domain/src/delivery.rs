use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Terminal classification of a single delivery attempt.
///
/// `FailedAttempt` is never the outcome of the last attempt recorded for a
/// webhook_id: the final row is always `Success` or `Failure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "TEXT", rename_all = "PascalCase"))]
pub enum Outcome {
    Success,
    #[serde(rename = "Failed Attempt")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "Failed Attempt"))]
    FailedAttempt,
    Failure,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Success => "Success",
            Outcome::FailedAttempt => "Failed Attempt",
            Outcome::Failure => "Failure",
        }
    }
}

/// In-flight delivery job. Never persisted in the durable store; crosses
/// the job store boundary as JSON and is recreated with `attempt + 1` for
/// each retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryJob {
    pub subscription_id: Uuid,
    pub payload: serde_json::Value,
    pub event_type: Option<String>,
    pub signature: Option<String>,
    pub webhook_id: Uuid,
    pub attempt: u32,
}

impl DeliveryJob {
    pub fn first_attempt(
        subscription_id: Uuid,
        payload: serde_json::Value,
        event_type: Option<String>,
        signature: Option<String>,
        webhook_id: Uuid,
    ) -> Self {
        Self {
            subscription_id,
            payload,
            event_type,
            signature,
            webhook_id,
            attempt: 1,
        }
    }

    /// Build the job for the next attempt, re-reading the subscription's
    /// current target_url is the caller's responsibility at dequeue time —
    /// this type carries no target_url snapshot on purpose.
    pub fn next_attempt(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }
}

/// One row per completed attempt. Append-only; pruned by the retention
/// sweeper on `timestamp`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct DeliveryLog {
    pub id: Uuid,
    pub webhook_id: Uuid,
    pub subscription_id: Uuid,
    pub target_url: String,
    pub timestamp: DateTime<Utc>,
    pub attempt_number: i32,
    pub outcome: Outcome,
    pub status_code: Option<i32>,
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_attempt_increments_and_preserves_webhook_id() {
        let job = DeliveryJob::first_attempt(
            Uuid::new_v4(),
            serde_json::json!({"x": 1}),
            Some("order.created".to_string()),
            None,
            Uuid::new_v4(),
        );
        let retry = job.next_attempt();
        assert_eq!(retry.attempt, 2);
        assert_eq!(retry.webhook_id, job.webhook_id);
        assert_eq!(retry.subscription_id, job.subscription_id);
    }

    #[test]
    fn outcome_as_str_matches_wire_format() {
        assert_eq!(Outcome::Success.as_str(), "Success");
        assert_eq!(Outcome::FailedAttempt.as_str(), "Failed Attempt");
        assert_eq!(Outcome::Failure.as_str(), "Failure");
    }
}
