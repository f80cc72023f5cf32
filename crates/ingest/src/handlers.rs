//! `POST /ingest/{subscription_id}` — spec.md §4.1/§6.1.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{info, warn};
use uuid::Uuid;

use hookrelay_domain::DeliveryJob;
use hookrelay_job_queue::JobQueue;
use hookrelay_subscription_cache::SubscriptionCache;

use crate::error::IngestError;
use crate::metrics::INGESTS_TOTAL;

pub struct AppState {
    pub cache: Mutex<SubscriptionCache>,
    pub queue: Mutex<JobQueue>,
}

/// 1. resolve subscription via SC; 2. parse JSON body; 3. generate
/// webhook_id; 4. enqueue onto JS with zero delay; 5. reply 202. The
/// enqueue happens before the reply is sent, so a 202 implies the job is
/// durably queued.
pub async fn ingest(
    State(state): State<Arc<AppState>>,
    Path(subscription_id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<serde_json::Value>), IngestError> {
    let subscription = {
        let mut cache = state.cache.lock().await;
        cache.get(subscription_id).await.map_err(|err| {
            IngestError::Internal(hookrelay_common::Error::Database(err))
        })?
    };

    let Some(_subscription) = subscription else {
        INGESTS_TOTAL.with_label_values(&["subscription_not_found"]).inc();
        warn!(%subscription_id, "ingest rejected: subscription not found");
        return Err(IngestError::SubscriptionNotFound);
    };

    let payload: serde_json::Value = serde_json::from_slice(&body).map_err(|err| {
        INGESTS_TOTAL.with_label_values(&["invalid_payload"]).inc();
        IngestError::InvalidPayload(err.to_string())
    })?;

    let event_type = header_value(&headers, "x-event-type");
    let signature = header_value(&headers, "x-signature");

    let webhook_id = Uuid::new_v4();
    let job = DeliveryJob {
        subscription_id,
        payload,
        event_type,
        signature,
        webhook_id,
        attempt: 1,
    };

    {
        let mut queue = state.queue.lock().await;
        queue
            .enqueue(job)
            .await
            .map_err(|err| IngestError::QueueUnavailable(anyhow::Error::from(err)))?;
    }

    INGESTS_TOTAL.with_label_values(&["enqueued"]).inc();
    info!(%subscription_id, %webhook_id, "ingested and enqueued delivery job");

    Ok((StatusCode::ACCEPTED, Json(json!({ "webhook_id": webhook_id }))))
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}
