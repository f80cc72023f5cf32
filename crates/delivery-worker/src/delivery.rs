//! Outbound webhook HTTP delivery — spec.md §6.3.
//!
//! Grounded on the teacher's `webhook-delivery/src/delivery.rs` `deliver()`:
//! same shared-client-with-timeout shape, same "read a capped slice of the
//! response body for logging only" behavior. HMAC signing is dropped (the
//! system forwards an opaque `X-Signature` header verbatim rather than
//! computing one, per spec.md's Non-goals).

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::{debug, warn};

use hookrelay_domain::DeliveryJob;

/// Response body reads are capped at 10 KB; only used for logging, never
/// inspected for delivery-outcome decisions.
const RESPONSE_BODY_CAP: usize = 10_000;

pub struct AttemptResult {
    pub success: bool,
    pub status_code: Option<i32>,
    pub error: Option<String>,
    pub duration: Duration,
}

pub struct WebhookDelivery {
    client: Client,
}

impl WebhookDelivery {
    pub fn new(http_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(http_timeout)
            .build()
            .context("failed to create HTTP client")?;

        Ok(Self { client })
    }

    /// Send one delivery attempt to `target_url`. Any HTTP status in
    /// [200, 299] is success; everything else — including 3xx — and any
    /// network/timeout/DNS error is a transient failure.
    pub async fn attempt(&self, job: &DeliveryJob, target_url: &str) -> AttemptResult {
        let start = Instant::now();

        let mut request = self.client.post(target_url);

        if let Some(event_type) = &job.event_type {
            request = request.header("X-Event-Type", event_type);
        }
        if let Some(signature) = &job.signature {
            request = request.header("X-Signature", signature);
        }

        debug!(webhook_id = %job.webhook_id, attempt = job.attempt, target_url, "sending delivery attempt");

        let response = request.json(&job.payload).send().await;
        let duration = start.elapsed();

        match response {
            Ok(response) => {
                let status = response.status();
                let status_code = status.as_u16() as i32;

                let body_preview = response
                    .text()
                    .await
                    .ok()
                    .map(|body| body.chars().take(RESPONSE_BODY_CAP).collect::<String>());
                drop(body_preview);

                let success = status.is_success();
                if !success {
                    warn!(
                        webhook_id = %job.webhook_id,
                        attempt = job.attempt,
                        status_code,
                        "delivery attempt returned non-2xx"
                    );
                }

                AttemptResult {
                    success,
                    status_code: Some(status_code),
                    error: if success {
                        None
                    } else {
                        Some(format!("HTTP {status_code}"))
                    },
                    duration,
                }
            }
            Err(err) => {
                warn!(webhook_id = %job.webhook_id, attempt = job.attempt, %err, "delivery attempt failed");
                AttemptResult {
                    success: false,
                    status_code: None,
                    error: Some(err.to_string()),
                    duration,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_webhook_delivery_creation() {
        let result = WebhookDelivery::new(Duration::from_secs(5));
        assert!(result.is_ok());
    }
}
