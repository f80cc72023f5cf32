/*!
 * Prometheus metrics for the delivery worker.
 */

use lazy_static::lazy_static;
use prometheus::{
    Encoder, HistogramVec, IntCounterVec, TextEncoder, opts, register_histogram_vec,
    register_int_counter_vec,
};

lazy_static! {
    pub static ref JOBS_CONSUMED_TOTAL: IntCounterVec = register_int_counter_vec!(
        opts!("hookrelay_delivery_jobs_consumed_total", "Total jobs consumed from the ready queue"),
        &["worker"]
    )
    .expect("metric can be created");

    pub static ref ATTEMPTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        opts!("hookrelay_delivery_attempts_total", "Total delivery attempts by outcome"),
        &["outcome"]
    )
    .expect("metric can be created");

    pub static ref ATTEMPT_DURATION: HistogramVec = register_histogram_vec!(
        "hookrelay_delivery_attempt_duration_seconds",
        "Delivery attempt duration in seconds",
        &["outcome"],
        vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    )
    .expect("metric can be created");

    pub static ref HTTP_RESPONSES_TOTAL: IntCounterVec = register_int_counter_vec!(
        opts!("hookrelay_delivery_http_responses_total", "Total HTTP responses by status code"),
        &["status_code"]
    )
    .expect("metric can be created");

    pub static ref RETRIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        opts!("hookrelay_delivery_retries_total", "Total retry re-enqueues"),
        &["subscription_id"]
    )
    .expect("metric can be created");
}

pub fn render_metrics() -> Result<String, Box<dyn std::error::Error>> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = vec![];
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
