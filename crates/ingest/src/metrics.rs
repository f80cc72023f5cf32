/*!
 * Prometheus metrics for the ingest service.
 */

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounterVec, TextEncoder, opts, register_int_counter_vec};

lazy_static! {
    pub static ref INGESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        opts!("hookrelay_ingest_requests_total", "Total ingest requests by outcome"),
        &["outcome"]
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
