/*!
 * Prometheus metrics for the retention sweeper.
 */

use lazy_static::lazy_static;
use prometheus::{Encoder, IntCounter, IntCounterVec, TextEncoder, opts, register_int_counter, register_int_counter_vec};

lazy_static! {
    pub static ref SWEEPS_TOTAL: IntCounterVec = register_int_counter_vec!(
        opts!("hookrelay_sweeps_total", "Retention sweeps by outcome"),
        &["outcome"]
    )
    .expect("metric can be created");
    pub static ref ROWS_DELETED_TOTAL: IntCounter = register_int_counter!(
        "hookrelay_sweep_rows_deleted_total",
        "Total delivery_logs rows deleted by the retention sweeper"
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
