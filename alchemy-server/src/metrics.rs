//! Prometheus metrics for alchemy-server.
//!
//! Provides metrics collection and a Prometheus-compatible `/metrics` endpoint.

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

const PROGRESS_LOADS_TOTAL: &str = "alchemy_progress_loads_total";
const PROGRESS_SAVES_TOTAL: &str = "alchemy_progress_saves_total";
const PROGRESS_SAVE_BYTES: &str = "alchemy_progress_save_bytes";
const PROGRESS_RECORDS: &str = "alchemy_progress_records";
const VALIDATION_FAILURES_TOTAL: &str = "alchemy_validation_failures_total";

/// Initialize metrics and return the Prometheus handle.
///
/// # Errors
///
/// Returns an error if the Prometheus recorder cannot be installed
/// (e.g., if another recorder is already installed).
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Record a progress load.
///
/// # Arguments
///
/// * `anonymous` - Whether the request carried no user id
pub fn record_load(anonymous: bool) {
    counter!(PROGRESS_LOADS_TOTAL, "anonymous" => anonymous.to_string()).increment(1);
}

/// Record a progress save.
///
/// # Arguments
///
/// * `outcome` - "stored", "too_large", "anonymous" or "failed"
/// * `size` - Serialized record size in bytes, when known
#[allow(clippy::cast_precision_loss)]
pub fn record_save(outcome: &'static str, size: Option<usize>) {
    counter!(PROGRESS_SAVES_TOTAL, "outcome" => outcome).increment(1);
    if let Some(size) = size {
        histogram!(PROGRESS_SAVE_BYTES).record(size as f64);
    }
}

/// Update the number of records held in memory.
#[allow(clippy::cast_precision_loss)]
pub fn set_records(count: usize) {
    gauge!(PROGRESS_RECORDS).set(count as f64);
}

/// Record an input validation failure.
///
/// # Arguments
///
/// * `validation_type` - Type of validation that failed (user_id, scope)
pub fn record_validation_failure(validation_type: &'static str) {
    counter!(VALIDATION_FAILURES_TOTAL, "type" => validation_type).increment(1);
}
