//! Prometheus metrics for the reducer sync indexer.
//!
//! All metrics follow the naming convention: `rsx_<area>_<metric>_<unit>`

use lazy_static::lazy_static;
use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, IntGaugeVec, Opts, Registry, TextEncoder,
};
use std::sync::Arc;

use crate::TelemetryError;

lazy_static! {
    /// Global metrics registry
    pub static ref REGISTRY: Registry = Registry::new();

    // =========================================================================
    // REDUCER METRICS
    // =========================================================================

    /// Blocks applied per reducer
    pub static ref BLOCKS_APPLIED: IntCounterVec = IntCounterVec::new(
        Opts::new("rsx_reducer_blocks_applied_total", "Blocks applied by each reducer"),
        &["reducer"]
    ).expect("metric creation failed");

    /// Rollbacks applied per reducer
    pub static ref ROLLBACKS_APPLIED: IntCounterVec = IntCounterVec::new(
        Opts::new("rsx_reducer_rollbacks_applied_total", "Rollbacks applied by each reducer"),
        &["reducer"]
    ).expect("metric creation failed");

    /// Latest checkpointed slot per reducer
    pub static ref REDUCER_SLOT: IntGaugeVec = IntGaugeVec::new(
        Opts::new("rsx_reducer_latest_slot", "Latest checkpointed slot of each reducer"),
        &["reducer"]
    ).expect("metric creation failed");

    /// Reducer failures by kind
    pub static ref REDUCER_ERRORS: IntCounterVec = IntCounterVec::new(
        Opts::new("rsx_reducer_errors_total", "Reducer failures by reducer and kind"),
        &["reducer", "kind"]  // kind: roll_forward/roll_backward/mass_rollback
    ).expect("metric creation failed");

    // =========================================================================
    // SYNC METRICS
    // =========================================================================

    /// Checkpoint rows written to the state store
    pub static ref STATE_FLUSHES: IntCounter = IntCounter::new(
        "rsx_sync_state_rows_flushed_total",
        "Reducer state rows written to durable storage"
    ).expect("metric creation failed");

    /// Upstream provider connections opened
    pub static ref PROVIDER_CONNECTIONS: IntCounterVec = IntCounterVec::new(
        Opts::new("rsx_sync_provider_connections_total", "Chain provider connections opened"),
        &["purpose"]  // purpose: sync/tip
    ).expect("metric creation failed");

    // =========================================================================
    // PROCESS METRICS
    // =========================================================================

    /// Resident memory at the last sample
    pub static ref PROCESS_RESIDENT_MEMORY: IntGauge = IntGauge::new(
        "rsx_process_resident_memory_bytes",
        "Resident set size at the last sample"
    ).expect("metric creation failed");
}

/// Handle keeping the registry alive
pub struct MetricsHandle {
    _registry: Arc<Registry>,
}

/// Register all metrics with the global registry.
///
/// Calling this more than once is harmless.
pub fn register_metrics() -> Result<MetricsHandle, TelemetryError> {
    let metrics: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(BLOCKS_APPLIED.clone()),
        Box::new(ROLLBACKS_APPLIED.clone()),
        Box::new(REDUCER_SLOT.clone()),
        Box::new(REDUCER_ERRORS.clone()),
        Box::new(STATE_FLUSHES.clone()),
        Box::new(PROVIDER_CONNECTIONS.clone()),
        Box::new(PROCESS_RESIDENT_MEMORY.clone()),
    ];

    for metric in metrics {
        match REGISTRY.register(metric) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(TelemetryError::MetricsInit(e.to_string())),
        }
    }

    Ok(MetricsHandle {
        _registry: Arc::new(REGISTRY.clone()),
    })
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> Result<String, TelemetryError> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    String::from_utf8(buffer).map_err(|e| TelemetryError::MetricsInit(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics_twice() {
        assert!(register_metrics().is_ok());
        assert!(register_metrics().is_ok());
    }

    #[test]
    fn test_counter_increment() {
        BLOCKS_APPLIED.with_label_values(&["TestReducer"]).inc();
        assert!(BLOCKS_APPLIED.with_label_values(&["TestReducer"]).get() >= 1);
    }

    #[test]
    fn test_gauge_set() {
        REDUCER_SLOT.with_label_values(&["GaugeReducer"]).set(42);
        assert_eq!(REDUCER_SLOT.with_label_values(&["GaugeReducer"]).get(), 42);
    }

    #[test]
    fn test_encode_contains_registered_metric() {
        register_metrics().unwrap();
        STATE_FLUSHES.inc();
        let text = encode_metrics().unwrap();
        assert!(text.contains("rsx_sync_state_rows_flushed_total"));
    }
}
