//! # Indexer Telemetry
//!
//! Logging and metrics for the reducer sync indexer.
//!
//! ## Components
//!
//! - **Logging**: `tracing-subscriber` with env-filter, pretty or JSON output
//! - **Metrics**: Prometheus counters and gauges, text exposition
//! - **Process**: resident memory sampling for per-event log lines
//!
//! ## Usage
//!
//! ```rust,ignore
//! use indexer_telemetry::{init_telemetry, TelemetryConfig};
//!
//! let _guard = init_telemetry(TelemetryConfig::from_env())?;
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `RSX_SERVICE_NAME` | `reducer-sync` | Service name in log lines |
//! | `RSX_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `RSX_JSON_LOGS` | `false` (true in containers) | JSON formatted logs |
//! | `RSX_METRICS` | `true` | Register Prometheus metrics |

mod config;
mod logging;
pub mod metrics;
mod process;

pub use config::TelemetryConfig;
pub use logging::{init_logging, LoggingGuard};
pub use metrics::{
    encode_metrics, register_metrics, MetricsHandle, BLOCKS_APPLIED, PROVIDER_CONNECTIONS,
    PROCESS_RESIDENT_MEMORY, REDUCER_ERRORS, REDUCER_SLOT, ROLLBACKS_APPLIED, STATE_FLUSHES,
};
pub use process::{last_resident_memory_bytes, resident_memory_bytes, sample_resident_memory};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Failed to initialize logging: {0}")]
    LoggingInit(String),

    #[error("Failed to initialize Prometheus metrics: {0}")]
    MetricsInit(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Initialize logging and, when enabled, metrics.
///
/// Returns a guard that must be held for the lifetime of the application.
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryGuard, TelemetryError> {
    let metrics = if config.metrics_enabled {
        Some(register_metrics()?)
    } else {
        None
    };

    let logging = init_logging(&config)?;
    sample_resident_memory();

    Ok(TelemetryGuard {
        _logging: logging,
        _metrics: metrics,
    })
}

/// Guard that keeps telemetry active.
pub struct TelemetryGuard {
    _logging: LoggingGuard,
    _metrics: Option<MetricsHandle>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        tracing::info!("Shutting down telemetry...");
    }
}

/// Log a reducer event with the standard fields.
///
/// `memory_bytes` is the value cached by the last
/// [`sample_resident_memory`] call.
///
/// ```rust,ignore
/// log_reducer_event!(info, "BlockReducer", "roll_forward", 1200, "Block applied", elapsed_ms = 3);
/// ```
#[macro_export]
macro_rules! log_reducer_event {
    ($level:ident, $reducer:expr, $action:expr, $slot:expr, $msg:expr $(, $($field:tt)*)?) => {
        tracing::$level!(
            reducer = %$reducer,
            action = $action,
            slot = $slot,
            memory_bytes = $crate::last_resident_memory_bytes(),
            $($($field)*,)?
            $msg
        )
    };
}
