//! # Reducer Sync Configuration
//!
//! Configuration for checkpointing, persistence cadence and bootstrap points.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shared_types::Point;

/// Cardano mainnet network magic.
pub const MAINNET_MAGIC: u64 = 764_824_073;

/// Default number of retained intersections per reducer.
pub const DEFAULT_ROLLBACK_BUFFER: usize = 1000;

/// Reducer sync configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Maximum number of retained intersections per reducer. Also the
    /// deepest rollback (in slots behind the high-water mark) that is
    /// tolerated before the process aborts.
    pub rollback_buffer: usize,

    /// Interval between checkpoint flushes, in milliseconds.
    pub flush_interval_ms: u64,

    /// Network magic passed to the chain provider.
    pub network_magic: u64,

    /// Global bootstrap point for reducers without stored state.
    /// `None` falls back to the provider tip.
    pub default_start: Option<Point>,

    /// Per-reducer bootstrap overrides, keyed by reducer name.
    pub start_overrides: HashMap<String, Point>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            rollback_buffer: DEFAULT_ROLLBACK_BUFFER,
            flush_interval_ms: 10_000,
            network_magic: MAINNET_MAGIC,
            default_start: None,
            start_overrides: HashMap::new(),
        }
    }
}

impl SyncConfig {
    /// Create a config for testing (small buffer, fast flush, origin start).
    pub fn for_testing() -> Self {
        Self {
            rollback_buffer: 20,
            flush_interval_ms: 50,
            network_magic: 42,
            default_start: Some(Point::origin()),
            start_overrides: HashMap::new(),
        }
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms.max(1))
    }

    pub fn with_rollback_buffer(mut self, rollback_buffer: usize) -> Self {
        self.rollback_buffer = rollback_buffer;
        self
    }

    pub fn with_start_override(mut self, reducer: impl Into<String>, point: Point) -> Self {
        self.start_overrides.insert(reducer.into(), point);
        self
    }

    /// Configured bootstrap point for `reducer`, override first.
    pub fn configured_start(&self, reducer: &str) -> Option<&Point> {
        self.start_overrides
            .get(reducer)
            .or(self.default_start.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SyncConfig::default();
        assert_eq!(config.rollback_buffer, DEFAULT_ROLLBACK_BUFFER);
        assert_eq!(config.network_magic, MAINNET_MAGIC);
        assert_eq!(config.flush_interval(), Duration::from_secs(10));
        assert!(config.default_start.is_none());
    }

    #[test]
    fn test_override_wins_over_default() {
        let config = SyncConfig::for_testing().with_start_override("Prices", Point::new(77, "aa"));

        assert_eq!(config.configured_start("Prices"), Some(&Point::new(77, "aa")));
        assert_eq!(config.configured_start("Balances"), Some(&Point::origin()));
    }

    #[test]
    fn test_zero_flush_interval_is_clamped() {
        let config = SyncConfig {
            flush_interval_ms: 0,
            ..SyncConfig::default()
        };
        assert_eq!(config.flush_interval(), Duration::from_millis(1));
    }
}
