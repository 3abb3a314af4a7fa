//! Engine configuration.

use std::time::Duration;

use serde::Deserialize;

/// Configuration for an [`Engine`](crate::Engine) and its tick loop.
///
/// Every field has a default, so a partial JSON document deserialises.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Target ticks per second. `None` runs ticks back to back.
    pub tick_rate: Option<f64>,
    /// Maximum number of ticks a single `start()` runs (0 = unlimited).
    pub max_ticks: u64,
    /// A system whose update phase takes longer than this is logged.
    pub slow_system_threshold_ms: u64,
    /// Upper bound on boundary application rounds. System initialisers may
    /// queue further mutations while a boundary is applied; each batch they
    /// produce is one more round.
    pub max_boundary_rounds: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_rate: Some(60.0),
            max_ticks: 0,
            slow_system_threshold_ms: 50,
            max_boundary_rounds: 16,
        }
    }
}

impl EngineConfig {
    /// Create a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the target tick rate. `None` disables pacing.
    #[must_use]
    pub fn with_tick_rate(mut self, tick_rate: Option<f64>) -> Self {
        self.tick_rate = tick_rate;
        self
    }

    /// Stop automatically after `max_ticks` ticks (0 = unlimited).
    #[must_use]
    pub fn with_max_ticks(mut self, max_ticks: u64) -> Self {
        self.max_ticks = max_ticks;
        self
    }

    /// Override the slow-system warning threshold.
    #[must_use]
    pub fn with_slow_system_threshold(mut self, threshold: Duration) -> Self {
        self.slow_system_threshold_ms = u64::try_from(threshold.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Override the bound on boundary application rounds.
    #[must_use]
    pub fn with_max_boundary_rounds(mut self, rounds: usize) -> Self {
        self.max_boundary_rounds = rounds;
        self
    }

    /// Duration of one tick at the configured rate, if pacing is enabled.
    #[must_use]
    pub fn tick_duration(&self) -> Option<Duration> {
        self.tick_rate
            .filter(|rate| rate.is_finite() && *rate > 0.0)
            .map(|rate| Duration::from_secs_f64(1.0 / rate))
    }

    #[must_use]
    pub fn slow_system_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_system_threshold_ms)
    }
}
