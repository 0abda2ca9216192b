// Scheduler configuration

use std::time::Duration;

use calendar_core::config::env_or;
use serde::{Deserialize, Serialize};

/// Largest purge age: 100 years.
pub const MAX_CLEAN_THRESHOLD_DAYS: u32 = 36_500;

/// Scheduler timing configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Scan period; also the width of each scan window
    pub scan_interval: Duration,

    /// Purge period
    pub clean_interval: Duration,

    /// Events starting more than this many days ago are purged
    pub clean_threshold_days: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            scan_interval: Duration::from_secs(60),
            clean_interval: Duration::from_secs(3600),
            clean_threshold_days: 365,
        }
    }
}

impl SchedulerConfig {
    /// Create configuration from environment variables
    ///
    /// Environment variables:
    /// - `SCAN_INTERVAL_SECS` (default: 60)
    /// - `CLEAN_INTERVAL_SECS` (default: 3600)
    /// - `CLEAN_THRESHOLD_DAYS` (default: 365)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self::default()
            .with_scan_interval(Duration::from_secs(env_or(
                "SCAN_INTERVAL_SECS",
                defaults.scan_interval.as_secs(),
            )))
            .with_clean_interval(Duration::from_secs(env_or(
                "CLEAN_INTERVAL_SECS",
                defaults.clean_interval.as_secs(),
            )))
            .with_clean_threshold_days(env_or(
                "CLEAN_THRESHOLD_DAYS",
                defaults.clean_threshold_days,
            ))
    }

    /// Set scan interval. Zero is raised to one second.
    pub fn with_scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval.max(Duration::from_secs(1));
        self
    }

    /// Set purge interval. Zero is raised to one second.
    pub fn with_clean_interval(mut self, interval: Duration) -> Self {
        self.clean_interval = interval.max(Duration::from_secs(1));
        self
    }

    /// Set purge age. Capped at `MAX_CLEAN_THRESHOLD_DAYS`.
    pub fn with_clean_threshold_days(mut self, days: u32) -> Self {
        self.clean_threshold_days = days.min(MAX_CLEAN_THRESHOLD_DAYS);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchedulerConfig::default();
        assert_eq!(config.scan_interval, Duration::from_secs(60));
        assert_eq!(config.clean_interval, Duration::from_secs(3600));
        assert_eq!(config.clean_threshold_days, 365);
    }

    #[test]
    fn test_config_builder() {
        let config = SchedulerConfig::default()
            .with_scan_interval(Duration::ZERO)
            .with_clean_interval(Duration::from_secs(30))
            .with_clean_threshold_days(7);

        assert_eq!(config.scan_interval, Duration::from_secs(1));
        assert_eq!(config.clean_interval, Duration::from_secs(30));
        assert_eq!(config.clean_threshold_days, 7);
    }

    #[test]
    fn test_clean_threshold_is_capped() {
        let config = SchedulerConfig::default().with_clean_threshold_days(u32::MAX);
        assert_eq!(config.clean_threshold_days, MAX_CLEAN_THRESHOLD_DAYS);
    }
}
