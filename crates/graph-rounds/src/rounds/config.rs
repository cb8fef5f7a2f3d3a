//! Round runtime configuration
//!
//! Parallelism, safety bounds and timeouts shared by the driver and the local
//! executor.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Round runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundConfig {
    /// Hard limit on rounds for any algorithm; exceeding it is an error
    pub max_rounds: usize,

    /// Number of parallel transform tasks per round
    pub parallelism: usize,

    /// Timeout for one transform or merge task
    #[serde(with = "humantime_serde")]
    pub task_timeout: Duration,

    /// Timeout for an entire run
    #[serde(with = "humantime_serde")]
    pub run_timeout: Duration,

    /// Log every round at info level
    pub tracing_enabled: bool,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            max_rounds: 1000,
            parallelism: num_cpus::get(),
            task_timeout: Duration::from_secs(300), // 5 min per task
            run_timeout: Duration::from_secs(3600), // 1 hour total
            tracing_enabled: true,
        }
    }
}

impl RoundConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the global round limit
    pub fn with_max_rounds(mut self, max: usize) -> Self {
        self.max_rounds = max;
        self
    }

    /// Set parallelism level
    pub fn with_parallelism(mut self, parallelism: usize) -> Self {
        self.parallelism = parallelism.max(1);
        self
    }

    /// Set per-task timeout
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    /// Set whole-run timeout
    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout = timeout;
        self
    }

    /// Enable or disable per-round logging
    pub fn with_tracing(mut self, enabled: bool) -> Self {
        self.tracing_enabled = enabled;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RoundConfig::default();
        assert_eq!(config.max_rounds, 1000);
        assert!(config.parallelism > 0);
        assert!(config.tracing_enabled);
    }

    #[test]
    fn test_config_builder() {
        let config = RoundConfig::default()
            .with_max_rounds(50)
            .with_parallelism(4)
            .with_task_timeout(Duration::from_secs(60))
            .with_run_timeout(Duration::from_secs(120));

        assert_eq!(config.max_rounds, 50);
        assert_eq!(config.parallelism, 4);
        assert_eq!(config.task_timeout, Duration::from_secs(60));
        assert_eq!(config.run_timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_parallelism_minimum() {
        let config = RoundConfig::default().with_parallelism(0);
        assert_eq!(config.parallelism, 1);
    }

    #[test]
    fn test_config_serialization() {
        let config = RoundConfig::default()
            .with_parallelism(2)
            .with_task_timeout(Duration::from_secs(90));
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"task_timeout\":\"1m 30s\""));

        let restored: RoundConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.parallelism, 2);
        assert_eq!(restored.task_timeout, Duration::from_secs(90));
    }
}
