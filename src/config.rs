//! # Configuration Module
//!
//! Loads run settings from `GRAPH_ROUNDS_*` environment variables (and a
//! `.env` file when present) and turns them into a [`RoundConfig`].

use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

use graph_rounds::RoundConfig;

// =============================================================================
// CONFIGURATION STRUCT
// =============================================================================
/// Settings shared by every subcommand
#[derive(Debug, Clone)]
pub struct Config {
    /// Transform/merge tasks per round; `None` uses the number of CPUs
    pub parallelism: Option<usize>,

    /// Global safety limit on rounds
    pub max_rounds: usize,

    /// Per-task timeout
    pub task_timeout: Duration,

    /// Whole-run timeout
    pub run_timeout: Duration,

    /// Log one line per finished round
    pub round_logging: bool,
}

impl Default for Config {
    fn default() -> Self {
        let defaults = RoundConfig::default();
        Self {
            parallelism: None,
            max_rounds: defaults.max_rounds,
            task_timeout: defaults.task_timeout,
            run_timeout: defaults.run_timeout,
            round_logging: defaults.tracing_enabled,
        }
    }
}

// =============================================================================
// CONFIGURATION LOADING
// =============================================================================
impl Config {
    /// Load configuration from the environment, reading `.env` first if present
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(val) = lookup("GRAPH_ROUNDS_PARALLELISM") {
            config.parallelism = Some(
                val.parse()
                    .context("GRAPH_ROUNDS_PARALLELISM must be a positive integer")?,
            );
        }

        if let Some(val) = lookup("GRAPH_ROUNDS_MAX_ROUNDS") {
            config.max_rounds = val
                .parse()
                .context("GRAPH_ROUNDS_MAX_ROUNDS must be a positive integer")?;
        }

        if let Some(val) = lookup("GRAPH_ROUNDS_TASK_TIMEOUT_SECS") {
            let secs: u64 = val
                .parse()
                .context("GRAPH_ROUNDS_TASK_TIMEOUT_SECS must be a whole number of seconds")?;
            config.task_timeout = Duration::from_secs(secs);
        }

        if let Some(val) = lookup("GRAPH_ROUNDS_RUN_TIMEOUT_SECS") {
            let secs: u64 = val
                .parse()
                .context("GRAPH_ROUNDS_RUN_TIMEOUT_SECS must be a whole number of seconds")?;
            config.run_timeout = Duration::from_secs(secs);
        }

        if let Some(val) = lookup("GRAPH_ROUNDS_ROUND_LOGGING") {
            config.round_logging = val
                .parse()
                .context("GRAPH_ROUNDS_ROUND_LOGGING must be true or false")?;
        }

        Ok(config)
    }

    /// Validate the configuration before any work starts
    pub fn validate(&self) -> Result<()> {
        if self.parallelism == Some(0) {
            anyhow::bail!("GRAPH_ROUNDS_PARALLELISM must be at least 1");
        }
        if self.max_rounds == 0 {
            anyhow::bail!("GRAPH_ROUNDS_MAX_ROUNDS must be at least 1");
        }
        if self.task_timeout.is_zero() || self.run_timeout.is_zero() {
            anyhow::bail!("Timeouts must be greater than zero");
        }
        Ok(())
    }

    /// Driver and executor settings
    pub fn round_config(&self) -> RoundConfig {
        let mut config = RoundConfig::default()
            .with_max_rounds(self.max_rounds)
            .with_task_timeout(self.task_timeout)
            .with_run_timeout(self.run_timeout)
            .with_tracing(self.round_logging);
        if let Some(parallelism) = self.parallelism {
            config = config.with_parallelism(parallelism);
        }
        config
    }
}

// =============================================================================
// UNIT TESTS
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.parallelism, None);
        assert_eq!(config.max_rounds, 1000);
        assert_eq!(config.task_timeout, Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides_from_lookup() {
        let config = Config::from_lookup(lookup(&[
            ("GRAPH_ROUNDS_PARALLELISM", "3"),
            ("GRAPH_ROUNDS_MAX_ROUNDS", "50"),
            ("GRAPH_ROUNDS_TASK_TIMEOUT_SECS", "10"),
            ("GRAPH_ROUNDS_ROUND_LOGGING", "false"),
        ]))
        .unwrap();

        assert_eq!(config.parallelism, Some(3));
        let rounds = config.round_config();
        assert_eq!(rounds.parallelism, 3);
        assert_eq!(rounds.max_rounds, 50);
        assert_eq!(rounds.task_timeout, Duration::from_secs(10));
        assert!(!rounds.tracing_enabled);
    }

    #[test]
    fn test_invalid_number_is_rejected() {
        let err = Config::from_lookup(lookup(&[("GRAPH_ROUNDS_MAX_ROUNDS", "many")])).unwrap_err();
        assert!(err.to_string().contains("GRAPH_ROUNDS_MAX_ROUNDS"));
    }

    #[test]
    fn test_config_validation_zero_rounds() {
        let mut config = Config::default();
        config.max_rounds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validation_zero_parallelism() {
        let config = Config {
            parallelism: Some(0),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }
}
