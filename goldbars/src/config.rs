//! Solver tuning knobs

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

const ENV_MAX_TRIES: &str = "GOLDBARS_MAX_TRIES";
const ENV_POLL_ATTEMPTS: &str = "GOLDBARS_POLL_ATTEMPTS";
const ENV_POLL_INTERVAL_MS: &str = "GOLDBARS_POLL_INTERVAL_MS";

/// Limits applied to one solving session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Ceiling on weighings that narrow the candidate set
    pub max_tries: u32,
    /// How many times to check for a new result after clicking weigh
    pub poll_attempts: u32,
    /// Delay between those checks in milliseconds
    pub poll_interval_ms: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            max_tries: 10,
            poll_attempts: 4,
            poll_interval_ms: 1000,
        }
    }
}

impl SolverConfig {
    /// Defaults, overridden by `GOLDBARS_*` environment variables when they parse.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(v) = env_number(ENV_MAX_TRIES) {
            config.max_tries = v;
        }
        if let Some(v) = env_number(ENV_POLL_ATTEMPTS) {
            config.poll_attempts = v;
        }
        if let Some(v) = env_number(ENV_POLL_INTERVAL_MS) {
            config.poll_interval_ms = v;
        }
        config
    }

    pub fn with_max_tries(mut self, max_tries: u32) -> Self {
        self.max_tries = max_tries;
        self
    }

    pub fn with_poll_attempts(mut self, poll_attempts: u32) -> Self {
        self.poll_attempts = poll_attempts;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn env_number<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse::<T>() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(variable = name, value = %raw, "Ignoring unparsable config override");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_puzzle_driver() {
        let config = SolverConfig::default();
        assert_eq!(config.max_tries, 10);
        assert_eq!(config.poll_attempts, 4);
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let config: SolverConfig = serde_json::from_str(r#"{"max_tries": 3}"#).unwrap();
        assert_eq!(config.max_tries, 3);
        assert_eq!(config.poll_attempts, 4);
        assert_eq!(config.poll_interval_ms, 1000);
    }

    #[test]
    fn builder_setters() {
        let config = SolverConfig::default()
            .with_max_tries(2)
            .with_poll_attempts(1)
            .with_poll_interval(Duration::from_millis(5));
        assert_eq!(config.max_tries, 2);
        assert_eq!(config.poll_attempts, 1);
        assert_eq!(config.poll_interval_ms, 5);
    }

    #[test]
    fn huge_poll_interval_saturates() {
        let config = SolverConfig::default().with_poll_interval(Duration::MAX);
        assert_eq!(config.poll_interval_ms, u64::MAX);
    }

    #[test]
    fn env_overrides_are_applied_and_garbage_ignored() {
        std::env::set_var(ENV_MAX_TRIES, "7");
        std::env::set_var(ENV_POLL_ATTEMPTS, "not-a-number");
        let config = SolverConfig::from_env();
        std::env::remove_var(ENV_MAX_TRIES);
        std::env::remove_var(ENV_POLL_ATTEMPTS);
        assert_eq!(config.max_tries, 7);
        assert_eq!(config.poll_attempts, 4);
    }
}
