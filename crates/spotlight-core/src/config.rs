//! Query and poll-loop configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::limits::{self, ValidationError};
use crate::value::attributes;

/// Poll loop settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollConfig {
    /// Milliseconds between poll ticks
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Upper bound for a single run-loop service call (0 = return immediately)
    #[serde(default)]
    pub run_timeout_ms: u64,
}

fn default_interval_ms() -> u64 {
    limits::DEFAULT_POLL_INTERVAL_MS
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            run_timeout_ms: 0,
        }
    }
}

impl PollConfig {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval_ms: u64::try_from(interval.as_millis()).unwrap_or(u64::MAX),
            ..Default::default()
        }
    }

    pub fn with_run_timeout(mut self, timeout: Duration) -> Self {
        self.run_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.run_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        limits::validate_poll_interval(self.interval_ms)?;
        limits::validate_run_timeout(self.run_timeout_ms)
    }
}

/// Settings shared by every query created from one hub
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Attribute read from each result during extraction
    #[serde(default = "default_attribute")]
    pub attribute: String,

    #[serde(default)]
    pub poll: PollConfig,
}

fn default_attribute() -> String {
    attributes::DISPLAY_NAME.to_string()
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            attribute: default_attribute(),
            poll: PollConfig::default(),
        }
    }
}

impl QueryConfig {
    pub fn with_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.attribute = attribute.into();
        self
    }

    pub fn with_poll(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        limits::validate_attribute(&self.attribute)?;
        self.poll.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = QueryConfig::default();
        assert_eq!(config.attribute, "kMDItemDisplayName");
        assert_eq!(config.poll.interval(), Duration::from_millis(50));
        assert_eq!(config.poll.run_timeout(), Duration::ZERO);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: QueryConfig = toml::from_str("attribute = \"kMDItemPath\"").unwrap();
        assert_eq!(config.attribute, "kMDItemPath");
        assert_eq!(config.poll, PollConfig::default());

        let config: QueryConfig = toml::from_str("[poll]\ninterval_ms = 10").unwrap();
        assert_eq!(config.poll.interval_ms, 10);
        assert_eq!(config.attribute, "kMDItemDisplayName");
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let config = QueryConfig::default().with_poll(PollConfig::new(Duration::ZERO));
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_huge_durations_saturate_and_fail_validation() {
        let poll = PollConfig::new(Duration::MAX).with_run_timeout(Duration::MAX);
        assert_eq!(poll.interval_ms, u64::MAX);
        assert_eq!(poll.run_timeout_ms, u64::MAX);
        assert!(poll.validate().is_err());

        let poll = PollConfig::new(Duration::from_millis(10)).with_run_timeout(Duration::MAX);
        assert!(poll.validate().is_err());
    }
}
