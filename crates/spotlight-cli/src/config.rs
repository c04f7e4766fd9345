//! CLI configuration file

use std::path::PathBuf;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use spotlight_core::limits::DEFAULT_POLL_INTERVAL_MS;
use spotlight_core::{attributes, PollConfig, QueryConfig};

/// Overrides the config file location
pub const CONFIG_ENV: &str = "SPOTLIGHT_CONFIG";

/// Path of the TOML config file
pub fn config_file_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("spotlight")
        .join("config.toml")
}

const FORMATS: &[&str] = &["table", "json", "csv"];

pub fn unknown_key(key: &str) -> anyhow::Error {
    anyhow::anyhow!(
        "Unknown config key: {} (available: {})",
        key,
        Config::keys().join(", ")
    )
}

/// Persisted CLI settings. Command-line flags take precedence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Attribute printed for each result
    pub attribute: String,
    pub poll_interval_ms: u64,
    pub run_timeout_ms: u64,
    /// Give up on a search after this many seconds
    pub timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub onlyin: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mdfind_path: Option<PathBuf>,
    pub format: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            attribute: attributes::DISPLAY_NAME.to_string(),
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            run_timeout_ms: 0,
            timeout_secs: 30,
            onlyin: None,
            mdfind_path: None,
            format: "table".to_string(),
        }
    }
}

impl Config {
    /// Load the config file, falling back to defaults if it is missing or
    /// unreadable.
    pub fn load() -> Self {
        let path = config_file_path();
        let Ok(contents) = std::fs::read_to_string(&path) else {
            return Self::default();
        };
        match toml::from_str(&contents) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Ignoring invalid config file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn save(&self) -> anyhow::Result<()> {
        let path = config_file_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(&path, contents).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    pub fn keys() -> &'static [&'static str] {
        &[
            "attribute",
            "poll_interval_ms",
            "run_timeout_ms",
            "timeout_secs",
            "onlyin",
            "mdfind_path",
            "format",
        ]
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let path = |p: &Option<PathBuf>| {
            p.as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(not set)".to_string())
        };
        match key {
            "attribute" => Some(self.attribute.clone()),
            "poll_interval_ms" => Some(self.poll_interval_ms.to_string()),
            "run_timeout_ms" => Some(self.run_timeout_ms.to_string()),
            "timeout_secs" => Some(self.timeout_secs.to_string()),
            "onlyin" => Some(path(&self.onlyin)),
            "mdfind_path" => Some(path(&self.mdfind_path)),
            "format" => Some(self.format.clone()),
            _ => None,
        }
    }

    /// Set one key from its string form. An empty value clears optional keys.
    ///
    /// The whole config is validated before the change is kept, so a
    /// rejected value leaves `self` untouched.
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let mut next = self.clone();
        next.assign(key, value)?;
        next.validate().with_context(|| format!("rejected {} = {}", key, value))?;
        *self = next;
        Ok(())
    }

    /// Put one key back to its default value
    pub fn reset(&mut self, key: &str) -> anyhow::Result<()> {
        let defaults = Self::default();
        match key {
            "attribute" => self.attribute = defaults.attribute,
            "poll_interval_ms" => self.poll_interval_ms = defaults.poll_interval_ms,
            "run_timeout_ms" => self.run_timeout_ms = defaults.run_timeout_ms,
            "timeout_secs" => self.timeout_secs = defaults.timeout_secs,
            "onlyin" => self.onlyin = None,
            "mdfind_path" => self.mdfind_path = None,
            "format" => self.format = defaults.format,
            _ => return Err(unknown_key(key)),
        }
        Ok(())
    }

    fn assign(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        let optional_path = |v: &str| (!v.is_empty()).then(|| PathBuf::from(v));
        let millis = |v: &str| {
            v.parse::<u64>()
                .with_context(|| format!("{} must be a whole number of milliseconds", key))
        };
        match key {
            "attribute" => self.attribute = value.to_string(),
            "poll_interval_ms" => self.poll_interval_ms = millis(value)?,
            "run_timeout_ms" => self.run_timeout_ms = millis(value)?,
            "timeout_secs" => {
                self.timeout_secs = value
                    .parse::<u64>()
                    .context("timeout_secs must be a whole number of seconds")?;
            }
            "onlyin" => self.onlyin = optional_path(value),
            "mdfind_path" => self.mdfind_path = optional_path(value),
            "format" => self.format = value.to_string(),
            _ => return Err(unknown_key(key)),
        }
        Ok(())
    }

    /// Check the query settings this file produces, plus the output format.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.query_config().validate()?;
        if !FORMATS.contains(&self.format.as_str()) {
            anyhow::bail!("format must be one of: {}", FORMATS.join(", "));
        }
        if self.timeout_secs == 0 {
            anyhow::bail!("timeout_secs must be at least 1");
        }
        Ok(())
    }

    pub fn query_config(&self) -> QueryConfig {
        QueryConfig::default()
            .with_attribute(&self.attribute)
            .with_poll(PollConfig {
                interval_ms: self.poll_interval_ms,
                run_timeout_ms: self.run_timeout_ms,
            })
    }
}
