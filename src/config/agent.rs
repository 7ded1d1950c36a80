//! Node agent configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::read_optional;
use super::validation::ConfigError;

/// Default listen address of the agent.
pub const DEFAULT_AGENT_LISTEN_ADDR: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 9876);

/// Default host sampling period in seconds.
pub const DEFAULT_REFRESH_WINDOW_SECONDS: i64 = 2;

/// Agent configuration. Every key is optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Bind address (default: "0.0.0.0:9876").
    pub listen_addr: String,

    /// Reported hostname instead of the system one.
    pub hostname_override: Option<String>,

    /// Seconds between host samples (default: 2).
    pub refresh_window_seconds: i64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_AGENT_LISTEN_ADDR.to_string(),
            hostname_override: None,
            refresh_window_seconds: DEFAULT_REFRESH_WINDOW_SECONDS,
        }
    }
}

impl AgentConfig {
    /// Load configuration from a YAML file; a missing file yields the defaults.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        match read_optional(path.as_ref())? {
            Some(content) => Self::from_yaml(&content),
            None => Ok(Self::default()),
        }
    }

    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.normalize();
        Ok(config)
    }

    /// Replace out-of-range values with defaults.
    pub fn normalize(&mut self) {
        if self.listen_addr.trim().parse::<SocketAddr>().is_err() {
            tracing::warn!(
                listen_addr = %self.listen_addr,
                default = %DEFAULT_AGENT_LISTEN_ADDR,
                "Invalid listen address, using default"
            );
            self.listen_addr = DEFAULT_AGENT_LISTEN_ADDR.to_string();
        }

        if self.refresh_window_seconds <= 0 {
            tracing::warn!(
                refresh_window_seconds = self.refresh_window_seconds,
                default = DEFAULT_REFRESH_WINDOW_SECONDS,
                "refresh_window_seconds must be positive, using default"
            );
            self.refresh_window_seconds = DEFAULT_REFRESH_WINDOW_SECONDS;
        }

        if self
            .hostname_override
            .as_deref()
            .is_some_and(|h| h.trim().is_empty())
        {
            self.hostname_override = None;
        }
    }

    pub fn socket_addr(&self) -> SocketAddr {
        self.listen_addr
            .trim()
            .parse()
            .unwrap_or(DEFAULT_AGENT_LISTEN_ADDR)
    }

    pub fn refresh_window(&self) -> Duration {
        u64::try_from(self.refresh_window_seconds)
            .ok()
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_REFRESH_WINDOW_SECONDS as u64))
    }
}
