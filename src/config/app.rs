//! Collector service configuration.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::collector::ProbeTimings;
use crate::storage::{DEFAULT_HISTORY_LIMIT, NodeSpec};

use super::read_optional;
use super::validation::{ConfigError, validate_nodes};

// =============================================================================
// Constants
// =============================================================================

/// Default listen address of the query/export server.
pub const DEFAULT_LISTEN_ADDR: SocketAddr =
    SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 8080);

/// Default refresh interval in seconds.
pub const DEFAULT_REFRESH_SECONDS: i64 = 2;

const DEFAULT_GROUP: &str = "default";

// =============================================================================
// Application Configuration
// =============================================================================

/// Top-level collector configuration.
///
/// Every key is optional. Out-of-range scalars fall back to their defaults
/// (see [`AppConfig::normalize`]); problems with the node list are fatal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Server bind address (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Seconds between probe rounds (default: 2).
    pub refresh_seconds: i64,

    /// Samples kept per node (default: 500).
    pub history_limit: i64,

    /// Monitored nodes, in display order.
    pub nodes: Vec<NodeSpec>,

    /// Probe time budgets.
    pub probe: ProbeTimings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen_addr: DEFAULT_LISTEN_ADDR.to_string(),
            refresh_seconds: DEFAULT_REFRESH_SECONDS,
            history_limit: DEFAULT_HISTORY_LIMIT as i64,
            nodes: Vec::new(),
            probe: ProbeTimings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// A missing file yields the defaults.
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, parsed, or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        match read_optional(path.as_ref())? {
            Some(content) => Self::from_yaml(&content),
            None => Ok(Self::default()),
        }
    }

    /// Parse, normalize and validate a YAML document.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if content.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(content)?
        };
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Replace out-of-range scalars with defaults.
    pub fn normalize(&mut self) {
        if self.listen_addr.trim().parse::<SocketAddr>().is_err() {
            tracing::warn!(
                listen_addr = %self.listen_addr,
                default = %DEFAULT_LISTEN_ADDR,
                "Invalid listen address, using default"
            );
            self.listen_addr = DEFAULT_LISTEN_ADDR.to_string();
        }

        if self.refresh_seconds <= 0 {
            tracing::warn!(
                refresh_seconds = self.refresh_seconds,
                default = DEFAULT_REFRESH_SECONDS,
                "refresh_seconds must be positive, using default"
            );
            self.refresh_seconds = DEFAULT_REFRESH_SECONDS;
        }

        if self.history_limit <= 0 {
            tracing::warn!(
                history_limit = self.history_limit,
                default = DEFAULT_HISTORY_LIMIT,
                "history_limit must be positive, using default"
            );
            self.history_limit = DEFAULT_HISTORY_LIMIT as i64;
        }

        for node in &mut self.nodes {
            if node.group.trim().is_empty() {
                node.group = DEFAULT_GROUP.to_string();
            }
        }
    }

    /// Validate configuration values.
    ///
    /// # Errors
    /// Returns `ConfigError::ValidationError` if any field is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_nodes(&self.nodes)?;

        let budgets = [
            ("connect_timeout", self.probe.connect_timeout),
            ("fetch_timeout", self.probe.fetch_timeout),
            ("deadline", self.probe.deadline),
        ];
        for (field, budget) in budgets {
            if budget.is_zero() {
                return Err(ConfigError::ValidationError(format!(
                    "probe {} must be non-zero",
                    field
                )));
            }
        }

        Ok(())
    }

    /// Parsed listen address.
    pub fn socket_addr(&self) -> SocketAddr {
        self.listen_addr
            .trim()
            .parse()
            .unwrap_or(DEFAULT_LISTEN_ADDR)
    }

    /// Period between probe rounds.
    pub fn refresh_interval(&self) -> Duration {
        u64::try_from(self.refresh_seconds)
            .ok()
            .filter(|s| *s > 0)
            .map(Duration::from_secs)
            .unwrap_or(Duration::from_secs(DEFAULT_REFRESH_SECONDS as u64))
    }

    /// Per-node history capacity.
    pub fn history_capacity(&self) -> usize {
        usize::try_from(self.history_limit)
            .ok()
            .filter(|n| *n > 0)
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{NamedTempFile, tempdir};

    const SAMPLE: &str = r#"
listen_addr: "127.0.0.1:9000"
refresh_seconds: 5
history_limit: 120
probe:
  connect_timeout: 500ms
  deadline: 2s
nodes:
  - name: web-1
    url: http://10.0.0.1:9876
    group: edge
    alerts:
      cpu_pct: 90
      disk_pct: 85.5
  - name: db-1
    url: http://10.0.0.2:9876
"#;

    fn write_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();
        assert_eq!(config.socket_addr(), DEFAULT_LISTEN_ADDR);
        assert_eq!(config.refresh_interval(), Duration::from_secs(2));
        assert_eq!(config.history_capacity(), 500);
        assert!(config.nodes.is_empty());
        assert_eq!(config.probe, ProbeTimings::default());
    }

    #[test]
    fn test_load_full_config() {
        let file = write_config(SAMPLE);
        let config = AppConfig::load(file.path()).unwrap();

        assert_eq!(config.socket_addr(), "127.0.0.1:9000".parse().unwrap());
        assert_eq!(config.refresh_interval(), Duration::from_secs(5));
        assert_eq!(config.history_capacity(), 120);

        assert_eq!(config.probe.connect_timeout, Duration::from_millis(500));
        assert_eq!(config.probe.fetch_timeout, Duration::from_secs(3));
        assert_eq!(config.probe.deadline, Duration::from_secs(2));

        assert_eq!(config.nodes.len(), 2);
        assert_eq!(config.nodes[0].group, "edge");
        let alerts = config.nodes[0].alerts.unwrap();
        assert_eq!(alerts.cpu_pct, Some(90.0));
        assert_eq!(alerts.disk_pct, Some(85.5));
        assert_eq!(alerts.mem_pct, None);
        assert_eq!(config.nodes[1].group, "default");
        assert!(config.nodes[1].alerts.is_none());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = AppConfig::load(dir.path().join("absent.yaml")).unwrap();
        assert_eq!(config.socket_addr(), DEFAULT_LISTEN_ADDR);
        assert!(config.nodes.is_empty());
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let file = write_config("");
        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.history_capacity(), 500);
    }

    #[test]
    fn test_invalid_yaml_is_fatal() {
        let file = write_config("nodes: [unclosed");
        let err = AppConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_out_of_range_scalars_fall_back() {
        let config = AppConfig::from_yaml(
            "listen_addr: not-an-address\nrefresh_seconds: 0\nhistory_limit: -3\n",
        )
        .unwrap();

        assert_eq!(config.listen_addr, DEFAULT_LISTEN_ADDR.to_string());
        assert_eq!(config.refresh_seconds, DEFAULT_REFRESH_SECONDS);
        assert_eq!(config.history_capacity(), DEFAULT_HISTORY_LIMIT);
    }

    #[test]
    fn test_empty_group_becomes_default() {
        let config = AppConfig::from_yaml(
            "nodes:\n  - name: a\n    url: http://10.0.0.1:9876\n    group: \"\"\n",
        )
        .unwrap();
        assert_eq!(config.nodes[0].group, "default");
    }

    #[test]
    fn test_duplicate_node_names_rejected() {
        let yaml = "nodes:\n  - {name: a, url: 'http://10.0.0.1'}\n  - {name: a, url: 'http://10.0.0.2'}\n";
        let err = AppConfig::from_yaml(yaml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_bad_node_url_rejected() {
        let yaml = "nodes:\n  - {name: a, url: '10.0.0.1:9876'}\n";
        let err = AppConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("node 'a'"));
    }

    #[test]
    fn test_zero_probe_budget_rejected() {
        let err = AppConfig::from_yaml("probe:\n  deadline: 0s\n").unwrap_err();
        assert!(err.to_string().contains("deadline"));
    }
}
