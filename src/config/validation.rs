//! Configuration validation utilities.

use std::collections::HashSet;

use thiserror::Error;
use url::Url;

use crate::storage::{AlertThresholds, NodeSpec};

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse YAML configuration.
    #[error("failed to parse YAML config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Configuration validation failed.
    #[error("config validation error: {0}")]
    ValidationError(String),
}

/// Check that a node base address is an absolute http(s) URL with a host.
///
/// # Examples
///
/// ```
/// use nodewatch::config::validate_node_url;
///
/// assert!(validate_node_url("http://10.0.0.5:9876").is_ok());
/// assert!(validate_node_url("10.0.0.5:9876").is_err());
/// assert!(validate_node_url("ftp://10.0.0.5").is_err());
/// ```
pub fn validate_node_url(raw: &str) -> Result<(), String> {
    let url = Url::parse(raw).map_err(|e| format!("invalid url '{}': {}", raw, e))?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(format!("unsupported scheme '{}' in '{}'", other, raw)),
    }

    if url.host_str().is_none_or(str::is_empty) {
        return Err(format!("missing host in '{}'", raw));
    }

    Ok(())
}

fn validate_thresholds(node: &str, alerts: &AlertThresholds) -> Result<(), ConfigError> {
    let ceilings = [
        ("cpu_pct", alerts.cpu_pct),
        ("mem_pct", alerts.mem_pct),
        ("disk_pct", alerts.disk_pct),
        ("tx_bps", alerts.tx_bps),
        ("rx_bps", alerts.rx_bps),
    ];

    for (field, value) in ceilings {
        if let Some(v) = value
            && (!v.is_finite() || v < 0.0)
        {
            return Err(ConfigError::ValidationError(format!(
                "node '{}': alert {} must be a non-negative number, got {}",
                node, field, v
            )));
        }
    }

    Ok(())
}

/// Validate the node list: non-empty unique names, usable URLs, sane alert ceilings.
pub fn validate_nodes(nodes: &[NodeSpec]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for node in nodes {
        if node.name.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "node name must not be empty".to_string(),
            ));
        }

        if !seen.insert(node.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "duplicate node name: '{}'",
                node.name
            )));
        }

        validate_node_url(&node.url)
            .map_err(|e| ConfigError::ValidationError(format!("node '{}': {}", node.name, e)))?;

        if let Some(alerts) = &node.alerts {
            validate_thresholds(&node.name, alerts)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_node_url() {
        assert!(validate_node_url("http://127.0.0.1").is_ok());
        assert!(validate_node_url("https://node.example.com:9876/").is_ok());

        assert!(validate_node_url("").is_err());
        assert!(validate_node_url("not a url").is_err());
        assert!(
            validate_node_url("tcp://127.0.0.1:9876")
                .unwrap_err()
                .contains("unsupported scheme")
        );
    }

    #[test]
    fn test_validate_nodes_duplicates() {
        let nodes = vec![
            NodeSpec::new("a", "http://10.0.0.1:9876"),
            NodeSpec::new("a", "http://10.0.0.2:9876"),
        ];
        let err = validate_nodes(&nodes).unwrap_err();
        assert!(err.to_string().contains("duplicate node name"));
    }

    #[test]
    fn test_validate_nodes_empty_name() {
        let nodes = vec![NodeSpec::new("  ", "http://10.0.0.1:9876")];
        assert!(validate_nodes(&nodes).is_err());
    }

    #[test]
    fn test_validate_nodes_negative_alert() {
        let nodes = vec![NodeSpec::new("a", "http://10.0.0.1:9876").with_alerts(
            AlertThresholds {
                mem_pct: Some(-1.0),
                ..Default::default()
            },
        )];
        let err = validate_nodes(&nodes).unwrap_err();
        assert!(err.to_string().contains("mem_pct"));
    }

    #[test]
    fn test_validate_nodes_ok() {
        let nodes = vec![
            NodeSpec::new("a", "http://10.0.0.1:9876"),
            NodeSpec::new("b", "http://10.0.0.2").with_group("db"),
        ];
        assert!(validate_nodes(&nodes).is_ok());
        assert!(validate_nodes(&[]).is_ok());
    }
}
