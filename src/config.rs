//! Configuration module for nodewatch.
//!
//! Provides YAML-based configuration loading and validation for:
//! - The collector service (listen address, refresh, history, nodes, probe budgets)
//! - The node agent (listen address, hostname, sampling window)

mod agent;
mod app;
mod validation;

use std::path::Path;

pub use agent::{AgentConfig, DEFAULT_AGENT_LISTEN_ADDR, DEFAULT_REFRESH_WINDOW_SECONDS};
pub use app::{AppConfig, DEFAULT_LISTEN_ADDR, DEFAULT_REFRESH_SECONDS};
pub use validation::{ConfigError, validate_node_url, validate_nodes};

/// Read a config file, treating a missing file as "use defaults".
fn read_optional(path: &Path) -> Result<Option<String>, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(path = %path.display(), "Config file not found, using defaults");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}
