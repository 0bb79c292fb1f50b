//! Loading topologies, scenarios, and engine configuration from disk
//!
//! Topologies and scenarios are JSON documents in the host application's
//! camelCase format. Engine configuration is TOML; missing keys fall back to
//! [`SimConfig::default`].

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;
use twin_core::Topology;

use crate::simulation::SimConfig;
use crate::types::Scenario;

/// Errors raised while reading input files
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Malformed TOML in {path}: {source}")]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Result type for loading operations
pub type ConfigResult<T> = Result<T, ConfigError>;

fn read(path: &Path) -> ConfigResult<String> {
    fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_json<T: serde::de::DeserializeOwned>(path: &Path) -> ConfigResult<T> {
    let text = read(path)?;
    serde_json::from_str(&text).map_err(|source| ConfigError::Json {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a topology document
///
/// Only the document shape is checked here; graph validation happens when a
/// run starts.
pub fn load_topology(path: impl AsRef<Path>) -> ConfigResult<Topology> {
    let path = path.as_ref();
    let topology: Topology = parse_json(path)?;
    debug!(
        path = %path.display(),
        nodes = topology.nodes.len(),
        links = topology.links.len(),
        "Loaded topology"
    );
    Ok(topology)
}

/// Load a scenario document
pub fn load_scenario(path: impl AsRef<Path>) -> ConfigResult<Scenario> {
    let path = path.as_ref();
    let scenario: Scenario = parse_json(path)?;
    debug!(path = %path.display(), scenario = %scenario.id, flows = scenario.flows.len(), "Loaded scenario");
    Ok(scenario)
}

/// Load engine configuration from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<SimConfig> {
    let path = path.as_ref();
    let text = read(path)?;
    SimConfig::from_toml(&text).map_err(|source| ConfigError::Toml {
        path: path.to_path_buf(),
        source,
    })
}

impl SimConfig {
    /// Parse configuration text; absent keys keep their defaults
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = SimConfig::from_toml("hop_budget = 8\ntrace_routing = false\n").unwrap();
        assert_eq!(config.hop_budget, 8);
        assert!(!config.trace_routing);
        assert_eq!(config.time_step_ms, SimConfig::default().time_step_ms);
        assert_eq!(config.blast_radius_threshold, 100);
    }

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(SimConfig::from_toml("").unwrap(), SimConfig::default());
    }

    #[test]
    fn test_load_files() {
        let dir = tempfile::tempdir().unwrap();

        let topology_path = dir.path().join("topology.json");
        fs::write(
            &topology_path,
            r#"{"nodes": [{"id": "a", "type": "router"}, {"id": "b", "type": "server"}],
                "links": [{"id": "l1", "source": "a", "target": "b"}]}"#,
        )
        .unwrap();
        let topology = load_topology(&topology_path).unwrap();
        assert_eq!(topology.nodes.len(), 2);

        let scenario_path = dir.path().join("scenario.json");
        fs::write(&scenario_path, r#"{"id": "s1", "flows": [{"id": "f1", "from": "a", "to": "b"}]}"#).unwrap();
        assert_eq!(load_scenario(&scenario_path).unwrap().flows.len(), 1);

        let config_path = dir.path().join("sim.toml");
        fs::write(&config_path, "max_steps = 10\n").unwrap();
        assert_eq!(load_config(&config_path).unwrap().max_steps, 10);
    }

    #[test]
    fn test_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("missing.json");
        let err = load_topology(&missing).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("missing.json"));

        let broken = dir.path().join("broken.json");
        fs::write(&broken, "{not json").unwrap();
        assert!(matches!(load_scenario(&broken), Err(ConfigError::Json { .. })));

        let bad_toml = dir.path().join("sim.toml");
        fs::write(&bad_toml, "hop_budget = \"many\"").unwrap();
        assert!(matches!(load_config(&bad_toml), Err(ConfigError::Toml { .. })));
    }
}
