//! Configuration for the greenhouse relay, node simulator and control panel
//!
//! All three binaries read the same TOML file; each one only looks at its
//! own section. Every section has defaults, so a missing file or a partial
//! file still yields a runnable setup.

use crate::core::types::NodeId;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

/// Top-level application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub relay: RelayConfig,
    pub simulator: SimulatorConfig,
    pub control_panel: ControlPanelConfig,
    pub logging: LoggingConfig,
}

/// Relay server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RelayConfig {
    /// TCP bind address for nodes and control panels
    ///
    /// Examples:
    /// - `0.0.0.0:12345` - Bind to all interfaces on port 12345
    /// - `127.0.0.1:12345` - Localhost only
    pub bind_address: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:12345".to_string(),
        }
    }
}

/// Node simulator configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Relay address the simulated nodes connect to
    pub server_address: String,
    /// Interval between two samples of the same node
    pub sample_interval_ms: u64,
    /// Random seed for sensor noise (0 = random)
    pub random_seed: u64,
    /// Nodes to simulate
    pub nodes: Vec<NodeConfig>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1:12345".to_string(),
            sample_interval_ms: 5000,
            random_seed: 0,
            nodes: vec![
                NodeConfig::new(1, 2, 1, 0, 0),
                NodeConfig::new(1, 0, 0, 2, 1),
                NodeConfig::new(2, 0, 0, 0, 0),
                NodeConfig::new(2, 3, 2, 1, 0),
            ],
        }
    }
}

/// Sensor and actuator inventory of one simulated node
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Fixed node id; assigned automatically when absent
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<NodeId>,
    pub temperature: usize,
    pub humidity: usize,
    pub windows: usize,
    pub fans: usize,
    pub heaters: usize,
}

impl NodeConfig {
    /// Inventory with an automatically assigned id
    pub fn new(temperature: usize, humidity: usize, windows: usize, fans: usize, heaters: usize) -> Self {
        Self {
            id: None,
            temperature,
            humidity,
            windows,
            fans,
            heaters,
        }
    }

    pub fn with_id(mut self, id: NodeId) -> Self {
        self.id = Some(id);
        self
    }
}

/// Control panel configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ControlPanelConfig {
    /// Relay address to connect to
    pub server_address: String,
}

impl Default for ControlPanelConfig {
    fn default() -> Self {
        Self {
            server_address: "127.0.0.1:12345".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from TOML file
    ///
    /// # Example
    /// ```no_run
    /// use greenhouse_link::config::AppConfig;
    ///
    /// let config = AppConfig::from_file("greenhouse.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Reject settings no component can run with
    pub fn validate(&self) -> Result<()> {
        if self.simulator.sample_interval_ms == 0 {
            return Err(Error::Config(
                "simulator.sample_interval_ms must be positive".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for id in self.simulator.nodes.iter().filter_map(|n| n.id) {
            if !seen.insert(id) {
                return Err(Error::Config(format!("duplicate simulator node id {}", id)));
            }
        }
        Ok(())
    }
}

/// Load the config file named on the command line, or defaults
///
/// Accepts `<path>`, `--config <path>` or `-c <path>`.
pub fn load_from_args<I>(args: I) -> Result<AppConfig>
where
    I: IntoIterator<Item = String>,
{
    let args: Vec<String> = args.into_iter().collect();
    let path = match args.as_slice() {
        [] => None,
        [flag, path] if flag == "--config" || flag == "-c" => Some(path.as_str()),
        [flag] if flag == "--config" || flag == "-c" => {
            return Err(Error::Config(format!("{} needs a file path", flag)));
        }
        [path] => Some(path.as_str()),
        _ => {
            return Err(Error::Config(format!(
                "unexpected arguments: {}",
                args.join(" ")
            )));
        }
    };

    match path {
        Some(path) => AppConfig::from_file(path),
        None => Ok(AppConfig::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.relay.bind_address, "0.0.0.0:12345");
        assert_eq!(config.simulator.server_address, "127.0.0.1:12345");
        assert_eq!(config.simulator.sample_interval_ms, 5000);
        assert_eq!(config.simulator.nodes.len(), 4);
        assert_eq!(config.simulator.nodes[3], NodeConfig::new(2, 3, 2, 1, 0));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_toml_serialization() {
        let config = AppConfig::default();
        let toml_string = toml::to_string_pretty(&config).unwrap();

        assert!(toml_string.contains("[relay]"));
        assert!(toml_string.contains("[simulator]"));
        assert!(toml_string.contains("[[simulator.nodes]]"));
        assert!(toml_string.contains("[logging]"));
        assert!(toml_string.contains("bind_address = \"0.0.0.0:12345\""));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let toml_content = r#"
[relay]
bind_address = "127.0.0.1:4000"

[[simulator.nodes]]
id = 4
temperature = 1
humidity = 1
windows = 1

[logging]
level = "debug"
"#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.relay.bind_address, "127.0.0.1:4000");
        assert_eq!(config.simulator.sample_interval_ms, 5000);
        assert_eq!(
            config.simulator.nodes,
            [NodeConfig::new(1, 1, 1, 0, 0).with_id(4)]
        );
        assert_eq!(config.control_panel.server_address, "127.0.0.1:12345");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("greenhouse.toml");

        let mut config = AppConfig::default();
        config.simulator.random_seed = 42;
        config.simulator.nodes = vec![NodeConfig::new(0, 2, 0, 0, 1).with_id(9)];
        config.to_file(&path).unwrap();

        let loaded = AppConfig::from_file(&path).unwrap();
        assert_eq!(loaded.simulator.random_seed, 42);
        assert_eq!(loaded.simulator.nodes, config.simulator.nodes);
    }

    #[test]
    fn test_invalid_files_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[simulator]\nsample_interval_ms = 0").unwrap();
        assert!(matches!(AppConfig::from_file(file.path()), Err(Error::Config(_))));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[[simulator.nodes]]\nid = 2\n[[simulator.nodes]]\nid = 2").unwrap();
        assert!(matches!(AppConfig::from_file(file.path()), Err(Error::Config(_))));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[relay\nbind_address = 1").unwrap();
        assert!(matches!(AppConfig::from_file(file.path()), Err(Error::TomlDe(_))));
    }

    #[test]
    fn test_load_from_args() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[logging]\nlevel = \"warn\"").unwrap();
        let path = file.path().to_string_lossy().to_string();

        let config = load_from_args(Vec::new()).unwrap();
        assert_eq!(config.logging.level, "info");

        for args in [
            vec![path.clone()],
            vec!["--config".to_string(), path.clone()],
            vec!["-c".to_string(), path.clone()],
        ] {
            assert_eq!(load_from_args(args).unwrap().logging.level, "warn");
        }

        assert!(load_from_args(vec!["-c".to_string()]).is_err());
        assert!(load_from_args(vec!["a".to_string(), "b".to_string(), "c".to_string()]).is_err());
    }
}
