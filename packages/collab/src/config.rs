use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_NAME: &str = "reactype.config.json";

/// ReacType collaboration configuration file format
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Client-side room settings
    #[serde(default)]
    pub relay: RelayConfig,

    /// Relay server settings
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayConfig {
    /// WebSocket endpoint of the relay
    #[serde(default = "default_server_url")]
    pub server_url: String,

    /// Quiet period before local changes are broadcast
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u64,

    /// How long to wait for the relay's `connect` acknowledgment
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_server_url() -> String {
    "ws://127.0.0.1:5656/ws".to_string()
}

fn default_debounce_ms() -> u64 {
    100
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

impl RelayConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            server_url: default_server_url(),
            debounce_ms: default_debounce_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Origins allowed by CORS; empty allows any
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

fn default_bind_addr() -> String {
    "127.0.0.1:5656".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            allowed_origins: Vec::new(),
        }
    }
}

impl Config {
    /// Load config from a directory
    pub fn load(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let config_path = dir.as_ref().join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = serde_json::from_str(&content)?;
            Ok(config)
        } else {
            // Return default config if none exists
            Ok(Config::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_config() {
        let json = r#"{
            "relay": { "debounceMs": 250 },
            "server": { "bindAddr": "0.0.0.0:8080", "allowedOrigins": ["http://localhost:8080"] }
        }"#;

        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.relay.debounce(), Duration::from_millis(250));
        assert_eq!(config.relay.connect_timeout_ms, 5_000);
        assert_eq!(config.server.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.server.allowed_origins.len(), 1);
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.relay.debounce_ms, 100);
        assert_eq!(config.server.bind_addr, "127.0.0.1:5656");
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(DEFAULT_CONFIG_NAME),
            r#"{ "relay": { "serverUrl": "ws://relay.example:9000/ws" } }"#,
        )
        .unwrap();

        let config = Config::load(dir.path()).unwrap();
        assert_eq!(config.relay.server_url, "ws://relay.example:9000/ws");
        assert_eq!(config.server, ServerConfig::default());
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(Config::load(dir.path()).unwrap(), Config::default());
    }

    #[test]
    fn test_invalid_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(DEFAULT_CONFIG_NAME), "{ nope").unwrap();
        assert!(Config::load(dir.path()).is_err());
    }
}
