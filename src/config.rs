use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub bitcoin: BitcoinConfig,
    pub database: DatabaseConfig,
    pub alerts: AlertConfig,
    pub engine: EngineConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BitcoinConfig {
    pub rpc_host: String,
    pub rpc_port: u16,
    pub rpc_user: Option<String>,
    pub rpc_password: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct AlertConfig {
    pub webhooks: Vec<WebhookConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebhookConfig {
    pub name: String,
    pub url: String,
    /// Only alerts at or above this severity are delivered.
    pub min_severity: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EngineConfig {
    /// Snapshot id override for shadow observation windows; 0 = engine
    /// default.
    pub shadow_snapshot_id: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bitcoin: BitcoinConfig::default(),
            database: DatabaseConfig::default(),
            alerts: AlertConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl Default for BitcoinConfig {
    fn default() -> Self {
        Self {
            rpc_host: "127.0.0.1".into(),
            rpc_port: 8332,
            rpc_user: None,
            rpc_password: None,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "data/txlens.db".into(),
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self { webhooks: Vec::new() }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { shadow_snapshot_id: 0 }
    }
}

impl Config {
    /// Load config from a TOML file. Falls back to defaults if the file is
    /// missing or unparsable.
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("config file {} not found, using defaults", path.display());
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("config loaded from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("failed to parse {}: {e}, using defaults", path.display());
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("failed to read {}: {e}, using defaults", path.display());
                Self::default()
            }
        }
    }
}
