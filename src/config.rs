// ABOUTME: Stored connection management and descriptor normalization for SQL Magpie
// ABOUTME: Turns partially-specified saved connections into total configs before any remote call

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read connections file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse connections file: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("Config directory not found")]
    NoDirFound,
    #[error("Connection not found: {0}")]
    ConnectionNotFound(String),
    #[error("Connection '{0}' has no host")]
    MissingHost(String),
}

/// Database engine tag carried on every connection
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    MySql,
    Postgres,
    SqlServer,
}

impl Default for EngineKind {
    fn default() -> Self {
        EngineKind::MySql
    }
}

impl EngineKind {
    /// Conventional port used when a stored connection omits one
    pub fn default_port(&self) -> u16 {
        match self {
            EngineKind::MySql => 3306,
            EngineKind::Postgres => 5432,
            EngineKind::SqlServer => 1433,
        }
    }
}

/// SSH tunnel settings as saved - every field may be absent
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct StoredSshTunnel {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(rename = "keyPath", default)]
    pub key_path: Option<String>,
}

/// A saved connection as it sits on disk, with most fields optional
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredConnection {
    pub name: String,
    #[serde(rename = "type", default)]
    pub engine: EngineKind,
    #[serde(default)]
    pub host: String,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
    #[serde(rename = "sshTunnel", default)]
    pub ssh_tunnel: Option<StoredSshTunnel>,
}

/// Fully-populated SSH tunnel record - never carries an absent field
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct SshTunnelConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    #[serde(rename = "keyPath")]
    pub key_path: String,
}

/// Total connection configuration handed to every backend call.
/// Downstream serialization never sees an omitted field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    #[serde(rename = "type")]
    pub engine: EngineKind,
    #[serde(rename = "sshTunnel")]
    pub ssh_tunnel: SshTunnelConfig,
}

/// Canonicalize a stored connection into a total config. Pure, no network
/// effect; fails only when the stored record itself lacks a host.
pub fn normalize(
    stored: &StoredConnection,
    database_override: Option<&str>,
) -> Result<ConnectionConfig, ConfigError> {
    if stored.host.trim().is_empty() {
        return Err(ConfigError::MissingHost(stored.name.clone()));
    }

    let tunnel = stored.ssh_tunnel.clone().unwrap_or_default();
    let database = database_override
        .map(str::to_string)
        .or_else(|| stored.database.clone())
        .unwrap_or_default();

    Ok(ConnectionConfig {
        host: stored.host.clone(),
        port: stored.port.unwrap_or_else(|| stored.engine.default_port()),
        username: stored.username.clone(),
        password: stored.password.clone().unwrap_or_default(),
        database,
        engine: stored.engine,
        ssh_tunnel: SshTunnelConfig {
            enabled: tunnel.enabled,
            host: tunnel.host.unwrap_or_default(),
            port: tunnel.port.unwrap_or(22),
            user: tunnel.user.unwrap_or_default(),
            password: tunnel.password.unwrap_or_default(),
            key_path: tunnel.key_path.unwrap_or_default(),
        },
    })
}

/// Saved connections, persisted as JSON in the user config directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionStore {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub connections: HashMap<String, StoredConnection>,
}

fn default_version() -> u32 {
    1
}

impl Default for ConnectionStore {
    fn default() -> Self {
        Self {
            version: 1,
            connections: HashMap::new(),
        }
    }
}

impl ConnectionStore {
    /// Get the connections file path based on OS
    pub fn store_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoDirFound)?;
        let app_dir = config_dir.join("SQL Magpie");
        Ok(app_dir.join("connections.json"))
    }

    /// Load connections from file, or create an empty store if not exists
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::store_path()?;
        Self::load_from(&path)
    }

    pub fn load_from(path: &PathBuf) -> Result<Self, ConfigError> {
        if !path.exists() {
            let store = Self::default();
            store.save_to(path)?;
            return Ok(store);
        }

        let contents = fs::read_to_string(path)?;
        let store: ConnectionStore = serde_json::from_str(&contents)?;
        Ok(store)
    }

    /// Save connections to file
    pub fn save(&self) -> Result<(), ConfigError> {
        let path = Self::store_path()?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &PathBuf) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(self)?;
        fs::write(path, contents)?;
        Ok(())
    }

    /// Look up a saved connection by key. A miss is the caller's validation
    /// error, not a store fault.
    pub fn get(&self, key: &str) -> Result<&StoredConnection, ConfigError> {
        self.connections
            .get(key)
            .ok_or_else(|| ConfigError::ConnectionNotFound(key.to_string()))
    }

    /// Add or update a connection
    pub fn set(&mut self, key: String, connection: StoredConnection) {
        self.connections.insert(key, connection);
    }

    /// Remove a connection
    pub fn remove(&mut self, key: &str) -> Option<StoredConnection> {
        self.connections.remove(key)
    }
}
