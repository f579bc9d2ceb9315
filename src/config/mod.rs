//! Server configuration
//!
//! Loaded from a JSON file. Every field except `data_dir` has a default;
//! `validate` runs on load and rejects values the server cannot start
//! with.
//!
//! ```json
//! {
//!   "data_dir": "/var/lib/slotanchor",
//!   "current_timeline": 3,
//!   "roles": [{ "name": "repl", "member_of": ["mdb_replication"] }]
//! }
//! ```

mod errors;

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use errors::{ConfigError, ConfigErrorCode, ConfigResult};

use crate::anchor::{DecodingRequirements, WalLevel};
use crate::auth::{AuthorizationGate, RoleCatalog, RoleDefinition, DEFAULT_DELEGATED_ROLE};
use crate::decoding::PluginRegistry;
use crate::observability::Severity;
use crate::slot::validate_slot_name;
use crate::types::{TimelineId, TransactionId};

/// Directory holding timeline history files, relative to `data_dir`.
const DEFAULT_HISTORY_DIR: &str = "pg_wal";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Data directory (required)
    pub data_dir: String,

    /// Database sessions connect to
    #[serde(default = "default_database")]
    pub database: String,

    #[serde(default = "default_wal_level")]
    pub wal_level: WalLevel,

    #[serde(default = "default_max_replication_slots")]
    pub max_replication_slots: usize,

    /// Role whose members may manage slots; `null` disables delegation
    #[serde(default = "default_delegated_role")]
    pub delegated_role: Option<String>,

    /// Timeline the server is currently writing
    #[serde(default = "default_current_timeline")]
    pub current_timeline: u32,

    /// Directory with `<TLI>.history` files (default `<data_dir>/pg_wal`)
    #[serde(default)]
    pub timeline_history_dir: Option<String>,

    /// Output plugins that may be attached to slots
    #[serde(default = "default_decoding_plugins")]
    pub decoding_plugins: Vec<String>,

    #[serde(default)]
    pub roles: Vec<RoleDefinition>,

    /// Next transaction id to assign
    #[serde(default = "default_next_xid")]
    pub next_xid: u32,

    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_database() -> String {
    "postgres".to_string()
}
fn default_wal_level() -> WalLevel {
    WalLevel::Logical
}
fn default_max_replication_slots() -> usize {
    10
}
fn default_delegated_role() -> Option<String> {
    Some(DEFAULT_DELEGATED_ROLE.to_string())
}
fn default_current_timeline() -> u32 {
    1
}
fn default_decoding_plugins() -> Vec<String> {
    PluginRegistry::default().names().map(str::to_string).collect()
}
fn default_next_xid() -> u32 {
    TransactionId::FIRST_NORMAL.value()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl ServerConfig {
    /// Configuration with every default and the given data directory.
    pub fn new(data_dir: impl Into<String>) -> Self {
        Self {
            data_dir: data_dir.into(),
            database: default_database(),
            wal_level: default_wal_level(),
            max_replication_slots: default_max_replication_slots(),
            delegated_role: default_delegated_role(),
            current_timeline: default_current_timeline(),
            timeline_history_dir: None,
            decoding_plugins: default_decoding_plugins(),
            roles: Vec::new(),
            next_xid: default_next_xid(),
            log_level: default_log_level(),
        }
    }

    /// Load and validate configuration from file
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ConfigError::read(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> ConfigResult<Self> {
        let config: ServerConfig = serde_json::from_str(content)
            .map_err(|e| ConfigError::parse(format!("Invalid config JSON: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.data_dir.trim().is_empty() {
            return Err(ConfigError::invalid("data_dir must not be empty"));
        }

        if self.database.is_empty() {
            return Err(ConfigError::invalid("database must not be empty"));
        }

        if self.current_timeline == 0 {
            return Err(ConfigError::invalid("current_timeline must be >= 1"));
        }

        if Severity::parse(&self.log_level).is_none() {
            return Err(ConfigError::invalid(format!(
                "Invalid log_level: '{}'. Expected trace, info, warn, error or fatal.",
                self.log_level
            )));
        }

        if let Some(role) = &self.delegated_role {
            if role.is_empty() {
                return Err(ConfigError::invalid(
                    "delegated_role must not be empty; use null to disable",
                ));
            }
        }

        let invalid_plugin = self
            .decoding_plugins
            .iter()
            .find(|p| validate_slot_name(p).is_err());
        if let Some(plugin) = invalid_plugin {
            return Err(ConfigError::invalid(format!("Invalid decoding plugin name: '{}'", plugin)));
        }

        let mut seen = HashSet::new();
        for role in &self.roles {
            if role.name.is_empty() {
                return Err(ConfigError::invalid("role name must not be empty"));
            }
            if !seen.insert(role.name.as_str()) {
                return Err(ConfigError::invalid(format!("Duplicate role: '{}'", role.name)));
            }
        }

        Ok(())
    }

    pub fn data_path(&self) -> &Path {
        Path::new(&self.data_dir)
    }

    pub fn history_dir(&self) -> PathBuf {
        match &self.timeline_history_dir {
            Some(dir) => PathBuf::from(dir),
            None => self.data_path().join(DEFAULT_HISTORY_DIR),
        }
    }

    pub fn timeline(&self) -> TimelineId {
        TimelineId::new(self.current_timeline)
    }

    pub fn log_severity(&self) -> Severity {
        Severity::parse(&self.log_level).unwrap_or(Severity::Info)
    }

    pub fn gate(&self) -> AuthorizationGate {
        AuthorizationGate::new(self.delegated_role.clone())
    }

    pub fn role_catalog(&self) -> RoleCatalog {
        RoleCatalog::from_definitions(self.roles.iter().cloned())
    }

    pub fn plugin_registry(&self) -> PluginRegistry {
        PluginRegistry::with_plugins(self.decoding_plugins.iter().cloned())
    }

    pub fn requirements(&self) -> DecodingRequirements {
        DecodingRequirements {
            wal_level: self.wal_level,
            max_replication_slots: self.max_replication_slots,
        }
    }
}
