//! Configuration for TideKV
//!
//! Centralized configuration with sensible defaults. A server reads it from a
//! TOML file; tests and embedders usually go through [`ConfigBuilder`].

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::{Result, TideError};

/// Main configuration for a TideKV node
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineConfig,
    pub network: NetworkConfig,
    pub logging: LoggingConfig,
    pub wal: WalConfig,

    /// Absent section means a standalone node (no replication at all)
    pub replication: Option<ReplicationConfig>,
}

// -----------------------------------------------------------------------------
// Engine Configuration
// -----------------------------------------------------------------------------

/// Backend used for the in-memory table
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum EngineType {
    #[default]
    #[serde(rename = "in_memory")]
    InMemory,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    #[serde(rename = "type")]
    pub engine_type: EngineType,
}

// -----------------------------------------------------------------------------
// Network Configuration
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// TCP listen address for client queries
    pub address: String,

    /// Max concurrent client connections
    pub max_connections: usize,

    /// Longest accepted query line, in bytes
    #[serde(deserialize_with = "deserialize_size")]
    pub max_message_size: usize,

    /// Connections idle for longer than this are closed
    #[serde(with = "humantime_serde")]
    pub idle_timeout: Duration,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            address: "127.0.0.1:3223".to_string(),
            max_connections: 100,
            max_message_size: 4 * 1024,
            idle_timeout: Duration::from_secs(300),
        }
    }
}

// -----------------------------------------------------------------------------
// Logging Configuration
// -----------------------------------------------------------------------------

/// Where log lines go
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// An `EnvFilter` directive, e.g. `info` or `info,tidekv=debug`
    pub level: String,
    pub output: LogOutput,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            output: LogOutput::Stdout,
        }
    }
}

// -----------------------------------------------------------------------------
// WAL Configuration
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WalConfig {
    /// Disabled WAL means a purely volatile node
    pub enabled: bool,

    /// Buffered entries that trigger an early flush
    pub flushing_batch_size: usize,

    /// Group commit timeout
    #[serde(with = "humantime_serde")]
    pub flushing_batch_timeout: Duration,

    /// Segment size (bytes) after which the writer rotates
    #[serde(deserialize_with = "deserialize_size")]
    pub max_segment_size: usize,

    /// Directory holding the `wal-<timestamp>.log` segments
    pub data_directory: PathBuf,

    /// Run the background compactor
    pub compaction: bool,

    #[serde(with = "humantime_serde")]
    pub compaction_interval: Duration,
}

impl Default for WalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            flushing_batch_size: 100,
            flushing_batch_timeout: Duration::from_millis(10),
            max_segment_size: 5 * 1024 * 1024, // 5 MB
            data_directory: PathBuf::from("./tidekv_data/wal"),
            compaction: false,
            compaction_interval: Duration::from_secs(5),
        }
    }
}

// -----------------------------------------------------------------------------
// Replication Configuration
// -----------------------------------------------------------------------------

/// Role of this node in log-shipping replication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplicaRole {
    Master,
    Slave,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplicationConfig {
    pub replica_type: ReplicaRole,

    /// Master: address to listen on. Slave: address to pull from.
    #[serde(default = "default_master_address")]
    pub master_address: String,

    #[serde(default = "default_sync_interval", with = "humantime_serde")]
    pub sync_interval: Duration,

    /// Bound on one replication frame (a whole segment travels in one frame)
    #[serde(
        default = "default_replication_message_size",
        deserialize_with = "deserialize_size"
    )]
    pub max_message_size: usize,
}

fn default_master_address() -> String {
    "127.0.0.1:3232".to_string()
}

fn default_sync_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_replication_message_size() -> usize {
    10 << 20
}

impl ReplicationConfig {
    pub fn new(replica_type: ReplicaRole, master_address: impl Into<String>) -> Self {
        Self {
            replica_type,
            master_address: master_address.into(),
            sync_interval: default_sync_interval(),
            max_message_size: default_replication_message_size(),
        }
    }
}

// -----------------------------------------------------------------------------
// Loading
// -----------------------------------------------------------------------------

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Load a TOML configuration file; missing keys take their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            TideError::Config(format!("can't read {}: {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }

    /// Parse configuration from TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|e| TideError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the node cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.network.max_connections < 1 {
            return Err(TideError::Config("invalid max connections".to_string()));
        }
        if self.wal.flushing_batch_size < 1 {
            return Err(TideError::Config(
                "flushing_batch_size must be at least 1".to_string(),
            ));
        }
        if self.wal.flushing_batch_timeout.is_zero() {
            return Err(TideError::Config(
                "flushing_batch_timeout must be positive".to_string(),
            ));
        }
        if self.wal.compaction && self.wal.compaction_interval.is_zero() {
            return Err(TideError::Config(
                "compaction_interval must be positive".to_string(),
            ));
        }
        if let Some(replication) = &self.replication {
            if replication.sync_interval.is_zero() {
                return Err(TideError::Config("sync_interval must be positive".to_string()));
            }
            if !self.wal.enabled {
                return Err(TideError::Config(
                    "replication ships WAL segments and needs the WAL enabled".to_string(),
                ));
            }
            // A whole segment travels in one frame.
            if self.wal.max_segment_size >= replication.max_message_size {
                return Err(TideError::Config(format!(
                    "max_segment_size ({}) must be below replication max_message_size ({})",
                    self.wal.max_segment_size, replication.max_message_size
                )));
            }
        }
        Ok(())
    }

    /// True when this node accepts local mutations
    pub fn is_writable(&self) -> bool {
        self.replication
            .as_ref()
            .map_or(true, |r| r.replica_type == ReplicaRole::Master)
    }
}

/// Parse a human-readable size: `20`, `20B`, `20KB`, `20mb`, `1Gb`
pub fn parse_size(text: &str) -> Result<usize> {
    let text = text.trim();
    let split = text
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(text.len());
    let (digits, unit) = text.split_at(split);

    if digits.is_empty() {
        return Err(TideError::Config(format!("invalid size: {:?}", text)));
    }
    let number: usize = digits
        .parse()
        .map_err(|_| TideError::Config(format!("invalid size: {:?}", text)))?;

    let multiplier: usize = match unit.to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "kb" => 1 << 10,
        "mb" => 1 << 20,
        "gb" => 1 << 30,
        _ => return Err(TideError::Config(format!("invalid size unit: {:?}", unit))),
    };

    number
        .checked_mul(multiplier)
        .ok_or_else(|| TideError::Config(format!("size overflows: {:?}", text)))
}

fn deserialize_size<'de, D>(deserializer: D) -> std::result::Result<usize, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawSize {
        Bytes(usize),
        Text(String),
    }

    match RawSize::deserialize(deserializer)? {
        RawSize::Bytes(n) => Ok(n),
        RawSize::Text(s) => parse_size(&s).map_err(serde::de::Error::custom),
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the WAL segment directory
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.wal.data_directory = path.into();
        self
    }

    /// Enable or disable the WAL
    pub fn wal_enabled(mut self, enabled: bool) -> Self {
        self.config.wal.enabled = enabled;
        self
    }

    /// Set the batch size that triggers an early flush
    pub fn flushing_batch_size(mut self, size: usize) -> Self {
        self.config.wal.flushing_batch_size = size;
        self
    }

    /// Set the group commit timeout
    pub fn flushing_batch_timeout(mut self, timeout: Duration) -> Self {
        self.config.wal.flushing_batch_timeout = timeout;
        self
    }

    /// Set the segment rotation threshold (in bytes)
    pub fn max_segment_size(mut self, size: usize) -> Self {
        self.config.wal.max_segment_size = size;
        self
    }

    /// Turn the background compactor on with the given interval
    pub fn compaction(mut self, interval: Duration) -> Self {
        self.config.wal.compaction = true;
        self.config.wal.compaction_interval = interval;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.network.address = addr.into();
        self
    }

    /// Set the maximum number of concurrent connections
    pub fn max_connections(mut self, count: usize) -> Self {
        self.config.network.max_connections = count;
        self
    }

    /// Set the replication role and master address
    pub fn replication(mut self, role: ReplicaRole, master_address: impl Into<String>) -> Self {
        self.config.replication = Some(ReplicationConfig::new(role, master_address));
        self
    }

    /// Set the slave sync interval (requires `replication` first)
    pub fn sync_interval(mut self, interval: Duration) -> Self {
        if let Some(replication) = self.config.replication.as_mut() {
            replication.sync_interval = interval;
        }
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
