//! Application configuration
//!
//! Two files are involved: `control.toml` describes the process (authority,
//! links to open) and the node configuration, a JSON map of address to
//! argument list, holds the last known parameter values.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::codec::Argument;
use crate::error::{Error, Result};
use crate::root::NodeConfig;

const QUALIFIER: &str = "org";
const ORGANIZATION: &str = "mixer";
const APPLICATION: &str = "mixer-osc-control";

/// Top-level configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub control: ControlConfig,
    pub connectors: Vec<ConnectorConfig>,
    /// Where node values are persisted. Defaults to the user data directory.
    pub node_config_path: Option<PathBuf>,
}

/// How the root behaves towards its peers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    /// This process holds the ground truth and answers remote changes
    pub authority: bool,
    /// Broadcast values applied from the node configuration at startup
    pub notify_at_init: bool,
    /// Interval between connector polls
    pub poll_interval_ms: u64,
    /// Delay before persisting node values after a change
    pub save_delay_ms: u64,
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self {
            authority: true,
            notify_at_init: false,
            poll_interval_ms: 5,
            save_delay_ms: 1000,
        }
    }
}

/// One UDP link to a peer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorConfig {
    pub name: String,
    pub bind: SocketAddr,
    /// Fixed destination. Without one, replies go to the last sender.
    #[serde(default)]
    pub peer: Option<SocketAddr>,
    /// Frame packets with SLIP (for bridges forwarding a serial stream)
    #[serde(default)]
    pub slip: bool,
}

impl AppConfig {
    /// Default location of `control.toml`
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
            .map(|dirs| dirs.config_dir().join("control.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&contents)?;
        config.validate()?;
        tracing::info!(path = %path.display(), connectors = config.connectors.len(), "Configuration loaded");
        Ok(config)
    }

    /// Load `path`, falling back to defaults when the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(path = %path.display(), "No configuration file, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.control.poll_interval_ms == 0 {
            return Err(Error::Config("poll_interval_ms must be positive".into()));
        }
        let mut names = HashSet::new();
        for connector in &self.connectors {
            if connector.name.is_empty() {
                return Err(Error::Config("connector name must not be empty".into()));
            }
            if !names.insert(connector.name.as_str()) {
                return Err(Error::Config(format!("duplicate connector '{}'", connector.name)));
            }
        }
        Ok(())
    }

    /// Configured node configuration path, or the user data directory
    pub fn node_config_path(&self) -> Option<PathBuf> {
        self.node_config_path.clone().or_else(|| {
            directories::ProjectDirs::from(QUALIFIER, ORGANIZATION, APPLICATION)
                .map(|dirs| dirs.data_dir().join("nodes.json"))
        })
    }
}

/// On-disk form of one argument, keyed by its OSC type tag: `{"f": 1000.0}`.
/// The tag keeps the exact type across a save and reload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum StoredArgument {
    #[serde(rename = "T")]
    True,
    #[serde(rename = "F")]
    False,
    #[serde(rename = "i")]
    Int32(i32),
    #[serde(rename = "h")]
    Int64(i64),
    #[serde(rename = "f")]
    Float32(f32),
    #[serde(rename = "d")]
    Float64(f64),
    #[serde(rename = "s")]
    String(String),
    #[serde(rename = "b")]
    Blob(Vec<u8>),
    #[serde(rename = "m")]
    Midi([u8; 4]),
    #[serde(rename = "t")]
    Timetag(u64),
}

impl StoredArgument {
    /// None for NaN and infinities, which JSON cannot hold
    fn from_argument(argument: &Argument<'_>) -> Option<Self> {
        Some(match argument {
            Argument::Bool(true) => StoredArgument::True,
            Argument::Bool(false) => StoredArgument::False,
            Argument::Int32(v) => StoredArgument::Int32(*v),
            Argument::Int64(v) => StoredArgument::Int64(*v),
            Argument::Float32(v) if v.is_finite() => StoredArgument::Float32(*v),
            Argument::Float64(v) if v.is_finite() => StoredArgument::Float64(*v),
            Argument::Float32(_) | Argument::Float64(_) => return None,
            Argument::String(v) => StoredArgument::String(v.to_string()),
            Argument::Blob(v) => StoredArgument::Blob(v.to_vec()),
            Argument::Midi(v) => StoredArgument::Midi(*v),
            Argument::Timetag(v) => StoredArgument::Timetag(*v),
        })
    }

    fn into_argument(self) -> Argument<'static> {
        match self {
            StoredArgument::True => Argument::Bool(true),
            StoredArgument::False => Argument::Bool(false),
            StoredArgument::Int32(v) => Argument::Int32(v),
            StoredArgument::Int64(v) => Argument::Int64(v),
            StoredArgument::Float32(v) => Argument::Float32(v),
            StoredArgument::Float64(v) => Argument::Float64(v),
            StoredArgument::String(v) => Argument::String(Cow::Owned(v)),
            StoredArgument::Blob(v) => Argument::Blob(Cow::Owned(v)),
            StoredArgument::Midi(v) => Argument::Midi(v),
            StoredArgument::Timetag(v) => Argument::Timetag(v),
        }
    }
}

/// Read a persisted node configuration. A missing file is an empty map.
/// Entries that do not parse are skipped with a warning; the rest load.
pub fn load_node_config(path: &Path) -> Result<NodeConfig> {
    if !path.exists() {
        return Ok(NodeConfig::new());
    }
    let contents = fs::read_to_string(path)?;
    let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(&contents)?;

    let mut config = NodeConfig::new();
    for (address, value) in raw {
        match serde_json::from_value::<Vec<StoredArgument>>(value) {
            Ok(stored) => {
                let arguments = stored.into_iter().map(StoredArgument::into_argument).collect();
                config.insert(address, arguments);
            }
            Err(e) => tracing::warn!(address = %address, "Skipping unreadable node config entry: {}", e),
        }
    }
    Ok(config)
}

/// Persist a node configuration, replacing the file atomically. Entries
/// holding non-finite floats are left out.
pub fn save_node_config(path: &Path, config: &NodeConfig) -> Result<()> {
    let mut stored: BTreeMap<&str, Vec<StoredArgument>> = BTreeMap::new();
    for (address, arguments) in config {
        match arguments.iter().map(StoredArgument::from_argument).collect::<Option<Vec<_>>>() {
            Some(entry) => {
                stored.insert(address, entry);
            }
            None => tracing::warn!(address = %address, "Not saving non-finite value"),
        }
    }

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, serde_json::to_string_pretty(&stored)?)?;
    fs::rename(&tmp, path)?;
    tracing::debug!(path = %path.display(), entries = stored.len(), "Node configuration saved");
    Ok(())
}
