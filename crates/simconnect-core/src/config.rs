//! TOML-based session configuration.
//!
//! # Example file
//!
//! ```toml
//! app_name = "FlightRecorder"
//! log_level = "debug"
//! request_timeout_ms = 5000
//!
//! [simulator]
//! kind = "P3Dv5"
//! installation_path = 'C:\Program Files\Lockheed Martin\Prepar3D v5'
//! ```
//!
//! # Serde default values
//!
//! Every field has a `#[serde(default = "...")]` helper, so an empty file (or
//! no file at all) yields a working configuration, and older files missing
//! newer fields still load.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A file system I/O error occurred.
    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config could not be serialized to TOML.
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

// ── Config schema types ───────────────────────────────────────────────────────

/// Settings for one client session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Name the client announces to the host.
    #[serde(default = "default_app_name")]
    pub app_name: String,
    /// `tracing` log level: `"error"`, `"warn"`, `"info"`, `"debug"`, `"trace"`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// How long a request may stay unanswered; `0` disables the timer.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// The simulator this session talks to, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub simulator: Option<Simulator>,
}

/// Supported simulator families.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum SimulatorKind {
    #[serde(rename = "P3Dv4")]
    Prepar3dV4,
    #[serde(rename = "P3Dv5")]
    Prepar3dV5,
    #[serde(rename = "MSFS")]
    Msfs2020,
}

impl SimulatorKind {
    /// Short key used in config files.
    pub fn key(self) -> &'static str {
        match self {
            SimulatorKind::Prepar3dV4 => "P3Dv4",
            SimulatorKind::Prepar3dV5 => "P3Dv5",
            SimulatorKind::Msfs2020 => "MSFS",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            SimulatorKind::Prepar3dV4 => "Prepar3D v4",
            SimulatorKind::Prepar3dV5 => "Prepar3D v5",
            SimulatorKind::Msfs2020 => "MSFS 2020",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "P3Dv4" => Some(SimulatorKind::Prepar3dV4),
            "P3Dv5" => Some(SimulatorKind::Prepar3dV5),
            "MSFS" => Some(SimulatorKind::Msfs2020),
            _ => None,
        }
    }
}

/// Read-only description of a simulator installation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Simulator {
    pub kind: SimulatorKind,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub installation_path: Option<PathBuf>,
}

impl Simulator {
    pub fn name(&self) -> &'static str {
        self.kind.display_name()
    }
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_app_name() -> String {
    "simconnect-core".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            log_level: default_log_level(),
            request_timeout_ms: default_request_timeout_ms(),
            simulator: None,
        }
    }
}

impl SessionConfig {
    /// The request timeout, or `None` when timers are disabled.
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Loads a `SessionConfig` from `path`, returning the default if the file
/// does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// and [`ConfigError::Parse`] if the TOML is malformed.
pub fn load_config(path: &Path) -> Result<SessionConfig, ConfigError> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(toml::from_str(&content)?),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(SessionConfig::default()),
        Err(e) => Err(ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}

/// Writes `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config(path: &Path, config: &SessionConfig) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
