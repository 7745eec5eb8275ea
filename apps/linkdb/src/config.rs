//! # Configuration
//!
//! Optional `linkdb.toml` merged with command-line flags.
//!
//! ```toml
//! [storage]
//! database = "db.links"
//! backend = "redb"      # redb | file | memory
//!
//! [output]
//! json = false
//!
//! [logging]
//! filter = "linkdb=info"
//! format = "text"       # text | json
//! ```
//!
//! Precedence: explicit CLI flag > config file > built-in default.

use clap::ValueEnum;
use linkdb_core::LinkError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Config file looked up in the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "linkdb.toml";

/// Database path when neither flag nor config names one.
pub const DEFAULT_DATABASE: &str = "db.links";

/// Log filter when neither `RUST_LOG` nor config sets one.
pub const DEFAULT_LOG_FILTER: &str = "linkdb=info";

/// Largest config file accepted (64 KB).
const MAX_CONFIG_FILE_SIZE: u64 = 64 * 1024;

// =============================================================================
// ENUMS
// =============================================================================

/// Where links are kept between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// ACID redb database.
    #[default]
    Redb,
    /// Binary snapshot loaded at start and written back after mutations.
    File,
    /// Volatile; never touches disk.
    Memory,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Redb => "redb",
            Self::File => "file",
            Self::Memory => "memory",
        })
    }
}

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    /// Parse the `LINKDB_LOG_FORMAT` value; anything but `json` is text.
    #[must_use]
    pub fn from_env_value(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Text
        }
    }
}

// =============================================================================
// FILE SECTIONS
// =============================================================================

/// The parsed config file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub storage: StorageSection,
    pub output: OutputSection,
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSection {
    pub database: Option<PathBuf>,
    pub backend: Option<Backend>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OutputSection {
    pub json: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingSection {
    pub filter: Option<String>,
    pub format: Option<LogFormat>,
}

impl Config {
    /// Parse config text.
    pub fn from_toml(text: &str) -> Result<Self, LinkError> {
        toml::from_str(text).map_err(|e| LinkError::SerializationError(format!("config: {}", e)))
    }

    /// Load the config file.
    ///
    /// An explicit path must exist. Without one, `linkdb.toml` in the working
    /// directory is read if present and an empty config is used otherwise.
    pub fn load(explicit: Option<&Path>) -> Result<Self, LinkError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let default = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !default.is_file() {
                    return Ok(Self::default());
                }
                default
            }
        };

        let metadata = std::fs::metadata(&path).map_err(|e| {
            LinkError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        if metadata.len() > MAX_CONFIG_FILE_SIZE {
            return Err(LinkError::SerializationError(format!(
                "Config size {} bytes exceeds maximum allowed {} bytes",
                metadata.len(),
                MAX_CONFIG_FILE_SIZE
            )));
        }

        let text = std::fs::read_to_string(&path).map_err(|e| {
            LinkError::IoError(format!("Cannot read config '{}': {}", path.display(), e))
        })?;
        Self::from_toml(&text)
    }
}

// =============================================================================
// RESOLVED SETTINGS
// =============================================================================

/// Flags as given on the command line; `None`/`false` means "not given".
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub database: Option<PathBuf>,
    pub backend: Option<Backend>,
    pub json: bool,
}

/// Settings after merging flags, config file and defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub database: PathBuf,
    pub backend: Backend,
    pub json: bool,
    pub log_filter: String,
    pub log_format: LogFormat,
}

impl Settings {
    /// Merge `overrides` over `config` over defaults.
    #[must_use]
    pub fn resolve(overrides: &Overrides, config: &Config) -> Self {
        Self {
            database: overrides
                .database
                .clone()
                .or_else(|| config.storage.database.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE)),
            backend: overrides
                .backend
                .or(config.storage.backend)
                .unwrap_or_default(),
            json: overrides.json || config.output.json.unwrap_or(false),
            log_filter: config
                .logging
                .filter
                .clone()
                .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),
            log_format: config.logging.format.unwrap_or_default(),
        }
    }
}
