//! Session configuration loaded from `rusty-chess.toml`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur when loading or parsing configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    /// Failed to parse the configuration file as valid TOML.
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
}

/// Which engine picks autonomous moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoplayBackend {
    /// A uniformly random legal move.
    #[default]
    Random,
    /// An external UCI engine at `engine_path`.
    Uci,
}

/// How autonomous moves are produced.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AutoplayConfig {
    #[serde(default)]
    pub backend: AutoplayBackend,
    /// Path to the UCI engine executable. Defaults to "stockfish".
    #[serde(default = "default_engine_path")]
    pub engine_path: PathBuf,
    /// Time control string passed to `go` (e.g., "movetime 500").
    #[serde(default = "default_time_control")]
    pub time_control: String,
}

impl Default for AutoplayConfig {
    fn default() -> Self {
        Self {
            backend: AutoplayBackend::default(),
            engine_path: default_engine_path(),
            time_control: default_time_control(),
        }
    }
}

fn default_engine_path() -> PathBuf {
    PathBuf::from("stockfish")
}

fn default_time_control() -> String {
    "movetime 500".to_string()
}

/// Top-level session configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SessionConfig {
    /// Whether White starts under autonomy.
    #[serde(default)]
    pub white_autonomous: bool,
    /// Whether Black starts under autonomy.
    #[serde(default)]
    pub black_autonomous: bool,
    #[serde(default)]
    pub autoplay: AutoplayConfig,
    /// Capacity of the event broadcast channel. Defaults to 100.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    /// Plies after which the game is declared drawn. Defaults to 500.
    #[serde(default = "default_max_plies")]
    pub max_plies: u32,
}

fn default_event_capacity() -> usize {
    100
}

fn default_max_plies() -> u32 {
    500
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            white_autonomous: false,
            black_autonomous: false,
            autoplay: AutoplayConfig::default(),
            event_capacity: default_event_capacity(),
            max_plies: default_max_plies(),
        }
    }
}

impl SessionConfig {
    /// Loads the configuration from [`Self::config_path()`].
    ///
    /// # Errors
    ///
    /// See [`Self::load_from`].
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::config_path())
    }

    /// Loads the configuration from `path`, or defaults if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ReadError`] if the file exists but cannot be read,
    /// or [`ConfigError::ParseError`] if the file contains invalid TOML.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(toml::from_str(&content)?)
        } else {
            Ok(Self::default())
        }
    }

    /// `rusty-chess.toml` in the current working directory.
    pub fn config_path() -> PathBuf {
        PathBuf::from("rusty-chess.toml")
    }
}
