// Configuration loading and validation (config/server.toml).

use std::path::{Path, PathBuf};

use hearth_core::RoomId;
use serde::Deserialize;
use thiserror::Error;

use crate::server::ServerSettings;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// server.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerSection,
    pub world: WorldSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    /// Address both listeners bind to.
    #[serde(default = "default_bind")]
    pub bind: String,
    pub tcp_port: u16,
    /// WebSocket listener port; 0 disables the WebSocket listener.
    #[serde(default)]
    pub ws_port: u16,
    /// Undelivered messages a session may have queued before new ones are
    /// dropped.
    pub mailbox_capacity: usize,
    /// Dropped messages after which a session is disconnected.
    pub max_dropped: u64,
    pub prompt: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorldSection {
    pub db_path: String,
    pub start_room: i64,
    #[serde(default)]
    pub welcome: String,
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

impl Config {
    /// Per-session settings handed to the [`crate::server::Server`].
    pub fn server_settings(&self) -> ServerSettings {
        ServerSettings {
            prompt: self.server.prompt.clone(),
            mailbox_capacity: self.server.mailbox_capacity,
            max_dropped: self.server.max_dropped,
            start_room: RoomId(self.world.start_room),
            welcome: self.world.welcome.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/server.toml` relative to `base_dir`.
///
/// Does not copy defaults; prefer [`load_config`].
pub(crate) fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    load_config_file(&base_dir.join("config").join("server.toml"))
}

/// Load and validate a server config file at an explicit path.
pub fn load_config_file(path: &Path) -> Result<Config, ConfigError> {
    let text = read_file(path)?;
    let config: Config = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })?;

    validate(&config)?;

    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the server crate root or pass --config",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let mut copied = Vec::new();

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();

        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }
        let target = config_dir.join(file_name);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Convenience wrapper: loads config relative to the current working directory.
/// Ensures default config files are copied before loading.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.server.tcp_port == 0 {
        return Err(ConfigError::ValidationError {
            field: "server.tcp_port".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.server.ws_port != 0 && config.server.ws_port == config.server.tcp_port {
        return Err(ConfigError::ValidationError {
            field: "server.ws_port".into(),
            message: format!("must differ from tcp_port ({})", config.server.tcp_port),
        });
    }

    if config.server.mailbox_capacity == 0 {
        return Err(ConfigError::ValidationError {
            field: "server.mailbox_capacity".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.server.max_dropped == 0 {
        return Err(ConfigError::ValidationError {
            field: "server.max_dropped".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.world.db_path.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "world.db_path".into(),
            message: "must not be empty".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
