//! Configuration file management for weaver.
//!
//! Provides a TOML-based config file at `~/.config/weaver/config.toml` and a
//! resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use weaver_core::executor::ExecutorConfig;
use weaver_core::sync::SyncConfig;
use weaver_db::config::DbConfig;

pub const MAX_FILE_BYTES_ENV: &str = "WEAVER_MAX_FILE_BYTES";
pub const MAX_PARALLEL_STEPS_ENV: &str = "WEAVER_MAX_PARALLEL_STEPS";
pub const MAX_CONNECTIONS_ENV: &str = "WEAVER_DB_MAX_CONNECTIONS";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub database: DatabaseSection,
    #[serde(default)]
    pub sync: SyncSection,
    #[serde(default)]
    pub executor: ExecutorSection,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DatabaseSection {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            url: DbConfig::DEFAULT_URL.to_string(),
            max_connections: None,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SyncSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_file_bytes: Option<usize>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ExecutorSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_parallel_steps: Option<usize>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{var} must be a positive integer, got {value:?}")]
    InvalidNumber { var: &'static str, value: String },
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the weaver config directory: `$XDG_CONFIG_HOME/weaver` or
/// `~/.config/weaver`, on every platform.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("weaver");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("weaver")
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse a config file.
pub fn load_config_from(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))
}

/// Write a config file, creating parent dirs. Mode 0600 on Unix.
pub fn save_config_to(path: &Path, config: &ConfigFile) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug)]
pub struct WeaverConfig {
    pub db_config: DbConfig,
    pub sync: SyncConfig,
    pub executor: ExecutorConfig,
}

impl WeaverConfig {
    /// Resolve using the chain: CLI flag > env var > config file > default.
    ///
    /// A config file that exists but cannot be parsed is an error; a
    /// missing one is not.
    pub fn resolve(cli_db_url: Option<&str>) -> Result<Self> {
        let path = config_path();
        let file = if path.exists() {
            Some(load_config_from(&path)?)
        } else {
            None
        };
        Self::resolve_with(cli_db_url, file.as_ref())
    }

    pub fn resolve_with(cli_db_url: Option<&str>, file: Option<&ConfigFile>) -> Result<Self> {
        let db_url = if let Some(url) = cli_db_url {
            url.to_string()
        } else if let Ok(url) = std::env::var(DbConfig::ENV_VAR) {
            url
        } else if let Some(cfg) = file {
            cfg.database.url.clone()
        } else {
            DbConfig::DEFAULT_URL.to_string()
        };

        let max_file_bytes = env_number(MAX_FILE_BYTES_ENV)?
            .or_else(|| file.and_then(|f| f.sync.max_file_bytes))
            .unwrap_or(SyncConfig::default().max_file_bytes);
        let max_parallel_steps = env_number(MAX_PARALLEL_STEPS_ENV)?
            .or_else(|| file.and_then(|f| f.executor.max_parallel_steps))
            .unwrap_or(ExecutorConfig::default().max_parallel_steps);
        let max_connections = env_number(MAX_CONNECTIONS_ENV)?
            .or_else(|| file.and_then(|f| f.database.max_connections))
            .unwrap_or(DbConfig::DEFAULT_MAX_CONNECTIONS);

        let config = Self {
            db_config: DbConfig::new(db_url).with_max_connections(max_connections),
            sync: SyncConfig { max_file_bytes },
            executor: ExecutorConfig { max_parallel_steps },
        };
        Ok(config.widen_pool())
    }

    /// Override step parallelism (e.g. from `--parallel`), growing the pool
    /// to match.
    pub fn with_parallelism(mut self, max_parallel_steps: Option<usize>) -> Self {
        if let Some(n) = max_parallel_steps {
            self.executor.max_parallel_steps = n.max(1);
        }
        self.widen_pool()
    }

    /// Each running step holds a connection; keep one spare for the run
    /// itself.
    fn widen_pool(mut self) -> Self {
        let needed = u32::try_from(self.executor.max_parallel_steps)
            .unwrap_or(u32::MAX)
            .saturating_add(1);
        if self.db_config.max_connections < needed {
            self.db_config = self.db_config.with_max_connections(needed);
        }
        self
    }
}

fn env_number<T>(var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr + PartialOrd + From<u8>,
{
    match std::env::var(var) {
        Ok(value) => match value.trim().parse::<T>() {
            Ok(n) if n > T::from(0) => Ok(Some(n)),
            _ => Err(ConfigError::InvalidNumber { var, value }),
        },
        Err(_) => Ok(None),
    }
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------
