//! Mount configuration (§6 "Environment inputs" plus the cache/timeout
//! knobs implied by §4.2-§4.3 defaults).
//!
//! Grounded on the teacher's `config.rs`: a `toml`-backed, `Default`-falling-
//! back `Config` loaded from a `config.toml` file in the working directory.
//! The teacher's `cache_strategy` enum (`Ttl | Lru | None`) picked one
//! caching discipline; §4.2 requires both a TTL *and* an LRU cap
//! simultaneously, so that field is dropped in favor of the two caches
//! each carrying their own ttl/capacity. The remote host and access token
//! are not toml fields — per §6 they are environment inputs — so they are
//! read separately in [`Config::from_env_and_file`].

use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

const CONFIG_FILE: &str = "config.toml";
const HOST_ENV_VAR: &str = "WORKSPACEFS_HOST";
const TOKEN_ENV_VAR: &str = "WORKSPACEFS_TOKEN";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    MissingEnvVar(String),
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct FileConfig {
    pub metadata_cache_ttl_seconds: u64,
    pub metadata_cache_capacity: usize,
    pub disk_cache_dir: Option<String>,
    pub disk_cache_capacity_bytes: u64,
    pub disk_cache_ttl_seconds: u64,
    pub disk_cache_disabled: bool,
    pub kernel_attr_timeout_seconds: u64,
    pub kernel_entry_timeout_seconds: u64,
    pub owner_uid: Option<u32>,
    pub restrict_access: bool,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            metadata_cache_ttl_seconds: 60,
            metadata_cache_capacity: 10_000,
            disk_cache_dir: None,
            disk_cache_capacity_bytes: 10 * 1024 * 1024 * 1024,
            disk_cache_ttl_seconds: 24 * 60 * 60,
            disk_cache_disabled: false,
            kernel_attr_timeout_seconds: 1,
            kernel_entry_timeout_seconds: 1,
            owner_uid: None,
            restrict_access: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub file: FileConfig,
    pub remote_host: String,
    pub remote_token: String,
}

impl Config {
    pub fn disk_cache_dir(&self) -> PathBuf {
        match &self.file.disk_cache_dir {
            Some(dir) => PathBuf::from(dir),
            None => default_cache_dir(),
        }
    }

    pub fn owner_uid(&self) -> u32 {
        self.file.owner_uid.unwrap_or_else(current_uid)
    }
}

#[cfg(unix)]
fn current_uid() -> u32 {
    // SAFETY: getuid() has no preconditions and always succeeds.
    unsafe { libc::getuid() }
}

#[cfg(not(unix))]
fn current_uid() -> u32 {
    0
}

fn default_cache_dir() -> PathBuf {
    env::var_os("XDG_CACHE_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|h| Path::new(&h).join(".cache")))
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("workspacefs")
}

fn load_file_config(path: &Path) -> FileConfig {
    if !path.exists() {
        tracing::warn!(path = %path.display(), "config file not found, using defaults");
        return FileConfig::default();
    }
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            tracing::warn!(error = %e, "failed to read config file, using defaults");
            return FileConfig::default();
        }
    };
    match toml::from_str(&content) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!(error = %e, "failed to parse config file, using defaults");
            FileConfig::default()
        }
    }
}

/// Loads `config.toml` from the current directory (falling back to
/// defaults on any file-level failure, as the teacher does) and the
/// remote host/token from the environment (required — no default exists
/// for either, per §6).
pub fn load_config() -> Result<Config, ConfigError> {
    let file = load_file_config(Path::new(CONFIG_FILE));
    let remote_host = env::var(HOST_ENV_VAR).map_err(|_| ConfigError::MissingEnvVar(HOST_ENV_VAR.to_string()))?;
    let remote_token = env::var(TOKEN_ENV_VAR).map_err(|_| ConfigError::MissingEnvVar(TOKEN_ENV_VAR.to_string()))?;
    Ok(Config { file, remote_host, remote_token })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_config_defaults_match_spec_bounds() {
        let cfg = FileConfig::default();
        assert_eq!(cfg.metadata_cache_ttl_seconds, 60);
        assert_eq!(cfg.metadata_cache_capacity, 10_000);
        assert!(!cfg.disk_cache_disabled);
    }

    #[test]
    fn missing_env_var_is_reported_by_name() {
        let err = ConfigError::MissingEnvVar(HOST_ENV_VAR.to_string());
        assert!(err.to_string().contains(HOST_ENV_VAR));
    }
}
