//! Settings for the wrapper
//!
//! Resolution order (later wins):
//! 1. Built-in defaults (`~/.kubecredcache`, `AWS_ACCESS_KEY_ID`, 120s margin, 7 day retention)
//! 2. `KUBECREDCACHE_CONFIG_DIR` - moves the config directory and default cache directory
//! 3. `<config_dir>/config.toml`, if present
//! 4. `KUBECREDCACHE_*` environment overrides

use kubecredcache_cache::{DEFAULT_EARLY_MARGIN_SECONDS, DEFAULT_RETENTION_SECONDS, Error, Result};
use serde::Deserialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Program name, used for the config directory and env prefix
pub const PROGRAM_NAME: &str = "kubecredcache";
/// Settings file name inside the config directory
pub const CONFIG_FILE_NAME: &str = "config.toml";
/// Environment variable that holds the access key by default
pub const DEFAULT_ACCESS_KEY_ENV: &str = "AWS_ACCESS_KEY_ID";

const ENV_CONFIG_DIR: &str = "KUBECREDCACHE_CONFIG_DIR";
const ENV_CACHE_DIR: &str = "KUBECREDCACHE_CACHE_DIR";
/// Names the environment variable holding the access key
pub const ENV_ACCESS_KEY_ENV: &str = "KUBECREDCACHE_ACCESS_KEY_ENV";
const ENV_EXPIRE_EARLY: &str = "KUBECREDCACHE_EXPIRE_EARLY_SECONDS";
const ENV_GC_RETENTION: &str = "KUBECREDCACHE_GC_RETENTION_SECONDS";
const ENV_QUIET: &str = "KUBECREDCACHE_QUIET";

/// Resolved wrapper settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Directory holding `config.toml`
    pub config_dir: PathBuf,
    /// Directory holding cache entries
    pub cache_dir: PathBuf,
    /// Name of the environment variable carrying the access key id
    pub access_key_env: String,
    /// Seconds before real expiry at which an entry stops being served
    pub expire_early_seconds: u64,
    /// Age in seconds after which unused cache files are deleted; `0` disables GC
    pub gc_retention_seconds: u64,
    /// Suppress the cache status line
    pub quiet: bool,
}

/// Contents of `config.toml`; every key is optional
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct FileSettings {
    /// Cache directory override
    pub cache_dir: Option<PathBuf>,
    /// Access key variable name
    pub access_key_env: Option<String>,
    /// Early expiry margin in seconds
    pub expire_early_seconds: Option<u64>,
    /// GC retention in seconds
    pub gc_retention_seconds: Option<u64>,
    /// Suppress the status line
    pub quiet: Option<bool>,
}

impl Settings {
    /// Defaults rooted at `config_dir`
    #[must_use]
    pub fn with_config_dir(config_dir: impl Into<PathBuf>) -> Self {
        let config_dir = config_dir.into();
        Self {
            cache_dir: config_dir.clone(),
            config_dir,
            access_key_env: DEFAULT_ACCESS_KEY_ENV.to_string(),
            expire_early_seconds: DEFAULT_EARLY_MARGIN_SECONDS,
            gc_retention_seconds: DEFAULT_RETENTION_SECONDS,
            quiet: false,
        }
    }

    /// Load settings from the process environment and home directory.
    pub fn load() -> Result<Self> {
        Self::load_from(|name| std::env::var(name).ok(), dirs::home_dir())
    }

    /// Load settings with an explicit environment lookup and home directory.
    pub fn load_from(env: impl Fn(&str) -> Option<String>, home: Option<PathBuf>) -> Result<Self> {
        let lookup = |name: &str| env(name).filter(|v| !v.trim().is_empty());

        let config_dir = match lookup(ENV_CONFIG_DIR) {
            Some(dir) => PathBuf::from(dir),
            None => home
                .ok_or_else(|| Error::configuration("Could not determine home directory"))?
                .join(format!(".{PROGRAM_NAME}")),
        };

        let mut settings = Self::with_config_dir(config_dir);
        if let Some(file) = FileSettings::read(&settings.config_file())? {
            settings.apply_file(file);
        }

        if let Some(dir) = lookup(ENV_CACHE_DIR) {
            settings.cache_dir = PathBuf::from(dir);
        }
        if let Some(name) = lookup(ENV_ACCESS_KEY_ENV) {
            settings.access_key_env = name;
        }
        if let Some(value) = lookup(ENV_EXPIRE_EARLY) {
            settings.expire_early_seconds = parse_seconds(ENV_EXPIRE_EARLY, &value)?;
        }
        if let Some(value) = lookup(ENV_GC_RETENTION) {
            settings.gc_retention_seconds = parse_seconds(ENV_GC_RETENTION, &value)?;
        }
        if let Some(value) = lookup(ENV_QUIET) {
            settings.quiet = parse_bool(ENV_QUIET, &value)?;
        }

        tracing::debug!(
            config_dir = %settings.config_dir.display(),
            cache_dir = %settings.cache_dir.display(),
            access_key_env = %settings.access_key_env,
            expire_early_seconds = settings.expire_early_seconds,
            gc_retention_seconds = settings.gc_retention_seconds,
            "Resolved settings"
        );
        Ok(settings)
    }

    /// Path of `config.toml`
    #[must_use]
    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join(CONFIG_FILE_NAME)
    }

    /// Create the config and cache directories if needed.
    pub fn bootstrap(&self) -> Result<()> {
        for dir in [&self.config_dir, &self.cache_dir] {
            if dir.is_dir() {
                continue;
            }
            fs::create_dir_all(dir).map_err(|e| {
                Error::configuration(format!(
                    "Unable to create directory '{}': {e}",
                    dir.display()
                ))
            })?;
        }
        Ok(())
    }

    fn apply_file(&mut self, file: FileSettings) {
        if let Some(dir) = file.cache_dir {
            self.cache_dir = if dir.is_relative() {
                self.config_dir.join(dir)
            } else {
                dir
            };
        }
        if let Some(name) = file.access_key_env.filter(|n| !n.is_empty()) {
            self.access_key_env = name;
        }
        if let Some(secs) = file.expire_early_seconds {
            self.expire_early_seconds = secs;
        }
        if let Some(secs) = file.gc_retention_seconds {
            self.gc_retention_seconds = secs;
        }
        if let Some(quiet) = file.quiet {
            self.quiet = quiet;
        }
    }
}

impl FileSettings {
    /// Read and parse a settings file; a missing file is `Ok(None)`.
    pub fn read(path: &Path) -> Result<Option<Self>> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::io(e, path, "read")),
        };
        toml::from_str(&content).map(Some).map_err(|e| {
            Error::configuration(format!("Error reading '{}': {e}", path.display()))
        })
    }
}

fn parse_seconds(name: &str, value: &str) -> Result<u64> {
    value.trim().parse().map_err(|_| {
        Error::configuration(format!(
            "{name} must be a whole number of seconds, got '{value}'"
        ))
    })
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::configuration(format!(
            "{name} must be a boolean, got '{value}'"
        ))),
    }
}
