//! Configuration loading
//!
//! Root folder resolution priority, highest first:
//! 1. CLI argument
//! 2. `BEATPLANNER_ROOT_FOLDER` environment variable
//! 3. `BEATPLANNER_ROOT` environment variable
//! 4. `root_folder` in `<config dir>/beatplanner/<module>.toml`
//! 5. Compiled platform default (user data directory)
//!
//! A missing or malformed TOML file never aborts startup; the affected
//! settings fall back to defaults with a log line.

use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

pub const ENV_ROOT_FOLDER: &str = "BEATPLANNER_ROOT_FOLDER";
pub const ENV_ROOT: &str = "BEATPLANNER_ROOT";

/// Compiled fallback defaults for the current platform.
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let root_folder = dirs::data_dir()
            .map(|dir| dir.join("beatplanner"))
            .unwrap_or_else(|| PathBuf::from(".beatplanner"));
        Self {
            root_folder,
            log_level: "info".to_string(),
        }
    }
}

/// Per-module TOML configuration schema.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub root_folder: Option<PathBuf>,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Settings for the periodic membership repair task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default = "default_sync_enabled")]
    pub enabled: bool,
    #[serde(default = "default_sync_interval")]
    pub interval_secs: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: default_sync_enabled(),
            interval_secs: default_sync_interval(),
        }
    }
}

fn default_sync_enabled() -> bool {
    true
}

fn default_sync_interval() -> u64 {
    30
}

/// Resolves the root folder for a module using the priority order above.
pub struct RootFolderResolver {
    module: String,
}

impl RootFolderResolver {
    pub fn new(module: &str) -> Self {
        Self {
            module: module.to_string(),
        }
    }

    /// Full resolution with an optional CLI override (highest priority).
    pub fn resolve_with_cli(&self, cli_root: Option<&Path>) -> PathBuf {
        if let Some(root) = cli_root {
            debug!("Root folder from CLI argument: {}", root.display());
            return root.to_path_buf();
        }
        self.resolve()
    }

    /// Resolution without a CLI argument: environment, TOML, then default.
    pub fn resolve(&self) -> PathBuf {
        for var in [ENV_ROOT_FOLDER, ENV_ROOT] {
            if let Ok(root) = env::var(var) {
                if !root.is_empty() {
                    debug!("Root folder from {}: {}", var, root);
                    return PathBuf::from(root);
                }
            }
        }
        let config = self.load_config();
        if let Some(root) = config.root_folder {
            debug!("Root folder from config file: {}", root.display());
            return root;
        }
        CompiledDefaults::for_current_platform().root_folder
    }

    /// Path of this module's TOML config file, if a config dir exists.
    pub fn config_file_path(&self) -> Option<PathBuf> {
        dirs::config_dir().map(|dir| {
            dir.join("beatplanner")
                .join(format!("{}.toml", self.module))
        })
    }

    /// Log level for the startup filter: the TOML `[logging]` level when
    /// the file parses, the compiled default otherwise.
    ///
    /// Reads quietly. This runs before the tracing subscriber is
    /// installed, so file problems are not reported here; `load_config`
    /// reads the same file again once logging is up and warns then.
    pub fn configured_log_level(&self) -> String {
        self.config_file_path()
            .and_then(|path| std::fs::read_to_string(path).ok())
            .and_then(|raw| toml::from_str::<TomlConfig>(&raw).ok())
            .map(|config| config.logging.level)
            .unwrap_or_else(|| CompiledDefaults::for_current_platform().log_level)
    }

    /// Load the module's TOML config. Missing or malformed files degrade to
    /// defaults rather than failing startup.
    pub fn load_config(&self) -> TomlConfig {
        let Some(path) = self.config_file_path() else {
            return TomlConfig::default();
        };
        match std::fs::read_to_string(&path) {
            Ok(raw) => match toml::from_str(&raw) {
                Ok(config) => config,
                Err(e) => {
                    warn!("Ignoring malformed config {}: {}", path.display(), e);
                    TomlConfig::default()
                }
            },
            Err(_) => {
                debug!("No config file at {} (using defaults)", path.display());
                TomlConfig::default()
            }
        }
    }
}

/// Prepares a resolved root folder for use.
pub struct RootFolderInitializer {
    root: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root folder (and parents) if missing. Idempotent.
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root)?;
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root.join("beatplanner.db")
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }
}
