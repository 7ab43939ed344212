//! Configuration loading for scribe.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/scribe/config.toml.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use config::{Config, Environment, File};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};

use crate::error::ScribeError;

/// Identifies a search engine implementation.
///
/// Engine roles are chosen by this tag in configuration, never by
/// inspecting runtime types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Embedded Tantivy inverted index
    Tantivy,
    /// Substring scan over the derived-index rows
    Database,
    /// In-memory engine used in tests
    Memory,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineKind::Tantivy => "tantivy",
            EngineKind::Database => "database",
            EngineKind::Memory => "memory",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = ScribeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tantivy" => Ok(EngineKind::Tantivy),
            "database" => Ok(EngineKind::Database),
            "memory" => Ok(EngineKind::Memory),
            other => Err(ScribeError::UnknownEngineKind(other.to_string())),
        }
    }
}

/// Which engine is primary; every other configured engine is a fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default = "default_primary_engine")]
    pub primary: EngineKind,
}

fn default_primary_engine() -> EngineKind {
    EngineKind::Tantivy
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            primary: default_primary_engine(),
        }
    }
}

/// Bounded exponential backoff for engine writes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total attempts per write, including the first (1 = no retry)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_interval_ms")]
    pub initial_interval_ms: u64,

    /// Cap on a single backoff delay
    #[serde(default = "default_max_interval_ms")]
    pub max_interval_ms: u64,

    /// Cap on total time spent retrying one write
    #[serde(default = "default_max_elapsed_ms")]
    pub max_elapsed_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_interval_ms() -> u64 {
    100
}

fn default_max_interval_ms() -> u64 {
    2_000
}

fn default_max_elapsed_ms() -> u64 {
    10_000
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_interval_ms: default_initial_interval_ms(),
            max_interval_ms: default_max_interval_ms(),
            max_elapsed_ms: default_max_elapsed_ms(),
        }
    }
}

impl RetrySettings {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_retries == 0 {
            return Err("max_retries must be >= 1".to_string());
        }
        if self.initial_interval_ms > self.max_interval_ms {
            return Err(format!(
                "initial_interval_ms ({}) must not exceed max_interval_ms ({})",
                self.initial_interval_ms, self.max_interval_ms
            ));
        }
        Ok(())
    }
}

/// Background maintenance and paging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaintenanceSettings {
    /// Page size for rebuild, sync and cleanup passes
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_sync_interval_secs")]
    pub sync_interval_secs: u64,

    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

fn default_batch_size() -> usize {
    100
}

fn default_sync_interval_secs() -> u64 {
    15 * 60
}

fn default_cleanup_interval_secs() -> u64 {
    60 * 60
}

impl Default for MaintenanceSettings {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            sync_interval_secs: default_sync_interval_secs(),
            cleanup_interval_secs: default_cleanup_interval_secs(),
        }
    }
}

/// Tantivy index tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchSettings {
    /// Memory budget for the index writer in MB
    #[serde(default = "default_writer_memory_mb")]
    pub writer_memory_mb: usize,

    /// Replace an index whose on-disk schema no longer matches. The index is
    /// derived data; a rebuild repopulates it.
    #[serde(default = "default_recreate_on_schema_mismatch")]
    pub recreate_on_schema_mismatch: bool,
}

/// Smallest writer budget Tantivy accepts
pub const MIN_WRITER_MEMORY_MB: usize = 15;

fn default_writer_memory_mb() -> usize {
    50
}

fn default_recreate_on_schema_mismatch() -> bool {
    true
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            writer_memory_mb: default_writer_memory_mb(),
            recreate_on_schema_mismatch: default_recreate_on_schema_mismatch(),
        }
    }
}

impl SearchSettings {
    pub fn validate(&self) -> Result<(), String> {
        if self.writer_memory_mb < MIN_WRITER_MEMORY_MB {
            return Err(format!(
                "writer_memory_mb ({}) must be >= {}",
                self.writer_memory_mb, MIN_WRITER_MEMORY_MB
            ));
        }
        Ok(())
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Path to RocksDB storage directory
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Path to Tantivy index directory
    #[serde(default = "default_search_index_path")]
    pub search_index_path: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Language tag stamped on every document
    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default)]
    pub engines: EngineSettings,

    #[serde(default)]
    pub retry: RetrySettings,

    #[serde(default)]
    pub maintenance: MaintenanceSettings,

    #[serde(default)]
    pub search: SearchSettings,
}

fn default_db_path() -> String {
    ProjectDirs::from("", "", "scribe")
        .map(|p| p.data_local_dir().join("db"))
        .unwrap_or_else(|| PathBuf::from("./data"))
        .to_string_lossy()
        .to_string()
}

fn default_search_index_path() -> String {
    ProjectDirs::from("", "", "scribe")
        .map(|p| p.data_local_dir().join("search-index"))
        .unwrap_or_else(|| PathBuf::from("./search-index"))
        .to_string_lossy()
        .to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_language() -> String {
    "en".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            search_index_path: default_search_index_path(),
            log_level: default_log_level(),
            language: default_language(),
            engines: EngineSettings::default(),
            retry: RetrySettings::default(),
            maintenance: MaintenanceSettings::default(),
            search: SearchSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/scribe/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (SCRIBE_*, `__` separates nested keys)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, ScribeError> {
        let config_dir = ProjectDirs::from("", "", "scribe")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("db_path", default_db_path())
            .map_err(|e| ScribeError::Config(e.to_string()))?
            .set_default("search_index_path", default_search_index_path())
            .map_err(|e| ScribeError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| ScribeError::Config(e.to_string()))?
            .set_default("language", default_language())
            .map_err(|e| ScribeError::Config(e.to_string()))?
            .set_default("engines.primary", default_primary_engine().as_str())
            .map_err(|e| ScribeError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // SCRIBE_DB_PATH, SCRIBE_ENGINES__PRIMARY, SCRIBE_RETRY__MAX_RETRIES, ...
        builder = builder.add_source(
            Environment::with_prefix("SCRIBE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| ScribeError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| ScribeError::Config(e.to_string()))?;

        settings.retry.validate().map_err(ScribeError::Config)?;
        settings.search.validate().map_err(ScribeError::Config)?;
        Ok(settings)
    }

    /// Expand ~ in db_path to the home directory
    pub fn expanded_db_path(&self) -> PathBuf {
        expand_home(&self.db_path)
    }

    /// Expand ~ in search_index_path to the home directory
    pub fn expanded_search_index_path(&self) -> PathBuf {
        expand_home(&self.search_index_path)
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(dirs) = BaseDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    PathBuf::from(path)
}
