//! Configuration for the Reelsort engine.
//!
//! Fixed tuning constants live on unit structs with associated consts. Runtime
//! settings live on [`EngineConfig`], which deserializes from JSON with every
//! field defaulted so partial files are valid.

use crate::error::{ReelsortError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application-level constants.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "reelsort";
    pub const CONFIG_FILENAME: &'static str = "config.json";
}

/// Scanner tuning.
pub struct ScanConfig;

impl ScanConfig {
    /// Progress callback cadence, in scanned files.
    pub const PROGRESS_INTERVAL: u64 = 10;
    /// Confidence below which a classified file is flagged for review.
    pub const NEEDS_REVIEW_THRESHOLD: f64 = 0.8;
    pub const MIN_MOVIE_SIZE: u64 = 500 * 1024 * 1024;
    pub const MIN_EPISODE_SIZE: u64 = 50 * 1024 * 1024;
    /// Provenance tag written on rows produced by a filesystem scan.
    pub const SOURCE_FILESYSTEM: &'static str = "filesystem";
    pub const SOURCE_PRIORITY_FILESYSTEM: i64 = 50;
}

/// Activity log retention windows.
pub struct ActivityConfig;

impl ActivityConfig {
    pub const RETRY_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);
    pub const CLEANUP_WINDOW: Duration = Duration::from_secs(7 * 24 * 60 * 60);
    pub const FILE_PREFIX: &'static str = "activity-";
    pub const FILE_SUFFIX: &'static str = ".jsonl";
}

/// Shared directory and file names under the data directory.
pub struct PathsConfig;

impl PathsConfig {
    pub const DATABASE_FILENAME: &'static str = "media.db";
    pub const AI_CACHE_FILENAME: &'static str = "ai-cache.db";
    pub const PLANS_DIR_NAME: &'static str = "plans";
    pub const ACTIVITY_DIR_NAME: &'static str = "activity";
    pub const LOGS_DIR_NAME: &'static str = "logs";
}

/// Watcher tuning.
pub struct WatchConfig;

impl WatchConfig {
    pub const DEBOUNCE: Duration = Duration::from_secs(2);
    pub const POLL_INTERVAL: Duration = Duration::from_millis(500);
}

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub ai: AiConfig,
    pub libraries: LibrariesConfig,
    pub periodic: PeriodicConfig,
    pub paths: DataPaths,
    pub permissions: PermissionsConfig,
}

impl EngineConfig {
    /// Load configuration from a JSON file. A missing file yields defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let config: Option<Self> = crate::atomic::atomic_read_json(path)?;
        let config = config.unwrap_or_default();
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("ai.confidence_threshold", self.ai.confidence_threshold),
            ("ai.auto_trigger_threshold", self.ai.auto_trigger_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ReelsortError::Validation {
                    field: field.to_string(),
                    message: format!("must be within [0, 1], got {}", value),
                });
            }
        }
        if self.periodic.interval_seconds == 0 {
            return Err(ReelsortError::Validation {
                field: "periodic.interval_seconds".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

/// AI fallback settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    pub enabled: bool,
    pub ollama_endpoint: String,
    pub model: String,
    /// AI results at or above this confidence are accepted outright.
    pub confidence_threshold: f64,
    /// The AI stage only runs when the current confidence is below this.
    pub auto_trigger_threshold: f64,
    pub timeout_seconds: u64,
    pub cache_enabled: bool,
    pub retry_delay_ms: u64,
    pub max_retries: u32,
    pub circuit_breaker: CircuitBreakerSettings,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ollama_endpoint: "http://localhost:11434".to_string(),
            model: "qwen2.5vl:7b".to_string(),
            confidence_threshold: 0.8,
            auto_trigger_threshold: 0.6,
            timeout_seconds: 30,
            cache_enabled: true,
            retry_delay_ms: 500,
            max_retries: 3,
            circuit_breaker: CircuitBreakerSettings::default(),
        }
    }
}

impl AiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Breaker thresholds for the AI matcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: u32,
    pub failure_window_seconds: u64,
    pub cooldown_seconds: u64,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            failure_window_seconds: 120,
            cooldown_seconds: 30,
        }
    }
}

/// Library roots. TV roots hold episodes, movie roots hold movies.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LibrariesConfig {
    pub tv: Vec<PathBuf>,
    pub movies: Vec<PathBuf>,
}

/// Periodic scan settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PeriodicConfig {
    pub enabled: bool,
    pub interval_seconds: u64,
    /// Download/intake folders re-walked on every tick.
    pub watch_paths: Vec<PathBuf>,
}

impl Default for PeriodicConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_seconds: 300,
            watch_paths: Vec::new(),
        }
    }
}

impl PeriodicConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

/// Location of on-disk state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataPaths {
    pub data_dir: PathBuf,
}

impl Default for DataPaths {
    fn default() -> Self {
        let data_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(AppConfig::APP_NAME);
        Self { data_dir }
    }
}

impl DataPaths {
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join(PathsConfig::DATABASE_FILENAME)
    }

    pub fn ai_cache_path(&self) -> PathBuf {
        self.data_dir.join(PathsConfig::AI_CACHE_FILENAME)
    }

    pub fn plans_dir(&self) -> PathBuf {
        self.data_dir.join(PathsConfig::PLANS_DIR_NAME)
    }

    pub fn activity_dir(&self) -> PathBuf {
        self.data_dir.join(PathsConfig::ACTIVITY_DIR_NAME)
    }
}

/// Ownership applied when a delete needs a permission fix.
///
/// `user` and `group` accept a name or a numeric id.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionsConfig {
    pub user: Option<String>,
    pub group: Option<String>,
}

impl PermissionsConfig {
    pub fn wants_ownership(&self) -> bool {
        self.user.as_deref().is_some_and(|u| !u.trim().is_empty())
            || self.group.as_deref().is_some_and(|g| !g.trim().is_empty())
    }
}
