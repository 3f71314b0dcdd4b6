//! Registry configuration: file locations and policy thresholds.
//!
//! [`RegistryConfig`] is passed to [`ToolRegistry::load`](crate::ToolRegistry::load)
//! instead of deriving paths from the install location. Defaults place both
//! files under `.agents/tools/` next to the agent's session directory.
//!
//! # Examples
//!
//! ```ignore
//! let config = RegistryConfig::default()
//!     .with_store_path("/var/lib/agent/usage-config.json")
//!     .with_idle_days(14)
//!     .with_usage_threshold(25);
//! let registry = ToolRegistry::load(config);
//! ```

use chrono::Duration;
use std::path::PathBuf;

/// Environment variable overriding [`RegistryConfig::store_path`].
pub const STORE_ENV: &str = "CINCH_USAGE_STORE";

/// Environment variable overriding [`RegistryConfig::usage_log_path`].
pub const LOG_ENV: &str = "CINCH_USAGE_LOG";

/// Largest idle threshold, in days, the CLI accepts.
pub const MAX_IDLE_DAYS: i64 = 36_500;

/// Configuration for a [`ToolRegistry`](crate::ToolRegistry).
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Backing store. Default: `.agents/tools/usage-config.json`.
    pub store_path: PathBuf,
    /// Read-only usage event log. Default: `.agents/tools/usage-log.json`.
    pub usage_log_path: PathBuf,
    /// Idle time after which an active, used tool is flagged inactive. Default: 7 days.
    pub idle_threshold: Duration,
    /// Use count below which a tool is under-used. Default: `50`.
    pub usage_threshold: u64,
    /// Idle time after which an under-used tool is flagged inactive. Default: 1 day.
    pub recent_idle: Duration,
    /// Active count below which auto-optimization re-enables popular tools. Default: `5`.
    pub min_active_floor: usize,
    /// Tools need strictly more uses than this to be re-enabled. Default: `20`.
    pub reenable_min_uses: u64,
    /// Success rate (percent) below which a tool is reported. Default: `80.0`.
    pub low_success_rate: f64,
    /// Tools need strictly more uses than this to be reported for low success. Default: `10`.
    pub low_success_min_uses: u64,
    /// Active-and-used count above which the idle review is recommended. Default: `5`.
    pub idle_recommendation_count: usize,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            store_path: PathBuf::from(".agents/tools/usage-config.json"),
            usage_log_path: PathBuf::from(".agents/tools/usage-log.json"),
            idle_threshold: Duration::days(7),
            usage_threshold: 50,
            recent_idle: Duration::days(1),
            min_active_floor: 5,
            reenable_min_uses: 20,
            low_success_rate: 80.0,
            low_success_min_uses: 10,
            idle_recommendation_count: 5,
        }
    }
}

impl RegistryConfig {
    /// Defaults with [`STORE_ENV`] and [`LOG_ENV`] applied when set.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(path) = std::env::var_os(STORE_ENV).filter(|v| !v.is_empty()) {
            config.store_path = PathBuf::from(path);
        }
        if let Some(path) = std::env::var_os(LOG_ENV).filter(|v| !v.is_empty()) {
            config.usage_log_path = PathBuf::from(path);
        }
        config
    }

    /// Place both files inside `dir` using the default file names.
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            store_path: dir.join("usage-config.json"),
            usage_log_path: dir.join("usage-log.json"),
            ..Default::default()
        }
    }

    /// Set the backing store path.
    pub fn with_store_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.store_path = path.into();
        self
    }

    /// Set the usage event log path.
    pub fn with_usage_log_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.usage_log_path = path.into();
        self
    }

    /// Set the idle threshold in whole days.
    ///
    /// Negative values count as zero. Values past the range of
    /// [`Duration`] saturate to [`Duration::MAX`].
    pub fn with_idle_days(mut self, days: i64) -> Self {
        self.idle_threshold = Duration::try_days(days.max(0)).unwrap_or(Duration::MAX);
        self
    }

    /// Set the use count below which a tool is under-used.
    pub fn with_usage_threshold(mut self, count: u64) -> Self {
        self.usage_threshold = count;
        self
    }

    /// Set the active count below which popular tools are re-enabled.
    pub fn with_min_active_floor(mut self, floor: usize) -> Self {
        self.min_active_floor = floor;
        self
    }
}
