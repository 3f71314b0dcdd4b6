//! Per-tool usage statistics and tool categories.
//!
//! [`ToolStat`] is the unit the registry tracks; [`ToolCategory`] groups
//! related tools with advisory bounds on how many should be active at once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::timestamp;

/// Default label for tools without an explicit category.
pub const DEFAULT_CATEGORY: &str = "general";

/// Highest priority rank.
pub const PRIORITY_HIGH: u8 = 1;

/// Lowest priority rank.
pub const PRIORITY_LOW: u8 = 3;

/// Usage statistics for one named tool.
///
/// Every field has a default so that partially written store entries still
/// load. Unknown fields are ignored.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ToolStat {
    /// Unique tool identifier.
    pub name: String,
    /// Number of recorded uses.
    pub use_count: u64,
    /// Most recent recorded use.
    #[serde(with = "timestamp::option")]
    pub last_used: Option<DateTime<Utc>>,
    /// Cumulative duration of recorded uses in milliseconds.
    pub total_duration_ms: f64,
    /// Number of recorded uses that reported failure. Never exceeds `use_count`.
    pub error_count: u64,
    /// Percentage of successful uses. Only recomputed while `use_count > 0`.
    pub success_rate: f64,
    /// Free-form label. Default: `"general"`.
    pub category: String,
    /// Rank from 1 (high) to 3 (low). Default: `1`.
    #[serde(deserialize_with = "saturating_priority")]
    pub priority: u8,
    /// Whether the tool is considered usable.
    pub is_active: bool,
    /// Last statistics update.
    #[serde(with = "timestamp::option")]
    pub last_checked: Option<DateTime<Utc>>,
}

impl Default for ToolStat {
    fn default() -> Self {
        Self {
            name: String::new(),
            use_count: 0,
            last_used: None,
            total_duration_ms: 0.0,
            error_count: 0,
            success_rate: 100.0,
            category: DEFAULT_CATEGORY.to_string(),
            priority: PRIORITY_HIGH,
            is_active: true,
            last_checked: None,
        }
    }
}

impl ToolStat {
    /// Create a fresh, active, never-used tool.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Apply one recorded use at `at`.
    ///
    /// Counters and the derived rate are updated together so that callers
    /// holding the registry lock never expose `error_count > use_count`.
    ///
    /// Negative and non-finite durations count as zero, and the running
    /// total saturates at `f64::MAX` so it always stays representable in JSON.
    pub fn apply_use(&mut self, duration_ms: f64, success: bool, at: DateTime<Utc>) {
        let duration_ms = if duration_ms.is_finite() { duration_ms.max(0.0) } else { 0.0 };
        self.use_count += 1;
        self.total_duration_ms = (self.total_duration_ms + duration_ms).min(f64::MAX);
        if !success {
            self.error_count += 1;
        }
        self.recompute_success_rate();
        self.last_used = Some(at);
        self.last_checked = Some(at);
    }

    /// Recompute `success_rate` from the counters. No-op while unused.
    pub fn recompute_success_rate(&mut self) {
        if self.use_count > 0 {
            let successes = self.use_count.saturating_sub(self.error_count);
            self.success_rate = successes as f64 / self.use_count as f64 * 100.0;
        }
    }

    /// Mean duration per recorded use, or `0.0` when unused.
    pub fn average_duration_ms(&self) -> f64 {
        if self.use_count == 0 {
            0.0
        } else {
            self.total_duration_ms / self.use_count as f64
        }
    }

    /// Whether this tool has ever been used.
    pub fn has_been_used(&self) -> bool {
        self.use_count > 0 || self.last_used.is_some()
    }

    /// Repair values a hand-edited or stale store may carry.
    ///
    /// Returns `true` if anything was changed.
    pub(crate) fn normalize(&mut self) -> bool {
        let mut changed = false;
        if self.error_count > self.use_count {
            self.error_count = self.use_count;
            self.recompute_success_rate();
            changed = true;
        }
        let clamped = self.priority.clamp(PRIORITY_HIGH, PRIORITY_LOW);
        if clamped != self.priority {
            self.priority = clamped;
            changed = true;
        }
        if !self.total_duration_ms.is_finite() || self.total_duration_ms < 0.0 {
            self.total_duration_ms = 0.0;
            changed = true;
        }
        changed
    }
}

/// Decode a stored priority of any integer value, saturating into `u8` so
/// [`ToolStat::normalize`] can clamp it instead of the entry being rejected.
fn saturating_priority<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = i64::deserialize(deserializer)?;
    Ok(u8::try_from(raw.max(0)).unwrap_or(u8::MAX))
}

/// A named grouping of tools with advisory active-count bounds.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ToolCategory {
    /// Category name.
    pub name: String,
    /// Member tool names, in declaration order.
    #[serde(default)]
    pub tools: Vec<String>,
    /// Minimum number of members that should be active.
    #[serde(default = "default_min_active")]
    pub min_active: usize,
    /// Maximum number of members that should be active.
    #[serde(default = "default_max_active")]
    pub max_active: usize,
}

fn default_min_active() -> usize {
    1
}

fn default_max_active() -> usize {
    3
}

impl ToolCategory {
    /// Create a category from string slices.
    pub fn new(
        name: impl Into<String>,
        tools: &[&str],
        min_active: usize,
        max_active: usize,
    ) -> Self {
        Self {
            name: name.into(),
            tools: tools.iter().map(|s| (*s).to_string()).collect(),
            min_active,
            max_active,
        }
    }

    /// Whether `tool` is a member of this category.
    pub fn contains(&self, tool: &str) -> bool {
        self.tools.iter().any(|t| t == tool)
    }
}

/// The built-in category table, in lookup order.
pub fn default_categories() -> Vec<ToolCategory> {
    vec![
        ToolCategory::new(
            "filesystem",
            &["filesystem", "read", "write", "edit", "glob", "grep"],
            2,
            3,
        ),
        ToolCategory::new(
            "mcp_core",
            &["context7", "sequential-thinking", "supabase-mcp-server"],
            2,
            2,
        ),
        ToolCategory::new("web", &["websearch", "webfetch", "codesearch"], 1, 2),
        ToolCategory::new("github", &["github-mcp-server"], 1, 1),
        ToolCategory::new("devtools", &["debugger", "chrome-devtools"], 1, 2),
        ToolCategory::new("cloud", &["render", "deepwiki"], 1, 1),
        ToolCategory::new("mobile", &["android"], 1, 1),
    ]
}
