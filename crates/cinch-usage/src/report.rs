//! Status reports, change sets, and recommendation rules.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::Serialize;

use crate::config::RegistryConfig;
use crate::stats::{ToolCategory, ToolStat};

/// Bucket for tools that belong to no category.
pub const UNCATEGORIZED: &str = "uncategorized";

/// Tools whose activation changed during an optimization pass.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub disabled: Vec<String>,
    pub enabled: Vec<String>,
}

impl ChangeSet {
    /// Whether nothing changed.
    pub fn is_empty(&self) -> bool {
        self.disabled.is_empty() && self.enabled.is_empty()
    }
}

/// One tool line in the per-category breakdown.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CategoryEntry {
    pub name: String,
    pub use_count: u64,
    pub is_active: bool,
    pub success_rate: f64,
}

/// Active member count of a category against its advisory bounds.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct CategoryBounds {
    pub name: String,
    /// Tracked members that are currently active.
    pub active: usize,
    pub min_active: usize,
    pub max_active: usize,
    pub within_bounds: bool,
}

/// Snapshot of the registry for humans and dashboards.
#[derive(Serialize, Debug, Clone)]
pub struct StatusReport {
    pub timestamp: DateTime<Utc>,
    pub total_tools: usize,
    pub active_tools: usize,
    /// Number of tools in `inactive_list`.
    pub inactive_tools: usize,
    pub inactive_list: Vec<String>,
    pub by_category: IndexMap<String, Vec<CategoryEntry>>,
    pub category_bounds: Vec<CategoryBounds>,
    pub recommendations: Vec<String>,
}

/// Name of the first category listing `tool`, or [`UNCATEGORIZED`].
pub fn category_of<'a>(tool: &str, categories: &'a [ToolCategory]) -> &'a str {
    categories
        .iter()
        .find(|c| c.contains(tool))
        .map_or(UNCATEGORIZED, |c| c.name.as_str())
}

/// Assemble a report. `inactive` is the idle list computed for `now`.
pub(crate) fn build(
    tools: &IndexMap<String, ToolStat>,
    categories: &[ToolCategory],
    config: &RegistryConfig,
    inactive: Vec<String>,
    now: DateTime<Utc>,
) -> StatusReport {
    let mut by_category: IndexMap<String, Vec<CategoryEntry>> = IndexMap::new();
    for (name, stat) in tools {
        by_category
            .entry(category_of(name, categories).to_string())
            .or_default()
            .push(CategoryEntry {
                name: name.clone(),
                use_count: stat.use_count,
                is_active: stat.is_active,
                success_rate: stat.success_rate,
            });
    }

    let category_bounds = categories
        .iter()
        .map(|cat| {
            let active = cat
                .tools
                .iter()
                .filter(|t| tools.get(t.as_str()).is_some_and(|s| s.is_active))
                .count();
            CategoryBounds {
                name: cat.name.clone(),
                active,
                min_active: cat.min_active,
                max_active: cat.max_active,
                within_bounds: (cat.min_active..=cat.max_active).contains(&active),
            }
        })
        .collect();

    StatusReport {
        timestamp: now,
        total_tools: tools.len(),
        active_tools: tools.values().filter(|s| s.is_active).count(),
        inactive_tools: inactive.len(),
        inactive_list: inactive,
        by_category,
        category_bounds,
        recommendations: recommendations(tools, config),
    }
}

/// Evaluate the recommendation rules. Each rule fires independently.
pub fn recommendations(tools: &IndexMap<String, ToolStat>, config: &RegistryConfig) -> Vec<String> {
    let mut out = Vec::new();

    let low_success: Vec<&str> = tools
        .values()
        .filter(|s| {
            s.success_rate < config.low_success_rate && s.use_count > config.low_success_min_uses
        })
        .map(|s| s.name.as_str())
        .collect();
    if !low_success.is_empty() {
        out.push(format!(
            "Review tools with a low success rate: {}",
            low_success.join(", ")
        ));
    }

    // Counts active tools that were ever used, not tools that are idle now.
    let active_and_used = tools
        .values()
        .filter(|s| s.is_active && s.last_used.is_some())
        .count();
    if active_and_used > config.idle_recommendation_count {
        out.push("Consider disabling tools that have not been used recently".to_string());
    }

    out
}
