//! The tool usage registry and its activation policy.
//!
//! [`ToolRegistry`] owns every [`ToolStat`] for the life of the process. It
//! is loaded once from the backing store plus the usage event log, mutated
//! in memory as the agent records tool calls, and rewritten in full whenever
//! a tool is enabled or disabled.
//!
//! A single mutex guards the statistics map and every store write, so the
//! registry can be shared across threads behind an `Arc`. There is no
//! cross-process coordination: two processes sharing a store overwrite each
//! other, last writer wins.
//!
//! # Examples
//!
//! ```ignore
//! let registry = ToolRegistry::load(RegistryConfig::default());
//! registry.record_usage("grep", 12.0, true);
//! registry.save()?;
//!
//! let changes = registry.auto_optimize()?;
//! println!("disabled: {:?}", changes.disabled);
//! ```

use std::cmp::Reverse;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::config::RegistryConfig;
use crate::error::RegistryResult;
use crate::report::{self, ChangeSet, StatusReport};
use crate::stats::{ToolCategory, ToolStat, default_categories};
use crate::store;

/// Models known not to accept image input.
pub const NO_IMAGE_MODELS: &[&str] = &["claude-opus-4-5-thinking", "gemini-3-flash"];

/// Name fragments marking a tool as image or clipboard capable.
pub const IMAGE_TOOL_TERMS: &[&str] = &["image", "clipboard", "picture", "screenshot"];

/// Per-tool usage statistics with threshold-based activation policy.
pub struct ToolRegistry {
    config: RegistryConfig,
    categories: Vec<ToolCategory>,
    tools: Mutex<IndexMap<String, ToolStat>>,
}

impl ToolRegistry {
    /// Load the registry from the store and usage log named in `config`.
    ///
    /// Never fails: unreadable or malformed files are logged and treated as
    /// empty. The usage log is folded in file order, so the last entry for a
    /// tool determines its `last_used`.
    pub fn load(config: RegistryConfig) -> Self {
        let mut tools = store::load_tools(&config.store_path);

        let events = store::load_usage_log(&config.usage_log_path);
        let replayed = events.len();
        for event in events {
            let stat = tools
                .entry(event.tool.clone())
                .or_insert_with(|| ToolStat::new(event.tool));
            stat.use_count += 1;
            if let Some(ts) = event.timestamp {
                stat.last_used = Some(ts);
            }
        }

        info!(
            "Tool registry loaded: {} tool(s), {replayed} usage event(s) replayed",
            tools.len()
        );
        Self::with_tools(config, tools)
    }

    /// An empty registry that has not read anything from disk.
    ///
    /// Mutating enable/disable calls still write to `config.store_path`.
    pub fn in_memory(config: RegistryConfig) -> Self {
        Self::with_tools(config, IndexMap::new())
    }

    fn with_tools(config: RegistryConfig, tools: IndexMap<String, ToolStat>) -> Self {
        Self {
            config,
            categories: default_categories(),
            tools: Mutex::new(tools),
        }
    }

    /// Lock the statistics map. A poisoned lock is recovered; the map holds
    /// plain data and every update leaves it consistent.
    fn lock(&self) -> MutexGuard<'_, IndexMap<String, ToolStat>> {
        self.tools.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Paths and thresholds this registry was built with.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Categories in lookup order.
    pub fn categories(&self) -> &[ToolCategory] {
        &self.categories
    }

    /// Number of tracked tools.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no tool is tracked yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A copy of one tool's statistics.
    pub fn tool(&self, name: &str) -> Option<ToolStat> {
        self.lock().get(name).cloned()
    }

    /// A copy of every tool's statistics, in insertion order.
    pub fn snapshot(&self) -> Vec<ToolStat> {
        self.lock().values().cloned().collect()
    }

    // ── Recording ──────────────────────────────────────────────────

    /// Record one use of `tool` at the current time.
    ///
    /// Unknown tools are created. Does not save; call [`save`](Self::save)
    /// when the recorded state should survive the process.
    pub fn record_usage(&self, tool: &str, duration_ms: f64, success: bool) {
        self.record_usage_at(tool, duration_ms, success, Utc::now());
    }

    /// Record one use of `tool` at `at`.
    pub fn record_usage_at(&self, tool: &str, duration_ms: f64, success: bool, at: DateTime<Utc>) {
        let mut tools = self.lock();
        let stat = tools
            .entry(tool.to_string())
            .or_insert_with(|| ToolStat::new(tool));
        stat.apply_use(duration_ms, success, at);
        debug!(
            "Recorded use of '{tool}' ({} total, {:.1}% success)",
            stat.use_count, stat.success_rate
        );
    }

    /// Write the full registry state to the backing store.
    pub fn save(&self) -> RegistryResult<()> {
        let tools = self.lock();
        store::save(&self.config.store_path, &tools, &self.categories)
    }

    // ── Queries ────────────────────────────────────────────────────

    /// Up to `limit` tool names ranked by priority (high first), then use
    /// count (most first), then `last_used` (oldest first, never-used first).
    ///
    /// The sort is stable, so ties keep insertion order.
    pub fn get_active_tools(&self, limit: usize) -> Vec<String> {
        let tools = self.lock();
        let mut ranked: Vec<&ToolStat> = tools.values().collect();
        ranked.sort_by_key(|s| (s.priority, Reverse(s.use_count), s.last_used));
        ranked
            .into_iter()
            .take(limit)
            .map(|s| s.name.clone())
            .collect()
    }

    /// Active tools that look idle or under-used right now.
    pub fn get_inactive_tools(&self) -> Vec<String> {
        self.get_inactive_tools_at(Utc::now())
    }

    /// Active tools that look idle or under-used as of `now`.
    pub fn get_inactive_tools_at(&self, now: DateTime<Utc>) -> Vec<String> {
        inactive_names(&self.lock(), &self.config, now)
    }

    /// Build a status report with recommendations.
    pub fn get_status_report(&self) -> StatusReport {
        let now = Utc::now();
        let tools = self.lock();
        let inactive = inactive_names(&tools, &self.config, now);
        report::build(&tools, &self.categories, &self.config, inactive, now)
    }

    // ── Activation ─────────────────────────────────────────────────

    /// Mark `name` inactive and save.
    ///
    /// Returns `Ok(false)` without touching anything when the tool is unknown.
    /// If the save fails the flag is restored before the error is returned.
    pub fn disable_tool(&self, name: &str) -> RegistryResult<bool> {
        self.set_active(name, false)
    }

    /// Mark `name` active and save.
    ///
    /// Returns `Ok(false)` without touching anything when the tool is unknown.
    /// If the save fails the flag is restored before the error is returned.
    pub fn enable_tool(&self, name: &str) -> RegistryResult<bool> {
        self.set_active(name, true)
    }

    fn set_active(&self, name: &str, active: bool) -> RegistryResult<bool> {
        let mut tools = self.lock();
        let Some(stat) = tools.get_mut(name) else {
            debug!("Cannot change activation of unknown tool '{name}'");
            return Ok(false);
        };
        let previous = std::mem::replace(&mut stat.is_active, active);
        if let Err(e) = store::save(&self.config.store_path, &tools, &self.categories) {
            if let Some(stat) = tools.get_mut(name) {
                stat.is_active = previous;
            }
            warn!("Could not save activation change for '{name}'; reverted");
            return Err(e);
        }
        info!(
            "Tool '{name}' {}",
            if active { "enabled" } else { "disabled" }
        );
        Ok(true)
    }

    /// Disable idle tools, then re-enable popular ones if too few remain.
    ///
    /// Phase two only runs when fewer than `min_active_floor` tools are
    /// active after phase one. It re-enables, most used first, every
    /// inactive tool with more than `reenable_min_uses` uses. The store is
    /// saved once if anything changed. If that save fails every flip is
    /// undone, so memory still matches the store, and the error is returned.
    pub fn auto_optimize(&self) -> RegistryResult<ChangeSet> {
        let now = Utc::now();
        let mut tools = self.lock();
        let mut changes = ChangeSet::default();

        for name in inactive_names(&tools, &self.config, now) {
            if let Some(stat) = tools.get_mut(&name) {
                stat.is_active = false;
                changes.disabled.push(name);
            }
        }

        let active = tools.values().filter(|s| s.is_active).count();
        if active < self.config.min_active_floor {
            let mut candidates: Vec<&mut ToolStat> = tools
                .values_mut()
                .filter(|s| !s.is_active && s.use_count > self.config.reenable_min_uses)
                .collect();
            candidates.sort_by_key(|s| Reverse(s.use_count));
            for stat in candidates {
                stat.is_active = true;
                changes.enabled.push(stat.name.clone());
            }
        }

        if !changes.is_empty() {
            save_or_revert(&self.config.store_path, &mut tools, &self.categories, &changes)?;
            info!(
                "Auto-optimize: disabled {:?}, enabled {:?}",
                changes.disabled, changes.enabled
            );
        }
        Ok(changes)
    }

    /// Disable image and clipboard tools for models without image input.
    ///
    /// `model` matches when it contains one of [`NO_IMAGE_MODELS`],
    /// ignoring case. The `enabled` list of the result is always empty.
    /// A failed save undoes the flips before the error is returned.
    pub fn optimize_for_model(&self, model: &str) -> RegistryResult<ChangeSet> {
        let mut changes = ChangeSet::default();
        let model_lower = model.to_lowercase();
        if !NO_IMAGE_MODELS.iter().any(|m| model_lower.contains(m)) {
            debug!("Model '{model}' needs no tool adjustments");
            return Ok(changes);
        }

        let mut tools = self.lock();
        for stat in tools.values_mut() {
            let name_lower = stat.name.to_lowercase();
            if stat.is_active && IMAGE_TOOL_TERMS.iter().any(|t| name_lower.contains(t)) {
                stat.is_active = false;
                changes.disabled.push(stat.name.clone());
            }
        }

        if !changes.is_empty() {
            save_or_revert(&self.config.store_path, &mut tools, &self.categories, &changes)?;
            info!(
                "Model '{model}' lacks image input; disabled {:?}",
                changes.disabled
            );
        }
        Ok(changes)
    }
}

/// Save the store after `changes` were applied to `tools`, undoing them
/// if the write fails.
///
/// Re-enables are undone before disables, so a tool disabled and then
/// re-enabled in the same pass ends up active again.
fn save_or_revert(
    path: &Path,
    tools: &mut IndexMap<String, ToolStat>,
    categories: &[ToolCategory],
    changes: &ChangeSet,
) -> RegistryResult<()> {
    let Err(e) = store::save(path, tools, categories) else {
        return Ok(());
    };
    for name in &changes.enabled {
        if let Some(stat) = tools.get_mut(name) {
            stat.is_active = false;
        }
    }
    for name in &changes.disabled {
        if let Some(stat) = tools.get_mut(name) {
            stat.is_active = true;
        }
    }
    warn!(
        "Could not save {} activation change(s); reverted",
        changes.disabled.len() + changes.enabled.len()
    );
    Err(e)
}

/// Apply the idle and under-use rules to every active tool.
///
/// Tools without `last_used` are never reported, whatever their count.
fn inactive_names(
    tools: &IndexMap<String, ToolStat>,
    config: &RegistryConfig,
    now: DateTime<Utc>,
) -> Vec<String> {
    tools
        .values()
        .filter(|stat| stat.is_active)
        .filter(|stat| {
            let Some(last_used) = stat.last_used else {
                return false;
            };
            let idle = now - last_used;
            if idle > config.idle_threshold {
                return true;
            }
            let under_used = stat.use_count > 0 && stat.use_count < config.usage_threshold;
            under_used && idle > config.recent_idle
        })
        .map(|stat| stat.name.clone())
        .collect()
}
