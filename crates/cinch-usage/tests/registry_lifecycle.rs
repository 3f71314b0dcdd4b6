//! Integration tests for the registry's load / mutate / save lifecycle.
//!
//! Every test works in its own temp directory with real store and usage
//! log files.

use chrono::{Duration, Utc};
use cinch_usage::{RegistryConfig, RegistryError, ToolRegistry};
use std::path::Path;

fn config_in(dir: &Path) -> RegistryConfig {
    RegistryConfig::in_dir(dir)
}

fn write_log(config: &RegistryConfig, body: &str) {
    std::fs::write(&config.usage_log_path, body).unwrap();
}

// ── Loading ──────────────────────────────────────────────────────────

#[test]
fn empty_directory_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let registry = ToolRegistry::load(config_in(dir.path()));
    assert!(registry.is_empty());
    assert_eq!(registry.categories().len(), 7);
}

#[test]
fn corrupt_files_start_empty() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    std::fs::write(&config.store_path, "\u{0}garbage").unwrap();
    write_log(&config, "{\"usage\": 17}");

    let registry = ToolRegistry::load(config);
    assert!(registry.is_empty());
}

#[test]
fn usage_log_is_folded_in_order() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    write_log(
        &config,
        r#"{"usage": [
            {"tool": "grep", "timestamp": "2025-01-01T10:00:00Z"},
            {"tool": "read"},
            {"tool": "grep", "timestamp": "2025-01-03T10:00:00Z"},
            {"tool": "grep"}
        ]}"#,
    );

    let registry = ToolRegistry::load(config);
    let grep = registry.tool("grep").unwrap();
    assert_eq!(grep.use_count, 3);
    assert_eq!(
        grep.last_used.map(|t| t.to_rfc3339()),
        Some("2025-01-03T10:00:00+00:00".to_string())
    );
    let read = registry.tool("read").unwrap();
    assert_eq!(read.use_count, 1);
    assert!(read.last_used.is_none());
}

#[test]
fn usage_log_adds_to_stored_counts() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    std::fs::write(
        &config.store_path,
        r#"{"tools": {"grep": {"name": "grep", "use_count": 10, "priority": 2, "is_active": false}}}"#,
    )
    .unwrap();
    write_log(&config, r#"{"usage": [{"tool": "grep"}, {"tool": "grep"}]}"#);

    let registry = ToolRegistry::load(config);
    let grep = registry.tool("grep").unwrap();
    assert_eq!(grep.use_count, 12);
    assert_eq!(grep.priority, 2);
    assert!(!grep.is_active);
}

#[test]
fn naive_timestamps_from_older_stores_load() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    std::fs::write(
        &config.store_path,
        r#"{"tools": {"edit": {"use_count": 4, "last_used": "2024-06-01T08:15:30.123456"}}}"#,
    )
    .unwrap();
    let registry = ToolRegistry::load(config);
    assert!(registry.tool("edit").unwrap().last_used.is_some());
}

// ── Persistence ──────────────────────────────────────────────────────

#[test]
fn save_then_load_round_trips_every_field() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let registry = ToolRegistry::in_memory(config.clone());
    let now = Utc::now();
    for i in 0..7 {
        registry.record_usage_at("grep", 3.3 * i as f64, i % 3 != 0, now);
    }
    registry.record_usage_at("webfetch", 120.25, false, now - Duration::days(3));
    registry.record_usage("clipboard", 0.1, true);
    assert!(registry.disable_tool("clipboard").unwrap());

    let before = registry.snapshot();
    let reloaded = ToolRegistry::load(config);
    assert_eq!(reloaded.snapshot(), before);
}

#[test]
fn recorded_usage_survives_only_after_save() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());

    let registry = ToolRegistry::load(config.clone());
    registry.record_usage("grep", 1.0, true);
    assert!(ToolRegistry::load(config.clone()).is_empty());

    registry.save().unwrap();
    assert_eq!(ToolRegistry::load(config).tool("grep").unwrap().use_count, 1);
}

#[test]
fn store_document_has_tools_categories_and_timestamp() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let registry = ToolRegistry::in_memory(config.clone());
    registry.record_usage("grep", 1.0, true);
    registry.save().unwrap();

    let doc: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&config.store_path).unwrap()).unwrap();
    assert_eq!(doc["tools"]["grep"]["use_count"], 1);
    assert_eq!(doc["categories"]["filesystem"]["min_active"], 2);
    assert!(doc["last_updated"].as_str().is_some());
}

#[test]
fn persistence_failure_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("not-a-dir");
    std::fs::write(&blocker, "").unwrap();
    let config = RegistryConfig::default()
        .with_store_path(blocker.join("store.json"))
        .with_usage_log_path(dir.path().join("log.json"));

    let registry = ToolRegistry::in_memory(config);
    registry.record_usage("grep", 1.0, true);
    let err = registry.disable_tool("grep").unwrap_err();
    assert!(matches!(err, RegistryError::Persist { .. }));
    assert!(registry.tool("grep").unwrap().is_active, "flip is reverted");
    assert!(registry.save().is_err());
}

#[test]
fn infinite_duration_does_not_lose_the_tool() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let registry = ToolRegistry::in_memory(config.clone());
    registry.record_usage("read", 2.0, true);
    registry.record_usage("grep", 5.0, true);
    registry.record_usage("grep", f64::INFINITY, true);
    registry.save().unwrap();

    let reloaded = ToolRegistry::load(config);
    assert_eq!(reloaded.snapshot(), registry.snapshot());
    let grep = reloaded.tool("grep").unwrap();
    assert_eq!(grep.use_count, 2);
    assert_eq!(grep.total_duration_ms, 5.0);
}

// ── Policy scenarios ─────────────────────────────────────────────────

#[test]
fn busy_tool_stays_active() {
    let dir = tempfile::tempdir().unwrap();
    let registry = ToolRegistry::in_memory(config_in(dir.path()));
    for _ in 0..60 {
        registry.record_usage("grep", 2.0, true);
    }
    assert!(!registry.get_inactive_tools().contains(&"grep".to_string()));
    assert_eq!(registry.tool("grep").unwrap().success_rate, 100.0);
}

#[test]
fn stale_image_tool_is_inactive() {
    let dir = tempfile::tempdir().unwrap();
    let registry = ToolRegistry::in_memory(config_in(dir.path()));
    let ten_days_ago = Utc::now() - Duration::days(10);
    registry.record_usage_at("ask_image", 5.0, true, ten_days_ago);
    registry.record_usage_at("ask_image", 5.0, true, ten_days_ago);

    let stat = registry.tool("ask_image").unwrap();
    assert_eq!(stat.use_count, 2);
    assert!(stat.is_active);
    assert_eq!(registry.get_inactive_tools(), ["ask_image"]);
}

#[test]
fn text_only_model_drops_clipboard() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let registry = ToolRegistry::in_memory(config.clone());
    registry.record_usage("clipboard", 1.0, true);

    let changes = registry
        .optimize_for_model("claude-opus-4-5-thinking")
        .unwrap();
    assert_eq!(changes.disabled, ["clipboard"]);
    assert!(changes.enabled.is_empty());
    assert!(!registry.tool("clipboard").unwrap().is_active);
    assert!(!ToolRegistry::load(config).tool("clipboard").unwrap().is_active);
}

#[test]
fn untracked_tools_never_appear() {
    let dir = tempfile::tempdir().unwrap();
    let registry = ToolRegistry::in_memory(config_in(dir.path()));
    registry.record_usage_at("old", 1.0, true, Utc::now() - Duration::days(30));
    let ghost = "ghost".to_string();
    assert!(!registry.get_active_tools(100).contains(&ghost));
    assert!(!registry.get_inactive_tools().contains(&ghost));
}

#[test]
fn optimize_keeps_popular_tools_when_active_set_collapses() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    let registry = ToolRegistry::in_memory(config.clone());
    let stale = Utc::now() - Duration::days(14);
    for (name, uses) in [("read", 45), ("write", 30), ("glob", 21), ("debugger", 3)] {
        for _ in 0..uses {
            registry.record_usage_at(name, 1.0, true, stale);
        }
    }

    let popular: Vec<String> = registry
        .snapshot()
        .into_iter()
        .filter(|s| s.is_active && s.use_count > 20)
        .map(|s| s.name)
        .collect();

    let changes = registry.auto_optimize().unwrap();
    assert_eq!(changes.disabled.len(), 4);
    assert_eq!(changes.enabled, ["read", "write", "glob"]);
    for name in &popular {
        assert!(registry.tool(name).unwrap().is_active, "{name} should be back");
    }
    assert!(!registry.tool("debugger").unwrap().is_active);

    let stored = ToolRegistry::load(config);
    assert!(stored.tool("read").unwrap().is_active);
    assert!(!stored.tool("debugger").unwrap().is_active);
}

#[test]
fn status_report_serializes() {
    let dir = tempfile::tempdir().unwrap();
    let registry = ToolRegistry::in_memory(config_in(dir.path()));
    for i in 0..12 {
        registry.record_usage("webfetch", 10.0, i < 4);
    }
    let report = registry.get_status_report();
    assert_eq!(report.recommendations.len(), 1);
    assert!(report.recommendations[0].contains("webfetch"));

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["total_tools"], 1);
    assert_eq!(json["by_category"]["web"][0]["name"], "webfetch");
    assert!(json["timestamp"].is_string());
}
