//! On-disk formats for the backing store and the usage event log.
//!
//! The store is a pretty-printed JSON document rewritten in full on every
//! save (temp file, then rename). The usage log is produced by other
//! components and only ever read here.
//!
//! Loading is fail-soft: a missing file is an empty start, and an unreadable
//! file or a malformed entry is logged and skipped. Nothing in this module
//! aborts a load.

use std::path::Path;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{RegistryError, RegistryResult};
use crate::stats::{ToolCategory, ToolStat};
use crate::timestamp;

/// Document written to the backing store.
#[derive(Serialize, Debug)]
pub struct StoreFile<'a> {
    pub tools: &'a IndexMap<String, ToolStat>,
    pub categories: IndexMap<&'a str, &'a ToolCategory>,
    pub last_updated: String,
}

/// One entry of the usage event log.
#[derive(Debug, Clone, PartialEq)]
pub struct UsageEvent {
    pub tool: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Raw log entry; unknown fields are ignored.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct RawUsageEntry {
    tool: Option<String>,
    timestamp: Option<String>,
}

/// Load tool statistics from the store at `path`.
///
/// Each entry under `"tools"` is decoded on its own so one bad entry does
/// not discard the rest. The map key is authoritative for the tool name.
pub fn load_tools(path: &Path) -> IndexMap<String, ToolStat> {
    let mut tools = IndexMap::new();
    let Some(doc) = read_json(path, "tool store") else {
        return tools;
    };

    let entries = match doc.get("tools") {
        Some(serde_json::Value::Object(map)) => map,
        Some(_) => {
            warn!("Ignoring tool store {}: \"tools\" is not an object", path.display());
            return tools;
        }
        None => return tools,
    };

    for (name, raw) in entries {
        match serde_json::from_value::<ToolStat>(raw.clone()) {
            Ok(mut stat) => {
                if !stat.name.is_empty() && stat.name != *name {
                    debug!("Store entry '{name}' carries name '{}'; using key", stat.name);
                }
                stat.name = name.clone();
                if stat.normalize() {
                    warn!("Repaired inconsistent statistics for tool '{name}'");
                }
                tools.insert(name.clone(), stat);
            }
            Err(e) => warn!("Skipping malformed tool entry '{name}': {e}"),
        }
    }

    debug!("Loaded {} tool(s) from {}", tools.len(), path.display());
    tools
}

/// Load the usage event log at `path`, in file order.
///
/// Entries without a tool name are dropped. A missing or unparseable
/// timestamp leaves the event's timestamp empty.
pub fn load_usage_log(path: &Path) -> Vec<UsageEvent> {
    let Some(doc) = read_json(path, "usage log") else {
        return Vec::new();
    };

    let entries = match doc.get("usage") {
        Some(serde_json::Value::Array(items)) => items,
        Some(_) => {
            warn!("Ignoring usage log {}: \"usage\" is not an array", path.display());
            return Vec::new();
        }
        None => return Vec::new(),
    };

    let mut events = Vec::with_capacity(entries.len());
    for (i, raw) in entries.iter().enumerate() {
        let entry = match serde_json::from_value::<RawUsageEntry>(raw.clone()) {
            Ok(e) => e,
            Err(e) => {
                warn!("Skipping malformed usage entry #{i}: {e}");
                continue;
            }
        };
        let Some(tool) = entry.tool.filter(|t| !t.is_empty()) else {
            continue;
        };
        let timestamp = entry.timestamp.as_deref().and_then(|raw| {
            let parsed = timestamp::parse(raw);
            if parsed.is_none() {
                warn!("Usage entry #{i} for '{tool}' has unparseable timestamp '{raw}'");
            }
            parsed
        });
        events.push(UsageEvent { tool, timestamp });
    }

    debug!("Loaded {} usage event(s) from {}", events.len(), path.display());
    events
}

/// Write the full store to `path`.
///
/// Serializes to a sibling temp file and renames it into place, creating
/// the parent directory if needed.
pub fn save(
    path: &Path,
    tools: &IndexMap<String, ToolStat>,
    categories: &[ToolCategory],
) -> RegistryResult<()> {
    let doc = StoreFile {
        tools,
        categories: categories.iter().map(|c| (c.name.as_str(), c)).collect(),
        last_updated: timestamp::format(&Utc::now()),
    };
    let json = serde_json::to_string_pretty(&doc)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| RegistryError::persist(parent, e))?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "store.json".to_string());
    let tmp_path = path.with_file_name(format!(".{file_name}.tmp"));

    std::fs::write(&tmp_path, json).map_err(|e| RegistryError::persist(&tmp_path, e))?;
    std::fs::rename(&tmp_path, path).map_err(|e| RegistryError::persist(path, e))?;

    debug!("Saved {} tool(s) to {}", tools.len(), path.display());
    Ok(())
}

/// Read and parse a JSON document, logging instead of failing.
fn read_json(path: &Path, what: &str) -> Option<serde_json::Value> {
    if !path.exists() {
        debug!("No {what} at {}; starting empty", path.display());
        return None;
    }
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) => {
            warn!("Failed to read {what} {}: {e}", path.display());
            return None;
        }
    };
    match serde_json::from_str(&content) {
        Ok(doc) => Some(doc),
        Err(e) => {
            warn!("Failed to parse {what} {}: {e}", path.display());
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::default_categories;

    #[test]
    fn missing_files_load_empty() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_tools(&dir.path().join("nope.json")).is_empty());
        assert!(load_usage_log(&dir.path().join("nope.json")).is_empty());
    }

    #[test]
    fn corrupt_store_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(load_tools(&path).is_empty());
    }

    #[test]
    fn malformed_entry_is_skipped_others_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(
            &path,
            r#"{"tools": {
                "good": {"name": "good", "use_count": 3},
                "bad": {"use_count": "many"},
                "renamed": {"name": "other", "use_count": 1}
            }}"#,
        )
        .unwrap();
        let tools = load_tools(&path);
        assert_eq!(tools.len(), 2);
        assert_eq!(tools["good"].use_count, 3);
        assert_eq!(tools["renamed"].name, "renamed");
        assert!(!tools.contains_key("bad"));
    }

    #[test]
    fn store_entries_are_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(
            &path,
            r#"{"tools": {
                "x": {"use_count": 2, "error_count": 5, "priority": 0},
                "y": {"use_count": 7, "priority": -1},
                "z": {"use_count": 9, "priority": 300}
            }}"#,
        )
        .unwrap();
        let tools = load_tools(&path);
        assert_eq!(tools["x"].error_count, 2);
        assert_eq!(tools["x"].priority, 1);
        assert_eq!((tools["y"].use_count, tools["y"].priority), (7, 1));
        assert_eq!((tools["z"].use_count, tools["z"].priority), (9, 3));
    }

    #[test]
    fn usage_log_keeps_order_and_skips_nameless() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.json");
        std::fs::write(
            &path,
            r#"{"usage": [
                {"tool": "grep", "timestamp": "2025-01-01T10:00:00Z"},
                {"timestamp": "2025-01-01T11:00:00Z"},
                {"tool": "read"},
                {"tool": "grep", "timestamp": "not a time"},
                42
            ]}"#,
        )
        .unwrap();
        let events = load_usage_log(&path);
        let tools: Vec<&str> = events.iter().map(|e| e.tool.as_str()).collect();
        assert_eq!(tools, ["grep", "read", "grep"]);
        assert!(events[0].timestamp.is_some());
        assert!(events[1].timestamp.is_none());
        assert!(events[2].timestamp.is_none());
    }

    #[test]
    fn save_writes_full_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");
        let mut tools = IndexMap::new();
        tools.insert("grep".to_string(), ToolStat::new("grep"));

        save(&path, &tools, &default_categories()).unwrap();

        let doc: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(doc["tools"]["grep"]["name"], "grep");
        assert_eq!(doc["categories"]["web"]["max_active"], 2);
        assert!(doc["last_updated"].is_string());
        assert!(!dir.path().join("nested").join(".store.json.tmp").exists());
    }

    #[test]
    fn save_into_unwritable_location_fails() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        // Parent "directory" is a regular file.
        let path = blocker.join("store.json");
        let err = save(&path, &IndexMap::new(), &[]).unwrap_err();
        assert!(matches!(err, RegistryError::Persist { .. }));
    }
}
