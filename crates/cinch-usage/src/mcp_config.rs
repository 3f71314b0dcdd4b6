//! Apply registry decisions to an MCP server configuration.
//!
//! MCP clients read a document of the form `{"mcpServers": {name: {...}}}`.
//! Servers the registry tracks are marked `"disabled": true` when they are
//! inactive, or when more than a fifth of their recorded uses failed and
//! the server does not already carry an explicit `disabled` setting.

use std::path::Path;

use serde_json::{Value, json};
use tracing::debug;

use crate::error::{RegistryError, RegistryResult};
use crate::registry::ToolRegistry;

/// Error fraction above which an active server is disabled.
pub const MAX_ERROR_FRACTION: f64 = 0.2;

/// Read a base config, or start from an empty server list.
///
/// A missing path (or `None`) yields `{"mcpServers": {}}`. A file that
/// exists but is unreadable or not a JSON object is an error.
pub fn load_base(path: Option<&Path>) -> RegistryResult<Value> {
    let Some(path) = path.filter(|p| p.exists()) else {
        return Ok(json!({ "mcpServers": {} }));
    };
    let content = std::fs::read_to_string(path)
        .map_err(|e| RegistryError::mcp_config(path, e.to_string()))?;
    let doc: Value =
        serde_json::from_str(&content).map_err(|e| RegistryError::mcp_config(path, e.to_string()))?;
    if !doc.is_object() {
        return Err(RegistryError::mcp_config(path, "top level is not an object"));
    }
    Ok(doc)
}

/// Rewrite `config` in place from the registry's current statistics.
///
/// Returns the names of servers that were marked disabled.
pub fn apply(registry: &ToolRegistry, config: &mut Value) -> Vec<String> {
    let mut disabled = Vec::new();
    let Some(servers) = config.get_mut("mcpServers").and_then(Value::as_object_mut) else {
        return disabled;
    };

    for (name, server) in servers.iter_mut() {
        let Some(stat) = registry.tool(name) else {
            continue;
        };
        let Some(server) = server.as_object_mut() else {
            debug!("MCP server '{name}' is not an object; leaving it alone");
            continue;
        };

        if !stat.is_active {
            server.insert("disabled".into(), Value::Bool(true));
            disabled.push(name.clone());
        } else if stat.error_count as f64 > stat.use_count as f64 * MAX_ERROR_FRACTION
            && !server.contains_key("disabled")
        {
            server.insert("disabled".into(), Value::Bool(true));
            disabled.push(name.clone());
        }
    }

    debug!("MCP config: disabled {disabled:?}");
    disabled
}

/// Load the base config at `path` and apply the registry to it.
pub fn generate(registry: &ToolRegistry, path: Option<&Path>) -> RegistryResult<Value> {
    let mut config = load_base(path)?;
    apply(registry, &mut config);
    Ok(config)
}
