//! Tool usage tracking and activation policy for cinch-rs agents.
//!
//! Agents with many tools (especially MCP servers) pay for every tool
//! definition in every request. `cinch-usage` keeps per-tool statistics in a
//! small JSON store, flags tools that have gone idle or are barely used, and
//! decides which tools should stay exposed to the model.
//!
//! The core type is [`ToolRegistry`]: load it once at startup, record each
//! tool call, and ask it for rankings, idle tools, reports, or an automatic
//! optimization pass.
//!
//! ```ignore
//! use cinch_usage::{RegistryConfig, ToolRegistry};
//!
//! let registry = ToolRegistry::load(RegistryConfig::from_env());
//!
//! // After each tool execution.
//! registry.record_usage("grep", 14.2, true);
//! registry.save()?;
//!
//! // Periodically.
//! let changes = registry.auto_optimize()?;
//! let report = registry.get_status_report();
//! println!("{} active, {} idle", report.active_tools, report.inactive_tools);
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`registry`] | [`ToolRegistry`]: recording, ranking, idle detection, enable/disable, optimization |
//! | [`stats`] | [`ToolStat`] and [`ToolCategory`], the default category table |
//! | [`report`] | [`StatusReport`], [`ChangeSet`], recommendation rules |
//! | [`store`] | Backing-store and usage-log file formats |
//! | [`config`] | [`RegistryConfig`] paths and thresholds |
//! | [`mcp_config`] | Rewrite an MCP server config from registry decisions |
//!
//! # Persistence
//!
//! Recording a use only touches memory. Enable/disable and optimization
//! passes rewrite the whole store immediately; other callers save
//! explicitly with [`ToolRegistry::save`]. Load never fails: a missing or
//! corrupt store is logged and the registry starts empty.

pub mod config;
pub mod error;
pub mod mcp_config;
pub mod registry;
pub mod report;
pub mod stats;
pub mod store;
pub mod timestamp;

pub use config::RegistryConfig;
pub use error::{RegistryError, RegistryResult};
pub use registry::ToolRegistry;
pub use report::{ChangeSet, StatusReport};
pub use stats::{ToolCategory, ToolStat};
