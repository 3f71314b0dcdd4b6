//! Error types for registry operations.
//!
//! Load problems never surface here: a missing or corrupt store is logged
//! and treated as empty state. Unknown tool names are reported through
//! `Ok(false)` by [`ToolRegistry`](crate::ToolRegistry). What remains are
//! failures the caller must observe, or an update would be silently lost.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while persisting or exporting registry state.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Writing or renaming the backing store failed.
    #[error("failed to persist tool store at {}: {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Encoding the store to JSON failed.
    #[error("failed to serialize tool store: {0}")]
    Serialize(#[from] serde_json::Error),

    /// An MCP base config exists but could not be read or parsed.
    #[error("invalid MCP config at {}: {message}", path.display())]
    McpConfig { path: PathBuf, message: String },
}

impl RegistryError {
    /// Create a persistence error for `path`.
    pub fn persist(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Persist {
            path: path.into(),
            source,
        }
    }

    /// Create an MCP config error for `path`.
    pub fn mcp_config(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::McpConfig {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;
