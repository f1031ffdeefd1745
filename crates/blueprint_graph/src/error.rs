// SPDX-License-Identifier: MIT OR Apache-2.0
//! Errors and author-facing diagnostics.

use crate::graph::GraphId;
use crate::node::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error when loading or saving a [`GraphConfig`](crate::config::GraphConfig)
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Reading or writing the file failed
    #[error("Config I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// The RON text is malformed
    #[error("Failed to parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),

    /// Serializing the config failed
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] ron::Error),

    /// The file was written by a newer format
    #[error("Config version {found} is newer than supported version {supported}")]
    UnsupportedVersion {
        /// Version found in the file
        found: u32,
        /// Newest supported version
        supported: u32,
    },

    /// A value is out of range
    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// How serious a diagnostic is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Severity {
    /// Informational
    Info,
    /// Suspicious but not fatal; the graph stays usable
    Warning,
}

/// A message for the author about a graph that needs manual attention
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Severity
    pub severity: Severity,
    /// Graph the message is about
    pub graph: Option<GraphId>,
    /// Node the message is about
    pub node: Option<NodeId>,
    /// Message text
    pub message: String,
}

impl Diagnostic {
    /// Create a warning
    pub fn warning(graph: Option<GraphId>, node: Option<NodeId>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            graph,
            node,
            message: message.into(),
        }
    }

    /// Create an informational message
    pub fn info(graph: Option<GraphId>, node: Option<NodeId>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            graph,
            node,
            message: message.into(),
        }
    }

    /// Whether this is a warning
    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }

    /// Send the diagnostic to the tracing subscriber
    pub fn emit(&self) {
        match self.severity {
            Severity::Info => tracing::info!("{}", self),
            Severity::Warning => tracing::warn!("{}", self),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(graph) = self.graph {
            write!(f, "[{graph}] ")?;
        }
        if let Some(node) = self.node {
            write!(f, "node {node}: ")?;
        }
        f.write_str(&self.message)
    }
}
