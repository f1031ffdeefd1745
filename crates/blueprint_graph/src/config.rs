// SPDX-License-Identifier: MIT OR Apache-2.0
//! Graph configuration.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Current config format version
pub const CONFIG_FORMAT_VERSION: u32 = 1;

/// Default ceiling for nested subgraph references
pub const DEFAULT_MAX_SUBGRAPH_DEPTH: usize = 100;

/// Order in which links leaving (or arriving at) one port are enumerated.
///
/// Consumers such as the runtime fire multiple flow targets in this order, so
/// it is part of the graph's contract rather than a storage detail. Ties are
/// broken by port index, then by node ID.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LinkOrder {
    /// Largest vertical position first
    #[default]
    DescendingY,
    /// Smallest vertical position first
    AscendingY,
}

/// Settings shared by every graph of a library
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Format version
    pub version: u32,
    /// Deepest allowed chain of nested subgraphs
    pub max_subgraph_depth: usize,
    /// Cross-check port declarations against node capabilities
    pub validate_declarations: bool,
    /// Link enumeration order
    pub link_order: LinkOrder,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            version: CONFIG_FORMAT_VERSION,
            max_subgraph_depth: DEFAULT_MAX_SUBGRAPH_DEPTH,
            validate_declarations: true,
            link_order: LinkOrder::default(),
        }
    }
}

impl GraphConfig {
    /// Parse from RON text
    pub fn from_ron(text: &str) -> Result<Self, ConfigError> {
        let config: GraphConfig = ron::from_str(text)?;
        config.check()?;
        Ok(config)
    }

    /// Load from a RON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_ron(&content)
    }

    /// Serialize to pretty RON
    pub fn to_ron(&self) -> Result<String, ConfigError> {
        let config = ron::ser::PrettyConfig::default().struct_names(true);
        Ok(ron::ser::to_string_pretty(self, config)?)
    }

    /// Save to a RON file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        std::fs::write(path, self.to_ron()?)?;
        Ok(())
    }

    fn check(&self) -> Result<(), ConfigError> {
        if self.version > CONFIG_FORMAT_VERSION {
            return Err(ConfigError::UnsupportedVersion {
                found: self.version,
                supported: CONFIG_FORMAT_VERSION,
            });
        }
        if self.max_subgraph_depth == 0 {
            return Err(ConfigError::Invalid(
                "max_subgraph_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
