//! Type-set configuration

use serde::Deserialize;
use std::path::Path;

use crate::error::ConfigError;

/// Tuning knobs for the type-set serializer, loadable from TOML
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct TypeSetConfig {
    /// Deepest dependency chain accepted before the graph is treated as corrupt
    pub max_dependency_depth: usize,

    /// Name written for the bootstrap loader record
    pub bootstrap_loader_name: String,

    /// Emit a record for the bootstrap loader when something references it
    pub emit_bootstrap_loader: bool,

    /// Keep a lookup table of every class written to the leak-profiler stream
    pub retain_leak_records: bool,
}

impl Default for TypeSetConfig {
    fn default() -> Self {
        Self {
            max_dependency_depth: 1024,
            bootstrap_loader_name: "bootstrap".to_string(),
            emit_bootstrap_loader: true,
            retain_leak_records: true,
        }
    }
}

impl TypeSetConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&content)
    }
}
