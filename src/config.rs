use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::DocumentationError;

/// File name of the documentation configuration inside a documentation bundle
pub const DEFAULT_CONFIG_FILE: &str = "Documentation.json";

/// Maps library names (`"scheme base"`) to Markdown files relative to the
/// documentation directory
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentationConfig {
    #[serde(default)]
    pub builtin: BTreeMap<String, PathBuf>,
}

impl DocumentationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_library(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.builtin.insert(name.into(), path.into());
        self
    }

    /// Library entries in ascending name order
    pub fn libraries(&self) -> impl Iterator<Item = (&str, &Path)> {
        self.builtin
            .iter()
            .map(|(name, path)| (name.as_str(), path.as_path()))
    }

    pub fn len(&self) -> usize {
        self.builtin.len()
    }

    pub fn is_empty(&self) -> bool {
        self.builtin.is_empty()
    }
}

pub fn parse_documentation_config(bytes: &[u8]) -> Result<DocumentationConfig, DocumentationError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Reads the configuration at `path`. A missing or malformed file yields an
/// empty configuration.
pub fn load_documentation_config(path: &Path) -> DocumentationConfig {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "documentation config not readable");
            return DocumentationConfig::default();
        }
    };
    parse_documentation_config(&bytes).unwrap_or_else(|e| {
        tracing::warn!(path = %path.display(), error = %e, "ignoring documentation config");
        DocumentationConfig::default()
    })
}
