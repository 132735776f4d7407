//! Export configuration catalog - the external collaborator interface
//!
//! The inliner and the mapping passes look macros up by name: what export
//! mode a macro uses, how its parameters and variables are renamed, and the
//! raw definition source the pipeline re-enters during inlining. Embedders
//! implement [`MacroCatalog`] over their own repositories; [`StaticCatalog`]
//! is the in-memory implementation used by tests and JSON-configured hosts.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// How a macro is exported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportMode {
    /// Calls are replaced by a substituted copy of the macro body.
    Inline,
    /// Calls are left for the consumer to resolve.
    Reference,
}

impl Default for ExportMode {
    fn default() -> Self {
        Self::Reference
    }
}

/// Rename target for one formal parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterTarget {
    #[serde(rename = "targetName")]
    pub target_name: String,
}

/// Export configuration of one macro.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroExportConfig {
    #[serde(default)]
    pub mode: ExportMode,
    /// Formal-parameter renames, keyed by parameter name.
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterTarget>,
    /// Variable-path renames, keyed by the dotted source path.
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

/// Lookup interface the transform passes consume. Unknown names return
/// `None` and pass through every lookup site unchanged.
pub trait MacroCatalog {
    fn configuration(&self, name: &str) -> Option<&MacroExportConfig>;

    /// Raw template source of the macro's definition, for recursive
    /// parser/pipeline re-entry during inlining.
    fn macro_source(&self, name: &str) -> Option<&str>;
}

/// In-memory catalog.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    configurations: BTreeMap<String, MacroExportConfig>,
    sources: BTreeMap<String, String>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a macro's definition source and export configuration.
    pub fn insert(
        &mut self,
        name: impl Into<String>,
        source: impl Into<String>,
        config: MacroExportConfig,
    ) {
        let name = name.into();
        self.sources.insert(name.clone(), source.into());
        self.configurations.insert(name, config);
    }

    /// Builder-style [`StaticCatalog::insert`].
    pub fn with_macro(
        mut self,
        name: impl Into<String>,
        source: impl Into<String>,
        config: MacroExportConfig,
    ) -> Self {
        self.insert(name, source, config);
        self
    }

    /// Loads a catalog from its JSON document form:
    /// `{"macros": {"name": {"source": "...", "mode": "inline", ...}}}`.
    pub fn from_json(document: &str) -> Result<Self, CatalogError> {
        let document: CatalogDocument = serde_json::from_str(document)?;
        let mut catalog = Self::new();
        for (name, entry) in document.macros {
            catalog.insert(name, entry.source, entry.config);
        }
        Ok(catalog)
    }
}

impl MacroCatalog for StaticCatalog {
    fn configuration(&self, name: &str) -> Option<&MacroExportConfig> {
        self.configurations.get(name)
    }

    fn macro_source(&self, name: &str) -> Option<&str> {
        self.sources.get(name).map(String::as_str)
    }
}

#[derive(Debug, Deserialize)]
struct CatalogDocument {
    #[serde(default)]
    macros: BTreeMap<String, CatalogEntry>,
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    source: String,
    #[serde(flatten)]
    config: MacroExportConfig,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("invalid catalog document: {0}")]
    Invalid(#[from] serde_json::Error),
}
