//! Export orchestration
//!
//! Wires parser and pipeline into one run. Each call owns a fresh
//! [`ExportContext`], so hygiene counters start at zero per run and
//! independent runs can never interfere.

use crate::catalog::MacroCatalog;
use crate::errors::{unspanned, ErrorKind, ErrorReporting, ExportError, ReportContext};
use crate::node::Tree;
use crate::syntax::{parse, ParseOptions};
use crate::transform::{ExportContext, Pipeline, YieldMode};

/// One export target: a catalog plus the caller/yield assumption its
/// consumers need.
pub struct Exporter<'a> {
    catalog: &'a dyn MacroCatalog,
    yield_mode: YieldMode,
}

impl<'a> Exporter<'a> {
    pub fn new(catalog: &'a dyn MacroCatalog, yield_mode: YieldMode) -> Self {
        Self {
            catalog,
            yield_mode,
        }
    }

    /// Parses template source and runs the full export pipeline over it.
    pub fn export_source(
        &self,
        content: &str,
        options: &ParseOptions,
    ) -> Result<Tree, ExportError> {
        let tree = parse(content, options)?;
        let ctx = ExportContext::new(self.catalog, self.yield_mode);
        Pipeline::for_export(self.yield_mode).run(&tree, &ctx)
    }

    /// Exports a macro registered in the catalog by name.
    pub fn export_macro(&self, name: &str) -> Result<Tree, ExportError> {
        let Some(source) = self.catalog.macro_source(name) else {
            let errors = ReportContext::for_pass("export");
            return Err(errors.report(
                ErrorKind::MissingMacroSource {
                    macro_name: name.to_string(),
                },
                unspanned(),
            ));
        };
        let source = source.to_string();
        self.export_source(&source, &ParseOptions::named(name))
    }
}
