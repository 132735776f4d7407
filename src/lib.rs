//! Stencil: template macro structure extraction and inlining.
//!
//! Parses the macro/control-flow structure of Jinja-style templates into
//! node trees and rewrites them through a pipeline of semantics-preserving
//! passes - most notably hygienic macro inlining - so the result can be
//! exported to consumers that cannot resolve macro calls at render time.

pub use crate::errors::{ErrorKind, ErrorReporting, ExportError, SourceContext};

pub mod catalog;
pub mod errors;
pub mod export;
pub mod node;
pub mod syntax;
pub mod transform;

pub use crate::catalog::{ExportMode, MacroCatalog, MacroExportConfig, StaticCatalog};
pub use crate::export::Exporter;
pub use crate::node::{Literal, NodeId, NodeKind, NodeRef, NodeTag, Tree};
pub use crate::syntax::{parse, ParseOptions};
pub use crate::transform::{Disposition, ExportContext, Pipeline, Transformer, YieldMode};
