//! Configuration-driven renaming passes
//!
//! Both passes rewrite variable references inside macro definitions using the
//! enclosing macro's configured rename tables: [`MapVariables`] matches the
//! full dotted path, [`MapParameters`] matches the first segment against the
//! formal-parameter renames. A variable with no enclosing macro, an unknown
//! macro, or a missing table entry is left unchanged.

use crate::errors::ExportError;
use crate::node::{NodeId, NodeKind, NodeTag, Tree};

use super::{Disposition, ExportContext, Transformer};

/// Name of the macro definition enclosing `id`, if any.
fn enclosing_macro_name(tree: &Tree, id: NodeId) -> Option<String> {
    tree.at(id)
        .find_parent(&|node| node.tag() == NodeTag::Macro)
        .and_then(|node| node.name())
        .map(str::to_string)
}

/// Rewrites whole variable paths through the macro's `variables` table.
pub struct MapVariables;

impl Transformer for MapVariables {
    fn name(&self) -> &'static str {
        "map-variables"
    }

    fn transform(
        &self,
        tree: &mut Tree,
        id: NodeId,
        ctx: &ExportContext<'_>,
    ) -> Result<Disposition, ExportError> {
        let NodeKind::Variable { path } = tree.kind(id) else {
            return Ok(Disposition::Unchanged);
        };
        let Some(macro_name) = enclosing_macro_name(tree, id) else {
            return Ok(Disposition::Unchanged);
        };
        let Some(config) = ctx.catalog.configuration(&macro_name) else {
            return Ok(Disposition::Unchanged);
        };

        let joined = path.join(".");
        let Some(target) = config.variables.get(&joined) else {
            return Ok(Disposition::Unchanged);
        };
        let target_path: Vec<String> = target.split('.').map(str::to_string).collect();
        if let NodeKind::Variable { path } = tree.kind_mut(id) {
            *path = target_path;
        }
        Ok(Disposition::Unchanged)
    }
}

/// Rewrites the first path segment through the macro's `parameters` table.
pub struct MapParameters;

impl Transformer for MapParameters {
    fn name(&self) -> &'static str {
        "map-parameters"
    }

    fn transform(
        &self,
        tree: &mut Tree,
        id: NodeId,
        ctx: &ExportContext<'_>,
    ) -> Result<Disposition, ExportError> {
        let NodeKind::Variable { path } = tree.kind(id) else {
            return Ok(Disposition::Unchanged);
        };
        let Some(first) = path.first() else {
            return Ok(Disposition::Unchanged);
        };
        let Some(macro_name) = enclosing_macro_name(tree, id) else {
            return Ok(Disposition::Unchanged);
        };
        let Some(config) = ctx.catalog.configuration(&macro_name) else {
            return Ok(Disposition::Unchanged);
        };

        let Some(target) = config.parameters.get(first) else {
            return Ok(Disposition::Unchanged);
        };
        let target_name = target.target_name.clone();
        if let NodeKind::Variable { path } = tree.kind_mut(id) {
            path[0] = target_name;
        }
        Ok(Disposition::Unchanged)
    }
}
