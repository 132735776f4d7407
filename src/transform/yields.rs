//! Caller/yield resolution passes
//!
//! Macro bodies guard caller-supplied content with two idioms: a conditional
//! on a `caller...` variable (optionally through a `notempty` filter, with a
//! fallback else branch) and the standalone yield placeholder. When a call
//! site cannot supply a body at render time, an export target commits to one
//! assumption:
//!
//! - [`RemoveYield`]: a caller body is never supplied - conditionals
//!   collapse to their else branch and placeholders disappear;
//! - [`PreferYield`]: a caller body is always supplied - conditionals
//!   collapse to their then branch and placeholders stay for substitution.
//!
//! The two passes are mutually exclusive per export target.

use crate::errors::ExportError;
use crate::node::{ChildField, NodeId, NodeKind, Tree};

use super::{Disposition, ExportContext, Transformer};

/// True for a condition matching the caller-guard shapes: a variable whose
/// first path segment starts with `caller`, bare or wrapped in a `notempty`
/// filter.
fn is_caller_condition(tree: &Tree, condition: NodeId) -> bool {
    match tree.kind(condition) {
        NodeKind::Variable { path } => path
            .first()
            .is_some_and(|segment| segment.starts_with("caller")),
        NodeKind::Filter { name, value, .. } => {
            name == "notempty" && value.is_some_and(|inner| is_caller_condition(tree, inner))
        }
        _ => false,
    }
}

/// The caller-guard conditional, if `id` is one: a plain `If` (no else-ifs)
/// whose condition matches [`is_caller_condition`].
fn caller_guard(tree: &Tree, id: NodeId) -> bool {
    let NodeKind::If {
        condition: Some(condition),
        else_if_children,
        ..
    } = tree.kind(id)
    else {
        return false;
    };
    else_if_children.is_empty() && is_caller_condition(tree, *condition)
}

/// Detaches the chosen branch and wraps it in a generic sequence.
fn branch_as_sequence(tree: &mut Tree, id: NodeId, field: ChildField) -> NodeId {
    let branch = tree.take_many(id, field);
    let sequence = tree.push(NodeKind::NodeList { children: vec![] });
    tree.set_many(sequence, ChildField::Children, branch);
    sequence
}

/// Resolves caller guards assuming the caller body is never supplied.
pub struct RemoveYield;

impl Transformer for RemoveYield {
    fn name(&self) -> &'static str {
        "remove-yield"
    }

    fn transform(
        &self,
        tree: &mut Tree,
        id: NodeId,
        _ctx: &ExportContext<'_>,
    ) -> Result<Disposition, ExportError> {
        if matches!(tree.kind(id), NodeKind::Yield) {
            return Ok(Disposition::Removed);
        }
        if caller_guard(tree, id) {
            let sequence = branch_as_sequence(tree, id, ChildField::ElseChildren);
            return Ok(Disposition::Replaced(sequence));
        }
        Ok(Disposition::Unchanged)
    }
}

/// Resolves caller guards assuming the caller body is always supplied.
/// Standalone yield placeholders are left for later substitution.
pub struct PreferYield;

impl Transformer for PreferYield {
    fn name(&self) -> &'static str {
        "prefer-yield"
    }

    fn transform(
        &self,
        tree: &mut Tree,
        id: NodeId,
        _ctx: &ExportContext<'_>,
    ) -> Result<Disposition, ExportError> {
        if caller_guard(tree, id) {
            let sequence = branch_as_sequence(tree, id, ChildField::Children);
            return Ok(Disposition::Replaced(sequence));
        }
        Ok(Disposition::Unchanged)
    }
}
