//! Variable name decoration - the hygienic renaming primitive
//!
//! Appends a suffix and/or prepends a prefix to the *first* path segment of
//! every variable reference, optionally gated by a predicate over that
//! segment. Macro inlining uses this to rebind body references to the
//! call-site-private variables it synthesizes.

use crate::errors::ExportError;
use crate::node::{NodeId, NodeKind, Tree};

use super::{Disposition, ExportContext, Transformer};

type SegmentPredicate = Box<dyn Fn(&str) -> bool>;

pub struct DecorateVariableNames {
    prefix: Option<String>,
    suffix: Option<String>,
    applies: Option<SegmentPredicate>,
}

impl DecorateVariableNames {
    /// Decorates every variable's first segment with a suffix.
    pub fn suffix(suffix: impl Into<String>) -> Self {
        Self {
            prefix: None,
            suffix: Some(suffix.into()),
            applies: None,
        }
    }

    /// Decorates every variable's first segment with a prefix.
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: Some(prefix.into()),
            suffix: None,
            applies: None,
        }
    }

    /// Restricts decoration to variables whose first segment satisfies the
    /// predicate.
    pub fn gated(mut self, predicate: impl Fn(&str) -> bool + 'static) -> Self {
        self.applies = Some(Box::new(predicate));
        self
    }
}

impl Transformer for DecorateVariableNames {
    fn name(&self) -> &'static str {
        "decorate-variable-names"
    }

    fn transform(
        &self,
        tree: &mut Tree,
        id: NodeId,
        _ctx: &ExportContext<'_>,
    ) -> Result<Disposition, ExportError> {
        let NodeKind::Variable { path } = tree.kind(id) else {
            return Ok(Disposition::Unchanged);
        };
        let Some(first) = path.first() else {
            return Ok(Disposition::Unchanged);
        };
        if let Some(applies) = &self.applies {
            if !applies(first) {
                return Ok(Disposition::Unchanged);
            }
        }

        let decorated = format!(
            "{}{}{}",
            self.prefix.as_deref().unwrap_or(""),
            first,
            self.suffix.as_deref().unwrap_or("")
        );
        if let NodeKind::Variable { path } = tree.kind_mut(id) {
            path[0] = decorated;
        }
        Ok(Disposition::Unchanged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::node::ChildField;
    use crate::transform::{walk, YieldMode};

    fn variable(tree: &mut Tree, path: &[&str]) -> NodeId {
        tree.push(NodeKind::Variable {
            path: path.iter().map(|s| s.to_string()).collect(),
        })
    }

    #[test]
    fn suffix_applies_to_first_segment_only() {
        let mut tree = Tree::with_root(NodeKind::NodeList { children: vec![] });
        let root = tree.root();
        let var = variable(&mut tree, &["x", "inner"]);
        tree.set_many(root, ChildField::Children, vec![var]);

        let catalog = StaticCatalog::default();
        let ctx = ExportContext::new(&catalog, YieldMode::Remove);
        walk(
            &mut tree,
            root,
            &DecorateVariableNames::suffix("_u1"),
            &ctx,
        )
        .expect("decoration never fails");

        assert_eq!(
            tree.kind(var),
            &NodeKind::Variable {
                path: vec!["x_u1".to_string(), "inner".to_string()]
            }
        );
    }

    #[test]
    fn gate_limits_decoration() {
        let mut tree = Tree::with_root(NodeKind::NodeList { children: vec![] });
        let root = tree.root();
        let hit = variable(&mut tree, &["x"]);
        let miss = variable(&mut tree, &["y"]);
        tree.set_many(root, ChildField::Children, vec![hit, miss]);

        let catalog = StaticCatalog::default();
        let ctx = ExportContext::new(&catalog, YieldMode::Remove);
        let pass = DecorateVariableNames::prefix("outer_").gated(|segment| segment == "x");
        walk(&mut tree, root, &pass, &ctx).expect("decoration never fails");

        assert_eq!(tree.at(hit).first_segment(), Some("outer_x"));
        assert_eq!(tree.at(miss).first_segment(), Some("y"));
    }
}
