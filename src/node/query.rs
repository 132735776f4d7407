//! Structural predicates and traversal over node trees
//!
//! [`NodeRef`] is a cheap borrow handle (tree + id) carrying the query
//! surface the transform passes use as their pattern-matching primitive:
//! tag tests, ancestor walks, pre-order search, and index-based sibling
//! lookup.

use super::{ChildSlot, NodeId, NodeKind, NodeTag, Tree};

/// Borrowed view of one node inside a [`Tree`].
#[derive(Debug, Clone, Copy)]
pub struct NodeRef<'t> {
    tree: &'t Tree,
    id: NodeId,
}

impl<'t> NodeRef<'t> {
    pub(crate) fn new(tree: &'t Tree, id: NodeId) -> Self {
        Self { tree, id }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn tree(&self) -> &'t Tree {
        self.tree
    }

    pub fn kind(&self) -> &'t NodeKind {
        self.tree.kind(self.id)
    }

    pub fn tag(&self) -> NodeTag {
        self.kind().tag()
    }

    // ------------------------------------------------------------------------
    // Predicates
    // ------------------------------------------------------------------------

    /// True if this node's tag is one of `tags`. An empty slice matches
    /// nothing; use pattern matching for "any node".
    pub fn is(&self, tags: &[NodeTag]) -> bool {
        tags.contains(&self.tag())
    }

    /// Tag test plus name equality, the pervasive filter pair.
    pub fn is_named(&self, tags: &[NodeTag], name: &str) -> bool {
        self.is(tags) && self.name() == Some(name)
    }

    /// The node's `name` attribute, for the kinds that carry one.
    pub fn name(&self) -> Option<&'t str> {
        match self.kind() {
            NodeKind::Block { name, .. }
            | NodeKind::Call { name, .. }
            | NodeKind::Tag { name, .. }
            | NodeKind::FunctionCall { name, .. }
            | NodeKind::Filter { name, .. }
            | NodeKind::Macro { name, .. }
            | NodeKind::Parameter { name, .. } => Some(name),
            NodeKind::Argument { name, .. } => name.as_deref(),
            _ => None,
        }
    }

    /// First path segment of a variable reference.
    pub fn first_segment(&self) -> Option<&'t str> {
        match self.kind() {
            NodeKind::Variable { path } => path.first().map(String::as_str),
            _ => None,
        }
    }

    // ------------------------------------------------------------------------
    // Ancestor walks
    // ------------------------------------------------------------------------

    pub fn parent(&self) -> Option<NodeRef<'t>> {
        self.tree.parent(self.id).map(|p| self.tree.at(p))
    }

    /// Self-or-ancestor search upward; returns the first match.
    pub fn find_parent(&self, pred: &dyn Fn(NodeRef<'t>) -> bool) -> Option<NodeRef<'t>> {
        let mut cursor = Some(*self);
        while let Some(node) = cursor {
            if pred(node) {
                return Some(node);
            }
            cursor = node.parent();
        }
        None
    }

    /// True if any strict ancestor matches.
    pub fn is_child_of(&self, pred: &dyn Fn(NodeRef<'t>) -> bool) -> bool {
        match self.parent() {
            Some(parent) => parent.find_parent(pred).is_some(),
            None => false,
        }
    }

    // ------------------------------------------------------------------------
    // Pre-order search
    // ------------------------------------------------------------------------

    /// Depth-first pre-order search: self first, then the child-bearing
    /// fields in their declared order. Returns the first match.
    pub fn find(&self, pred: &dyn Fn(NodeRef<'t>) -> bool) -> Option<NodeRef<'t>> {
        if pred(*self) {
            return Some(*self);
        }
        for slot in self.tree.child_slots(self.id) {
            for child in slot.ids() {
                if let Some(found) = self.tree.at(child).find(pred) {
                    return Some(found);
                }
            }
        }
        None
    }

    /// All matches, in the same pre-order as [`NodeRef::find`].
    pub fn filter(&self, pred: &dyn Fn(NodeRef<'t>) -> bool) -> Vec<NodeRef<'t>> {
        let mut matches = Vec::new();
        self.collect_into(pred, &mut matches);
        matches
    }

    fn collect_into(&self, pred: &dyn Fn(NodeRef<'t>) -> bool, out: &mut Vec<NodeRef<'t>>) {
        if pred(*self) {
            out.push(*self);
        }
        for slot in self.tree.child_slots(self.id) {
            for child in slot.ids() {
                self.tree.at(child).collect_into(pred, out);
            }
        }
    }

    /// First pre-order descendant (or self) with the given tag.
    pub fn find_kind(&self, tag: NodeTag) -> Option<NodeRef<'t>> {
        self.find(&|node| node.tag() == tag)
    }

    /// All pre-order descendants (and self) with the given tag.
    pub fn filter_kind(&self, tag: NodeTag) -> Vec<NodeRef<'t>> {
        self.filter(&|node| node.tag() == tag)
    }

    // ------------------------------------------------------------------------
    // Sibling lookup
    // ------------------------------------------------------------------------

    /// The sibling `offset` positions away inside the parent field holding
    /// this node. Position is index-based: the index of this id within that
    /// field. `peek(0)` is self; out of range is `None`.
    pub fn peek(&self, offset: isize) -> Option<NodeRef<'t>> {
        if offset == 0 {
            return Some(*self);
        }
        let parent = self.parent()?;
        for slot in self.tree.child_slots(parent.id) {
            let ChildSlot::Many(_, ids) = slot else {
                continue;
            };
            let Some(position) = ids.iter().position(|&c| c == self.id) else {
                continue;
            };
            let target = position as isize + offset;
            if target < 0 || target as usize >= ids.len() {
                return None;
            }
            return Some(self.tree.at(ids[target as usize]));
        }
        None
    }

    pub fn next(&self) -> Option<NodeRef<'t>> {
        self.peek(1)
    }

    pub fn previous(&self) -> Option<NodeRef<'t>> {
        self.peek(-1)
    }
}

#[cfg(test)]
mod tests {
    use crate::node::{ChildField, NodeKind, NodeTag, Tree};

    /// root(NodeList) -> [ Text "a", If { condition: Variable x, children: [Text "b"] } ]
    fn sample_tree() -> Tree {
        let mut tree = Tree::with_root(NodeKind::NodeList { children: vec![] });
        let root = tree.root();
        let a = tree.push(NodeKind::Text {
            value: "a".to_string(),
        });
        let cond = tree.push(NodeKind::Variable {
            path: vec!["x".to_string()],
        });
        let b = tree.push(NodeKind::Text {
            value: "b".to_string(),
        });
        let branch = tree.push(NodeKind::If {
            condition: None,
            children: vec![],
            else_if_children: vec![],
            else_children: vec![],
        });
        tree.set_one(branch, ChildField::Condition, Some(cond));
        tree.set_many(branch, ChildField::Children, vec![b]);
        tree.set_many(root, ChildField::Children, vec![a, branch]);
        tree
    }

    #[test]
    fn find_prefers_self_then_declared_field_order() {
        let tree = sample_tree();
        let root = tree.at(tree.root());

        // Self before children.
        assert_eq!(root.find_kind(NodeTag::NodeList).unwrap().id(), root.id());

        // The If node's condition field is declared before its children, so
        // the Variable is found before the Text inside the branch.
        let order: Vec<_> = root
            .filter(&|n| matches!(n.tag(), NodeTag::Variable | NodeTag::Text))
            .iter()
            .map(|n| n.tag())
            .collect();
        assert_eq!(order, vec![NodeTag::Text, NodeTag::Variable, NodeTag::Text]);
    }

    #[test]
    fn find_parent_walks_self_then_ancestors() {
        let tree = sample_tree();
        let root = tree.at(tree.root());
        let var = root.find_kind(NodeTag::Variable).unwrap();

        assert!(var.find_parent(&|n| n.tag() == NodeTag::If).is_some());
        assert!(var.is_child_of(&|n| n.tag() == NodeTag::NodeList));
        // is_child_of inspects strict ancestors only.
        assert!(!var.is_child_of(&|n| n.tag() == NodeTag::Variable));
    }

    #[test]
    fn tag_and_name_predicates() {
        let mut tree = Tree::with_root(NodeKind::NodeList { children: vec![] });
        let root = tree.root();
        let m = tree.push(NodeKind::Macro {
            name: "card".to_string(),
            parameters: vec![],
            children: vec![],
        });
        tree.set_many(root, ChildField::Children, vec![m]);

        let node = tree.at(m);
        assert!(node.is(&[NodeTag::Macro, NodeTag::Call]));
        assert!(!node.is(&[NodeTag::Call]));
        assert!(!node.is(&[]));
        assert!(node.is_named(&[NodeTag::Macro], "card"));
        assert!(!node.is_named(&[NodeTag::Macro], "button"));

        assert!(tree.kind(root).is_sequence());
        let filter = tree.push(NodeKind::Filter {
            name: "trim".to_string(),
            value: None,
            arguments: vec![],
        });
        assert!(tree.kind(filter).is_callable());
        assert!(tree.kind(filter).is_value());
        assert!(!tree.kind(m).is_callable());
    }

    #[test]
    fn peek_is_index_based_sibling_lookup() {
        let tree = sample_tree();
        let root = tree.at(tree.root());
        let first = root.find_kind(NodeTag::Text).unwrap();

        assert_eq!(first.peek(0).unwrap().id(), first.id());
        assert_eq!(first.next().unwrap().tag(), NodeTag::If);
        assert!(first.previous().is_none());
        assert_eq!(first.next().unwrap().previous().unwrap().id(), first.id());

        // The condition sits in a single-child slot: no siblings there.
        let var = root.find_kind(NodeTag::Variable).unwrap();
        assert!(var.next().is_none());
    }
}
