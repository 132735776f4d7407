//! Node model for exported template structure
//!
//! Trees are arena-backed: every node lives in a [`Tree`] and is addressed by
//! a [`NodeId`]. The parent link is a plain index back-reference, so the
//! ownership graph is just the arena while navigation stays bidirectional.
//!
//! Invariants enforced here:
//! - every non-root node has exactly one parent, assigned when it is attached
//!   through a slot setter (never implicitly);
//! - a node can never become its own ancestor;
//! - children preserve insertion order.

use std::mem;

pub mod query;
pub mod serialize;

pub use query::NodeRef;

// ============================================================================
// IDS AND SCALARS
// ============================================================================

/// Index of a node within its owning [`Tree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// Scalar literal payload. The kind (int/string/boolean) is preserved so a
/// later emitter can re-quote the value exactly as it was written.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Str(String),
    Bool(bool),
}

// ============================================================================
// NODE KINDS
// ============================================================================

/// Discriminant tag for every concrete node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeTag {
    NodeList,
    Array,
    Block,
    Condition,
    Expression,
    Group,
    Output,
    Literal,
    Text,
    Operand,
    BooleanOperand,
    ComplexVariable,
    Call,
    Tag,
    FunctionCall,
    Filter,
    Macro,
    Parameter,
    Argument,
    If,
    ElseIf,
    For,
    Set,
    Variable,
    Yield,
}

impl NodeTag {
    /// The serialized `type` discriminant of this kind.
    pub const fn name(self) -> &'static str {
        match self {
            Self::NodeList => "NodeList",
            Self::Array => "ArrayNode",
            Self::Block => "BlockNode",
            Self::Condition => "ConditionNode",
            Self::Expression => "ExpressionNode",
            Self::Group => "GroupNode",
            Self::Output => "OutputNode",
            Self::Literal => "LiteralNode",
            Self::Text => "TextNode",
            Self::Operand => "OperandNode",
            Self::BooleanOperand => "BooleanOperandNode",
            Self::ComplexVariable => "ComplexVariableNode",
            Self::Call => "CallNode",
            Self::Tag => "TagNode",
            Self::FunctionCall => "FunctionCallNode",
            Self::Filter => "FilterNode",
            Self::Macro => "MacroNode",
            Self::Parameter => "ParameterNode",
            Self::Argument => "ArgumentNode",
            Self::If => "IfNode",
            Self::ElseIf => "ElseIfNode",
            Self::For => "ForNode",
            Self::Set => "SetNode",
            Self::Variable => "VariableNode",
            Self::Yield => "YieldNode",
        }
    }
}

/// Closed union of concrete node kinds.
///
/// Single-child fields (`value`, `condition`, `variable`) are optional so the
/// walk engine's drop-on-failure policy is total over every kind.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Generic ordered sequence; also the wrapper transformers synthesize.
    NodeList {
        children: Vec<NodeId>,
    },
    Array {
        children: Vec<NodeId>,
    },
    Block {
        name: String,
        children: Vec<NodeId>,
    },
    Condition {
        children: Vec<NodeId>,
    },
    Expression {
        children: Vec<NodeId>,
    },
    Group {
        children: Vec<NodeId>,
    },
    Output {
        children: Vec<NodeId>,
    },

    Literal {
        value: Literal,
    },
    Text {
        value: String,
    },
    Operand {
        value: Option<NodeId>,
    },
    BooleanOperand {
        value: Option<NodeId>,
    },
    ComplexVariable {
        value: Option<NodeId>,
    },

    /// Macro invocation; `children` carry the caller-supplied body, if any.
    Call {
        name: String,
        arguments: Vec<NodeId>,
        children: Vec<NodeId>,
    },
    Tag {
        name: String,
        arguments: Vec<NodeId>,
    },
    FunctionCall {
        name: String,
        arguments: Vec<NodeId>,
    },
    /// Pipe application; `value` is the piped-from expression.
    Filter {
        name: String,
        value: Option<NodeId>,
        arguments: Vec<NodeId>,
    },

    Macro {
        name: String,
        parameters: Vec<NodeId>,
        children: Vec<NodeId>,
    },
    Parameter {
        name: String,
        value: Option<NodeId>,
    },
    Argument {
        name: Option<String>,
        value: Option<NodeId>,
    },

    If {
        condition: Option<NodeId>,
        children: Vec<NodeId>,
        else_if_children: Vec<NodeId>,
        else_children: Vec<NodeId>,
    },
    ElseIf {
        condition: Option<NodeId>,
        children: Vec<NodeId>,
    },
    For {
        key_name: Option<String>,
        value_name: String,
        value: Option<NodeId>,
        children: Vec<NodeId>,
    },
    Set {
        variable: Option<NodeId>,
        value: Option<NodeId>,
    },
    /// Dotted reference, one path segment per element.
    Variable {
        path: Vec<String>,
    },
    /// Leaf placeholder for caller-supplied content.
    Yield,
}

impl NodeKind {
    pub fn tag(&self) -> NodeTag {
        match self {
            Self::NodeList { .. } => NodeTag::NodeList,
            Self::Array { .. } => NodeTag::Array,
            Self::Block { .. } => NodeTag::Block,
            Self::Condition { .. } => NodeTag::Condition,
            Self::Expression { .. } => NodeTag::Expression,
            Self::Group { .. } => NodeTag::Group,
            Self::Output { .. } => NodeTag::Output,
            Self::Literal { .. } => NodeTag::Literal,
            Self::Text { .. } => NodeTag::Text,
            Self::Operand { .. } => NodeTag::Operand,
            Self::BooleanOperand { .. } => NodeTag::BooleanOperand,
            Self::ComplexVariable { .. } => NodeTag::ComplexVariable,
            Self::Call { .. } => NodeTag::Call,
            Self::Tag { .. } => NodeTag::Tag,
            Self::FunctionCall { .. } => NodeTag::FunctionCall,
            Self::Filter { .. } => NodeTag::Filter,
            Self::Macro { .. } => NodeTag::Macro,
            Self::Parameter { .. } => NodeTag::Parameter,
            Self::Argument { .. } => NodeTag::Argument,
            Self::If { .. } => NodeTag::If,
            Self::ElseIf { .. } => NodeTag::ElseIf,
            Self::For { .. } => NodeTag::For,
            Self::Set { .. } => NodeTag::Set,
            Self::Variable { .. } => NodeTag::Variable,
            Self::Yield => NodeTag::Yield,
        }
    }

    /// True for the sequence kinds (ordered `children`, nothing else).
    pub fn is_sequence(&self) -> bool {
        matches!(
            self,
            Self::NodeList { .. }
                | Self::Array { .. }
                | Self::Block { .. }
                | Self::Condition { .. }
                | Self::Expression { .. }
                | Self::Group { .. }
                | Self::Output { .. }
        )
    }

    /// True for the kinds that wrap a single `value`.
    pub fn is_value(&self) -> bool {
        matches!(
            self,
            Self::Literal { .. }
                | Self::Text { .. }
                | Self::Operand { .. }
                | Self::BooleanOperand { .. }
                | Self::ComplexVariable { .. }
                | Self::Filter { .. }
        )
    }

    /// True for the kinds carrying a name plus ordered arguments.
    pub fn is_callable(&self) -> bool {
        matches!(
            self,
            Self::Call { .. } | Self::Tag { .. } | Self::FunctionCall { .. } | Self::Filter { .. }
        )
    }
}

// ============================================================================
// CHILD SLOTS
// ============================================================================

/// A child-bearing field of a node kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildField {
    Condition,
    Variable,
    Value,
    Parameters,
    Arguments,
    Children,
    ElseIfChildren,
    ElseChildren,
}

/// Snapshot of one child-bearing field, in the kind's declared order.
#[derive(Debug, Clone)]
pub enum ChildSlot {
    One(ChildField, Option<NodeId>),
    Many(ChildField, Vec<NodeId>),
}

impl ChildSlot {
    pub fn field(&self) -> ChildField {
        match self {
            Self::One(field, _) | Self::Many(field, _) => *field,
        }
    }

    pub fn ids(&self) -> Vec<NodeId> {
        match self {
            Self::One(_, id) => id.iter().copied().collect(),
            Self::Many(_, ids) => ids.clone(),
        }
    }
}

// ============================================================================
// TREE
// ============================================================================

/// One arena entry: the node's kind plus its non-owning parent link.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub(crate) parent: Option<NodeId>,
}

/// Arena-backed node tree. `Clone` yields a storage-disjoint deep copy:
/// mutating the clone can never affect the original.
#[derive(Debug, Clone, PartialEq)]
pub struct Tree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Tree {
    /// Creates a tree whose root is the given kind.
    pub fn with_root(kind: NodeKind) -> Self {
        Self {
            nodes: vec![Node { kind, parent: None }],
            root: NodeId(0),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Re-roots the tree at an existing node and clears its parent link.
    pub fn set_root(&mut self, id: NodeId) {
        self.nodes[id.index()].parent = None;
        self.root = id;
    }

    /// Adds a detached node and returns its id. Attach it through a slot
    /// setter to give it a parent.
    pub fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node { kind, parent: None });
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.index()].kind
    }

    /// Mutable access to a node's payload. Structural edits (swapping child
    /// ids) must go through the slot setters so parent links stay normalized;
    /// this is for in-place scalar rewrites such as variable path edits.
    pub fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        &mut self.nodes[id.index()].kind
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.index()].parent
    }

    pub fn tag(&self, id: NodeId) -> NodeTag {
        self.kind(id).tag()
    }

    /// Borrow handle for queries and traversal.
    pub fn at(&self, id: NodeId) -> NodeRef<'_> {
        NodeRef::new(self, id)
    }

    // ------------------------------------------------------------------------
    // Child slot access
    // ------------------------------------------------------------------------

    /// The node's child-bearing fields in the kind's declared order. This is
    /// the order every traversal (find/filter/walk) uses.
    pub fn child_slots(&self, id: NodeId) -> Vec<ChildSlot> {
        use ChildField as F;
        use ChildSlot::{Many, One};
        match self.kind(id) {
            NodeKind::NodeList { children }
            | NodeKind::Array { children }
            | NodeKind::Block { children, .. }
            | NodeKind::Condition { children }
            | NodeKind::Expression { children }
            | NodeKind::Group { children }
            | NodeKind::Output { children } => vec![Many(F::Children, children.clone())],

            NodeKind::Literal { .. }
            | NodeKind::Text { .. }
            | NodeKind::Variable { .. }
            | NodeKind::Yield => Vec::new(),

            NodeKind::Operand { value }
            | NodeKind::BooleanOperand { value }
            | NodeKind::ComplexVariable { value }
            | NodeKind::Parameter { value, .. }
            | NodeKind::Argument { value, .. } => vec![One(F::Value, *value)],

            NodeKind::Call {
                arguments,
                children,
                ..
            } => vec![
                Many(F::Arguments, arguments.clone()),
                Many(F::Children, children.clone()),
            ],
            NodeKind::Tag { arguments, .. } | NodeKind::FunctionCall { arguments, .. } => {
                vec![Many(F::Arguments, arguments.clone())]
            }
            NodeKind::Filter {
                value, arguments, ..
            } => vec![One(F::Value, *value), Many(F::Arguments, arguments.clone())],

            NodeKind::Macro {
                parameters,
                children,
                ..
            } => vec![
                Many(F::Parameters, parameters.clone()),
                Many(F::Children, children.clone()),
            ],

            NodeKind::If {
                condition,
                children,
                else_if_children,
                else_children,
            } => vec![
                One(F::Condition, *condition),
                Many(F::Children, children.clone()),
                Many(F::ElseIfChildren, else_if_children.clone()),
                Many(F::ElseChildren, else_children.clone()),
            ],
            NodeKind::ElseIf {
                condition,
                children,
            } => vec![
                One(F::Condition, *condition),
                Many(F::Children, children.clone()),
            ],
            NodeKind::For {
                value, children, ..
            } => vec![One(F::Value, *value), Many(F::Children, children.clone())],
            NodeKind::Set { variable, value } => {
                vec![One(F::Variable, *variable), One(F::Value, *value)]
            }
        }
    }

    fn slot_many_mut(&mut self, id: NodeId, field: ChildField) -> &mut Vec<NodeId> {
        use ChildField as F;
        let tag = self.tag(id);
        match (&mut self.nodes[id.index()].kind, field) {
            (NodeKind::NodeList { children }, F::Children)
            | (NodeKind::Array { children }, F::Children)
            | (NodeKind::Block { children, .. }, F::Children)
            | (NodeKind::Condition { children }, F::Children)
            | (NodeKind::Expression { children }, F::Children)
            | (NodeKind::Group { children }, F::Children)
            | (NodeKind::Output { children }, F::Children)
            | (NodeKind::Call { children, .. }, F::Children)
            | (NodeKind::Macro { children, .. }, F::Children)
            | (NodeKind::If { children, .. }, F::Children)
            | (NodeKind::ElseIf { children, .. }, F::Children)
            | (NodeKind::For { children, .. }, F::Children) => children,
            (NodeKind::Call { arguments, .. }, F::Arguments)
            | (NodeKind::Tag { arguments, .. }, F::Arguments)
            | (NodeKind::FunctionCall { arguments, .. }, F::Arguments)
            | (NodeKind::Filter { arguments, .. }, F::Arguments) => arguments,
            (NodeKind::Macro { parameters, .. }, F::Parameters) => parameters,
            (
                NodeKind::If {
                    else_if_children, ..
                },
                F::ElseIfChildren,
            ) => else_if_children,
            (NodeKind::If { else_children, .. }, F::ElseChildren) => else_children,
            _ => panic!("{} has no list field {:?}", tag.name(), field),
        }
    }

    fn slot_one_mut(&mut self, id: NodeId, field: ChildField) -> &mut Option<NodeId> {
        use ChildField as F;
        let tag = self.tag(id);
        match (&mut self.nodes[id.index()].kind, field) {
            (NodeKind::Operand { value }, F::Value)
            | (NodeKind::BooleanOperand { value }, F::Value)
            | (NodeKind::ComplexVariable { value }, F::Value)
            | (NodeKind::Parameter { value, .. }, F::Value)
            | (NodeKind::Argument { value, .. }, F::Value)
            | (NodeKind::Filter { value, .. }, F::Value)
            | (NodeKind::For { value, .. }, F::Value)
            | (NodeKind::Set { value, .. }, F::Value) => value,
            (NodeKind::If { condition, .. }, F::Condition)
            | (NodeKind::ElseIf { condition, .. }, F::Condition) => condition,
            (NodeKind::Set { variable, .. }, F::Variable) => variable,
            _ => panic!("{} has no single-child field {:?}", tag.name(), field),
        }
    }

    // ------------------------------------------------------------------------
    // Attachment (the only way parent links change)
    // ------------------------------------------------------------------------

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        assert!(
            !self.is_self_or_ancestor(child, parent),
            "node may not become its own ancestor"
        );
        let current = self.nodes[child.index()].parent;
        assert!(
            current.is_none() || current == Some(parent),
            "node is already attached elsewhere; detach it first"
        );
        self.nodes[child.index()].parent = Some(parent);
    }

    fn is_self_or_ancestor(&self, candidate: NodeId, start: NodeId) -> bool {
        let mut cursor = Some(start);
        while let Some(id) = cursor {
            if id == candidate {
                return true;
            }
            cursor = self.parent(id);
        }
        false
    }

    /// Replaces a list field wholesale, detaching the previous children and
    /// parenting the new ones.
    pub fn set_many(&mut self, id: NodeId, field: ChildField, children: Vec<NodeId>) {
        let old = mem::take(self.slot_many_mut(id, field));
        for child in old {
            self.nodes[child.index()].parent = None;
        }
        for &child in &children {
            self.attach(id, child);
        }
        *self.slot_many_mut(id, field) = children;
    }

    /// Replaces a single-child field, detaching any previous occupant.
    pub fn set_one(&mut self, id: NodeId, field: ChildField, child: Option<NodeId>) {
        if let Some(old) = self.slot_one_mut(id, field).take() {
            self.nodes[old.index()].parent = None;
        }
        if let Some(new) = child {
            self.attach(id, new);
        }
        *self.slot_one_mut(id, field) = child;
    }

    /// Empties a list field, returning the now-detached children.
    pub fn take_many(&mut self, id: NodeId, field: ChildField) -> Vec<NodeId> {
        let children = mem::take(self.slot_many_mut(id, field));
        for &child in &children {
            self.nodes[child.index()].parent = None;
        }
        children
    }

    /// Clears a single-child field, returning the now-detached child.
    pub fn take_one(&mut self, id: NodeId, field: ChildField) -> Option<NodeId> {
        let child = self.slot_one_mut(id, field).take();
        if let Some(old) = child {
            self.nodes[old.index()].parent = None;
        }
        child
    }

    /// Swaps one child of `parent` for another, wherever it sits.
    pub fn replace_child(&mut self, parent: NodeId, old: NodeId, new: NodeId) {
        for slot in self.child_slots(parent) {
            match slot {
                ChildSlot::Many(field, ids) => {
                    if let Some(pos) = ids.iter().position(|&c| c == old) {
                        let mut ids = ids;
                        ids[pos] = new;
                        self.set_many(parent, field, ids);
                        return;
                    }
                }
                ChildSlot::One(field, Some(occupant)) if occupant == old => {
                    self.set_one(parent, field, Some(new));
                    return;
                }
                ChildSlot::One(..) => {}
            }
        }
        panic!("child to replace is not attached to the given parent");
    }

    // ------------------------------------------------------------------------
    // Cross-tree grafting
    // ------------------------------------------------------------------------

    /// Deep-copies a subtree from another tree into this arena and returns
    /// the new (detached) root id of the copy.
    pub fn adopt(&mut self, other: &Tree, id: NodeId) -> NodeId {
        let mut kind = other.kind(id).clone();
        match &mut kind {
            NodeKind::NodeList { children }
            | NodeKind::Array { children }
            | NodeKind::Block { children, .. }
            | NodeKind::Condition { children }
            | NodeKind::Expression { children }
            | NodeKind::Group { children }
            | NodeKind::Output { children } => self.adopt_all(other, children),

            NodeKind::Literal { .. }
            | NodeKind::Text { .. }
            | NodeKind::Variable { .. }
            | NodeKind::Yield => {}

            NodeKind::Operand { value }
            | NodeKind::BooleanOperand { value }
            | NodeKind::ComplexVariable { value }
            | NodeKind::Parameter { value, .. }
            | NodeKind::Argument { value, .. } => self.adopt_opt(other, value),

            NodeKind::Call {
                arguments,
                children,
                ..
            } => {
                self.adopt_all(other, arguments);
                self.adopt_all(other, children);
            }
            NodeKind::Tag { arguments, .. } | NodeKind::FunctionCall { arguments, .. } => {
                self.adopt_all(other, arguments);
            }
            NodeKind::Filter {
                value, arguments, ..
            } => {
                self.adopt_opt(other, value);
                self.adopt_all(other, arguments);
            }
            NodeKind::Macro {
                parameters,
                children,
                ..
            } => {
                self.adopt_all(other, parameters);
                self.adopt_all(other, children);
            }
            NodeKind::If {
                condition,
                children,
                else_if_children,
                else_children,
            } => {
                self.adopt_opt(other, condition);
                self.adopt_all(other, children);
                self.adopt_all(other, else_if_children);
                self.adopt_all(other, else_children);
            }
            NodeKind::ElseIf {
                condition,
                children,
            } => {
                self.adopt_opt(other, condition);
                self.adopt_all(other, children);
            }
            NodeKind::For {
                value, children, ..
            } => {
                self.adopt_opt(other, value);
                self.adopt_all(other, children);
            }
            NodeKind::Set { variable, value } => {
                self.adopt_opt(other, variable);
                self.adopt_opt(other, value);
            }
        }

        let new_id = self.push(kind);
        for slot in self.child_slots(new_id) {
            for child in slot.ids() {
                self.nodes[child.index()].parent = Some(new_id);
            }
        }
        new_id
    }

    fn adopt_all(&mut self, other: &Tree, ids: &mut Vec<NodeId>) {
        for id in ids {
            *id = self.adopt(other, *id);
        }
    }

    fn adopt_opt(&mut self, other: &Tree, id: &mut Option<NodeId>) {
        if let Some(inner) = id {
            *inner = self.adopt(other, *inner);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(tree: &mut Tree, s: &str) -> NodeId {
        tree.push(NodeKind::Text {
            value: s.to_string(),
        })
    }

    #[test]
    fn attach_sets_parent_exactly_once() {
        let mut tree = Tree::with_root(NodeKind::NodeList { children: vec![] });
        let root = tree.root();
        let a = text(&mut tree, "a");
        assert_eq!(tree.parent(a), None);
        tree.set_many(root, ChildField::Children, vec![a]);
        assert_eq!(tree.parent(a), Some(root));
    }

    #[test]
    #[should_panic(expected = "already attached")]
    fn double_attach_panics() {
        let mut tree = Tree::with_root(NodeKind::NodeList { children: vec![] });
        let root = tree.root();
        let inner = tree.push(NodeKind::Group { children: vec![] });
        let a = text(&mut tree, "a");
        tree.set_many(root, ChildField::Children, vec![inner, a]);
        // `a` already has a parent, so attaching it elsewhere must panic.
        tree.set_many(inner, ChildField::Children, vec![a]);
    }

    #[test]
    #[should_panic(expected = "own ancestor")]
    fn cycle_attach_panics() {
        let mut tree = Tree::with_root(NodeKind::NodeList { children: vec![] });
        let root = tree.root();
        let inner = tree.push(NodeKind::Group { children: vec![] });
        tree.set_many(root, ChildField::Children, vec![inner]);
        tree.set_many(inner, ChildField::Children, vec![root]);
    }

    #[test]
    fn take_many_detaches() {
        let mut tree = Tree::with_root(NodeKind::NodeList { children: vec![] });
        let root = tree.root();
        let a = text(&mut tree, "a");
        tree.set_many(root, ChildField::Children, vec![a]);
        let taken = tree.take_many(root, ChildField::Children);
        assert_eq!(taken, vec![a]);
        assert_eq!(tree.parent(a), None);
        assert!(tree.child_slots(root)[0].ids().is_empty());
    }

    #[test]
    fn adopt_copies_subtree_disjointly() {
        let mut source = Tree::with_root(NodeKind::NodeList { children: vec![] });
        let sroot = source.root();
        let hello = text(&mut source, "hello");
        source.set_many(sroot, ChildField::Children, vec![hello]);

        let mut target = Tree::with_root(NodeKind::NodeList { children: vec![] });
        let adopted = target.adopt(&source, sroot);
        assert_eq!(target.serialize(adopted), source.serialize(sroot));
        assert_eq!(target.parent(adopted), None);

        // Mutating the adopted copy must not touch the source.
        if let NodeKind::Text { value } = target.kind_mut(target.child_slots(adopted)[0].ids()[0]) {
            *value = "changed".to_string();
        }
        assert_ne!(target.serialize(adopted), source.serialize(sroot));
    }
}
