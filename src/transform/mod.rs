//! Tree rewrite pipeline
//!
//! A transformer visits every node of a tree in post-order and may keep,
//! replace, or remove it. `Pipeline` chains transformers, giving each one a
//! private clone of its input so passes are composable and caller trees are
//! never mutated.
//!
//! Failure policy: an error while transforming a child is caught, logged,
//! and the child dropped; the enclosing node and its siblings are
//! unaffected. An error at the root aborts the pass.

use std::cell::Cell;

use crate::catalog::MacroCatalog;
use crate::errors::ExportError;
use crate::node::{ChildSlot, NodeId, NodeKind, Tree};

pub mod decorate;
pub mod inline;
pub mod mapping;
pub mod yields;

pub use decorate::DecorateVariableNames;
pub use inline::InlineMacroCall;
pub use mapping::{MapParameters, MapVariables};
pub use yields::{PreferYield, RemoveYield};

/// Maximum macro inline recursion depth, guarding self-referential macros.
pub const MAX_INLINE_DEPTH: usize = 32;

/// Which caller/yield resolution pass an export target runs. The two passes
/// are mutually exclusive; exactly one runs per pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YieldMode {
    /// Assume a caller body is never supplied.
    Remove,
    /// Assume a caller body is always supplied.
    Prefer,
}

/// What a transformer did with one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// The node stays (its payload may have been rewritten in place).
    Unchanged,
    /// The node is replaced by another (detached) node of the same tree.
    Replaced(NodeId),
    /// The node is dropped from its parent's field.
    Removed,
}

/// One rewrite pass.
pub trait Transformer {
    /// Pass name used in log records.
    fn name(&self) -> &'static str;

    /// Transforms a single node. Called post-order: every child has already
    /// been transformed when this runs.
    fn transform(
        &self,
        tree: &mut Tree,
        id: NodeId,
        ctx: &ExportContext<'_>,
    ) -> Result<Disposition, ExportError>;
}

// ============================================================================
// EXPORT CONTEXT - Run-scoped state
// ============================================================================

/// State owned by one export run: the configuration catalog, the selected
/// yield mode, and the hygiene counter.
///
/// The counter is deliberately run-scoped rather than global so independent
/// export runs cannot interfere and tests reset it by constructing a fresh
/// context. It is shared across nested inline expansions within the run,
/// which is what keeps sibling and nested inlinings collision-free.
pub struct ExportContext<'a> {
    pub catalog: &'a dyn MacroCatalog,
    pub yield_mode: YieldMode,
    counter: Cell<u64>,
    inline_depth: Cell<usize>,
}

impl<'a> ExportContext<'a> {
    pub fn new(catalog: &'a dyn MacroCatalog, yield_mode: YieldMode) -> Self {
        Self {
            catalog,
            yield_mode,
            counter: Cell::new(0),
            inline_depth: Cell::new(0),
        }
    }

    /// Draws the next unique hygiene suffix: `_u1`, `_u2`, ...
    pub fn next_suffix(&self) -> String {
        let next = self.counter.get() + 1;
        self.counter.set(next);
        format!("_u{}", next)
    }

    /// How many suffixes this run has handed out so far.
    pub fn suffixes_drawn(&self) -> u64 {
        self.counter.get()
    }

    pub(crate) fn enter_inline(&self) -> Option<InlineDepthGuard<'_>> {
        if self.inline_depth.get() >= MAX_INLINE_DEPTH {
            return None;
        }
        self.inline_depth.set(self.inline_depth.get() + 1);
        Some(InlineDepthGuard {
            depth: &self.inline_depth,
        })
    }
}

/// Decrements the inline depth when an expansion scope ends.
pub(crate) struct InlineDepthGuard<'a> {
    depth: &'a Cell<usize>,
}

impl Drop for InlineDepthGuard<'_> {
    fn drop(&mut self) {
        self.depth.set(self.depth.get() - 1);
    }
}

// ============================================================================
// WALK - Generic post-order traversal
// ============================================================================

/// Post-order walk: for every child-bearing field in declared order, each
/// child subtree is walked first; only then is the transformer applied to
/// the node itself. Removed children are dropped (order otherwise
/// preserved); per-child errors are logged and absorbed by dropping the
/// child.
pub fn walk(
    tree: &mut Tree,
    id: NodeId,
    pass: &dyn Transformer,
    ctx: &ExportContext<'_>,
) -> Result<Disposition, ExportError> {
    for slot in tree.child_slots(id) {
        match slot {
            ChildSlot::Many(field, children) => {
                let mut kept = Vec::with_capacity(children.len());
                for child in children {
                    match walk(tree, child, pass, ctx) {
                        Ok(Disposition::Unchanged) => kept.push(child),
                        Ok(Disposition::Replaced(replacement)) => kept.push(replacement),
                        Ok(Disposition::Removed) => {}
                        Err(error) => {
                            log::warn!(
                                "{}: dropping {} child after transform failure: {}",
                                pass.name(),
                                tree.tag(child).name(),
                                error
                            );
                        }
                    }
                }
                tree.set_many(id, field, kept);
            }
            ChildSlot::One(field, Some(child)) => match walk(tree, child, pass, ctx) {
                Ok(Disposition::Unchanged) => {}
                Ok(Disposition::Replaced(replacement)) => {
                    tree.set_one(id, field, Some(replacement));
                }
                Ok(Disposition::Removed) => tree.set_one(id, field, None),
                Err(error) => {
                    log::warn!(
                        "{}: dropping {} child after transform failure: {}",
                        pass.name(),
                        tree.tag(child).name(),
                        error
                    );
                    tree.set_one(id, field, None);
                }
            },
            ChildSlot::One(_, None) => {}
        }
    }
    pass.transform(tree, id, ctx)
}

/// Applies one pass to a private clone of the tree; the input is never
/// mutated.
pub fn transform(
    tree: &Tree,
    pass: &dyn Transformer,
    ctx: &ExportContext<'_>,
) -> Result<Tree, ExportError> {
    let mut output = tree.clone();
    let root = output.root();
    match walk(&mut output, root, pass, ctx)? {
        Disposition::Unchanged => {}
        Disposition::Replaced(replacement) => output.set_root(replacement),
        Disposition::Removed => {
            let empty = output.push(NodeKind::NodeList { children: vec![] });
            output.set_root(empty);
        }
    }
    Ok(output)
}

// ============================================================================
// PIPELINE - Ordered pass application
// ============================================================================

/// An ordered sequence of rewrite passes. Each pass consumes the previous
/// pass's output tree.
pub struct Pipeline {
    passes: Vec<Box<dyn Transformer>>,
}

impl Pipeline {
    pub fn new(passes: Vec<Box<dyn Transformer>>) -> Self {
        Self { passes }
    }

    /// The standard export pipeline: inline configured macro calls, resolve
    /// caller/yield idioms per the selected mode, then apply the configured
    /// parameter and variable renames.
    pub fn for_export(yield_mode: YieldMode) -> Self {
        let yield_pass: Box<dyn Transformer> = match yield_mode {
            YieldMode::Remove => Box::new(RemoveYield),
            YieldMode::Prefer => Box::new(PreferYield),
        };
        Self::new(vec![
            Box::new(InlineMacroCall),
            yield_pass,
            Box::new(MapParameters),
            Box::new(MapVariables),
        ])
    }

    pub fn run(&self, tree: &Tree, ctx: &ExportContext<'_>) -> Result<Tree, ExportError> {
        let mut current = tree.clone();
        for pass in &self.passes {
            current = transform(&current, pass.as_ref(), ctx)?;
        }
        Ok(current)
    }
}
