//! Transformer contract tests: the caller/yield resolution tables, the
//! configuration-driven renames, and the walk engine's clone-first and
//! partial-failure policies.

use serde_json::json;

use stencil::catalog::{MacroExportConfig, ParameterTarget, StaticCatalog};
use stencil::errors::{unspanned, ReportContext};
use stencil::node::{NodeId, NodeKind, NodeTag, Tree};
use stencil::transform::{transform, MapParameters, MapVariables, PreferYield, RemoveYield};
use stencil::{
    parse, Disposition, ErrorKind, ErrorReporting, ExportContext, ExportError, ParseOptions,
    Transformer, YieldMode,
};

fn parse_ok(content: &str) -> Tree {
    parse(content, &ParseOptions::default()).expect("template should parse")
}

fn variable_paths(tree: &Tree) -> Vec<Vec<String>> {
    tree.at(tree.root())
        .filter_kind(NodeTag::Variable)
        .iter()
        .map(|node| match node.kind() {
            NodeKind::Variable { path } => path.clone(),
            _ => Vec::new(),
        })
        .collect()
}

// ----------------------------------------------------------------------------
// Caller/yield resolution
// ----------------------------------------------------------------------------

const GUARDED: &str = "{% if caller_text | notempty %}A{% else %}B{% endif %}";
const BARE: &str = "{% if caller %}A{% endif %}";
const STANDALONE: &str = "X{{ caller() }}Y";

#[test]
fn remove_yield_keeps_the_else_branch() {
    let tree = parse_ok(GUARDED);
    let catalog = StaticCatalog::default();
    let ctx = ExportContext::new(&catalog, YieldMode::Remove);
    let out = transform(&tree, &RemoveYield, &ctx).expect("pass should run");
    assert_eq!(
        out.serialize_root(),
        json!({
            "type": "NodeList",
            "children": [{
                "type": "NodeList",
                "children": [{"type": "TextNode", "value": "B"}]
            }]
        })
    );
}

#[test]
fn remove_yield_empties_a_bare_caller_guard() {
    let tree = parse_ok(BARE);
    let catalog = StaticCatalog::default();
    let ctx = ExportContext::new(&catalog, YieldMode::Remove);
    let out = transform(&tree, &RemoveYield, &ctx).expect("pass should run");
    assert_eq!(
        out.serialize_root(),
        json!({
            "type": "NodeList",
            "children": [{"type": "NodeList", "children": []}]
        })
    );
}

#[test]
fn remove_yield_deletes_standalone_placeholders() {
    let tree = parse_ok(STANDALONE);
    let catalog = StaticCatalog::default();
    let ctx = ExportContext::new(&catalog, YieldMode::Remove);
    let out = transform(&tree, &RemoveYield, &ctx).expect("pass should run");
    assert_eq!(
        out.serialize_root(),
        json!({
            "type": "NodeList",
            "children": [
                {"type": "TextNode", "value": "X"},
                {"type": "TextNode", "value": "Y"}
            ]
        })
    );
}

#[test]
fn prefer_yield_keeps_the_then_branch_for_both_shapes() {
    let catalog = StaticCatalog::default();
    let ctx = ExportContext::new(&catalog, YieldMode::Prefer);
    for shape in [GUARDED, BARE] {
        let tree = parse_ok(shape);
        let out = transform(&tree, &PreferYield, &ctx).expect("pass should run");
        assert_eq!(
            out.serialize_root(),
            json!({
                "type": "NodeList",
                "children": [{
                    "type": "NodeList",
                    "children": [{"type": "TextNode", "value": "A"}]
                }]
            }),
            "shape: {shape}"
        );
    }
}

#[test]
fn prefer_yield_leaves_standalone_placeholders_for_substitution() {
    let tree = parse_ok(STANDALONE);
    let catalog = StaticCatalog::default();
    let ctx = ExportContext::new(&catalog, YieldMode::Prefer);
    let out = transform(&tree, &PreferYield, &ctx).expect("pass should run");
    assert_eq!(out.serialize_root(), tree.serialize_root());
}

#[test]
fn unrelated_conditionals_are_untouched() {
    let catalog = StaticCatalog::default();
    let tree = parse_ok("{% if other %}A{% else %}B{% endif %}");
    let ctx = ExportContext::new(&catalog, YieldMode::Remove);
    let removed = transform(&tree, &RemoveYield, &ctx).expect("pass should run");
    assert_eq!(removed.serialize_root(), tree.serialize_root());
    let preferred = transform(&tree, &PreferYield, &ctx).expect("pass should run");
    assert_eq!(preferred.serialize_root(), tree.serialize_root());
}

#[test]
fn passes_operate_on_a_clone_of_their_input() {
    let tree = parse_ok(GUARDED);
    let before = tree.serialize_root();
    let catalog = StaticCatalog::default();
    let ctx = ExportContext::new(&catalog, YieldMode::Remove);
    let _ = transform(&tree, &RemoveYield, &ctx).expect("pass should run");
    assert_eq!(tree.serialize_root(), before);
}

// ----------------------------------------------------------------------------
// Configuration-driven renames
// ----------------------------------------------------------------------------

fn card_catalog() -> StaticCatalog {
    let mut config = MacroExportConfig::default();
    config.variables.insert(
        "model.text".to_string(),
        "content.body".to_string(),
    );
    config.parameters.insert(
        "title".to_string(),
        ParameterTarget {
            target_name: "heading".to_string(),
        },
    );
    StaticCatalog::default().with_macro("card", "", config)
}

#[test]
fn map_variables_rewrites_paths_inside_the_configured_macro() {
    let catalog = card_catalog();
    let ctx = ExportContext::new(&catalog, YieldMode::Remove);
    let tree = parse_ok(
        "{% macro card(title) %}{{ model.text }}{{ model.other }}{% endmacro %}{{ model.text }}",
    );
    let out = transform(&tree, &MapVariables, &ctx).expect("pass should run");
    assert_eq!(
        variable_paths(&out),
        vec![
            // Inside the macro: configured path rewritten, others untouched.
            vec!["content".to_string(), "body".to_string()],
            vec!["model".to_string(), "other".to_string()],
            // Outside any macro the pass is a no-op.
            vec!["model".to_string(), "text".to_string()],
        ]
    );
}

#[test]
fn map_parameters_rewrites_the_first_segment_only() {
    let catalog = card_catalog();
    let ctx = ExportContext::new(&catalog, YieldMode::Remove);
    let tree = parse_ok("{% macro card(title) %}{{ title.length }}{{ other }}{% endmacro %}");
    let out = transform(&tree, &MapParameters, &ctx).expect("pass should run");
    assert_eq!(
        variable_paths(&out),
        vec![
            vec!["heading".to_string(), "length".to_string()],
            vec!["other".to_string()],
        ]
    );
}

#[test]
fn unknown_macro_configuration_passes_through() {
    let catalog = StaticCatalog::default();
    let ctx = ExportContext::new(&catalog, YieldMode::Remove);
    let tree = parse_ok("{% macro card(title) %}{{ model.text }}{% endmacro %}");
    let out = transform(&tree, &MapVariables, &ctx).expect("pass should run");
    assert_eq!(out.serialize_root(), tree.serialize_root());
}

// ----------------------------------------------------------------------------
// Walk engine failure policy
// ----------------------------------------------------------------------------

struct FailOnText;

impl Transformer for FailOnText {
    fn name(&self) -> &'static str {
        "fail-on-text"
    }

    fn transform(
        &self,
        tree: &mut Tree,
        id: NodeId,
        _ctx: &ExportContext<'_>,
    ) -> Result<Disposition, ExportError> {
        if matches!(tree.kind(id), NodeKind::Text { .. }) {
            let errors = ReportContext::for_pass("fail-on-text");
            return Err(errors.report(
                ErrorKind::GeneralTransform {
                    message: "text is not allowed here".to_string(),
                },
                unspanned(),
            ));
        }
        Ok(Disposition::Unchanged)
    }
}

#[test]
fn per_child_failures_drop_the_child_and_keep_siblings() {
    let _ = env_logger::builder().is_test(true).try_init();
    let tree = parse_ok("A{{ x }}B");
    let before = tree.serialize_root();
    let catalog = StaticCatalog::default();
    let ctx = ExportContext::new(&catalog, YieldMode::Remove);

    let out = transform(&tree, &FailOnText, &ctx).expect("walk absorbs child failures");
    assert_eq!(
        out.serialize_root(),
        json!({
            "type": "NodeList",
            "children": [{
                "type": "OutputNode",
                "children": [{"type": "VariableNode", "path": ["x"]}]
            }]
        })
    );
    // The caller's tree is never mutated, even when children get dropped.
    assert_eq!(tree.serialize_root(), before);
}
