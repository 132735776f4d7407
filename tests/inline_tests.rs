//! End-to-end macro inlining: hygienic suffixes, parameter bindings, yield
//! substitution, and composition across nested expansions.

use serde_json::json;

use stencil::catalog::{ExportMode, MacroExportConfig, StaticCatalog};
use stencil::node::{NodeKind, NodeTag, Tree};
use stencil::transform::Pipeline;
use stencil::{parse, ExportContext, Exporter, ParseOptions, YieldMode};

fn inline_config() -> MacroExportConfig {
    MacroExportConfig {
        mode: ExportMode::Inline,
        ..MacroExportConfig::default()
    }
}

fn catalog_with_m() -> StaticCatalog {
    StaticCatalog::default().with_macro(
        "m",
        "{% macro m(x=1) %}{{ x }}{{ caller() }}{% endmacro %}",
        inline_config(),
    )
}

fn export(catalog: &StaticCatalog, content: &str, mode: YieldMode) -> (Tree, u64) {
    let tree = parse(content, &ParseOptions::default()).expect("template should parse");
    let ctx = ExportContext::new(catalog, mode);
    let out = Pipeline::for_export(mode)
        .run(&tree, &ctx)
        .expect("pipeline should run");
    (out, ctx.suffixes_drawn())
}

fn first_segments(tree: &Tree) -> Vec<String> {
    tree.at(tree.root())
        .filter_kind(NodeTag::Variable)
        .iter()
        .filter_map(|node| node.first_segment().map(str::to_string))
        .collect()
}

#[test]
fn call_is_replaced_by_bindings_then_substituted_body() {
    let catalog = catalog_with_m();
    let (out, drawn) = export(
        &catalog,
        "{% call m(x=5) %}BODY{% endcall %}",
        YieldMode::Prefer,
    );
    assert_eq!(drawn, 1);
    assert_eq!(
        out.serialize_root(),
        json!({
            "type": "NodeList",
            "children": [{
                "type": "NodeList",
                "children": [
                    {
                        "type": "SetNode",
                        "variable": {"type": "VariableNode", "path": ["x_u1"]},
                        "value": {"type": "LiteralNode", "value": 5}
                    },
                    {
                        "type": "OutputNode",
                        "children": [{"type": "VariableNode", "path": ["x_u1"]}]
                    },
                    {
                        "type": "NodeList",
                        "children": [{"type": "TextNode", "value": "BODY"}]
                    }
                ]
            }]
        })
    );
}

#[test]
fn missing_argument_falls_back_to_the_typed_default() {
    let catalog = catalog_with_m();
    let (out, _) = export(&catalog, "{% call m() %}{% endcall %}", YieldMode::Remove);
    // Under the remove-yield assumption the placeholder is gone and the
    // empty caller body is discarded.
    assert_eq!(
        out.serialize_root(),
        json!({
            "type": "NodeList",
            "children": [{
                "type": "NodeList",
                "children": [
                    {
                        "type": "SetNode",
                        "variable": {"type": "VariableNode", "path": ["x_u1"]},
                        "value": {"type": "LiteralNode", "value": 1}
                    },
                    {
                        "type": "OutputNode",
                        "children": [{"type": "VariableNode", "path": ["x_u1"]}]
                    }
                ]
            }]
        })
    );
}

#[test]
fn positional_arguments_bind_in_declared_order() {
    let catalog = StaticCatalog::default().with_macro(
        "pair",
        "{% macro pair(a, b=2) %}{{ a }}{{ b }}{% endmacro %}",
        inline_config(),
    );
    let (out, _) = export(&catalog, "{% call pair(9) %}{% endcall %}", YieldMode::Remove);
    let serialized = serde_json::to_string(&out.serialize_root()).expect("serializable");
    // a binds the positional 9, b falls back to its default.
    assert!(serialized.contains("a_u1"));
    assert!(serialized.contains("b_u1"));
    assert!(serialized.contains(":9"));
    assert!(serialized.contains(":2"));
}

#[test]
fn sibling_inlinings_draw_disjoint_suffixes() {
    let catalog = catalog_with_m();
    let (out, drawn) = export(
        &catalog,
        "{% call m(x=5) %}{% endcall %}{% call m(x=6) %}{% endcall %}",
        YieldMode::Remove,
    );
    assert_eq!(drawn, 2);
    let segments = first_segments(&out);
    assert!(segments.contains(&"x_u1".to_string()));
    assert!(segments.contains(&"x_u2".to_string()));
    assert!(!segments.iter().any(|s| s == "x"));
}

#[test]
fn nested_inlining_composes_without_collisions() {
    let catalog = StaticCatalog::default()
        .with_macro(
            "inner",
            "{% macro inner(v) %}<i>{{ v }}</i>{% endmacro %}",
            inline_config(),
        )
        .with_macro(
            "outer",
            "{% macro outer(t) %}{% call inner(v=t) %}{% endcall %}{% endmacro %}",
            inline_config(),
        );
    let (out, drawn) = export(
        &catalog,
        "{% call outer(t='x') %}{% endcall %}",
        YieldMode::Remove,
    );
    // The outer call drew its suffix before re-entering the pipeline, so the
    // nested expansion drew the next one.
    assert_eq!(drawn, 2);
    let segments = first_segments(&out);
    assert_eq!(
        segments,
        vec![
            "t_u1".to_string(), // outer binding
            "v_u2".to_string(), // inner binding, value references t_u1
            "t_u1".to_string(),
            "v_u2".to_string(), // inner body output
        ]
    );
}

#[test]
fn zero_parameter_macros_synthesize_no_bindings() {
    let catalog = StaticCatalog::default().with_macro(
        "chrome",
        "{% macro chrome() %}Z{% endmacro %}",
        inline_config(),
    );
    let (out, _) = export(
        &catalog,
        "{% call chrome() %}BODY{% endcall %}",
        YieldMode::Remove,
    );
    // No bindings, and without a placeholder the caller body is discarded.
    assert_eq!(
        out.serialize_root(),
        json!({
            "type": "NodeList",
            "children": [{
                "type": "NodeList",
                "children": [{"type": "TextNode", "value": "Z"}]
            }]
        })
    );
}

#[test]
fn extra_arguments_are_ignored() {
    let catalog = catalog_with_m();
    let (out, _) = export(
        &catalog,
        "{% call m(x=5, unknown=7) %}{% endcall %}",
        YieldMode::Remove,
    );
    let serialized = serde_json::to_string(&out.serialize_root()).expect("serializable");
    assert!(serialized.contains("x_u1"));
    assert!(!serialized.contains("unknown"));
}

#[test]
fn calls_without_inline_mode_pass_through() {
    let referenced = StaticCatalog::default().with_macro(
        "m",
        "{% macro m(x=1) %}{{ x }}{% endmacro %}",
        MacroExportConfig::default(),
    );
    let (out, drawn) = export(
        &referenced,
        "{% call m(x=5) %}{% endcall %}",
        YieldMode::Remove,
    );
    assert_eq!(drawn, 0);
    let root = out.at(out.root());
    let call = root.find_kind(NodeTag::Call).expect("call preserved");
    assert_eq!(call.name(), Some("m"));

    // Same for a macro the catalog has never heard of.
    let empty = StaticCatalog::default();
    let (out, drawn) = export(&empty, "{% call m(x=5) %}{% endcall %}", YieldMode::Remove);
    assert_eq!(drawn, 0);
    assert!(out.at(out.root()).find_kind(NodeTag::Call).is_some());
}

#[test]
fn self_recursive_macros_stop_at_the_depth_guard() {
    let catalog = StaticCatalog::default().with_macro(
        "loop",
        "{% macro loop() %}x{% call loop() %}{% endcall %}{% endmacro %}",
        inline_config(),
    );
    // The innermost expansion fails at the depth limit; the walk absorbs it
    // by dropping that child, so the export still completes.
    let (out, _) = export(&catalog, "{% call loop() %}{% endcall %}", YieldMode::Remove);
    assert!(out
        .at(out.root())
        .find(&|n| matches!(n.kind(), NodeKind::Text { value } if value == "x"))
        .is_some());
}

#[test]
fn exporter_runs_the_configured_renames_on_macro_definitions() {
    let catalog = StaticCatalog::from_json(
        r#"{
            "macros": {
                "card": {
                    "source": "{% macro card(title) %}{{ title }}{% endmacro %}",
                    "parameters": {"title": {"targetName": "heading"}}
                }
            }
        }"#,
    )
    .expect("catalog should load");

    let exporter = Exporter::new(&catalog, YieldMode::Remove);
    let out = exporter.export_macro("card").expect("export should run");
    assert_eq!(first_segments(&out), vec!["heading".to_string()]);

    // Unregistered macros are an export error, not a silent no-op.
    assert!(exporter.export_macro("missing").is_err());
}
