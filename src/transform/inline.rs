//! Macro call inlining
//!
//! Replaces a call to a macro configured for inline export with a hygienic,
//! parameter-substituted copy of the macro's body: classic inline expansion
//! with alpha-renaming so two call sites can never capture each other's
//! bindings.
//!
//! Per matching call:
//! 1. calls to macros that are unknown or not in inline mode pass through;
//! 2. a fresh suffix is drawn from the run-scoped hygiene counter;
//! 3. the macro's own definition is re-entered through parser + pipeline,
//!    sharing the run context (and with it the counter);
//! 4. one `Set` binding per formal parameter is synthesized, in declared
//!    order, from the argument matched by name, then by position, then the
//!    parameter default;
//! 5. body references to formal parameters are suffix-renamed;
//! 6. a caller body replaces the yield placeholder, wrapped in a sequence;
//! 7. the call is replaced by a flat sequence of bindings then body.

use std::collections::HashSet;

use crate::catalog::ExportMode;
use crate::errors::{unspanned, ErrorKind, ErrorReporting, ExportError, ReportContext};
use crate::node::{ChildField, NodeId, NodeKind, NodeTag, Tree};
use crate::syntax::{parse, ParseOptions};

use super::{walk, DecorateVariableNames, Disposition, ExportContext, Pipeline, Transformer};

pub struct InlineMacroCall;

impl Transformer for InlineMacroCall {
    fn name(&self) -> &'static str {
        "inline-macro-call"
    }

    fn transform(
        &self,
        tree: &mut Tree,
        id: NodeId,
        ctx: &ExportContext<'_>,
    ) -> Result<Disposition, ExportError> {
        let NodeKind::Call { name, .. } = tree.kind(id) else {
            return Ok(Disposition::Unchanged);
        };
        let macro_name = name.clone();

        match ctx.catalog.configuration(&macro_name) {
            Some(config) if config.mode == ExportMode::Inline => {}
            _ => return Ok(Disposition::Unchanged),
        }

        let errors = ReportContext::for_pass("inline");
        let Some(source) = ctx.catalog.macro_source(&macro_name) else {
            return Err(errors.report(
                ErrorKind::MissingMacroSource {
                    macro_name: macro_name.clone(),
                },
                unspanned(),
            ));
        };
        let source = source.to_string();

        // One fresh suffix per call site, unique across the whole run.
        let suffix = ctx.next_suffix();

        let Some(_depth) = ctx.enter_inline() else {
            return Err(errors.report(
                ErrorKind::InlineDepthExceeded {
                    macro_name: macro_name.clone(),
                },
                unspanned(),
            ));
        };

        // Recursive re-entry: the macro's definition goes through the same
        // parser and pipeline, so its body arrives fully transformed.
        let parsed = parse(&source, &ParseOptions::named(macro_name.as_str()))?;
        let mut expanded = Pipeline::for_export(ctx.yield_mode).run(&parsed, ctx)?;

        let Some(macro_found) = expanded.at(expanded.root()).find_kind(NodeTag::Macro) else {
            return Err(errors.malformed_macro(
                &macro_name,
                "definition source contains no macro",
                unspanned(),
            ));
        };
        let macro_id = macro_found.id();
        let (parameter_ids, body_ids) = match expanded.kind(macro_id) {
            NodeKind::Macro {
                parameters,
                children,
                ..
            } => (parameters.clone(), children.clone()),
            _ => (Vec::new(), Vec::new()),
        };
        let mut parameters: Vec<(String, Option<NodeId>)> = Vec::new();
        for parameter in parameter_ids {
            if let NodeKind::Parameter { name, value } = expanded.kind(parameter) {
                parameters.push((name.clone(), *value));
            }
        }

        // Alpha-rename parameter references inside the transformed body to
        // the call-site-private names the bindings below introduce.
        let parameter_names: HashSet<String> =
            parameters.iter().map(|(name, _)| name.clone()).collect();
        let rename = DecorateVariableNames::suffix(suffix.clone())
            .gated(move |segment| parameter_names.contains(segment));
        for &child in &body_ids {
            walk(&mut expanded, child, &rename, ctx)?;
        }

        // Call arguments still carrying a value: (name, argument node).
        let argument_ids = match tree.kind(id) {
            NodeKind::Call { arguments, .. } => arguments.clone(),
            _ => Vec::new(),
        };
        let mut supplied: Vec<(Option<String>, NodeId)> = Vec::new();
        for argument in argument_ids {
            if let NodeKind::Argument {
                name,
                value: Some(_),
            } = tree.kind(argument)
            {
                supplied.push((name.clone(), argument));
            }
        }
        let positional: Vec<NodeId> = supplied
            .iter()
            .filter(|(name, _)| name.is_none())
            .map(|(_, argument)| *argument)
            .collect();

        // One binding per formal parameter, in declared order. Unmatched
        // extra arguments are ignored; a parameter with neither argument nor
        // default binds nothing.
        let mut sequence = Vec::new();
        for (index, (parameter_name, default)) in parameters.iter().enumerate() {
            let argument = supplied
                .iter()
                .find(|(name, _)| name.as_deref() == Some(parameter_name.as_str()))
                .map(|(_, argument)| *argument)
                .or_else(|| positional.get(index).copied());
            let value = match argument {
                Some(argument) => tree.take_one(argument, ChildField::Value),
                None => default.map(|node| tree.adopt(&expanded, node)),
            };
            let Some(value) = value else { continue };

            let variable = tree.push(NodeKind::Variable {
                path: vec![format!("{}{}", parameter_name, suffix)],
            });
            let binding = tree.push(NodeKind::Set {
                variable: None,
                value: None,
            });
            tree.set_one(binding, ChildField::Variable, Some(variable));
            tree.set_one(binding, ChildField::Value, Some(value));
            sequence.push(binding);
        }

        // Graft the renamed body, then substitute the caller body at the
        // yield placeholder. Without a placeholder the caller body is
        // discarded.
        let mut grafted: Vec<NodeId> = body_ids
            .iter()
            .map(|&child| tree.adopt(&expanded, child))
            .collect();
        let call_body = tree.take_many(id, ChildField::Children);
        if !call_body.is_empty() {
            let placeholder: Option<NodeId> = grafted
                .iter()
                .find_map(|&child| tree.at(child).find_kind(NodeTag::Yield))
                .map(|found| found.id());
            if let Some(target) = placeholder {
                let wrapper = tree.push(NodeKind::NodeList { children: vec![] });
                tree.set_many(wrapper, ChildField::Children, call_body);
                match tree.parent(target) {
                    Some(parent) => tree.replace_child(parent, target, wrapper),
                    // The placeholder is itself a direct body child.
                    None => {
                        for child in &mut grafted {
                            if *child == target {
                                *child = wrapper;
                            }
                        }
                    }
                }
            }
        }

        sequence.extend(grafted);
        let replacement = tree.push(NodeKind::NodeList { children: vec![] });
        tree.set_many(replacement, ChildField::Children, sequence);
        Ok(Disposition::Replaced(replacement))
    }
}
