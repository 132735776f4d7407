//! Plain-data projection of node trees
//!
//! `serialize` produces the stable tagged-record shape consumed by golden
//! fixtures and downstream emitters: `{"type": <kind>, <data fields...>}`,
//! recursively nested, with fields in each kind's declared order. Parent
//! links never serialize, so the output is always acyclic.

use serde_json::{Map, Value};

use super::{Literal, NodeId, NodeKind, Tree};

impl Tree {
    /// Serializes the whole tree from its root.
    pub fn serialize_root(&self) -> Value {
        self.serialize(self.root())
    }

    /// Serializes one subtree into a plain tagged record.
    ///
    /// Total over every tree constructible through the slot setters; absent
    /// optional fields serialize as `null`.
    pub fn serialize(&self, id: NodeId) -> Value {
        let mut record = Map::new();
        record.insert(
            "type".to_string(),
            Value::String(self.tag(id).name().to_string()),
        );

        match self.kind(id) {
            NodeKind::NodeList { children }
            | NodeKind::Array { children }
            | NodeKind::Condition { children }
            | NodeKind::Expression { children }
            | NodeKind::Group { children }
            | NodeKind::Output { children } => {
                record.insert("children".to_string(), self.serialize_list(children));
            }
            NodeKind::Block { name, children } => {
                record.insert("name".to_string(), Value::String(name.clone()));
                record.insert("children".to_string(), self.serialize_list(children));
            }
            NodeKind::Literal { value } => {
                record.insert("value".to_string(), serialize_literal(value));
            }
            NodeKind::Text { value } => {
                record.insert("value".to_string(), Value::String(value.clone()));
            }
            NodeKind::Operand { value }
            | NodeKind::BooleanOperand { value }
            | NodeKind::ComplexVariable { value } => {
                record.insert("value".to_string(), self.serialize_opt(*value));
            }
            NodeKind::Call {
                name,
                arguments,
                children,
            } => {
                record.insert("name".to_string(), Value::String(name.clone()));
                record.insert("arguments".to_string(), self.serialize_list(arguments));
                record.insert("children".to_string(), self.serialize_list(children));
            }
            NodeKind::Tag { name, arguments } | NodeKind::FunctionCall { name, arguments } => {
                record.insert("name".to_string(), Value::String(name.clone()));
                record.insert("arguments".to_string(), self.serialize_list(arguments));
            }
            NodeKind::Filter {
                name,
                value,
                arguments,
            } => {
                record.insert("name".to_string(), Value::String(name.clone()));
                record.insert("value".to_string(), self.serialize_opt(*value));
                record.insert("arguments".to_string(), self.serialize_list(arguments));
            }
            NodeKind::Macro {
                name,
                parameters,
                children,
            } => {
                record.insert("name".to_string(), Value::String(name.clone()));
                record.insert("parameters".to_string(), self.serialize_list(parameters));
                record.insert("children".to_string(), self.serialize_list(children));
            }
            NodeKind::Parameter { name, value } => {
                record.insert("name".to_string(), Value::String(name.clone()));
                record.insert("value".to_string(), self.serialize_opt(*value));
            }
            NodeKind::Argument { name, value } => {
                record.insert(
                    "name".to_string(),
                    name.as_ref()
                        .map_or(Value::Null, |n| Value::String(n.clone())),
                );
                record.insert("value".to_string(), self.serialize_opt(*value));
            }
            NodeKind::If {
                condition,
                children,
                else_if_children,
                else_children,
            } => {
                record.insert("condition".to_string(), self.serialize_opt(*condition));
                record.insert("children".to_string(), self.serialize_list(children));
                record.insert(
                    "elseIfChildren".to_string(),
                    self.serialize_list(else_if_children),
                );
                record.insert(
                    "elseChildren".to_string(),
                    self.serialize_list(else_children),
                );
            }
            NodeKind::ElseIf {
                condition,
                children,
            } => {
                record.insert("condition".to_string(), self.serialize_opt(*condition));
                record.insert("children".to_string(), self.serialize_list(children));
            }
            NodeKind::For {
                key_name,
                value_name,
                value,
                children,
            } => {
                record.insert(
                    "keyName".to_string(),
                    key_name
                        .as_ref()
                        .map_or(Value::Null, |k| Value::String(k.clone())),
                );
                record.insert("valueName".to_string(), Value::String(value_name.clone()));
                record.insert("value".to_string(), self.serialize_opt(*value));
                record.insert("children".to_string(), self.serialize_list(children));
            }
            NodeKind::Set { variable, value } => {
                record.insert("variable".to_string(), self.serialize_opt(*variable));
                record.insert("value".to_string(), self.serialize_opt(*value));
            }
            NodeKind::Variable { path } => {
                record.insert(
                    "path".to_string(),
                    Value::Array(path.iter().map(|s| Value::String(s.clone())).collect()),
                );
            }
            NodeKind::Yield => {}
        }

        Value::Object(record)
    }

    fn serialize_list(&self, ids: &[NodeId]) -> Value {
        Value::Array(ids.iter().map(|&child| self.serialize(child)).collect())
    }

    fn serialize_opt(&self, id: Option<NodeId>) -> Value {
        id.map_or(Value::Null, |child| self.serialize(child))
    }
}

fn serialize_literal(literal: &Literal) -> Value {
    match literal {
        Literal::Int(i) => Value::from(*i),
        Literal::Str(s) => Value::String(s.clone()),
        Literal::Bool(b) => Value::Bool(*b),
    }
}
