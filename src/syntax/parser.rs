//! Template parser: token stream to node tree
//!
//! A state machine over the lexer's token stream. Each construct is parsed by
//! a small dedicated function returning `Result`; malformed input fails fast
//! with a spanned error and no partial tree is returned.

use crate::errors::{to_source_span, ErrorKind, ErrorReporting, ExportError, SourceContext};
use crate::node::{ChildField, Literal, NodeId, NodeKind, Tree};
use crate::syntax::lexer::{Lexer, Token, TokenKind};
use crate::syntax::Span;

/// Parser options. The name identifies the template in diagnostics.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub name: String,
}

impl ParseOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self::named("template")
    }
}

/// Parses template source into a node tree rooted at a `NodeList`.
pub fn parse(content: &str, options: &ParseOptions) -> Result<Tree, ExportError> {
    let source = SourceContext::from_template(&options.name, content);
    let tokens = Lexer::new(content, source.clone()).tokenize()?;
    Parser::new(tokens, source).parse_template()
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    source: SourceContext,
    tree: Tree,
}

impl ErrorReporting for Parser {
    fn report(&self, kind: ErrorKind, span: miette::SourceSpan) -> ExportError {
        crate::errors::ReportContext::new(self.source.clone(), "parse").report(kind, span)
    }
}

impl Parser {
    fn new(tokens: Vec<Token>, source: SourceContext) -> Self {
        Self {
            tokens,
            pos: 0,
            source,
            tree: Tree::with_root(NodeKind::NodeList { children: vec![] }),
        }
    }

    // ------------------------------------------------------------------------
    // Token cursor
    // ------------------------------------------------------------------------

    fn peek_kind(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn peek_kind_at(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    fn peek_symbol(&self, symbol: &str) -> bool {
        matches!(self.peek_kind(), Some(TokenKind::Symbol(k)) if k == symbol)
    }

    fn current_span(&self) -> Span {
        match self.tokens.get(self.pos) {
            Some(token) => token.span,
            None => {
                let end = self.tokens.last().map_or(0, |t| t.span.end);
                Span::new(end, end)
            }
        }
    }

    fn describe_current(&self) -> String {
        self.peek_kind()
            .map_or_else(|| "end of template".to_string(), TokenKind::describe)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek_kind() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: &TokenKind, expected: &str) -> Result<(), ExportError> {
        if self.eat(kind) {
            Ok(())
        } else {
            Err(self.unexpected_token(
                expected,
                &self.describe_current(),
                to_source_span(self.current_span()),
            ))
        }
    }

    fn expect_symbol(&mut self, expected: &str) -> Result<(String, Span), ExportError> {
        match self.tokens.get(self.pos) {
            Some(Token {
                kind: TokenKind::Symbol(symbol),
                span,
            }) => {
                let result = (symbol.clone(), *span);
                self.pos += 1;
                Ok(result)
            }
            _ => Err(self.unexpected_token(
                expected,
                &self.describe_current(),
                to_source_span(self.current_span()),
            )),
        }
    }

    // ------------------------------------------------------------------------
    // Top level
    // ------------------------------------------------------------------------

    fn parse_template(mut self) -> Result<Tree, ExportError> {
        let mut children = Vec::new();
        while self.pos < self.tokens.len() {
            match self.tokens[self.pos].kind.clone() {
                TokenKind::Data(text) => {
                    self.pos += 1;
                    if !text.is_empty() {
                        children.push(self.tree.push(NodeKind::Text { value: text }));
                    }
                }
                TokenKind::Comment(_) => self.pos += 1,
                TokenKind::VariableStart => children.push(self.parse_output()?),
                TokenKind::BlockStart => children.push(self.parse_statement()?),
                other => {
                    return Err(self.unexpected_token(
                        "raw text or a tag",
                        &other.describe(),
                        to_source_span(self.current_span()),
                    ))
                }
            }
        }
        let root = self.tree.root();
        self.tree.set_many(root, ChildField::Children, children);
        Ok(self.tree)
    }

    /// Parses body content up to one of the given terminator keywords.
    /// Consumes through the terminator keyword token and returns it; the
    /// caller finishes the terminator tag (condition and/or `%}`).
    fn parse_body_until(
        &mut self,
        terminators: &[&str],
    ) -> Result<(Vec<NodeId>, String), ExportError> {
        let mut children = Vec::new();
        loop {
            if self.pos >= self.tokens.len() {
                let expected = terminators
                    .iter()
                    .map(|t| format!("'{{% {} %}}'", t))
                    .collect::<Vec<_>>()
                    .join(" or ");
                return Err(self.unexpected_eof(&expected, to_source_span(self.current_span())));
            }
            match self.tokens[self.pos].kind.clone() {
                TokenKind::Data(text) => {
                    self.pos += 1;
                    if !text.is_empty() {
                        children.push(self.tree.push(NodeKind::Text { value: text }));
                    }
                }
                TokenKind::Comment(_) => self.pos += 1,
                TokenKind::VariableStart => children.push(self.parse_output()?),
                TokenKind::BlockStart => {
                    if let Some(TokenKind::Symbol(keyword)) = self.peek_kind_at(1) {
                        if terminators.contains(&keyword.as_str()) {
                            let keyword = keyword.clone();
                            self.pos += 2;
                            return Ok((children, keyword));
                        }
                    }
                    children.push(self.parse_statement()?);
                }
                other => {
                    return Err(self.unexpected_token(
                        "raw text or a tag",
                        &other.describe(),
                        to_source_span(self.current_span()),
                    ))
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Statements
    // ------------------------------------------------------------------------

    fn parse_statement(&mut self) -> Result<NodeId, ExportError> {
        self.expect(&TokenKind::BlockStart, "'{%'")?;
        let (keyword, span) = self.expect_symbol("a statement keyword")?;
        match keyword.as_str() {
            "macro" => self.parse_macro(),
            "call" => self.parse_call(),
            "if" => self.parse_if(),
            "for" => self.parse_for(),
            "set" => self.parse_set(),
            "elif" | "else" | "endif" | "endfor" | "endmacro" | "endcall" => Err(self.report(
                ErrorKind::UnknownStatement { keyword },
                to_source_span(span),
            )),
            _ => self.parse_tag(keyword),
        }
    }

    /// `{% macro name(a, b=2) %} ... {% endmacro %}`
    fn parse_macro(&mut self) -> Result<NodeId, ExportError> {
        let (name, _) = self.expect_symbol("a macro name")?;
        self.expect(&TokenKind::LeftParen, "'('")?;
        let mut parameters = Vec::new();
        if !self.eat(&TokenKind::RightParen) {
            loop {
                let (param_name, _) = self.expect_symbol("a parameter name")?;
                let default = if self.eat(&TokenKind::Equals) {
                    Some(self.parse_literal()?)
                } else {
                    None
                };
                let parameter = self.tree.push(NodeKind::Parameter {
                    name: param_name,
                    value: None,
                });
                self.tree.set_one(parameter, ChildField::Value, default);
                parameters.push(parameter);
                if self.eat(&TokenKind::Comma) {
                    continue;
                }
                self.expect(&TokenKind::RightParen, "')'")?;
                break;
            }
        }
        self.expect(&TokenKind::BlockEnd, "'%}'")?;
        let (children, _) = self.parse_body_until(&["endmacro"])?;
        self.expect(&TokenKind::BlockEnd, "'%}'")?;

        let macro_node = self.tree.push(NodeKind::Macro {
            name,
            parameters: vec![],
            children: vec![],
        });
        self.tree
            .set_many(macro_node, ChildField::Parameters, parameters);
        self.tree.set_many(macro_node, ChildField::Children, children);
        Ok(macro_node)
    }

    /// `{% call name(args) %} ... {% endcall %}`
    fn parse_call(&mut self) -> Result<NodeId, ExportError> {
        let (name, _) = self.expect_symbol("a macro name")?;
        let arguments = if self.eat(&TokenKind::LeftParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        self.expect(&TokenKind::BlockEnd, "'%}'")?;
        let (children, _) = self.parse_body_until(&["endcall"])?;
        self.expect(&TokenKind::BlockEnd, "'%}'")?;

        let call = self.tree.push(NodeKind::Call {
            name,
            arguments: vec![],
            children: vec![],
        });
        self.tree.set_many(call, ChildField::Arguments, arguments);
        self.tree.set_many(call, ChildField::Children, children);
        Ok(call)
    }

    /// Any other `{% name(args) %}` block is a self-closing tag invocation.
    fn parse_tag(&mut self, name: String) -> Result<NodeId, ExportError> {
        let arguments = if self.eat(&TokenKind::LeftParen) {
            self.parse_arguments()?
        } else {
            Vec::new()
        };
        self.expect(&TokenKind::BlockEnd, "'%}'")?;
        let tag = self.tree.push(NodeKind::Tag {
            name,
            arguments: vec![],
        });
        self.tree.set_many(tag, ChildField::Arguments, arguments);
        Ok(tag)
    }

    /// `{% if c %} ... {% elif c2 %} ... {% else %} ... {% endif %}`
    fn parse_if(&mut self) -> Result<NodeId, ExportError> {
        let condition = self.parse_condition()?;
        self.expect(&TokenKind::BlockEnd, "'%}'")?;
        let (children, mut terminator) = self.parse_body_until(&["elif", "else", "endif"])?;

        let mut else_ifs = Vec::new();
        while terminator == "elif" {
            let elif_condition = self.parse_condition()?;
            self.expect(&TokenKind::BlockEnd, "'%}'")?;
            let (elif_children, next) = self.parse_body_until(&["elif", "else", "endif"])?;
            let elif = self.tree.push(NodeKind::ElseIf {
                condition: None,
                children: vec![],
            });
            self.tree
                .set_one(elif, ChildField::Condition, Some(elif_condition));
            self.tree.set_many(elif, ChildField::Children, elif_children);
            else_ifs.push(elif);
            terminator = next;
        }

        let else_children = if terminator == "else" {
            self.expect(&TokenKind::BlockEnd, "'%}'")?;
            let (body, _) = self.parse_body_until(&["endif"])?;
            body
        } else {
            Vec::new()
        };
        self.expect(&TokenKind::BlockEnd, "'%}'")?;

        let branch = self.tree.push(NodeKind::If {
            condition: None,
            children: vec![],
            else_if_children: vec![],
            else_children: vec![],
        });
        self.tree.set_one(branch, ChildField::Condition, Some(condition));
        self.tree.set_many(branch, ChildField::Children, children);
        self.tree.set_many(branch, ChildField::ElseIfChildren, else_ifs);
        self.tree
            .set_many(branch, ChildField::ElseChildren, else_children);
        Ok(branch)
    }

    /// `{% for v in expr %}` / `{% for k, v in expr %}`
    fn parse_for(&mut self) -> Result<NodeId, ExportError> {
        let (first, _) = self.expect_symbol("a loop variable")?;
        let (key_name, value_name) = if self.eat(&TokenKind::Comma) {
            let (second, _) = self.expect_symbol("a loop value name")?;
            (Some(first), second)
        } else {
            (None, first)
        };
        let (keyword, keyword_span) = self.expect_symbol("'in'")?;
        if keyword != "in" {
            return Err(self.unexpected_token(
                "'in'",
                &format!("'{}'", keyword),
                to_source_span(keyword_span),
            ));
        }
        let value = self.parse_expression()?;
        self.expect(&TokenKind::BlockEnd, "'%}'")?;
        let (children, _) = self.parse_body_until(&["endfor"])?;
        self.expect(&TokenKind::BlockEnd, "'%}'")?;

        let loop_node = self.tree.push(NodeKind::For {
            key_name,
            value_name,
            value: None,
            children: vec![],
        });
        self.tree.set_one(loop_node, ChildField::Value, Some(value));
        self.tree.set_many(loop_node, ChildField::Children, children);
        Ok(loop_node)
    }

    /// `{% set target = expr %}`
    fn parse_set(&mut self) -> Result<NodeId, ExportError> {
        let variable = self.parse_variable_target()?;
        self.expect(&TokenKind::Equals, "'='")?;
        let value = self.parse_expression()?;
        self.expect(&TokenKind::BlockEnd, "'%}'")?;

        let set = self.tree.push(NodeKind::Set {
            variable: None,
            value: None,
        });
        self.tree.set_one(set, ChildField::Variable, Some(variable));
        self.tree.set_one(set, ChildField::Value, Some(value));
        Ok(set)
    }

    fn parse_variable_target(&mut self) -> Result<NodeId, ExportError> {
        let (first, _) = self.expect_symbol("a variable name")?;
        let mut path = vec![first];
        while self.eat(&TokenKind::Dot) {
            path.push(self.expect_symbol("a path segment")?.0);
        }
        Ok(self.tree.push(NodeKind::Variable { path }))
    }

    // ------------------------------------------------------------------------
    // Expressions
    // ------------------------------------------------------------------------

    /// `{{ expr }}`; a bare `caller()` placeholder stays standalone.
    fn parse_output(&mut self) -> Result<NodeId, ExportError> {
        self.expect(&TokenKind::VariableStart, "'{{'")?;
        let expr = self.parse_expression()?;
        self.expect(&TokenKind::VariableEnd, "'}}'")?;
        if matches!(self.tree.kind(expr), NodeKind::Yield) {
            return Ok(expr);
        }
        let output = self.tree.push(NodeKind::Output { children: vec![] });
        self.tree.set_many(output, ChildField::Children, vec![expr]);
        Ok(output)
    }

    /// Concatenation level: `a ~ b ~ ...` folds into an expression sequence.
    fn parse_expression(&mut self) -> Result<NodeId, ExportError> {
        let first = self.parse_filtered()?;
        if !matches!(self.peek_kind(), Some(TokenKind::Tilde)) {
            return Ok(first);
        }
        let mut operands = vec![first];
        while self.eat(&TokenKind::Tilde) {
            operands.push(self.parse_filtered()?);
        }
        let expression = self.tree.push(NodeKind::Expression { children: vec![] });
        self.tree.set_many(expression, ChildField::Children, operands);
        Ok(expression)
    }

    /// Pipe level: `lhs | name(args)` folds left-associatively.
    fn parse_filtered(&mut self) -> Result<NodeId, ExportError> {
        let mut value = self.parse_primary()?;
        while self.eat(&TokenKind::Pipe) {
            let (name, _) = self.expect_symbol("a filter name")?;
            let arguments = if self.eat(&TokenKind::LeftParen) {
                self.parse_arguments()?
            } else {
                Vec::new()
            };
            let filter = self.tree.push(NodeKind::Filter {
                name,
                value: None,
                arguments: vec![],
            });
            self.tree.set_one(filter, ChildField::Value, Some(value));
            self.tree.set_many(filter, ChildField::Arguments, arguments);
            value = filter;
        }
        Ok(value)
    }

    fn parse_primary(&mut self) -> Result<NodeId, ExportError> {
        match self.peek_kind().cloned() {
            Some(TokenKind::Int(value)) => {
                self.pos += 1;
                Ok(self.tree.push(NodeKind::Literal {
                    value: Literal::Int(value),
                }))
            }
            Some(TokenKind::Str(value)) => {
                self.pos += 1;
                Ok(self.tree.push(NodeKind::Literal {
                    value: Literal::Str(value),
                }))
            }
            Some(TokenKind::Bool(value)) => {
                self.pos += 1;
                Ok(self.tree.push(NodeKind::Literal {
                    value: Literal::Bool(value),
                }))
            }
            Some(TokenKind::Symbol(_)) => self.parse_variable_or_call(),
            Some(TokenKind::LeftBracket) => self.parse_array(),
            Some(TokenKind::LeftParen) => {
                self.pos += 1;
                let inner = self.parse_expression()?;
                self.expect(&TokenKind::RightParen, "')'")?;
                let group = self.tree.push(NodeKind::Group { children: vec![] });
                self.tree.set_many(group, ChildField::Children, vec![inner]);
                Ok(group)
            }
            _ => Err(self.unexpected_token(
                "an expression",
                &self.describe_current(),
                to_source_span(self.current_span()),
            )),
        }
    }

    fn parse_array(&mut self) -> Result<NodeId, ExportError> {
        self.expect(&TokenKind::LeftBracket, "'['")?;
        let mut elements = Vec::new();
        if !self.eat(&TokenKind::RightBracket) {
            loop {
                elements.push(self.parse_expression()?);
                if self.eat(&TokenKind::Comma) {
                    continue;
                }
                self.expect(&TokenKind::RightBracket, "']'")?;
                break;
            }
        }
        let array = self.tree.push(NodeKind::Array { children: vec![] });
        self.tree.set_many(array, ChildField::Children, elements);
        Ok(array)
    }

    /// `symbol(.symbol)*` is a variable reference; trailing `(` reclassifies
    /// it as a call. `caller()` with no arguments is the yield placeholder.
    fn parse_variable_or_call(&mut self) -> Result<NodeId, ExportError> {
        let (first, _) = self.expect_symbol("a symbol")?;
        let mut path = vec![first];
        while self.eat(&TokenKind::Dot) {
            path.push(self.expect_symbol("a path segment")?.0);
        }

        if self.eat(&TokenKind::LeftParen) {
            let arguments = self.parse_arguments()?;
            let name = path.join(".");
            if name == "caller" && arguments.is_empty() {
                return Ok(self.tree.push(NodeKind::Yield));
            }
            let call = self.tree.push(NodeKind::FunctionCall {
                name,
                arguments: vec![],
            });
            self.tree.set_many(call, ChildField::Arguments, arguments);
            return Ok(call);
        }

        let mut node = self.tree.push(NodeKind::Variable { path });
        // Subscript access wraps the base reference and the index expression.
        while self.eat(&TokenKind::LeftBracket) {
            let index = self.parse_expression()?;
            self.expect(&TokenKind::RightBracket, "']'")?;
            let group = self.tree.push(NodeKind::Group { children: vec![] });
            self.tree.set_many(group, ChildField::Children, vec![node, index]);
            let complex = self.tree.push(NodeKind::ComplexVariable { value: None });
            self.tree.set_one(complex, ChildField::Value, Some(group));
            node = complex;
        }
        Ok(node)
    }

    /// Call arguments after `(`: `name=value` is named, anything else is
    /// positional. Returns the ordered `Argument` nodes.
    fn parse_arguments(&mut self) -> Result<Vec<NodeId>, ExportError> {
        let mut arguments = Vec::new();
        if self.eat(&TokenKind::RightParen) {
            return Ok(arguments);
        }
        loop {
            let name = if matches!(self.peek_kind(), Some(TokenKind::Symbol(_)))
                && matches!(self.peek_kind_at(1), Some(TokenKind::Equals))
            {
                let (argument_name, _) = self.expect_symbol("an argument name")?;
                self.expect(&TokenKind::Equals, "'='")?;
                Some(argument_name)
            } else {
                None
            };
            let value = self.parse_expression()?;
            let argument = self.tree.push(NodeKind::Argument { name, value: None });
            self.tree.set_one(argument, ChildField::Value, Some(value));
            arguments.push(argument);
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            self.expect(&TokenKind::RightParen, "')'")?;
            break;
        }
        Ok(arguments)
    }

    fn parse_literal(&mut self) -> Result<NodeId, ExportError> {
        let literal = match self.peek_kind() {
            Some(TokenKind::Int(value)) => Literal::Int(*value),
            Some(TokenKind::Str(value)) => Literal::Str(value.clone()),
            Some(TokenKind::Bool(value)) => Literal::Bool(*value),
            _ => {
                return Err(self.unexpected_token(
                    "a literal default value",
                    &self.describe_current(),
                    to_source_span(self.current_span()),
                ))
            }
        };
        self.pos += 1;
        Ok(self.tree.push(NodeKind::Literal { value: literal }))
    }

    // ------------------------------------------------------------------------
    // Conditions
    // ------------------------------------------------------------------------

    /// A bare operand (variable, filter application, literal) is returned
    /// unwrapped; `and`/`or`/`not` combinations build a condition sequence of
    /// operand and boolean-operand wrappers.
    fn parse_condition(&mut self) -> Result<NodeId, ExportError> {
        let mut parts: Vec<NodeId> = Vec::new();
        loop {
            while self.peek_symbol("not") {
                self.pos += 1;
                parts.push(self.boolean_operand("not"));
            }
            let operand = self.parse_condition_operand()?;
            let more = self.peek_symbol("and") || self.peek_symbol("or");
            if parts.is_empty() && !more {
                return Ok(operand);
            }
            let wrapped = self.tree.push(NodeKind::Operand { value: None });
            self.tree.set_one(wrapped, ChildField::Value, Some(operand));
            parts.push(wrapped);
            if more {
                let (operator, _) = self.expect_symbol("a boolean operator")?;
                parts.push(self.boolean_operand(&operator));
                continue;
            }
            break;
        }
        let condition = self.tree.push(NodeKind::Condition { children: vec![] });
        self.tree.set_many(condition, ChildField::Children, parts);
        Ok(condition)
    }

    fn parse_condition_operand(&mut self) -> Result<NodeId, ExportError> {
        if matches!(self.peek_kind(), Some(TokenKind::LeftParen)) {
            self.pos += 1;
            let inner = self.parse_condition()?;
            self.expect(&TokenKind::RightParen, "')'")?;
            let group = self.tree.push(NodeKind::Group { children: vec![] });
            self.tree.set_many(group, ChildField::Children, vec![inner]);
            return Ok(group);
        }
        self.parse_filtered()
    }

    fn boolean_operand(&mut self, operator: &str) -> NodeId {
        let text = self.tree.push(NodeKind::Text {
            value: operator.to_string(),
        });
        let operand = self.tree.push(NodeKind::BooleanOperand { value: None });
        self.tree.set_one(operand, ChildField::Value, Some(text));
        operand
    }
}
