//! Hand-written template lexer
//!
//! Splits raw template text into the token stream the parser consumes: raw
//! text data, comments, tag delimiters, symbols, literals, and punctuation.
//! Spans are byte offsets into the original source; miette renders line and
//! column information from them at report time.

use crate::errors::{to_source_span, ErrorKind, ErrorReporting, ExportError, SourceContext};
use crate::syntax::Span;

const VARIABLE_START: &str = "{{";
const VARIABLE_END: &str = "}}";
const BLOCK_START: &str = "{%";
const BLOCK_END: &str = "%}";
const COMMENT_START: &str = "{#";
const COMMENT_END: &str = "#}";

/// One lexed token.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Raw text between tags.
    Data(String),
    /// `{# ... #}` comment body.
    Comment(String),
    VariableStart,
    VariableEnd,
    BlockStart,
    BlockEnd,
    Symbol(String),
    Int(i64),
    Str(String),
    Bool(bool),
    LeftParen,
    RightParen,
    LeftBracket,
    RightBracket,
    Comma,
    Dot,
    Pipe,
    Equals,
    Tilde,
}

impl TokenKind {
    /// Short human description used in "expected X, found Y" diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Self::Data(_) => "raw text".to_string(),
            Self::Comment(_) => "a comment".to_string(),
            Self::VariableStart => "'{{'".to_string(),
            Self::VariableEnd => "'}}'".to_string(),
            Self::BlockStart => "'{%'".to_string(),
            Self::BlockEnd => "'%}'".to_string(),
            Self::Symbol(s) => format!("'{}'", s),
            Self::Int(i) => format!("'{}'", i),
            Self::Str(s) => format!("'\"{}\"'", s),
            Self::Bool(b) => format!("'{}'", b),
            Self::LeftParen => "'('".to_string(),
            Self::RightParen => "')'".to_string(),
            Self::LeftBracket => "'['".to_string(),
            Self::RightBracket => "']'".to_string(),
            Self::Comma => "','".to_string(),
            Self::Dot => "'.'".to_string(),
            Self::Pipe => "'|'".to_string(),
            Self::Equals => "'='".to_string(),
            Self::Tilde => "'~'".to_string(),
        }
    }
}

#[derive(Clone, Copy, PartialEq)]
enum TagMode {
    Variable,
    Block,
}

/// Cursor-based scanner over one template source.
pub struct Lexer<'a> {
    input: &'a str,
    pos: usize,
    source: SourceContext,
}

impl ErrorReporting for Lexer<'_> {
    fn report(&self, kind: ErrorKind, span: miette::SourceSpan) -> ExportError {
        let context = crate::errors::ReportContext::new(self.source.clone(), "lex");
        context.report(kind, span)
    }
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str, source: SourceContext) -> Self {
        Self {
            input,
            pos: 0,
            source,
        }
    }

    /// Lexes the whole input, failing fast on the first malformed fragment.
    pub fn tokenize(mut self) -> Result<Vec<Token>, ExportError> {
        let mut tokens = Vec::new();
        while !self.eof() {
            if self.peek_str(COMMENT_START) {
                tokens.push(self.lex_comment()?);
            } else if self.peek_str(VARIABLE_START) {
                self.lex_tag(&mut tokens, TagMode::Variable)?;
            } else if self.peek_str(BLOCK_START) {
                self.lex_tag(&mut tokens, TagMode::Block)?;
            } else {
                tokens.push(self.lex_data());
            }
        }
        Ok(tokens)
    }

    // ------------------------------------------------------------------------
    // Cursor helpers
    // ------------------------------------------------------------------------

    fn eof(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek_str(&self, s: &str) -> bool {
        self.rest().starts_with(s)
    }

    fn current_char(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn consume(&mut self, s: &str) -> bool {
        if self.peek_str(s) {
            self.pos += s.len();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.current_char() {
            if c.is_whitespace() {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
    }

    fn span_from(&self, start: usize) -> Span {
        Span::new(start, self.pos)
    }

    // ------------------------------------------------------------------------
    // Data and comments
    // ------------------------------------------------------------------------

    fn lex_data(&mut self) -> Token {
        let start = self.pos;
        while let Some(c) = self.current_char() {
            if self.peek_str(VARIABLE_START)
                || self.peek_str(BLOCK_START)
                || self.peek_str(COMMENT_START)
            {
                break;
            }
            self.pos += c.len_utf8();
        }
        Token {
            kind: TokenKind::Data(self.input[start..self.pos].to_string()),
            span: self.span_from(start),
        }
    }

    fn lex_comment(&mut self) -> Result<Token, ExportError> {
        let start = self.pos;
        self.consume(COMMENT_START);
        let body_start = self.pos;
        while let Some(c) = self.current_char() {
            if self.peek_str(COMMENT_END) {
                break;
            }
            self.pos += c.len_utf8();
        }
        if !self.consume(COMMENT_END) {
            return Err(self.report(
                ErrorKind::UnterminatedTag {
                    delimiter: COMMENT_END.to_string(),
                },
                to_source_span(Span::new(start, start + COMMENT_START.len())),
            ));
        }
        let body = self.input[body_start..self.pos - COMMENT_END.len()].to_string();
        Ok(Token {
            kind: TokenKind::Comment(body),
            span: self.span_from(start),
        })
    }

    // ------------------------------------------------------------------------
    // Tag interiors
    // ------------------------------------------------------------------------

    fn lex_tag(&mut self, tokens: &mut Vec<Token>, mode: TagMode) -> Result<(), ExportError> {
        let open_start = self.pos;
        let (open, close, start_kind, end_kind) = match mode {
            TagMode::Variable => (
                VARIABLE_START,
                VARIABLE_END,
                TokenKind::VariableStart,
                TokenKind::VariableEnd,
            ),
            TagMode::Block => (
                BLOCK_START,
                BLOCK_END,
                TokenKind::BlockStart,
                TokenKind::BlockEnd,
            ),
        };
        self.consume(open);
        tokens.push(Token {
            kind: start_kind,
            span: self.span_from(open_start),
        });

        loop {
            self.skip_whitespace();
            if self.eof() {
                return Err(self.report(
                    ErrorKind::UnterminatedTag {
                        delimiter: close.to_string(),
                    },
                    to_source_span(Span::new(open_start, open_start + open.len())),
                ));
            }
            let close_start = self.pos;
            if self.consume(close) {
                tokens.push(Token {
                    kind: end_kind,
                    span: self.span_from(close_start),
                });
                return Ok(());
            }
            tokens.push(self.lex_tag_token()?);
        }
    }

    fn lex_tag_token(&mut self) -> Result<Token, ExportError> {
        let start = self.pos;
        let c = match self.current_char() {
            Some(c) => c,
            None => {
                return Err(self.report(
                    ErrorKind::UnexpectedEof {
                        expected: "a token".to_string(),
                    },
                    to_source_span(Span::new(start, start)),
                ))
            }
        };

        let punct = match c {
            '(' => Some(TokenKind::LeftParen),
            ')' => Some(TokenKind::RightParen),
            '[' => Some(TokenKind::LeftBracket),
            ']' => Some(TokenKind::RightBracket),
            ',' => Some(TokenKind::Comma),
            '.' => Some(TokenKind::Dot),
            '|' => Some(TokenKind::Pipe),
            '=' => Some(TokenKind::Equals),
            '~' => Some(TokenKind::Tilde),
            _ => None,
        };
        if let Some(kind) = punct {
            self.pos += 1;
            return Ok(Token {
                kind,
                span: self.span_from(start),
            });
        }

        if c == '"' || c == '\'' {
            return self.lex_string(c);
        }
        if c.is_ascii_digit() || (c == '-' && self.peek_digit_after_minus()) {
            return self.lex_int();
        }
        if c.is_ascii_alphabetic() || c == '_' {
            return Ok(self.lex_symbol());
        }

        Err(self.report(
            ErrorKind::UnexpectedCharacter {
                found: format!("'{}'", c),
            },
            to_source_span(Span::new(start, start + c.len_utf8())),
        ))
    }

    fn peek_digit_after_minus(&self) -> bool {
        self.rest()
            .chars()
            .nth(1)
            .is_some_and(|c| c.is_ascii_digit())
    }

    fn lex_string(&mut self, quote: char) -> Result<Token, ExportError> {
        let start = self.pos;
        self.pos += 1;
        let mut value = String::new();
        loop {
            let Some(c) = self.current_char() else {
                return Err(self.report(
                    ErrorKind::UnterminatedString,
                    to_source_span(Span::new(start, start + 1)),
                ));
            };
            self.pos += c.len_utf8();
            if c == quote {
                break;
            }
            if c == '\\' {
                let Some(escaped) = self.current_char() else {
                    return Err(self.report(
                        ErrorKind::UnterminatedString,
                        to_source_span(Span::new(start, start + 1)),
                    ));
                };
                self.pos += escaped.len_utf8();
                value.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    other => other,
                });
                continue;
            }
            value.push(c);
        }
        Ok(Token {
            kind: TokenKind::Str(value),
            span: self.span_from(start),
        })
    }

    fn lex_int(&mut self) -> Result<Token, ExportError> {
        let start = self.pos;
        if self.peek_str("-") {
            self.pos += 1;
        }
        while self.current_char().is_some_and(|c| c.is_ascii_digit()) {
            self.pos += 1;
        }
        let text = &self.input[start..self.pos];
        let value = text.parse::<i64>().map_err(|_| {
            self.invalid_literal("int", text, to_source_span(self.span_from(start)))
        })?;
        Ok(Token {
            kind: TokenKind::Int(value),
            span: self.span_from(start),
        })
    }

    fn lex_symbol(&mut self) -> Token {
        let start = self.pos;
        while self
            .current_char()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.pos += 1;
        }
        let text = &self.input[start..self.pos];
        let kind = match text {
            "true" => TokenKind::Bool(true),
            "false" => TokenKind::Bool(false),
            _ => TokenKind::Symbol(text.to_string()),
        };
        Token {
            kind,
            span: self.span_from(start),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(input: &str) -> Vec<TokenKind> {
        let source = SourceContext::from_template("test", input);
        Lexer::new(input, source)
            .tokenize()
            .expect("input should lex")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn lex_err(input: &str) -> ErrorKind {
        let source = SourceContext::from_template("test", input);
        Lexer::new(input, source)
            .tokenize()
            .expect_err("input should fail to lex")
            .kind
    }

    #[test]
    fn data_and_variable() {
        assert_eq!(
            lex("Hello {{ name }}!"),
            vec![
                TokenKind::Data("Hello ".to_string()),
                TokenKind::VariableStart,
                TokenKind::Symbol("name".to_string()),
                TokenKind::VariableEnd,
                TokenKind::Data("!".to_string()),
            ]
        );
    }

    #[test]
    fn block_with_punctuation_and_literals() {
        assert_eq!(
            lex("{% macro m(a, b=2, c='x', d=true) %}"),
            vec![
                TokenKind::BlockStart,
                TokenKind::Symbol("macro".to_string()),
                TokenKind::Symbol("m".to_string()),
                TokenKind::LeftParen,
                TokenKind::Symbol("a".to_string()),
                TokenKind::Comma,
                TokenKind::Symbol("b".to_string()),
                TokenKind::Equals,
                TokenKind::Int(2),
                TokenKind::Comma,
                TokenKind::Symbol("c".to_string()),
                TokenKind::Equals,
                TokenKind::Str("x".to_string()),
                TokenKind::Comma,
                TokenKind::Symbol("d".to_string()),
                TokenKind::Equals,
                TokenKind::Bool(true),
                TokenKind::RightParen,
                TokenKind::BlockEnd,
            ]
        );
    }

    #[test]
    fn dotted_path_and_pipe() {
        assert_eq!(
            lex("{{ model.text | trim }}"),
            vec![
                TokenKind::VariableStart,
                TokenKind::Symbol("model".to_string()),
                TokenKind::Dot,
                TokenKind::Symbol("text".to_string()),
                TokenKind::Pipe,
                TokenKind::Symbol("trim".to_string()),
                TokenKind::VariableEnd,
            ]
        );
    }

    #[test]
    fn comment_is_one_token() {
        assert_eq!(
            lex("a{# note #}b"),
            vec![
                TokenKind::Data("a".to_string()),
                TokenKind::Comment(" note ".to_string()),
                TokenKind::Data("b".to_string()),
            ]
        );
    }

    #[test]
    fn negative_int_and_escaped_string() {
        assert_eq!(
            lex("{{ f(-3, \"a\\\"b\") }}"),
            vec![
                TokenKind::VariableStart,
                TokenKind::Symbol("f".to_string()),
                TokenKind::LeftParen,
                TokenKind::Int(-3),
                TokenKind::Comma,
                TokenKind::Str("a\"b".to_string()),
                TokenKind::RightParen,
                TokenKind::VariableEnd,
            ]
        );
    }

    #[test]
    fn unterminated_variable_tag_fails() {
        assert!(matches!(
            lex_err("{{ name"),
            ErrorKind::UnterminatedTag { delimiter } if delimiter == "}}"
        ));
    }

    #[test]
    fn unterminated_string_fails() {
        assert!(matches!(lex_err("{{ 'abc }}"), ErrorKind::UnterminatedString));
    }

    #[test]
    fn stray_character_fails() {
        assert!(matches!(
            lex_err("{% if a ? %}"),
            ErrorKind::UnexpectedCharacter { .. }
        ));
    }
}
