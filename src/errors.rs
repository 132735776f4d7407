//! Stencil error handling - unified encapsulated API
//!
//! One error type covers the whole export path (lexing, parsing, transform
//! passes). Errors are created through context objects implementing
//! [`ErrorReporting`], never constructed field-by-field at call sites.

use miette::{Diagnostic, SourceSpan};
use miette::{LabeledSpan, NamedSource};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// SOURCE CONTEXT - Error reporting infrastructure
// ============================================================================

/// Source context for error reporting: the template name and its raw text.
///
/// Prefer [`SourceContext::from_template`]; the fallback exists for errors
/// raised outside any concrete template (catalog lookups, internal phases).
#[derive(Debug, Clone)]
pub struct SourceContext {
    pub name: String,
    pub content: String,
}

impl SourceContext {
    /// Create a source context from real template content.
    pub fn from_template(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Create a fallback when real source is unavailable.
    pub fn fallback(context: &str) -> Self {
        Self {
            name: "fallback".to_string(),
            content: format!("// {}", context),
        }
    }

    /// Convert to NamedSource for use with miette error reporting.
    pub fn to_named_source(&self) -> Arc<NamedSource<String>> {
        Arc::new(NamedSource::new(self.name.clone(), self.content.clone()))
    }
}

impl Default for SourceContext {
    fn default() -> Self {
        Self::fallback("default context")
    }
}

/// The single error type - no wrapper, no variants, just essential data.
#[derive(Debug)]
pub struct ExportError {
    /// What went wrong (type-specific data)
    pub kind: ErrorKind,
    /// Where it happened (context-specific source information)
    pub source_info: SourceInfo,
    /// How to help (auto-populated based on context)
    pub diagnostic_info: DiagnosticInfo,
}

/// All error types as a clean enum - no duplicate fields.
#[derive(Debug, Clone, PartialEq)]
pub enum ErrorKind {
    // Lex errors - character-level issues inside a template
    UnexpectedCharacter {
        found: String,
    },
    UnterminatedTag {
        delimiter: String,
    },
    UnterminatedString,
    InvalidLiteral {
        literal_type: String,
        value: String,
    },

    // Parse errors - structural and syntactic issues
    UnexpectedToken {
        expected: String,
        found: String,
    },
    UnexpectedEof {
        expected: String,
    },
    UnknownStatement {
        keyword: String,
    },

    // Transform errors - rewrite pipeline failures
    MalformedMacro {
        macro_name: String,
        reason: String,
    },
    MissingMacroSource {
        macro_name: String,
    },
    InlineDepthExceeded {
        macro_name: String,
    },
    GeneralTransform {
        message: String,
    },
}

/// Context-specific source information.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub source: Arc<NamedSource<String>>,
    pub primary_span: SourceSpan,
    pub phase: String,
}

/// Diagnostic enhancement data.
#[derive(Debug, Clone)]
pub struct DiagnosticInfo {
    pub help: Option<String>,
    pub error_code: String,
}

/// Context-aware error creation - each context knows how to create appropriate errors.
pub trait ErrorReporting {
    /// Create an error with context-appropriate enhancements.
    fn report(&self, kind: ErrorKind, span: SourceSpan) -> ExportError;

    /// Convenience methods for common error types.
    fn unexpected_token(&self, expected: &str, found: &str, span: SourceSpan) -> ExportError {
        self.report(
            ErrorKind::UnexpectedToken {
                expected: expected.into(),
                found: found.into(),
            },
            span,
        )
    }

    fn unexpected_eof(&self, expected: &str, span: SourceSpan) -> ExportError {
        self.report(
            ErrorKind::UnexpectedEof {
                expected: expected.into(),
            },
            span,
        )
    }

    fn invalid_literal(&self, literal_type: &str, value: &str, span: SourceSpan) -> ExportError {
        self.report(
            ErrorKind::InvalidLiteral {
                literal_type: literal_type.into(),
                value: value.into(),
            },
            span,
        )
    }

    fn malformed_macro(&self, macro_name: &str, reason: &str, span: SourceSpan) -> ExportError {
        self.report(
            ErrorKind::MalformedMacro {
                macro_name: macro_name.into(),
                reason: reason.into(),
            },
            span,
        )
    }
}

impl ErrorKind {
    /// Get the error category for test assertions.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::UnexpectedCharacter { .. }
            | Self::UnterminatedTag { .. }
            | Self::UnterminatedString
            | Self::InvalidLiteral { .. } => ErrorCategory::Lex,

            Self::UnexpectedToken { .. }
            | Self::UnexpectedEof { .. }
            | Self::UnknownStatement { .. } => ErrorCategory::Parse,

            Self::MalformedMacro { .. }
            | Self::MissingMacroSource { .. }
            | Self::InlineDepthExceeded { .. }
            | Self::GeneralTransform { .. } => ErrorCategory::Transform,
        }
    }

    /// Get error code suffix for diagnostic codes.
    pub const fn code_suffix(&self) -> &'static str {
        match self {
            Self::UnexpectedCharacter { .. } => "unexpected_character",
            Self::UnterminatedTag { .. } => "unterminated_tag",
            Self::UnterminatedString => "unterminated_string",
            Self::InvalidLiteral { .. } => "invalid_literal",
            Self::UnexpectedToken { .. } => "unexpected_token",
            Self::UnexpectedEof { .. } => "unexpected_eof",
            Self::UnknownStatement { .. } => "unknown_statement",
            Self::MalformedMacro { .. } => "malformed_macro",
            Self::MissingMacroSource { .. } => "missing_macro_source",
            Self::InlineDepthExceeded { .. } => "inline_depth_exceeded",
            Self::GeneralTransform { .. } => "general_transform",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Lex,
    Parse,
    Transform,
}

impl std::error::Error for ExportError {}

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::UnexpectedCharacter { found } => {
                write!(f, "Lex error: unexpected character {}", found)
            }
            ErrorKind::UnterminatedTag { delimiter } => {
                write!(f, "Lex error: tag is missing closing '{}'", delimiter)
            }
            ErrorKind::UnterminatedString => {
                write!(f, "Lex error: unterminated string literal")
            }
            ErrorKind::InvalidLiteral {
                literal_type,
                value,
            } => {
                write!(f, "Lex error: invalid {} literal '{}'", literal_type, value)
            }
            ErrorKind::UnexpectedToken { expected, found } => {
                write!(f, "Parse error: expected {}, found {}", expected, found)
            }
            ErrorKind::UnexpectedEof { expected } => {
                write!(
                    f,
                    "Parse error: unexpected end of template, expected {}",
                    expected
                )
            }
            ErrorKind::UnknownStatement { keyword } => {
                write!(f, "Parse error: unknown statement '{}'", keyword)
            }
            ErrorKind::MalformedMacro { macro_name, reason } => {
                write!(
                    f,
                    "Transform error: malformed macro '{}': {}",
                    macro_name, reason
                )
            }
            ErrorKind::MissingMacroSource { macro_name } => {
                write!(
                    f,
                    "Transform error: no source registered for macro '{}'",
                    macro_name
                )
            }
            ErrorKind::InlineDepthExceeded { macro_name } => {
                write!(
                    f,
                    "Transform error: inline recursion limit exceeded while expanding '{}'",
                    macro_name
                )
            }
            ErrorKind::GeneralTransform { message } => {
                write!(f, "Transform error: {}", message)
            }
        }
    }
}

impl Diagnostic for ExportError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(&self.diagnostic_info.error_code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        self.diagnostic_info
            .help
            .as_ref()
            .map(|h| Box::new(h) as Box<dyn fmt::Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = miette::LabeledSpan> + '_>> {
        let labels = vec![LabeledSpan::new_with_span(
            Some(self.primary_label()),
            self.source_info.primary_span,
        )];
        Some(Box::new(labels.into_iter()))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&*self.source_info.source)
    }
}

impl ExportError {
    fn primary_label(&self) -> String {
        match &self.kind {
            ErrorKind::UnexpectedCharacter { .. } => "unexpected character".into(),
            ErrorKind::UnterminatedTag { .. } => "tag opened here".into(),
            ErrorKind::UnterminatedString => "string opened here".into(),
            ErrorKind::InvalidLiteral { .. } => "invalid literal".into(),
            ErrorKind::UnexpectedToken { .. } => "unexpected token".into(),
            ErrorKind::UnexpectedEof { .. } => "template ends here".into(),
            ErrorKind::UnknownStatement { .. } => "unknown statement".into(),
            ErrorKind::MalformedMacro { .. } => "malformed macro".into(),
            ErrorKind::MissingMacroSource { .. } => "unresolvable macro".into(),
            ErrorKind::InlineDepthExceeded { .. } => "recursion limit hit".into(),
            ErrorKind::GeneralTransform { .. } => "transform failed".into(),
        }
    }
}

/// Creates a placeholder span for errors not tied to a specific source code
/// location, such as catalog lookups or internal pipeline state failures.
pub fn unspanned() -> miette::SourceSpan {
    miette::SourceSpan::from(0..0)
}

/// Converts a lexer/parser span to a miette SourceSpan.
pub fn to_source_span(span: crate::syntax::Span) -> miette::SourceSpan {
    miette::SourceSpan::from(span.start..span.end)
}

/// General-purpose error creation context used by the transform passes,
/// which operate on trees rather than raw source text.
pub struct ReportContext {
    pub source: SourceContext,
    pub phase: String,
}

impl ReportContext {
    pub fn new(source: SourceContext, phase: impl Into<String>) -> Self {
        Self {
            source,
            phase: phase.into(),
        }
    }

    /// Context for a named pass with no concrete template source at hand.
    pub fn for_pass(pass: &str) -> Self {
        Self::new(SourceContext::fallback(pass), pass.to_string())
    }
}

impl ErrorReporting for ReportContext {
    fn report(&self, kind: ErrorKind, span: miette::SourceSpan) -> ExportError {
        let error_code = format!("stencil::{}::{}", self.phase, kind.code_suffix());

        ExportError {
            kind,
            source_info: SourceInfo {
                source: self.source.to_named_source(),
                primary_span: span,
                phase: self.phase.clone(),
            },
            diagnostic_info: DiagnosticInfo {
                help: None,
                error_code,
            },
        }
    }
}

/// Prints an ExportError with full miette diagnostics.
///
/// Use this for user-facing error display in embedding hosts.
pub fn print_error(error: ExportError) {
    use miette::Report;
    let report = Report::new(error);
    eprintln!("{report:?}");
}
