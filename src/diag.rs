//! Structured diagnostics produced by the compilation backend.
//!
//! A diagnostic carries a message, a source span (line/column/offset range),
//! a severity, and optionally the offending source fragment sliced out by
//! the span. Diagnostics serialize to JSON so tooling outside the crate can
//! consume them.

use owo_colors::OwoColorize;
use serde::Serialize;
use std::fmt;

// ============================================================================
// Severity
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warning => "warning",
        }
    }
}

// ============================================================================
// Source positions
// ============================================================================

/// A point in the source text. `line` and `column` are 1-based for display;
/// `offset` is the byte offset used for slicing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SourcePos {
    pub line: u32,
    pub column: u32,
    pub offset: usize,
}

impl SourcePos {
    pub fn new(line: u32, column: u32, offset: usize) -> Self {
        Self {
            line,
            column,
            offset,
        }
    }
}

/// Half-open byte range in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SourceSpan {
    pub start: SourcePos,
    pub end: SourcePos,
}

impl SourceSpan {
    pub fn new(start: SourcePos, end: SourcePos) -> Self {
        Self { start, end }
    }

    pub fn is_empty(&self) -> bool {
        self.end.offset <= self.start.offset
    }

    /// Slice the spanned text out of `source`. Offsets are clamped to the
    /// source length and snapped back to char boundaries.
    pub fn slice<'a>(&self, source: &'a str) -> Option<&'a str> {
        if self.is_empty() {
            return None;
        }
        let start = clamp_boundary(source, self.start.offset);
        let end = clamp_boundary(source, self.end.offset);
        if end <= start {
            return None;
        }
        source.get(start..end)
    }
}

fn clamp_boundary(s: &str, offset: usize) -> usize {
    let mut i = offset.min(s.len());
    while i > 0 && !s.is_char_boundary(i) {
        i -= 1;
    }
    i
}

// ============================================================================
// Diagnostic
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub message: String,
    pub span: SourceSpan,
    pub severity: Severity,
    /// Offending source text sliced by `span`, when the source was at hand.
    pub fragment: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            span: SourceSpan::default(),
            severity: Severity::Error,
            fragment: None,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(message)
        }
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = span;
        self
    }

    /// Fill in `fragment` by slicing `source` with the diagnostic's span.
    /// Leaves an existing fragment untouched.
    pub fn with_fragment_from(mut self, source: &str) -> Self {
        if self.fragment.is_none() {
            self.fragment = self.span.slice(source).map(str::to_string);
        }
        self
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            Severity::Error => self.severity.as_str().red().bold().to_string(),
            Severity::Warning => self.severity.as_str().yellow().bold().to_string(),
        };
        write!(f, "{tag}: {}", self.message)?;
        if !self.span.is_empty() || self.span.start.line > 0 {
            write!(
                f,
                "\n  {} {}:{}",
                "-->".dimmed(),
                self.span.start.line,
                self.span.start.column
            )?;
        }
        if let Some(fragment) = &self.fragment {
            for line in fragment.lines() {
                write!(f, "\n  {} {line}", "|".dimmed())?;
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
