//! Faults captured as data inside compilation results.
//!
//! Compile-time diagnostics and runtime failures never cross the loader
//! boundary as `Err` — they travel inside the result union so the rendering
//! layer can substitute an inline panel for the failing subtree while the
//! rest of the page renders normally.

use owo_colors::OwoColorize;
use std::fmt;

use crate::diag::Diagnostic;

// ============================================================================
// RuntimeFault
// ============================================================================

/// Failure during artifact execution, including propagation from a failed
/// nested `resolve()`.
#[derive(Debug, Clone)]
pub struct RuntimeFault {
    message: String,
    /// Require stack at the point of failure, outermost first.
    stack: Vec<String>,
}

impl RuntimeFault {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            stack: Vec::new(),
        }
    }

    pub fn with_stack(mut self, stack: Vec<String>) -> Self {
        self.stack = stack;
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn stack(&self) -> &[String] {
        &self.stack
    }
}

impl fmt::Display for RuntimeFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if !self.stack.is_empty() {
            write!(f, " (via {})", self.stack.join(" -> "))?;
        }
        Ok(())
    }
}

impl std::error::Error for RuntimeFault {}

// ============================================================================
// ModuleFault
// ============================================================================

/// Either kind of captured failure, so callers handle them uniformly.
#[derive(Debug, Clone)]
pub enum ModuleFault {
    /// Backend rejected the source text.
    Compile(Diagnostic),
    /// Artifact execution failed.
    Runtime(RuntimeFault),
}

impl ModuleFault {
    pub fn diagnostic(&self) -> Option<&Diagnostic> {
        match self {
            Self::Compile(diag) => Some(diag),
            Self::Runtime(_) => None,
        }
    }

    pub fn runtime(&self) -> Option<&RuntimeFault> {
        match self {
            Self::Compile(_) => None,
            Self::Runtime(fault) => Some(fault),
        }
    }

    /// Inline error panel text: title, message, erroring fragment. Consumed
    /// by the rendering layer in place of the failing subtree.
    pub fn panel(&self, title: Option<&str>) -> String {
        let headline = match title {
            Some(title) => format!("{} {}: {self}", "✗".red(), title.bold()),
            None => format!("{} {self}", "✗".red()),
        };
        let fragment = match self {
            Self::Compile(diag) => diag.fragment.as_deref(),
            Self::Runtime(_) => None,
        };
        match fragment {
            Some(fragment) => {
                let mut panel = headline;
                for line in fragment.lines() {
                    panel.push_str(&format!("\n  {} {line}", "|".dimmed()));
                }
                panel
            }
            None => headline,
        }
    }
}

impl fmt::Display for ModuleFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Compile(diag) => write!(f, "{}", diag.message),
            Self::Runtime(fault) => write!(f, "{fault}"),
        }
    }
}

impl std::error::Error for ModuleFault {}

impl From<Diagnostic> for ModuleFault {
    fn from(diag: Diagnostic) -> Self {
        Self::Compile(diag)
    }
}

impl From<RuntimeFault> for ModuleFault {
    fn from(fault: RuntimeFault) -> Self {
        Self::Runtime(fault)
    }
}

// ============================================================================
// Tests
// ============================================================================
