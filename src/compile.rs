//! Compilation backend adapter and compilation results.
//!
//! The concrete compiler is a black box behind [`CompileBackend`]: it turns
//! source text into an executable [`CompiledArtifact`] whose import
//! statements have been rewritten into calls against an injected
//! [`Resolver`]. The loader never inspects source text itself.

use futures_util::future::LocalBoxFuture;
use rustc_hash::FxHashSet;
use std::fmt;
use std::rc::Rc;

use crate::diag::Diagnostic;
use crate::fault::ModuleFault;
use crate::loader::Resolver;
use crate::module::{Exports, Title};
use crate::value::{Value, ValueMap};

/// Ambient bindings handed to every artifact invocation: the shared-context
/// bag of the load that compiled it.
pub type AmbientBindings = ValueMap;

/// Signature every backend-generated artifact runs with: ambient bindings,
/// the dependency resolver, then the shared-context values in sorted key
/// order.
pub type ArtifactFn = Rc<
    dyn Fn(
        AmbientBindings,
        Resolver,
        Vec<Value>,
    ) -> LocalBoxFuture<'static, Result<Exports, crate::fault::RuntimeFault>>,
>;

/// Deterministic artifact signature for a (name, sorted context keys) pair.
/// Backends that have no scheme of their own can use this one; identical
/// inputs must yield identical signatures.
pub fn artifact_signature(name: &str, context_keys: &[String]) -> String {
    format!("{name}({})", context_keys.join(", "))
}

// =============================================================================
// CompiledArtifact
// =============================================================================

/// Executable unit produced by the backend from one source text.
#[derive(Clone)]
pub struct CompiledArtifact {
    signature: String,
    run: ArtifactFn,
}

impl CompiledArtifact {
    pub fn new(
        signature: impl Into<String>,
        run: impl Fn(
            AmbientBindings,
            Resolver,
            Vec<Value>,
        ) -> LocalBoxFuture<'static, Result<Exports, crate::fault::RuntimeFault>>
        + 'static,
    ) -> Self {
        Self {
            signature: signature.into(),
            run: Rc::new(run),
        }
    }

    pub fn signature(&self) -> &str {
        &self.signature
    }

    pub fn call(
        &self,
        ambient: AmbientBindings,
        resolver: Resolver,
        context_values: Vec<Value>,
    ) -> LocalBoxFuture<'static, Result<Exports, crate::fault::RuntimeFault>> {
        (self.run)(ambient, resolver, context_values)
    }
}

impl fmt::Debug for CompiledArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledArtifact")
            .field("signature", &self.signature)
            .finish()
    }
}

// =============================================================================
// CompileBackend
// =============================================================================

/// Successful backend output: the artifact plus non-fatal warnings.
#[derive(Debug, Clone)]
pub struct CompiledOutput {
    pub artifact: CompiledArtifact,
    pub warnings: Vec<Diagnostic>,
}

pub trait CompileBackend {
    /// Compile `source` into an executable artifact. `context_keys` always
    /// arrive sorted, so generated signatures are deterministic regardless
    /// of context insertion order.
    fn compile<'a>(
        &'a self,
        name: &'a str,
        source: &'a str,
        context_keys: &'a [String],
    ) -> LocalBoxFuture<'a, Result<CompiledOutput, Diagnostic>>;
}

// =============================================================================
// CompilationResult
// =============================================================================

/// Outcome of one load, captured as data. Immutable once produced per
/// (title, source text) pair. Faults never cross the loader boundary as
/// `Err`: the rendering layer displays them without aborting the tree.
#[derive(Debug)]
pub enum CompilationResult {
    Success {
        /// `None` for pre-registered exports that never went through the
        /// backend.
        artifact: Option<CompiledArtifact>,
        warnings: Vec<Diagnostic>,
        /// Titles whose `resolve()` was called during execution.
        dependencies: FxHashSet<Title>,
        exports: Exports,
    },
    Failure {
        fault: ModuleFault,
        title: Option<Title>,
    },
}

impl CompilationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure { .. })
    }

    pub fn exports(&self) -> Option<&Exports> {
        match self {
            Self::Success { exports, .. } => Some(exports),
            Self::Failure { .. } => None,
        }
    }

    pub fn fault(&self) -> Option<&ModuleFault> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { fault, .. } => Some(fault),
        }
    }

    pub fn dependencies(&self) -> Option<&FxHashSet<Title>> {
        match self {
            Self::Success { dependencies, .. } => Some(dependencies),
            Self::Failure { .. } => None,
        }
    }

    pub fn warnings(&self) -> &[Diagnostic] {
        match self {
            Self::Success { warnings, .. } => warnings,
            Self::Failure { .. } => &[],
        }
    }

    /// Inline error panel for a failed result, ready for the renderer.
    pub fn panel(&self) -> Option<String> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { fault, title } => {
                Some(fault.panel(title.as_ref().map(Title::as_str)))
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fault::RuntimeFault;

    #[test]
    fn test_signature_deterministic() {
        let keys = vec!["a".to_string(), "b".to_string()];
        assert_eq!(
            artifact_signature("page", &keys),
            artifact_signature("page", &keys)
        );
        assert_ne!(
            artifact_signature("page", &keys),
            artifact_signature("page", &[])
        );
    }

    #[test]
    fn test_failure_accessors() {
        let result = CompilationResult::Failure {
            fault: ModuleFault::Runtime(RuntimeFault::new("boom")),
            title: Some(Title::from("page")),
        };
        assert!(result.is_failure());
        assert!(result.exports().is_none());
        assert!(result.dependencies().is_none());
        assert!(result.warnings().is_empty());
        let panel = result.panel().unwrap();
        assert!(panel.contains("page"));
        assert!(panel.contains("boom"));
    }

    #[test]
    fn test_success_accessors() {
        let result = CompilationResult::Success {
            artifact: None,
            warnings: vec![Diagnostic::warning("unused binding")],
            dependencies: FxHashSet::default(),
            exports: Exports::default(),
        };
        assert!(result.is_success());
        assert!(result.fault().is_none());
        assert!(result.panel().is_none());
        assert_eq!(result.warnings().len(), 1);
    }
}
