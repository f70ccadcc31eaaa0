//! Incremental module loader: turns document text into a running module
//! exactly once per cache generation.
//!
//! # Pipeline
//!
//! ```text
//! load_module(title)
//! ├── registry has cached exports?  → return them (memoization)
//! ├── fetch text (store, or stored definition)
//! ├── backend.compile(name, text, sorted context keys)
//! ├── artifact(ambient, resolver, context values)
//! │     └── resolve(name) → recursive load_module, dependency recorded
//! ├── registry.define + record_execution (finished dependency set)
//! └── CompilationResult (faults captured as data, never Err)
//! ```
//!
//! Dependencies are discovered by running the artifact: the backend
//! rewrites import statements into `resolve()` calls, so import targets
//! need not be statically known. A module's exports become visible in the
//! registry only once every resolution made during its execution has
//! completed — recorded requires edges are never a partial snapshot.

mod context;
mod resolve;

pub use context::{DependencyObserver, LoadContext};
pub use resolve::Resolver;

use rustc_hash::{FxHashMap, FxHashSet};
use std::cell::RefCell;
use std::rc::Rc;

use crate::compile::{CompilationResult, CompileBackend, CompiledArtifact};
use crate::diag::Diagnostic;
use crate::error::Error;
use crate::fault::{ModuleFault, RuntimeFault};
use crate::module::{Exports, ModuleDefinition, ModuleKind, Title};
use crate::registry::{Execution, ModuleRegistry};
use crate::store::DocumentStore;
use crate::value::ValueMap;

// =============================================================================
// LoadRequest
// =============================================================================

/// What to load: a titled document, a literal inline source, or a titled
/// source override. A request naming neither is a wiring bug and fails
/// with [`Error::EmptyRequest`].
#[derive(Debug, Clone, Default)]
pub struct LoadRequest {
    title: Option<Title>,
    source: Option<String>,
}

impl LoadRequest {
    /// Load the named document; results are registered and memoized.
    pub fn by_title(title: impl Into<Title>) -> Self {
        Self {
            title: Some(title.into()),
            source: None,
        }
    }

    /// Compile literal source without registering a durable module — used
    /// for content generated inline inside a parent document.
    pub fn literal(source: impl Into<String>) -> Self {
        Self {
            title: None,
            source: Some(source.into()),
        }
    }

    /// Register `source` under `title`, bypassing the store fetch.
    pub fn titled_source(title: impl Into<Title>, source: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            source: Some(source.into()),
        }
    }

    pub fn title(&self) -> Option<&Title> {
        self.title.as_ref()
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }
}

// =============================================================================
// ModuleLoader
// =============================================================================

/// Compile memo entry: unchanged text keeps the previous artifact.
struct CompiledSource {
    hash: blake3::Hash,
    artifact: CompiledArtifact,
    warnings: Vec<Diagnostic>,
}

pub struct ModuleLoader {
    registry: Rc<ModuleRegistry>,
    store: Rc<dyn DocumentStore>,
    backend: Rc<dyn CompileBackend>,
    /// Last compilation result per title, for `compilation_result`.
    results: RefCell<FxHashMap<Title, Rc<CompilationResult>>>,
    /// Content-hash memo: the backend is skipped when a refetched text
    /// hashes identically; the artifact is still re-executed.
    compiled: RefCell<FxHashMap<Title, CompiledSource>>,
    /// Shared-context seed for loads started without a parent context.
    base_context: ValueMap,
    detect_cycles: bool,
}

impl ModuleLoader {
    pub fn new(
        registry: Rc<ModuleRegistry>,
        store: Rc<dyn DocumentStore>,
        backend: Rc<dyn CompileBackend>,
    ) -> Self {
        Self {
            registry,
            store,
            backend,
            results: RefCell::default(),
            compiled: RefCell::default(),
            base_context: ValueMap::new(),
            detect_cycles: true,
        }
    }

    /// Seed the shared context of top-level loads.
    pub fn with_base_context(mut self, context: ValueMap) -> Self {
        self.base_context = context;
        self
    }

    pub fn with_cycle_detection(mut self, detect: bool) -> Self {
        self.detect_cycles = detect;
        self
    }

    pub fn registry(&self) -> &Rc<ModuleRegistry> {
        &self.registry
    }

    /// Load a module. Compile-time and runtime faults come back as data
    /// inside the result; only wiring bugs (unknown title, empty request)
    /// are `Err`. The `Rc<Self>` receiver keeps recursive resolution
    /// possible: the resolver handed to artifacts owns a loader handle.
    pub async fn load_module(
        self: Rc<Self>,
        request: LoadRequest,
        parent: Option<&LoadContext>,
    ) -> Result<Rc<CompilationResult>, Error> {
        match (request.title, request.source) {
            (None, None) => Err(Error::EmptyRequest),
            (Some(title), source) => self.load_titled(title, source, parent).await,
            (None, Some(source)) => self.load_literal(source, parent).await,
        }
    }

    /// Result of the last title-based load, failed or not.
    pub fn compilation_result(&self, title: &str) -> Option<Rc<CompilationResult>> {
        self.results.borrow().get(title).cloned()
    }

    /// Dependency set of the last successful compile of `title`: exactly
    /// the titles whose `resolve()` was called, possibly empty.
    pub fn dependencies_of(&self, title: &str) -> FxHashSet<Title> {
        self.results
            .borrow()
            .get(title)
            .and_then(|result| result.dependencies().cloned())
            .unwrap_or_default()
    }

    // -------------------------------------------------------------------------
    // Pipeline
    // -------------------------------------------------------------------------

    async fn load_titled(
        self: Rc<Self>,
        title: Title,
        source_override: Option<String>,
        parent: Option<&LoadContext>,
    ) -> Result<Rc<CompilationResult>, Error> {
        let requester = parent.and_then(LoadContext::current);

        // Memoization: cached exports end the load before it starts.
        let mut stored_definition: Option<(String, ModuleKind)> = None;
        if source_override.is_none() {
            match self.registry.execute(title.as_str(), requester) {
                Ok(Execution::Ready(exports)) => return Ok(self.ready_result(&title, exports)),
                Ok(Execution::Source { text, kind }) => stored_definition = Some((text, kind)),
                // Unknown module: the store decides below.
                Err(_) => {}
            }
        }

        // A title already resolving further up the stack cannot terminate:
        // its exports are not cached yet. Refuse instead of recursing.
        if self.detect_cycles
            && let Some(parent_ctx) = parent
            && parent_ctx.on_stack(title.as_str())
        {
            let mut stack: Vec<String> =
                parent_ctx.stack().iter().map(ToString::to_string).collect();
            stack.push(title.to_string());
            let fault =
                RuntimeFault::new(format!("circular import of `{title}`")).with_stack(stack);
            return Ok(Rc::new(CompilationResult::Failure {
                fault: ModuleFault::Runtime(fault),
                title: Some(title),
            }));
        }

        // Source: explicit override, else current store text (live edits
        // must win), else the registry's stored definition.
        let (text, kind) = match source_override {
            Some(text) => (text, ModuleKind::markup()),
            None => match self.store.get_document(title.as_str()) {
                Some(doc) => (doc.text, doc.kind),
                None => match stored_definition {
                    Some(stored) => stored,
                    None => return Err(Error::not_found(title.as_str(), requester)),
                },
            },
        };

        let ctx = self.derive_context(parent, Some(&title));

        let (artifact, warnings) = match self
            .compile_source(title.as_str(), Some(&title), &text, &ctx)
            .await
        {
            Ok(compiled) => compiled,
            Err(diag) => {
                // Nothing is registered on backend failure.
                let fault = ModuleFault::Compile(diag.with_fragment_from(&text));
                return Ok(self.store_result(
                    &title,
                    CompilationResult::Failure {
                        fault,
                        title: Some(title.clone()),
                    },
                ));
            }
        };

        let exports = match Self::run_artifact(self.clone(), &artifact, &ctx).await {
            Ok(exports) => exports,
            Err(fault) => {
                return Ok(self.store_result(
                    &title,
                    CompilationResult::Failure {
                        fault: ModuleFault::Runtime(fault),
                        title: Some(title.clone()),
                    },
                ));
            }
        };

        let exports = if ctx.ambient().is_empty() {
            exports
        } else {
            exports.with_ambient_default(ctx.ambient())
        };

        // Register only now, with the finished dependency set: every
        // resolve() of this execution has completed. A concurrent load of
        // the same uncached title defines last and wins silently.
        let dependencies = ctx.required();
        self.registry
            .define(title.clone(), kind, ModuleDefinition::Source(text));
        let _ = self
            .registry
            .record_execution(title.as_str(), exports.clone(), dependencies.clone());

        crate::debug!("load"; "loaded `{title}` ({} deps)", dependencies.len());
        Ok(self.store_result(
            &title,
            CompilationResult::Success {
                artifact: Some(artifact),
                warnings,
                dependencies,
                exports,
            },
        ))
    }

    async fn load_literal(
        self: Rc<Self>,
        source: String,
        parent: Option<&LoadContext>,
    ) -> Result<Rc<CompilationResult>, Error> {
        let ctx = self.derive_context(parent, None);
        let name = match parent.and_then(LoadContext::current) {
            Some(parent_title) => format!("{parent_title}!inline"),
            None => "<literal>".to_string(),
        };

        let result = match self.compile_source(&name, None, &source, &ctx).await {
            Err(diag) => CompilationResult::Failure {
                fault: ModuleFault::Compile(diag.with_fragment_from(&source)),
                title: None,
            },
            Ok((artifact, warnings)) => match Self::run_artifact(self.clone(), &artifact, &ctx).await {
                Err(fault) => CompilationResult::Failure {
                    fault: ModuleFault::Runtime(fault),
                    title: None,
                },
                Ok(exports) => {
                    let exports = if ctx.ambient().is_empty() {
                        exports
                    } else {
                        exports.with_ambient_default(ctx.ambient())
                    };
                    CompilationResult::Success {
                        artifact: Some(artifact),
                        warnings,
                        dependencies: ctx.required(),
                        exports,
                    }
                }
            },
        };
        Ok(Rc::new(result))
    }

    /// Compile `source`, reusing the memoized artifact when the text is
    /// unchanged. Context keys are handed to the backend sorted.
    async fn compile_source(
        &self,
        name: &str,
        memo_title: Option<&Title>,
        source: &str,
        ctx: &LoadContext,
    ) -> Result<(CompiledArtifact, Vec<Diagnostic>), Diagnostic> {
        let hash = blake3::hash(source.as_bytes());
        if let Some(title) = memo_title {
            let memo = self.compiled.borrow();
            if let Some(entry) = memo.get(title.as_str())
                && entry.hash == hash
            {
                crate::debug!("load"; "compile memo hit for `{title}`");
                return Ok((entry.artifact.clone(), entry.warnings.clone()));
            }
        }

        let keys = ctx.shared_keys();
        let output = self.backend.compile(name, source, &keys).await?;
        if let Some(title) = memo_title {
            self.compiled.borrow_mut().insert(
                title.clone(),
                CompiledSource {
                    hash,
                    artifact: output.artifact.clone(),
                    warnings: output.warnings.clone(),
                },
            );
        }
        Ok((output.artifact, output.warnings))
    }

    async fn run_artifact(
        loader: Rc<Self>,
        artifact: &CompiledArtifact,
        ctx: &LoadContext,
    ) -> Result<Exports, RuntimeFault> {
        let resolver = Resolver::new(loader, ctx.clone());
        artifact
            .call(ctx.ambient().clone(), resolver, ctx.shared_values())
            .await
    }

    fn derive_context(&self, parent: Option<&LoadContext>, title: Option<&Title>) -> LoadContext {
        match parent {
            Some(parent) => parent.derive(title),
            None => LoadContext::root(self.base_context.clone()).derive(title),
        }
    }

    fn store_result(&self, title: &Title, result: CompilationResult) -> Rc<CompilationResult> {
        let result = Rc::new(result);
        self.results
            .borrow_mut()
            .insert(title.clone(), result.clone());
        result
    }

    /// Cached exports, surfaced as a result. Reuses the stored result when
    /// it still describes the same exports bundle.
    fn ready_result(&self, title: &Title, exports: Exports) -> Rc<CompilationResult> {
        {
            let results = self.results.borrow();
            if let Some(existing) = results.get(title.as_str())
                && existing.exports().is_some_and(|e| e.same(&exports))
            {
                return existing.clone();
            }
        }
        self.store_result(
            title,
            CompilationResult::Success {
                artifact: None,
                warnings: Vec::new(),
                dependencies: self
                    .registry
                    .get_dependencies(title.as_str())
                    .unwrap_or_default(),
                exports,
            },
        )
    }
}

// =============================================================================
// Tests
// =============================================================================
