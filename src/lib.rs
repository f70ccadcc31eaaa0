//! vellum — incremental module system for live-editing executable documents.
//!
//! Documents (markup interleaved with executable expressions) load as
//! compiled, cached modules. Dependencies are discovered by *running* the
//! compiled artifact: the backend rewrites import statements into calls
//! against an injected resolver, and each resolution recursively loads the
//! named module. A change feed invalidates exactly the transitive
//! consumers of an edited document; everything else stays cached and the
//! next render recompiles lazily.
//!
//! ```text
//! DocumentStore --text--> ModuleLoader <--artifact-- CompileBackend
//!       |                   |      ^
//!  change feed        define|      | resolve(name)
//!       v                   v      |
//! InvalidationTrigger --> ModuleRegistry (modules + requires edges)
//! ```
//!
//! The store and the backend are external collaborators behind traits; an
//! in-memory store ships for embedding and tests. Everything is
//! single-threaded and cooperatively scheduled: re-entrant loads suspend
//! recursively, they never run in parallel.

pub mod compile;
pub mod config;
pub mod diag;
pub mod error;
pub mod fault;
pub mod invalidate;
pub mod loader;
pub mod logger;
pub mod module;
pub mod registry;
pub mod space;
pub mod store;
pub mod value;

#[cfg(test)]
mod testkit;

pub use compile::{
    AmbientBindings, CompilationResult, CompileBackend, CompiledArtifact, CompiledOutput,
    artifact_signature,
};
pub use config::{ConfigError, Options};
pub use diag::{Diagnostic, Severity, SourcePos, SourceSpan};
pub use error::Error;
pub use fault::{ModuleFault, RuntimeFault};
pub use invalidate::InvalidationTrigger;
pub use loader::{DependencyObserver, LoadContext, LoadRequest, ModuleLoader, Resolver};
pub use module::{Exports, ExportsBuilder, Module, ModuleDefinition, ModuleKind, TeardownFn, Title};
pub use registry::{Execution, ModuleRegistry};
pub use space::Space;
pub use store::{
    ChangeBatch, Document, DocumentChange, DocumentStore, MemoryStore, change_batch,
};
pub use value::{NativeFn, Value, ValueMap};
