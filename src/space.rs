//! One assembled document space: store + backend + registry + loader +
//! invalidation trigger.
//!
//! There is no process-wide singleton; each space is an independent
//! universe of documents and modules, so several can coexist (one per
//! test, one per tenant).

use rustc_hash::FxHashSet;
use std::rc::Rc;
use tokio::sync::mpsc;

use crate::compile::{CompilationResult, CompileBackend};
use crate::config::Options;
use crate::error::Error;
use crate::invalidate::InvalidationTrigger;
use crate::loader::{LoadRequest, ModuleLoader};
use crate::logger;
use crate::module::{Exports, ModuleDefinition, ModuleKind, Title};
use crate::registry::ModuleRegistry;
use crate::store::{ChangeBatch, DocumentStore};

pub struct Space {
    registry: Rc<ModuleRegistry>,
    loader: Rc<ModuleLoader>,
    trigger: InvalidationTrigger,
}

impl Space {
    pub fn new(store: Rc<dyn DocumentStore>, backend: Rc<dyn CompileBackend>) -> Self {
        Self::with_options(store, backend, &Options::default())
    }

    pub fn with_options(
        store: Rc<dyn DocumentStore>,
        backend: Rc<dyn CompileBackend>,
        options: &Options,
    ) -> Self {
        logger::set_verbose(options.verbose);
        let registry = Rc::new(ModuleRegistry::new());
        let loader = Rc::new(
            ModuleLoader::new(registry.clone(), store, backend)
                .with_base_context(options.seed_context())
                .with_cycle_detection(options.detect_cycles),
        );
        let trigger = InvalidationTrigger::new(registry.clone());
        Self {
            registry,
            loader,
            trigger,
        }
    }

    pub fn registry(&self) -> &Rc<ModuleRegistry> {
        &self.registry
    }

    pub fn loader(&self) -> &Rc<ModuleLoader> {
        &self.loader
    }

    /// Load the named document as a module.
    pub async fn load(&self, title: &str) -> Result<Rc<CompilationResult>, Error> {
        self.loader
            .clone()
            .load_module(LoadRequest::by_title(title), None)
            .await
    }

    /// Compile literal source without registering a durable module.
    pub async fn load_literal(&self, source: &str) -> Result<Rc<CompilationResult>, Error> {
        self.loader
            .clone()
            .load_module(LoadRequest::literal(source), None)
            .await
    }

    /// Pre-register a built-in module with ready-made exports.
    pub fn define_builtin(&self, title: impl Into<Title>, exports: Exports) {
        self.registry.define(
            title.into(),
            ModuleKind::builtin(),
            ModuleDefinition::Exports(exports),
        );
    }

    pub fn compilation_result(&self, title: &str) -> Option<Rc<CompilationResult>> {
        self.loader.compilation_result(title)
    }

    pub fn dependencies_of(&self, title: &str) -> FxHashSet<Title> {
        self.loader.dependencies_of(title)
    }

    /// Apply a change batch now. Fully applied on return: a render pass
    /// started afterwards never reads stale exports.
    pub fn process_changes(&self, batch: &ChangeBatch) -> Vec<Title> {
        self.trigger.apply(batch)
    }

    /// Drive invalidation from a change feed until the channel closes.
    pub async fn watch(&self, feed: mpsc::UnboundedReceiver<ChangeBatch>) {
        self.trigger.run(feed).await;
    }
}

// =============================================================================
// Tests
// =============================================================================
