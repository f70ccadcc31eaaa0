//! Dependency-resolution capability injected into executing artifacts.
//!
//! The backend rewrites a document's import statements into calls against
//! this handle; dependencies are discovered by running the artifact, never
//! by static analysis.

use futures_util::future::LocalBoxFuture;
use std::rc::Rc;

use super::{LoadContext, LoadRequest, ModuleLoader};
use crate::compile::CompilationResult;
use crate::fault::RuntimeFault;
use crate::module::{Exports, Title};

#[derive(Clone)]
pub struct Resolver {
    loader: Rc<ModuleLoader>,
    ctx: LoadContext,
}

impl Resolver {
    pub(crate) fn new(loader: Rc<ModuleLoader>, ctx: LoadContext) -> Self {
        Self { loader, ctx }
    }

    /// Resolve a named dependency: notifies the observer hook, recursively
    /// loads `name`, and on success records it into the current load's
    /// dependency set. On failure the fault re-raises, aborting the
    /// importer's own execution.
    pub fn resolve(&self, name: &str) -> LocalBoxFuture<'static, Result<Exports, RuntimeFault>> {
        let loader = self.loader.clone();
        let ctx = self.ctx.clone();
        let title = Title::from(name);
        Box::pin(async move {
            ctx.notify(&title);
            let result = loader
                .load_module(LoadRequest::by_title(title.clone()), Some(&ctx))
                .await
                .map_err(|err| RuntimeFault::new(err.to_string()).with_stack(stack_of(&ctx)))?;
            match &*result {
                CompilationResult::Success { exports, .. } => {
                    ctx.record(&title);
                    Ok(exports.clone())
                }
                CompilationResult::Failure { fault, .. } => Err(RuntimeFault::new(format!(
                    "import `{title}` failed: {fault}"
                ))
                .with_stack(stack_of(&ctx))),
            }
        })
    }

    /// Compile an inline snippet as a nested anonymous module of the
    /// current load. The returned result belongs in the containing
    /// module's exports (`ExportsBuilder::nested`) so callers awaiting
    /// "whole tree ready" can reach it.
    pub fn load_literal(
        &self,
        source: &str,
    ) -> LocalBoxFuture<'static, Result<Rc<CompilationResult>, RuntimeFault>> {
        let loader = self.loader.clone();
        let ctx = self.ctx.clone();
        let source = source.to_string();
        Box::pin(async move {
            loader
                .load_module(LoadRequest::literal(source), Some(&ctx))
                .await
                .map_err(|err| RuntimeFault::new(err.to_string()))
        })
    }
}

fn stack_of(ctx: &LoadContext) -> Vec<String> {
    ctx.stack().iter().map(ToString::to_string).collect()
}
