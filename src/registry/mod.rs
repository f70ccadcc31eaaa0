//! Module registry: owns every module, the dependency edges between them,
//! and cascading invalidation.
//!
//! # Architecture
//!
//! ```text
//! ModuleRegistry
//! ├── modules: title → Module (definition, cached exports, requires)
//! ├── by_kind: kind → {titles}
//! └── reverse: dependency → {dependents}
//!
//! On invalidation of T:
//! 1. Walk reverse edges transitively from T (cycle-safe DFS)
//! 2. Run teardown hooks, clear exports — requires edges stay put
//! ```
//!
//! The registry is an explicit instance shared by the loader and the
//! invalidation trigger; multiple independent document spaces can coexist
//! in one process.

pub mod graph;

use parking_lot::RwLock;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::Error;
use crate::module::{Exports, Module, ModuleDefinition, ModuleKind, Title};

// =============================================================================
// Execution
// =============================================================================

/// Outcome of `execute`: either exports the registry can produce alone, or
/// a source definition that needs the loader's execution machinery.
#[derive(Debug, Clone)]
pub enum Execution {
    Ready(Exports),
    Source { text: String, kind: ModuleKind },
}

// =============================================================================
// ModuleRegistry
// =============================================================================

#[derive(Default)]
pub struct ModuleRegistry {
    modules: RwLock<FxHashMap<Title, Module>>,
    by_kind: RwLock<FxHashMap<ModuleKind, FxHashSet<Title>>>,
    /// Reverse requires index, kept consistent with `Module::requires`.
    reverse: RwLock<FxHashMap<Title, FxHashSet<Title>>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a module. A changed definition invalidates
    /// everything downstream even pre-execution: the prior module's cached
    /// exports and those of every transitive dependent are cleared before
    /// the new definition is stored. Requires edges survive the swap.
    pub fn define(&self, title: Title, kind: ModuleKind, definition: ModuleDefinition) {
        let prior = self
            .modules
            .read()
            .get(title.as_str())
            .map(|module| (module.kind.clone(), module.requires.clone()));

        if prior.is_some() {
            // Unknown-title error is impossible here; ignore the report.
            let _ = self.clear_exports(title.as_str());
            crate::debug!("registry"; "redefined `{title}`");
        }

        let mut module = Module::new(title.clone(), kind.clone(), definition);
        if let Some((old_kind, requires)) = prior {
            module.requires = requires;
            if old_kind != kind
                && let Some(titles) = self.by_kind.write().get_mut(&old_kind)
            {
                titles.remove(title.as_str());
            }
        }

        self.modules.write().insert(title.clone(), module);
        self.by_kind.write().entry(kind).or_default().insert(title);
    }

    pub fn module_exists(&self, title: &str) -> bool {
        self.modules.read().contains_key(title)
    }

    pub fn kind_of(&self, title: &str) -> Option<ModuleKind> {
        self.modules.read().get(title).map(|m| m.kind.clone())
    }

    /// Titles registered under `kind`, sorted.
    pub fn titles_of_kind(&self, kind: &ModuleKind) -> Vec<Title> {
        let mut titles: Vec<Title> = self
            .by_kind
            .read()
            .get(kind)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        titles.sort();
        titles
    }

    /// One-hop dependencies: titles this module resolved during its last
    /// successful execution.
    pub fn get_dependencies(&self, title: &str) -> Result<FxHashSet<Title>, Error> {
        self.modules
            .read()
            .get(title)
            .map(|m| m.requires.clone())
            .ok_or_else(|| Error::not_found(title, None))
    }

    /// One-hop dependents: titles whose last execution resolved this module.
    pub fn get_dependents(&self, title: &str) -> Result<FxHashSet<Title>, Error> {
        if !self.module_exists(title) {
            return Err(Error::not_found(title, None));
        }
        Ok(self
            .reverse
            .read()
            .get(title)
            .cloned()
            .unwrap_or_default())
    }

    /// Transitive dependents, excluding `title` itself.
    pub fn get_all_dependents(&self, title: &str) -> Result<FxHashSet<Title>, Error> {
        if !self.module_exists(title) {
            return Err(Error::not_found(title, None));
        }
        let reverse = self.reverse.read();
        Ok(graph::reachable(&Title::from(title), |t| {
            reverse
                .get(t.as_str())
                .map(|set| set.iter().cloned().collect::<Vec<_>>())
                .unwrap_or_default()
        }))
    }

    /// Transitive dependencies, excluding `title` itself.
    pub fn get_all_dependencies(&self, title: &str) -> Result<FxHashSet<Title>, Error> {
        if !self.module_exists(title) {
            return Err(Error::not_found(title, None));
        }
        let modules = self.modules.read();
        Ok(graph::reachable(&Title::from(title), |t| {
            modules
                .get(t.as_str())
                .map(|m| m.requires.iter().cloned().collect::<Vec<_>>())
                .unwrap_or_default()
        }))
    }

    /// Clear cached exports for `title` and every transitive dependent.
    /// Requires edges are untouched. Teardown hooks on the discarded
    /// exports run first; a failing hook is logged and swallowed so
    /// invalidation always completes. Returns the titles that actually had
    /// exports to clear, sorted.
    pub fn clear_exports(&self, title: &str) -> Result<Vec<Title>, Error> {
        let mut targets: Vec<Title> = vec![Title::from(title)];
        targets.extend(self.get_all_dependents(title)?);

        let mut stale: Vec<(Title, Exports)> = Vec::new();
        {
            let mut modules = self.modules.write();
            for target in &targets {
                if let Some(module) = modules.get_mut(target.as_str())
                    && let Some(exports) = module.exports.take()
                {
                    stale.push((target.clone(), exports));
                }
            }
        }

        let mut cleared = Vec::with_capacity(stale.len());
        for (target, exports) in stale {
            if let Some(hook) = exports.teardown()
                && let Err(fault) = hook()
            {
                crate::log!("error"; "teardown of `{target}` failed: {fault}");
            }
            cleared.push(target);
        }
        cleared.sort();
        Ok(cleared)
    }

    /// Cached exports if present; a ready-made definition becomes exports
    /// directly. Source definitions are handed back for the loader.
    pub fn execute(&self, title: &str, requester: Option<&Title>) -> Result<Execution, Error> {
        {
            let modules = self.modules.read();
            match modules.get(title) {
                None => return Err(Error::not_found(title, requester)),
                Some(module) => {
                    if let Some(exports) = &module.exports {
                        return Ok(Execution::Ready(exports.clone()));
                    }
                    if let ModuleDefinition::Source(text) = &module.definition {
                        return Ok(Execution::Source {
                            text: text.clone(),
                            kind: module.kind.clone(),
                        });
                    }
                }
            }
        }

        // Ready-made definition, first access: cache it as the exports.
        let mut modules = self.modules.write();
        let module = modules
            .get_mut(title)
            .ok_or_else(|| Error::not_found(title, requester))?;
        if module.exports.is_none()
            && let ModuleDefinition::Exports(exports) = &module.definition
        {
            module.exports = Some(exports.clone());
        }
        match &module.exports {
            Some(exports) => Ok(Execution::Ready(exports.clone())),
            None => match &module.definition {
                ModuleDefinition::Source(text) => Ok(Execution::Source {
                    text: text.clone(),
                    kind: module.kind.clone(),
                }),
                ModuleDefinition::Exports(exports) => Ok(Execution::Ready(exports.clone())),
            },
        }
    }

    /// Store a finished execution: cache the exports and replace the
    /// module's requires edges (reverse index kept consistent,
    /// self-reference excluded).
    pub fn record_execution(
        &self,
        title: &str,
        exports: Exports,
        requires: FxHashSet<Title>,
    ) -> Result<(), Error> {
        let requires: FxHashSet<Title> = requires
            .into_iter()
            .filter(|t| t.as_str() != title)
            .collect();

        let old = {
            let mut modules = self.modules.write();
            let module = modules
                .get_mut(title)
                .ok_or_else(|| Error::not_found(title, None))?;
            module.exports = Some(exports);
            std::mem::replace(&mut module.requires, requires.clone())
        };

        let mut reverse = self.reverse.write();
        for dep in old {
            if let Some(dependents) = reverse.get_mut(dep.as_str()) {
                dependents.remove(title);
                if dependents.is_empty() {
                    reverse.remove(dep.as_str());
                }
            }
        }
        let dependent = Title::from(title);
        for dep in requires {
            reverse.entry(dep).or_default().insert(dependent.clone());
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
