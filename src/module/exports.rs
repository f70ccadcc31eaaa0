//! Exported surface of an executed module.
//!
//! Immutable and cheaply clonable: the registry caches the same bundle the
//! loader returns up the call stack. Carries named values, an optional
//! default export (what the rendering layer consumes), an optional
//! `teardown()` capability invoked before the exports are discarded, and
//! the nested anonymous compilation results produced during execution.

use std::fmt;
use std::rc::Rc;

use crate::compile::CompilationResult;
use crate::fault::RuntimeFault;
use crate::value::{Value, ValueMap};

/// Teardown capability on the exports contract. Invoked by the registry
/// before discarding stale exports; failures are logged and swallowed.
pub type TeardownFn = Rc<dyn Fn() -> Result<(), RuntimeFault>>;

// =============================================================================
// Exports
// =============================================================================

#[derive(Clone, Default)]
pub struct Exports {
    inner: Rc<Inner>,
}

#[derive(Default)]
struct Inner {
    values: ValueMap,
    default: Option<Value>,
    teardown: Option<TeardownFn>,
    nested: Vec<Rc<CompilationResult>>,
}

impl Exports {
    pub fn builder() -> ExportsBuilder {
        ExportsBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.inner.values.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.inner.values.keys().map(String::as_str)
    }

    pub fn default_export(&self) -> Option<&Value> {
        self.inner.default.as_ref()
    }

    pub fn teardown(&self) -> Option<&TeardownFn> {
        self.inner.teardown.as_ref()
    }

    /// Nested anonymous compilation results, reachable so a caller awaiting
    /// "whole tree ready" can await nested compilations too.
    pub fn nested(&self) -> &[Rc<CompilationResult>] {
        &self.inner.nested
    }

    pub fn len(&self) -> usize {
        self.inner.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.values.is_empty() && self.inner.default.is_none()
    }

    /// Identity comparison: true when both handles share one bundle.
    pub fn same(&self, other: &Exports) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Same bundle with the default export wrapped so `ambient` values sit
    /// underneath explicit per-call values: explicit wins on key collision.
    /// No-op when there is nothing to merge or the default is not callable.
    pub fn with_ambient_default(&self, ambient: &ValueMap) -> Exports {
        if ambient.is_empty() {
            return self.clone();
        }
        let Some(Value::Func(run)) = &self.inner.default else {
            return self.clone();
        };

        let run = run.clone();
        let ambient = ambient.clone();
        let wrapped = Value::func(move |mut args: Vec<Value>| {
            let explicit = match args.first() {
                Some(Value::Map(map)) => map.clone(),
                None => ValueMap::new(),
                // Non-map leading argument: nothing to merge into.
                Some(_) => return run(args),
            };
            let mut merged = ambient.clone();
            merged.extend(explicit);
            if args.is_empty() {
                args.push(Value::Map(merged));
            } else {
                args[0] = Value::Map(merged);
            }
            run(args)
        });

        Exports {
            inner: Rc::new(Inner {
                values: self.inner.values.clone(),
                default: Some(wrapped),
                teardown: self.inner.teardown.clone(),
                nested: self.inner.nested.clone(),
            }),
        }
    }
}

impl fmt::Debug for Exports {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exports")
            .field("names", &self.inner.values.keys().collect::<Vec<_>>())
            .field("default", &self.inner.default.is_some())
            .field("teardown", &self.inner.teardown.is_some())
            .field("nested", &self.inner.nested.len())
            .finish()
    }
}

// =============================================================================
// ExportsBuilder
// =============================================================================

#[derive(Default)]
pub struct ExportsBuilder {
    inner: Inner,
}

impl ExportsBuilder {
    pub fn value(mut self, name: impl Into<String>, value: Value) -> Self {
        self.inner.values.insert(name.into(), value);
        self
    }

    pub fn default_export(mut self, value: Value) -> Self {
        self.inner.default = Some(value);
        self
    }

    pub fn teardown(mut self, hook: impl Fn() -> Result<(), RuntimeFault> + 'static) -> Self {
        self.inner.teardown = Some(Rc::new(hook));
        self
    }

    pub fn nested(mut self, result: Rc<CompilationResult>) -> Self {
        self.inner.nested.push(result);
        self
    }

    pub fn build(self) -> Exports {
        Exports {
            inner: Rc::new(self.inner),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
