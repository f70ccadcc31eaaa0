//! Per-load bookkeeping: require stack, accumulated dependency set, shared
//! context values.
//!
//! One context is owned by exactly one in-flight load. Nested loads derive
//! a fresh context: the require stack grows, the dependency set starts
//! empty, and the shared context carries forward. The dependency set is
//! never shared between parent and child.

use rustc_hash::FxHashSet;
use smallvec::SmallVec;
use std::cell::RefCell;
use std::rc::Rc;

use crate::module::Title;
use crate::value::{Value, ValueMap};

/// Observer hook notified of every `resolve()` call made during the load.
pub type DependencyObserver = Rc<dyn Fn(&Title)>;

#[derive(Clone, Default)]
pub struct LoadContext {
    /// Titles currently resolving, innermost last.
    require_stack: SmallVec<[Title; 8]>,
    /// Titles resolved so far in *this* load only — distinct from a
    /// module's persisted `requires`.
    required: Rc<RefCell<FxHashSet<Title>>>,
    /// Key→value bag passed into compiled code. BTreeMap keeps the key
    /// order sorted, so generated artifact signatures are deterministic.
    shared: Rc<ValueMap>,
    observer: Option<DependencyObserver>,
}

impl LoadContext {
    /// Context for a fresh top-level load.
    pub fn root(shared: ValueMap) -> Self {
        Self {
            require_stack: SmallVec::new(),
            required: Rc::default(),
            shared: Rc::new(shared),
            observer: None,
        }
    }

    pub fn with_observer(mut self, observer: impl Fn(&Title) + 'static) -> Self {
        self.observer = Some(Rc::new(observer));
        self
    }

    /// Fresh context for a nested load: stack grows by `title`, dependency
    /// set starts empty, shared context and observer carry forward.
    pub(crate) fn derive(&self, title: Option<&Title>) -> Self {
        let mut require_stack = self.require_stack.clone();
        if let Some(title) = title {
            require_stack.push(title.clone());
        }
        Self {
            require_stack,
            required: Rc::default(),
            shared: self.shared.clone(),
            observer: self.observer.clone(),
        }
    }

    pub fn stack(&self) -> &[Title] {
        &self.require_stack
    }

    /// Innermost title currently resolving — the requester of any nested
    /// resolution.
    pub fn current(&self) -> Option<&Title> {
        self.require_stack.last()
    }

    pub fn on_stack(&self, title: &str) -> bool {
        self.require_stack.iter().any(|t| t.as_str() == title)
    }

    pub(crate) fn notify(&self, title: &Title) {
        if let Some(observer) = &self.observer {
            observer(title);
        }
    }

    pub(crate) fn record(&self, title: &Title) {
        self.required.borrow_mut().insert(title.clone());
    }

    /// Snapshot of the dependency set accumulated so far.
    pub fn required(&self) -> FxHashSet<Title> {
        self.required.borrow().clone()
    }

    pub fn ambient(&self) -> &ValueMap {
        &self.shared
    }

    /// Shared-context key names, sorted.
    pub fn shared_keys(&self) -> Vec<String> {
        self.shared.keys().cloned().collect()
    }

    /// Shared-context values in sorted key order.
    pub fn shared_values(&self) -> Vec<Value> {
        self.shared.values().cloned().collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
