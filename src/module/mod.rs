//! Module data model: titles, kinds, definitions, compiled units.
//!
//! A `Module` is a named, compiled, cached unit of executable content. Its
//! `requires` edges record which titles it resolved during its last
//! successful execution; invalidation clears `exports` but leaves the edges
//! in place so a later invalidation of an ancestor still reaches it.

mod exports;

pub use exports::{Exports, ExportsBuilder, TeardownFn};

use rustc_hash::FxHashSet;
use std::borrow::Borrow;
use std::fmt;

// =============================================================================
// Title
// =============================================================================

/// Unique identifier of a document/module.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Title(String);

impl Title {
    pub fn new(title: impl Into<String>) -> Self {
        Self(title.into())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Title {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for Title {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Borrow<str> for Title {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Title {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Title {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// ModuleKind
// =============================================================================

/// Kind of a module, mirroring the document kind reported by the store.
/// The registry indexes modules by kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleKind(String);

impl ModuleKind {
    pub fn new(kind: impl Into<String>) -> Self {
        Self(kind.into())
    }

    /// Document with markup interleaved with executable expressions.
    pub fn markup() -> Self {
        Self("markup".to_string())
    }

    /// Pre-registered module whose definition is a ready-made exports
    /// object, not source text.
    pub fn builtin() -> Self {
        Self("builtin".to_string())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ModuleKind {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// ModuleDefinition
// =============================================================================

/// What a module is made from: raw source text compiled on demand, or a
/// ready-made exports object (pre-registered built-in).
#[derive(Debug, Clone)]
pub enum ModuleDefinition {
    Source(String),
    Exports(Exports),
}

// =============================================================================
// Module
// =============================================================================

#[derive(Debug, Clone)]
pub struct Module {
    pub title: Title,
    pub kind: ModuleKind,
    pub definition: ModuleDefinition,
    /// Cached exports; `None` until first successful execution, cleared on
    /// invalidation.
    pub exports: Option<Exports>,
    /// Titles resolved during the last successful execution. Preserved
    /// across invalidation.
    pub requires: FxHashSet<Title>,
}

impl Module {
    pub fn new(title: Title, kind: ModuleKind, definition: ModuleDefinition) -> Self {
        Self {
            title,
            kind,
            definition,
            exports: None,
            requires: FxHashSet::default(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHashMap;

    #[test]
    fn test_title_borrow_allows_str_lookup() {
        let mut map: FxHashMap<Title, u32> = FxHashMap::default();
        map.insert(Title::from("home"), 1);
        assert_eq!(map.get("home"), Some(&1));
    }

    #[test]
    fn test_new_module_has_no_exports_and_no_edges() {
        let module = Module::new(
            Title::from("home"),
            ModuleKind::markup(),
            ModuleDefinition::Source("text".to_string()),
        );
        assert!(module.exports.is_none());
        assert!(module.requires.is_empty());
    }
}
