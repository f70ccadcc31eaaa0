//! Document store adapter: text-by-title lookup plus a change feed.
//!
//! The store itself is an external collaborator; this module defines the
//! trait the loader consumes, the change-feed payload the invalidation
//! trigger consumes, and an in-memory reference implementation.

mod memory;

pub use memory::MemoryStore;

use rustc_hash::FxHashMap;

use crate::module::{ModuleKind, Title};

// =============================================================================
// DocumentStore
// =============================================================================

pub trait DocumentStore {
    /// Current text and kind of the named document, if present.
    fn get_document(&self, title: &str) -> Option<Document>;

    /// Titles matching a regular expression, in store order. An invalid
    /// pattern yields no matches.
    fn query_titles(&self, expr: &str) -> Vec<Title>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub title: Title,
    pub text: String,
    pub kind: ModuleKind,
}

// =============================================================================
// Change feed
// =============================================================================

/// One change-feed notification: what happened to each named title.
pub type ChangeBatch = FxHashMap<Title, DocumentChange>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentChange {
    Modified,
    Deleted,
}

/// Single-title convenience constructor for the common case.
pub fn change_batch(title: impl Into<Title>, change: DocumentChange) -> ChangeBatch {
    let mut batch = ChangeBatch::default();
    batch.insert(title.into(), change);
    batch
}
