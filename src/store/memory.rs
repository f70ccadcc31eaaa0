//! In-memory document store with a subscription-based change feed.
//!
//! Reference implementation of the store adapter: mutators emit a
//! `ChangeBatch` to every live subscriber, so live-editing flows are
//! drivable end to end without an external store.

use parking_lot::RwLock;
use regex::Regex;
use std::collections::BTreeMap;
use tokio::sync::mpsc;

use super::{ChangeBatch, Document, DocumentChange, DocumentStore, change_batch};
use crate::module::{ModuleKind, Title};

#[derive(Default)]
pub struct MemoryStore {
    /// BTreeMap so `query_titles` returns titles in a stable order.
    docs: RwLock<BTreeMap<Title, Document>>,
    feeds: RwLock<Vec<mpsc::UnboundedSender<ChangeBatch>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to the change feed. Each subscriber receives every batch
    /// emitted after the subscription.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ChangeBatch> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.feeds.write().push(tx);
        rx
    }

    /// Insert or replace a document. Emits a Modified change.
    pub fn insert(&self, title: impl Into<Title>, text: impl Into<String>, kind: ModuleKind) {
        let title = title.into();
        let doc = Document {
            title: title.clone(),
            text: text.into(),
            kind,
        };
        self.docs.write().insert(title.clone(), doc);
        self.emit(change_batch(title, DocumentChange::Modified));
    }

    /// Replace an existing document's text, keeping its kind. Emits a
    /// Modified change. Returns false if the title is unknown.
    pub fn update(&self, title: &str, text: impl Into<String>) -> bool {
        let mut docs = self.docs.write();
        let Some(doc) = docs.get_mut(title) else {
            return false;
        };
        doc.text = text.into();
        let title = doc.title.clone();
        drop(docs);
        self.emit(change_batch(title, DocumentChange::Modified));
        true
    }

    /// Remove a document. Emits a Deleted change. Returns false if the
    /// title is unknown.
    pub fn remove(&self, title: &str) -> bool {
        let removed = self.docs.write().remove(title);
        match removed {
            Some(doc) => {
                self.emit(change_batch(doc.title, DocumentChange::Deleted));
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.docs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.docs.read().is_empty()
    }

    /// Send a batch to all subscribers, pruning closed feeds.
    fn emit(&self, batch: ChangeBatch) {
        self.feeds
            .write()
            .retain(|tx| tx.send(batch.clone()).is_ok());
    }
}

impl DocumentStore for MemoryStore {
    fn get_document(&self, title: &str) -> Option<Document> {
        self.docs.read().get(title).cloned()
    }

    fn query_titles(&self, expr: &str) -> Vec<Title> {
        let Ok(pattern) = Regex::new(expr) else {
            crate::debug!("store"; "invalid title query `{expr}`");
            return Vec::new();
        };
        self.docs
            .read()
            .keys()
            .filter(|title| pattern.is_match(title.as_str()))
            .cloned()
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
