//! Invalidation trigger: wires the document store's change feed to the
//! registry.
//!
//! A change batch names edited or deleted titles. The trigger filters them
//! to known modules and clears cached exports for each, cascading to every
//! transitive dependent. `apply` is synchronous — the whole invalidation
//! is in place before it returns, so a render pass started afterwards
//! never reads stale exports. Requires edges survive, so the next
//! invalidation still reaches the same dependents.

use rustc_hash::FxHashSet;
use std::rc::Rc;
use tokio::sync::mpsc;

use crate::module::Title;
use crate::registry::ModuleRegistry;
use crate::store::ChangeBatch;

pub struct InvalidationTrigger {
    registry: Rc<ModuleRegistry>,
}

impl InvalidationTrigger {
    pub fn new(registry: Rc<ModuleRegistry>) -> Self {
        Self { registry }
    }

    /// Apply one change batch. Returns the titles whose exports were
    /// cleared, sorted.
    pub fn apply(&self, batch: &ChangeBatch) -> Vec<Title> {
        let mut cleared: FxHashSet<Title> = FxHashSet::default();
        for title in batch.keys() {
            if !self.registry.module_exists(title.as_str()) {
                continue;
            }
            if let Ok(titles) = self.registry.clear_exports(title.as_str()) {
                cleared.extend(titles);
            }
        }

        let mut cleared: Vec<Title> = cleared.into_iter().collect();
        cleared.sort();
        if !cleared.is_empty() {
            crate::debug!("invalidate"; "cleared {} module(s)", cleared.len());
        }
        cleared
    }

    /// Drive the trigger from a change feed until the channel closes.
    pub async fn run(&self, mut feed: mpsc::UnboundedReceiver<ChangeBatch>) {
        while let Some(batch) = feed.recv().await {
            self.apply(&batch);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::{Exports, ModuleDefinition, ModuleKind};
    use crate::registry::Execution;
    use crate::store::{DocumentChange, change_batch};
    use rustc_hash::FxHashSet as Set;

    fn registry_with_chain() -> Rc<ModuleRegistry> {
        // c requires b requires a; d stands alone
        let registry = Rc::new(ModuleRegistry::new());
        for title in ["a", "b", "c", "d"] {
            registry.define(
                Title::from(title),
                ModuleKind::markup(),
                ModuleDefinition::Source(format!("text of {title}")),
            );
        }
        let record = |title: &str, requires: &[&str]| {
            registry
                .record_execution(
                    title,
                    Exports::default(),
                    requires.iter().map(|t| Title::from(*t)).collect::<Set<_>>(),
                )
                .unwrap();
        };
        record("a", &[]);
        record("b", &["a"]);
        record("c", &["b"]);
        record("d", &[]);
        registry
    }

    fn has_exports(registry: &ModuleRegistry, title: &str) -> bool {
        matches!(registry.execute(title, None), Ok(Execution::Ready(_)))
    }

    #[test]
    fn test_modified_clears_transitive_dependents() {
        let registry = registry_with_chain();
        let trigger = InvalidationTrigger::new(registry.clone());

        let cleared = trigger.apply(&change_batch("a", DocumentChange::Modified));
        assert_eq!(
            cleared,
            vec![Title::from("a"), Title::from("b"), Title::from("c")]
        );
        assert!(!has_exports(&registry, "a"));
        assert!(!has_exports(&registry, "c"));
        assert!(has_exports(&registry, "d"));
    }

    #[test]
    fn test_unknown_titles_filtered() {
        let registry = registry_with_chain();
        let trigger = InvalidationTrigger::new(registry.clone());

        let cleared = trigger.apply(&change_batch("ghost", DocumentChange::Modified));
        assert!(cleared.is_empty());
        assert!(has_exports(&registry, "a"));
    }

    #[test]
    fn test_deleted_clears_like_modified() {
        let registry = registry_with_chain();
        let trigger = InvalidationTrigger::new(registry.clone());

        let cleared = trigger.apply(&change_batch("b", DocumentChange::Deleted));
        assert_eq!(cleared, vec![Title::from("b"), Title::from("c")]);
    }

    #[test]
    fn test_batch_union_deduplicated() {
        let registry = registry_with_chain();
        let trigger = InvalidationTrigger::new(registry.clone());

        let mut batch = ChangeBatch::default();
        batch.insert(Title::from("a"), DocumentChange::Modified);
        batch.insert(Title::from("b"), DocumentChange::Modified);
        let cleared = trigger.apply(&batch);
        // b and c are dependents of both changed titles; each appears once.
        assert_eq!(
            cleared,
            vec![Title::from("a"), Title::from("b"), Title::from("c")]
        );
    }

    #[tokio::test]
    async fn test_run_drains_feed_until_close() {
        let registry = registry_with_chain();
        let trigger = InvalidationTrigger::new(registry.clone());

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(change_batch("a", DocumentChange::Modified)).unwrap();
        drop(tx);

        trigger.run(rx).await;
        assert!(!has_exports(&registry, "c"));
    }
}
