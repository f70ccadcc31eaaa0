//! Depth-first reachability over the requires relation.
//!
//! The relation is a directed graph that may contain cycles, so traversal
//! keeps an explicit visited set and an explicit stack — never naive
//! recursion.

use rustc_hash::FxHashSet;

use crate::module::Title;

/// Transitive closure: every title reachable from `start` by repeatedly
/// applying `neighbors`. Excludes the start node.
pub fn reachable<N, I>(start: &Title, mut neighbors: N) -> FxHashSet<Title>
where
    N: FnMut(&Title) -> I,
    I: IntoIterator<Item = Title>,
{
    let mut visited: FxHashSet<Title> = FxHashSet::default();
    visited.insert(start.clone());

    let mut stack: Vec<Title> = neighbors(start).into_iter().collect();
    while let Some(next) = stack.pop() {
        if !visited.insert(next.clone()) {
            continue;
        }
        stack.extend(neighbors(&next));
    }

    visited.remove(start);
    visited
}

// =============================================================================
// Tests
// =============================================================================
