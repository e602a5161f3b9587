//! Evaluation order of list definitions.

use std::collections::VecDeque;

use ahash::AHashMap;

use super::ListDefinition;

/// Result of ordering a set of list definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution<'a> {
    /// Every definition exactly once; includes come before their users where
    /// the include graph allows it.
    pub order: Vec<&'a ListDefinition>,
    /// Names of lists that could not be placed after all of their includes
    /// (cycles or missing references), in declaration order.
    pub unresolved: Vec<&'a str>,
}

impl Resolution<'_> {
    pub fn names(&self) -> Vec<&str> {
        self.order.iter().map(|d| d.name.as_str()).collect()
    }
}

/// Order lists so that each one follows the lists it includes.
///
/// Kahn's algorithm over `A -> B` edges for "A includes B", peeling ready
/// lists in declaration order. Whatever is left once no list is ready is
/// appended in declaration order and logged; a missing include name counts
/// as an edge that never resolves.
pub fn resolve_order(lists: &[ListDefinition]) -> Resolution<'_> {
    let index: AHashMap<&str, usize> = lists
        .iter()
        .enumerate()
        .map(|(i, def)| (def.name.as_str(), i))
        .collect();

    let mut pending = vec![0usize; lists.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); lists.len()];

    for (i, def) in lists.iter().enumerate() {
        for include in &def.include_refs {
            pending[i] += 1;
            match index.get(include.as_str()) {
                Some(&dep) => dependents[dep].push(i),
                None => log::warn!(
                    "list {} includes unknown list {}, ignoring the reference",
                    def.name,
                    include
                ),
            }
        }
        for exclude in &def.exclude_refs {
            if !index.contains_key(exclude.as_str()) {
                log::warn!(
                    "list {} excludes unknown list {}, ignoring the reference",
                    def.name,
                    exclude
                );
            }
        }
    }

    let mut ready: VecDeque<usize> = (0..lists.len()).filter(|&i| pending[i] == 0).collect();
    let mut placed = vec![false; lists.len()];
    let mut order = Vec::with_capacity(lists.len());

    while let Some(i) = ready.pop_front() {
        placed[i] = true;
        order.push(&lists[i]);

        let mut released = Vec::new();
        for &dependent in &dependents[i] {
            pending[dependent] -= 1;
            if pending[dependent] == 0 {
                released.push(dependent);
            }
        }
        // keep declaration order among lists released together
        released.sort_unstable();
        released.dedup();
        ready.extend(released);
    }

    let mut unresolved = Vec::new();
    for (i, def) in lists.iter().enumerate() {
        if !placed[i] {
            log::warn!(
                "list {} has cyclic or unresolvable includes, building it best-effort",
                def.name
            );
            unresolved.push(def.name.as_str());
            order.push(def);
        }
    }

    Resolution { order, unresolved }
}
