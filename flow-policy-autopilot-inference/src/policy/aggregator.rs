//! Aggregation of (action, resource) pairs into statements
//!
//! A pure fold: start from an empty accumulator, add every pair in traversal order,
//! render. Resources keep first-encounter order and each resource's actions keep
//! first-seen order without duplicates, so an unchanged flow renders byte-identically.

use std::collections::HashMap;

use super::{PolicyDocument, Statement};
use crate::mapping::{ResourceAction, ResourceRef};

#[derive(Debug, Clone, Default)]
pub struct PolicyAccumulator {
    /// canonical resource key -> position in `entries`
    index: HashMap<String, usize>,
    entries: Vec<(ResourceRef, Vec<String>)>,
}

impl PolicyAccumulator {
    /// Add one pair; an action already granted on the same resource is ignored
    #[must_use]
    pub fn add(mut self, pair: ResourceAction) -> Self {
        let key = pair.resource.canonical_key();
        match self.index.get(&key) {
            Some(&position) => {
                let actions = &mut self.entries[position].1;
                if !actions.contains(&pair.action) {
                    actions.push(pair.action);
                }
            }
            None => {
                self.index.insert(key, self.entries.len());
                self.entries.push((pair.resource, vec![pair.action]));
            }
        }
        self
    }

    /// One allow statement per distinct resource
    pub fn render(self) -> PolicyDocument {
        PolicyDocument::new(
            self.entries
                .into_iter()
                .map(|(resource, actions)| Statement::allow(resource, actions))
                .collect(),
        )
    }
}

/// Fold `pairs` into a policy document
pub fn aggregate(pairs: impl IntoIterator<Item = ResourceAction>) -> PolicyDocument {
    pairs
        .into_iter()
        .fold(PolicyAccumulator::default(), PolicyAccumulator::add)
        .render()
}
