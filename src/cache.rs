use std::collections::{HashMap, HashSet};
use std::time::Instant;

use tracing::trace;

use crate::{QueryNode, ResourceRecord};

/// Every record the resolver has seen, keyed by owner name and type.
///
/// Expiry is lazy: expired records stay stored and are filtered out on
/// lookup.
#[derive(Debug, Default)]
pub struct Cache {
    entries: HashMap<QueryNode, HashSet<ResourceRecord>>,
    normalize_names: bool,
}

impl Cache {
    /// With `normalize_names`, keys ignore ASCII case and a trailing dot.
    pub fn new(normalize_names: bool) -> Self {
        Self {
            entries: HashMap::new(),
            normalize_names,
        }
    }

    fn key(&self, node: QueryNode) -> QueryNode {
        if self.normalize_names {
            node.normalized()
        } else {
            node
        }
    }

    /// Adds a record. An identical record already present is replaced, which
    /// refreshes its insertion time without growing the set.
    pub fn insert(&mut self, record: ResourceRecord) {
        let key = self.key(QueryNode::new(record.name.clone(), record.type_));
        trace!(%key, data = %record.data, "caching record");
        self.entries.entry(key).or_default().replace(record);
    }

    pub fn lookup(&self, node: &QueryNode) -> Vec<ResourceRecord> {
        self.lookup_at(node, Instant::now())
    }

    /// Records for `node` that are still live at `now`.
    pub fn lookup_at(&self, node: &QueryNode, now: Instant) -> Vec<ResourceRecord> {
        let key = self.key(node.clone());
        self.entries
            .get(&key)
            .map(|records| {
                records
                    .iter()
                    .filter(|r| !r.is_expired_at(now))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Visits every stored key with all of its records, expired ones
    /// included.
    pub fn for_each<F>(&self, mut visitor: F)
    where
        F: FnMut(&QueryNode, &HashSet<ResourceRecord>),
    {
        for (node, records) in &self.entries {
            visitor(node, records);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.values().map(HashSet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(HashSet::is_empty)
    }
}
