use std::collections::{HashMap, VecDeque};

use mpdbg_runtime::Value;
use tracing::debug;

/// Lowest id handed out for cached values. Everything below it is a scope
/// reference.
pub const VARREF_COMPLEX_BASE: i64 = 10_000;

pub const DEFAULT_MAX_SIZE: usize = 500;

/// Bounded registry of the complex values a client has been shown.
///
/// Ids grow monotonically and are never reused. When the cache is full the
/// oldest inserted entry is evicted, regardless of how recently it was read.
#[derive(Debug)]
pub struct VariableReferenceCache {
    entries: HashMap<i64, Value>,
    order: VecDeque<i64>,
    identities: HashMap<usize, i64>,
    next_id: i64,
    max_size: usize,
}

impl Default for VariableReferenceCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SIZE)
    }
}

impl VariableReferenceCache {
    pub fn new(max_size: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: VecDeque::new(),
            identities: HashMap::new(),
            next_id: VARREF_COMPLEX_BASE,
            max_size: max_size.max(1),
        }
    }

    /// Registers `value` and returns its reference. A container that is
    /// already cached keeps the reference it was given first.
    pub fn add(&mut self, value: Value) -> i64 {
        let identity = value.identity();
        if let Some(id) = identity.and_then(|identity| self.identities.get(&identity)) {
            return *id;
        }

        let id = self.next_id;
        self.next_id += 1;

        if let Some(identity) = identity {
            self.identities.insert(identity, id);
        }
        self.entries.insert(id, value);
        self.order.push_back(id);

        while self.entries.len() > self.max_size {
            self.evict_oldest();
        }

        id
    }

    pub fn get(&self, id: i64) -> Option<&Value> {
        self.entries.get(&id)
    }

    /// Drops every entry. Ids keep counting from where they were.
    pub fn clear(&mut self) {
        debug!(entries = self.entries.len(), "Clearing variable cache");
        self.entries.clear();
        self.order.clear();
        self.identities.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    fn evict_oldest(&mut self) {
        let Some(id) = self.order.pop_front() else {
            return;
        };
        if let Some(value) = self.entries.remove(&id)
            && let Some(identity) = value.identity()
        {
            self.identities.remove(&identity);
        }
        debug!(id, "Evicted cached variable");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_eviction_keeps_most_recent() {
        let mut cache = VariableReferenceCache::new(5);
        let refs: Vec<i64> = (0..10)
            .map(|n| cache.add(Value::list(vec![Value::Int(n)])))
            .collect();

        assert_eq!(cache.len(), 5);
        assert!(cache.get(refs[0]).is_none());
        assert!(refs[..5].iter().all(|id| cache.get(*id).is_none()));
        for (n, id) in refs.iter().enumerate().skip(5) {
            let expected = Value::list(vec![Value::Int(n as i64)]);
            assert_eq!(cache.get(*id), Some(&expected));
        }
    }

    #[test]
    fn test_reads_do_not_refresh_eviction_order() {
        let mut cache = VariableReferenceCache::new(2);
        let first = cache.add(Value::list(vec![]));
        let second = cache.add(Value::list(vec![]));
        assert!(cache.get(first).is_some());

        let third = cache.add(Value::list(vec![]));

        assert!(cache.get(first).is_none());
        assert!(cache.get(second).is_some());
        assert!(cache.get(third).is_some());
    }

    #[test]
    fn test_ids_start_at_base_and_increase() {
        let mut cache = VariableReferenceCache::default();
        let a = cache.add(Value::dict(vec![]));
        let b = cache.add(Value::tuple(vec![]));
        assert_eq!(a, VARREF_COMPLEX_BASE);
        assert!(b > a);
    }

    #[test]
    fn test_same_container_reuses_reference() {
        let mut cache = VariableReferenceCache::default();
        let list = Value::list(vec![1.into()]);
        let id = cache.add(list.clone());
        assert_eq!(cache.add(list.clone()), id);
        assert_eq!(cache.len(), 1);

        let equal_but_distinct = Value::list(vec![1.into()]);
        assert_ne!(cache.add(equal_but_distinct), id);
    }

    #[test]
    fn test_clear_keeps_id_counter() {
        let mut cache = VariableReferenceCache::default();
        let before = cache.add(Value::list(vec![]));
        cache.clear();

        assert!(cache.is_empty());
        assert!(cache.get(before).is_none());
        assert!(cache.add(Value::list(vec![])) > before);
    }

    #[test]
    fn test_evicted_container_gets_fresh_reference() {
        let mut cache = VariableReferenceCache::new(1);
        let list = Value::list(vec![]);
        let id = cache.add(list.clone());
        cache.add(Value::dict(vec![]));

        let again = cache.add(list);
        assert_ne!(again, id);
        assert!(cache.get(again).is_some());
    }
}
