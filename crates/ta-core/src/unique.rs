//! Distinct-value counting.

use std::collections::HashSet;
use std::hash::Hash;

use ta_common::Value;

/// Counts distinct items. Values compare exactly, doubles by bit pattern.
#[derive(Debug, Clone)]
pub struct UniquenessCounter<T> {
    seen: HashSet<T>,
}

impl<T: Hash + Eq> Default for UniquenessCounter<T> {
    fn default() -> Self {
        Self {
            seen: HashSet::new(),
        }
    }
}

impl<T: Hash + Eq> UniquenessCounter<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one item. Returns `true` if it was not seen before.
    pub fn observe(&mut self, item: T) -> bool {
        self.seen.insert(item)
    }

    pub fn count(&self) -> u64 {
        self.seen.len() as u64
    }
}

impl<'a> UniquenessCounter<&'a Value> {
    /// Record a raw field value; list elements count individually.
    pub fn observe_value(&mut self, value: &'a Value) {
        for leaf in value.leaves() {
            self.seen.insert(leaf);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_values_count_once() {
        let v = Value::from("eth0");
        let mut counter = UniquenessCounter::new();
        for _ in 0..5 {
            counter.observe_value(&v);
        }
        assert_eq!(counter.count(), 1);
    }

    #[test]
    fn test_distinct_values() {
        let values: Vec<Value> = (0..4u64).map(Value::from).collect();
        let mut counter = UniquenessCounter::new();
        for v in &values {
            counter.observe_value(v);
        }
        assert_eq!(counter.count(), 4);
    }

    #[test]
    fn test_lists_are_flattened() {
        let a = Value::List(vec![Value::from(1u64), Value::from(2u64)]);
        let b = Value::List(vec![Value::from(2u64), Value::from(3u64)]);
        let mut counter = UniquenessCounter::new();
        counter.observe_value(&a);
        counter.observe_value(&b);
        assert_eq!(counter.count(), 3);
    }

    #[test]
    fn test_kinds_are_distinct() {
        let a = Value::from(1u64);
        let b = Value::from(1i64);
        let mut counter = UniquenessCounter::new();
        counter.observe_value(&a);
        counter.observe_value(&b);
        assert_eq!(counter.count(), 2);
    }

    #[test]
    fn test_generic_items() {
        let mut counter = UniquenessCounter::new();
        assert!(counter.observe(("a", 1)));
        assert!(!counter.observe(("a", 1)));
        assert!(counter.observe(("a", 2)));
        assert_eq!(counter.count(), 2);
    }
}
