//! Cardinality limiting for `limited` collections.

/// Bound shared with the transport for `limited` collections.
pub const DEFAULT_LIMITED_CAPACITY: usize = 15;

/// An item with its merge weight.
#[derive(Debug, Clone, PartialEq)]
pub struct Weighted<T> {
    pub item: T,
    pub weight: u64,
}

impl<T> Weighted<T> {
    pub fn new(item: T, weight: u64) -> Self {
        Self { item, weight }
    }
}

/// Result of a truncation.
#[derive(Debug, Clone, PartialEq)]
pub struct Truncated<T> {
    /// Retained items in their original order.
    pub kept: Vec<T>,
    /// How many items were cut.
    pub dropped: usize,
}

/// Keeps the `capacity` heaviest items of a collection.
///
/// Ties are broken by position: an earlier item beats a later one of the
/// same weight. The retained items keep their input order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardinalityLimiter {
    capacity: usize,
}

impl Default for CardinalityLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_LIMITED_CAPACITY)
    }
}

impl CardinalityLimiter {
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Truncate `entries` (in first-appearance order) to the capacity.
    pub fn truncate<T>(&self, entries: Vec<Weighted<T>>) -> Truncated<T> {
        if entries.len() <= self.capacity {
            return Truncated {
                kept: entries.into_iter().map(|e| e.item).collect(),
                dropped: 0,
            };
        }

        let mut ranked: Vec<(usize, u64)> = entries
            .iter()
            .enumerate()
            .map(|(idx, e)| (idx, e.weight))
            .collect();
        // sort_by is stable, so equal weights stay in first-appearance order.
        ranked.sort_by(|a, b| b.1.cmp(&a.1));

        let mut keep = vec![false; entries.len()];
        for &(idx, _) in ranked.iter().take(self.capacity) {
            keep[idx] = true;
        }

        let dropped = entries.len() - self.capacity;
        let kept = entries
            .into_iter()
            .zip(keep)
            .filter_map(|(e, k)| k.then_some(e.item))
            .collect();
        Truncated { kept, dropped }
    }

    /// Cut a plain list to the capacity, keeping the head.
    pub fn truncate_list<T>(&self, mut items: Vec<T>) -> Truncated<T> {
        let dropped = items.len().saturating_sub(self.capacity);
        items.truncate(self.capacity);
        Truncated {
            kept: items,
            dropped,
        }
    }
}
