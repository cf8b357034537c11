use std::cmp::Reverse;
use std::collections::BinaryHeap;

use serde::Serialize;

/// A single labelled count under a [`FacetResult`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LabelAndValue {
    pub label: String,
    pub value: u64,
}

/// The aggregation answer for one dimension (or one path under it).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetResult {
    /// The dimension the counts were requested for.
    pub dim: String,
    /// The path under the dimension, empty at dimension level.
    pub path: Vec<String>,
    /// The count for the requested path itself.
    pub value: u64,
    /// The number of children with a non-zero count.
    pub child_count: u32,
    /// The selected children, by count descending then label ascending.
    pub label_values: Vec<LabelAndValue>,
}

/// # Important
/// The field order drives the derived `Ord`: entries compare by count
/// first, then by reversed key, so that inside a min-heap the smallest
/// entry is the lowest count carrying the greatest key.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
struct Entry<K> {
    count: u64,
    key: Reverse<K>,
}

/// A bounded selection of the `capacity` best `(count, key)` pairs.
///
/// Popping the backing min-heap yields entries by count ascending (ties by
/// key descending), so the drained output is by count descending with ties
/// by key ascending, which is the user-visible order.
pub(crate) struct TopEntries<K> {
    capacity: usize,
    heap: BinaryHeap<Reverse<Entry<K>>>,
}

impl<K: Ord> TopEntries<K> {
    pub fn new(capacity: usize) -> TopEntries<K> {
        TopEntries { capacity, heap: BinaryHeap::with_capacity(capacity) }
    }

    pub fn push(&mut self, count: u64, key: K) {
        let entry = Entry { count, key: Reverse(key) };
        if self.heap.len() < self.capacity {
            self.heap.push(Reverse(entry));
        } else if let Some(Reverse(bottom)) = self.heap.peek() {
            if entry > *bottom {
                self.heap.pop();
                self.heap.push(Reverse(entry));
            }
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// Drains into `(count, key)` pairs by count descending, key ascending.
    pub fn into_sorted(self) -> Vec<(u64, K)> {
        let mut out = Vec::with_capacity(self.heap.len());
        let mut heap = self.heap;
        while let Some(Reverse(Entry { count, key: Reverse(key) })) = heap.pop() {
            out.push((count, key));
        }
        out.reverse();
        out
    }
}

#[cfg(test)]
mod tests {
    use big_s::S;

    use super::*;

    #[test]
    fn keeps_the_highest_counts() {
        let mut top = TopEntries::new(2);
        for (count, key) in [(1, S("a")), (5, S("b")), (3, S("c")), (4, S("d"))] {
            top.push(count, key);
        }
        assert_eq!(top.into_sorted(), vec![(5, S("b")), (4, S("d"))]);
    }

    #[test]
    fn breaks_ties_by_ascending_key() {
        let mut top = TopEntries::new(3);
        for key in ["d", "b", "c", "a"] {
            top.push(7, S(key));
        }
        assert_eq!(top.into_sorted(), vec![(7, S("a")), (7, S("b")), (7, S("c"))]);
    }

    #[test]
    fn eviction_prefers_smaller_keys_on_equal_counts() {
        let mut top = TopEntries::new(2);
        top.push(7, S("c"));
        top.push(7, S("b"));
        top.push(7, S("a"));
        assert_eq!(top.into_sorted(), vec![(7, S("a")), (7, S("b"))]);
    }

    #[test]
    fn results_serialize_to_plain_json() {
        let result = FacetResult {
            dim: S("colour"),
            path: vec![],
            value: 3,
            child_count: 2,
            label_values: vec![
                LabelAndValue { label: S("blue"), value: 2 },
                LabelAndValue { label: S("red"), value: 1 },
            ],
        };
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            serde_json::json!({
                "dim": "colour",
                "path": [],
                "value": 3,
                "child_count": 2,
                "label_values": [
                    { "label": "blue", "value": 2 },
                    { "label": "red", "value": 1 },
                ],
            }),
        );
    }

    #[test]
    fn works_with_ordinal_keys() {
        let mut top = TopEntries::new(2);
        for (count, ord) in [(2, 10u32), (2, 3), (1, 1)] {
            top.push(count, ord);
        }
        assert_eq!(top.into_sorted(), vec![(2, 3), (2, 10)]);
    }
}
