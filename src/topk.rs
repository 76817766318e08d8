//! Bounded top-k selector.
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// One accepted candidate: a vector id and its distance to the query,
/// tagged with the order it was inserted in so ties can be broken
/// deterministically.
#[derive(Debug, Clone)]
struct Candidate {
    id: String,
    dist: f64,
    seq: u64,
}

impl PartialEq for Candidate {
    fn eq(&self, other: &Self) -> bool {
        self.dist == other.dist
    }
}
impl Eq for Candidate {}

impl PartialOrd for Candidate {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate {
    fn cmp(&self, other: &Self) -> Ordering {
        // NaN distances can't arise from a real L2 computation; treat any
        // that do as equal rather than panicking mid-query.
        self.dist
            .partial_cmp(&other.dist)
            .unwrap_or(Ordering::Equal)
    }
}

/// Streaming selector of the k smallest-distance `(id, distance)` pairs
/// seen so far, backed by a bounded max-heap.
///
/// The heap's root is always the current worst accepted candidate, so
/// `insert` can decide in O(1) whether a new candidate even needs to be
/// considered, and evicts in O(log k) when it does.
pub struct BoundedTopK {
    capacity: usize,
    heap: BinaryHeap<Candidate>,
    next_seq: u64,
}

impl BoundedTopK {
    /// Creates an empty selector retaining at most `capacity` items.
    ///
    /// # Panics
    /// Panics if `capacity == 0`; a query always asks for at least 1
    /// neighbour.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "BoundedTopK capacity must be at least 1");
        BoundedTopK {
            capacity,
            heap: BinaryHeap::with_capacity(capacity),
            next_seq: 0,
        }
    }

    /// Number of items currently retained (`<= capacity`).
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Considers a new `(id, dist)` pair.
    ///
    /// If fewer than `capacity` items have been accepted so far, the pair
    /// is always kept. Otherwise it replaces the current worst candidate
    /// only if strictly closer; equal distances never displace an already
    /// accepted candidate.
    pub fn insert(&mut self, id: impl Into<String>, dist: f64) {
        let seq = self.next_seq;
        self.next_seq += 1;
        let candidate = Candidate {
            id: id.into(),
            dist,
            seq,
        };

        if self.heap.len() < self.capacity {
            self.heap.push(candidate);
            return;
        }
        if let Some(worst) = self.heap.peek() {
            if candidate.dist < worst.dist {
                self.heap.pop();
                self.heap.push(candidate);
            }
        }
    }

    /// Drains the selector, returning its contents in ascending distance
    /// order. Ties are broken by insertion order (earlier insertions sort
    /// first) — a stable sort on distance alone achieves this since `seq`
    /// is monotonically increasing with insertion.
    ///
    /// Single-use: the selector is empty after this call.
    pub fn drain_sorted(mut self) -> Vec<(String, f64)> {
        let mut items: Vec<Candidate> = self.heap.drain().collect();
        items.sort_by(|a, b| {
            a.dist
                .partial_cmp(&b.dist)
                .unwrap_or(Ordering::Equal)
                .then(a.seq.cmp(&b.seq))
        });
        items.into_iter().map(|c| (c.id, c.dist)).collect()
    }
}
