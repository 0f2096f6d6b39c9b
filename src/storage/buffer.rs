//! Bounded FIFO buffer with lock-free snapshot reads.
//!
//! Writers serialize on a small mutex and publish a fresh vector through
//! `ArcSwap`; readers load the current vector without locking. A snapshot
//! is never mutated after publication, so offsets into it stay stable while
//! ingestion continues.

use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::Arc;

/// Immutable view of a buffer at one point in time, oldest first
pub type Snapshot<T> = Arc<Vec<Arc<T>>>;

#[derive(Debug)]
pub struct SnapshotBuffer<T> {
    capacity: usize,
    items: ArcSwap<Vec<Arc<T>>>,
    writer: Mutex<()>,
}

impl<T> SnapshotBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            items: ArcSwap::from_pointee(Vec::new()),
            writer: Mutex::new(()),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends `batch` and evicts the oldest items beyond capacity.
    ///
    /// Returns the evicted items, oldest first.
    pub fn push_batch(&self, batch: Vec<Arc<T>>) -> Vec<Arc<T>> {
        if batch.is_empty() {
            return Vec::new();
        }

        let _guard = self.writer.lock();
        let current = self.items.load_full();

        let total = current.len() + batch.len();
        let overflow = total.saturating_sub(self.capacity);

        let mut evicted = Vec::with_capacity(overflow);
        let mut next = Vec::with_capacity(total.min(self.capacity));
        for (i, item) in current.iter().chain(batch.iter()).enumerate() {
            if i < overflow {
                evicted.push(Arc::clone(item));
            } else {
                next.push(Arc::clone(item));
            }
        }

        self.items.store(Arc::new(next));
        evicted
    }

    /// Removes every item matching `predicate`
    pub fn retain<F>(&self, mut predicate: F)
    where
        F: FnMut(&T) -> bool,
    {
        let _guard = self.writer.lock();
        let current = self.items.load_full();
        if current.iter().all(|item| predicate(item)) {
            return;
        }
        let next: Vec<Arc<T>> = current
            .iter()
            .filter(|item| predicate(item))
            .map(Arc::clone)
            .collect();
        self.items.store(Arc::new(next));
    }

    /// Current contents, oldest first
    pub fn snapshot(&self) -> Snapshot<T> {
        self.items.load_full()
    }

    pub fn len(&self) -> usize {
        self.items.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.load().is_empty()
    }

    /// Returns true once the buffer has reached capacity
    pub fn is_full(&self) -> bool {
        self.len() >= self.capacity
    }

    pub fn clear(&self) {
        let _guard = self.writer.lock();
        self.items.store(Arc::new(Vec::new()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push(buffer: &SnapshotBuffer<u32>, values: &[u32]) -> Vec<u32> {
        buffer
            .push_batch(values.iter().map(|v| Arc::new(*v)).collect())
            .iter()
            .map(|v| **v)
            .collect()
    }

    fn contents(buffer: &SnapshotBuffer<u32>) -> Vec<u32> {
        buffer.snapshot().iter().map(|v| **v).collect()
    }

    #[test]
    fn test_fifo_eviction() {
        let buffer = SnapshotBuffer::new(3);
        assert!(push(&buffer, &[1, 2]).is_empty());
        assert_eq!(push(&buffer, &[3, 4]), vec![1]);
        assert_eq!(contents(&buffer), vec![2, 3, 4]);
        assert!(buffer.is_full());
    }

    #[test]
    fn test_batch_larger_than_capacity() {
        let buffer = SnapshotBuffer::new(2);
        push(&buffer, &[1]);
        assert_eq!(push(&buffer, &[2, 3, 4]), vec![1, 2]);
        assert_eq!(contents(&buffer), vec![3, 4]);
    }

    #[test]
    fn test_snapshot_is_stable_under_writes() {
        let buffer = SnapshotBuffer::new(10);
        push(&buffer, &[1, 2, 3]);
        let snapshot = buffer.snapshot();

        push(&buffer, &[4, 5]);
        buffer.retain(|v| *v != 2);

        let page: Vec<u32> = snapshot.iter().skip(1).take(2).map(|v| **v).collect();
        assert_eq!(page, vec![2, 3]);
        assert_eq!(contents(&buffer), vec![1, 3, 4, 5]);
    }

    #[test]
    fn test_clear() {
        let buffer = SnapshotBuffer::new(4);
        push(&buffer, &[1, 2]);
        buffer.clear();
        assert!(buffer.is_empty());
    }
}
