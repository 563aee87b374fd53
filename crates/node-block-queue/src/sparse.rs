//! The sparse window itself: a fixed-capacity array indexed by
//! `index mod capacity`, shared by the block queue and the header queue.
//!
//! Out-of-order items fill slots as they arrive; a watermark (`next_index`)
//! tracks the lowest index not yet drained. `drain_contiguous` walks
//! forward from the watermark for as long as consecutive slots are filled,
//! returning them in order and advancing the watermark past them. A gap at
//! the watermark stops the drain even if later slots are filled, since a
//! single missing block must not let later ones jump ahead of it onto the
//! chain.

use parking_lot::Mutex;

use crate::errors::BlockQueueError;

pub trait Indexed {
    fn queue_index(&self) -> u32;
}

struct Inner<T> {
    slots: Vec<Option<T>>,
    /// Lowest index not yet drained. Items below this are rejected as
    /// already applied; items `capacity` or more above it don't fit in the
    /// window yet and are rejected so the caller can re-request them later.
    next_index: u32,
}

pub struct SparseQueue<T> {
    capacity: usize,
    inner: Mutex<Inner<T>>,
}

impl<T: Indexed> SparseQueue<T> {
    pub fn new(capacity: usize, next_index: u32) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self {
            capacity,
            inner: Mutex::new(Inner { slots, next_index }),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The lowest index this queue still expects; everything below it has
    /// already been drained.
    pub fn watermark(&self) -> u32 {
        self.inner.lock().next_index
    }

    /// Number of slots currently holding an item, queued but not yet drained.
    pub fn len(&self) -> usize {
        self.inner.lock().slots.iter().filter(|s| s.is_present()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn put(&self, item: T) -> Result<(), BlockQueueError> {
        let index = item.queue_index();
        let mut inner = self.inner.lock();
        if index < inner.next_index {
            return Err(BlockQueueError::AlreadyApplied { index, tip: inner.next_index.wrapping_sub(1) });
        }
        if index >= inner.next_index + self.capacity as u32 {
            return Err(BlockQueueError::TooFarAhead { index, capacity: self.capacity, next: inner.next_index });
        }
        let slot = (index as usize) % self.capacity;
        inner.slots[slot] = Some(item);
        Ok(())
    }

    /// Drains every item starting at the watermark for as long as slots are
    /// filled contiguously, advancing the watermark past what's returned.
    pub fn drain_contiguous(&self) -> Vec<T> {
        let mut inner = self.inner.lock();
        let mut drained = Vec::new();
        loop {
            let slot = (inner.next_index as usize) % self.capacity;
            match inner.slots[slot].take() {
                Some(item) if item.queue_index() == inner.next_index => {
                    inner.next_index += 1;
                    drained.push(item);
                }
                Some(other) => {
                    // Slot held a stale or out-of-window item left over from
                    // a prior wraparound; put it back untouched and stop.
                    inner.slots[slot] = Some(other);
                    break;
                }
                None => break,
            }
        }
        drained
    }
}

trait SlotExt {
    fn is_present(&self) -> bool;
}

impl<T> SlotExt for Option<T> {
    fn is_present(&self) -> bool {
        self.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Eq, Clone, Copy)]
    struct Item(u32);
    impl Indexed for Item {
        fn queue_index(&self) -> u32 {
            self.0
        }
    }

    #[test]
    fn out_of_order_arrivals_drain_in_order_once_contiguous() {
        let q = SparseQueue::new(8, 0);
        q.put(Item(2)).unwrap();
        q.put(Item(1)).unwrap();
        assert!(q.drain_contiguous().is_empty()); // index 0 still missing
        q.put(Item(0)).unwrap();
        assert_eq!(q.drain_contiguous(), vec![Item(0), Item(1), Item(2)]);
        assert_eq!(q.watermark(), 3);
    }

    #[test]
    fn gap_blocks_later_items_from_draining() {
        let q = SparseQueue::new(8, 0);
        q.put(Item(0)).unwrap();
        q.put(Item(1)).unwrap();
        q.put(Item(3)).unwrap(); // index 2 missing
        assert_eq!(q.drain_contiguous(), vec![Item(0), Item(1)]);
        assert_eq!(q.watermark(), 2);
        assert_eq!(q.len(), 1); // item 3 still queued
    }

    #[test]
    fn already_applied_index_is_rejected() {
        let q = SparseQueue::new(8, 5);
        match q.put(Item(4)) {
            Err(BlockQueueError::AlreadyApplied { index: 4, tip: 4 }) => {}
            other => panic!("expected AlreadyApplied, got {other:?}"),
        }
    }

    #[test]
    fn index_beyond_capacity_window_is_rejected() {
        let q = SparseQueue::new(4, 0);
        match q.put(Item(4)) {
            Err(BlockQueueError::TooFarAhead { index: 4, capacity: 4, next: 0 }) => {}
            other => panic!("expected TooFarAhead, got {other:?}"),
        }
        q.put(Item(3)).unwrap(); // last index inside the window
    }

    #[test]
    fn wraparound_reuses_slots_after_draining() {
        let q = SparseQueue::new(2, 0);
        q.put(Item(0)).unwrap();
        q.put(Item(1)).unwrap();
        assert_eq!(q.drain_contiguous(), vec![Item(0), Item(1)]);
        q.put(Item(2)).unwrap(); // same slot as index 0, now free
        q.put(Item(3)).unwrap();
        assert_eq!(q.drain_contiguous(), vec![Item(2), Item(3)]);
    }
}
