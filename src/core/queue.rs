use super::state::SlotId;
use crate::error::QueueError;

/// Bounded FIFO of slot indices that also supports removal from the middle.
///
/// Removal shifts every later element left, so relative order is kept. Queues
/// never hold more than the slot count, so the linear cost is irrelevant.
#[derive(Debug, Clone)]
pub struct SlotQueue {
    items: Vec<SlotId>,
    capacity: usize,
}

impl SlotQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn enqueue(&mut self, slot: SlotId) -> Result<(), QueueError> {
        if self.items.len() >= self.capacity {
            return Err(QueueError::CapacityExceeded {
                capacity: self.capacity,
            });
        }
        self.items.push(slot);
        Ok(())
    }

    pub fn peek(&self) -> Option<SlotId> {
        self.items.first().copied()
    }

    pub fn remove_at(&mut self, index: usize) -> Result<SlotId, QueueError> {
        if index >= self.items.len() {
            return Err(QueueError::OutOfRange {
                index,
                len: self.items.len(),
            });
        }
        Ok(self.items.remove(index))
    }

    pub fn pop_front(&mut self) -> Option<SlotId> {
        self.remove_at(0).ok()
    }

    pub fn position(&self, slot: SlotId) -> Option<usize> {
        self.items.iter().position(|&s| s == slot)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = SlotId> + '_ {
        self.items.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enqueue_fails_once_full() {
        let mut q = SlotQueue::with_capacity(2);
        q.enqueue(4).unwrap();
        q.enqueue(7).unwrap();
        assert_eq!(
            q.enqueue(1),
            Err(QueueError::CapacityExceeded { capacity: 2 })
        );
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn remove_at_preserves_order() {
        let mut q = SlotQueue::with_capacity(8);
        for slot in [3, 1, 4, 1, 5] {
            q.enqueue(slot).unwrap();
        }
        assert_eq!(q.remove_at(2), Ok(4));
        assert_eq!(q.iter().collect::<Vec<_>>(), vec![3, 1, 1, 5]);
        assert_eq!(q.peek(), Some(3));
    }

    #[test]
    fn remove_at_out_of_range() {
        let mut q = SlotQueue::with_capacity(4);
        q.enqueue(0).unwrap();
        assert_eq!(q.remove_at(1), Err(QueueError::OutOfRange { index: 1, len: 1 }));
        assert_eq!(q.pop_front(), Some(0));
        assert_eq!(q.pop_front(), None);
        assert_eq!(q.peek(), None);
    }
}
