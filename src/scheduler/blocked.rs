use crate::core::{SimTime, SlotId, SlotTable, queue::SlotQueue};
use crate::error::QueueError;

/// Jobs waiting on simulated I/O, kept in the order they blocked.
///
/// Neither the unblock scan nor the idle time-jump reorders by wake time: an
/// entry that blocked earlier is always considered first, even if a later
/// entry is due sooner.
#[derive(Debug, Clone)]
pub struct BlockedSet {
    queue: SlotQueue,
}

impl BlockedSet {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            queue: SlotQueue::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, slot: SlotId) -> Result<(), QueueError> {
        self.queue.enqueue(slot)
    }

    pub fn front(&self) -> Option<SlotId> {
        self.queue.peek()
    }

    /// Position of the first entry, in block order, whose wake time has passed.
    pub fn first_due(&self, now: SimTime, slots: &SlotTable) -> Option<usize> {
        self.queue.iter().position(|slot| {
            slots
                .get(slot)
                .is_some_and(|record| record.blocked_until <= now)
        })
    }

    /// Wake time of the entry that blocked first.
    pub fn front_wake_time(&self, slots: &SlotTable) -> Option<SimTime> {
        self.front()
            .and_then(|slot| slots.get(slot))
            .map(|record| record.blocked_until)
    }

    pub fn remove_at(&mut self, index: usize) -> Result<SlotId, QueueError> {
        self.queue.remove_at(index)
    }

    pub fn remove(&mut self, slot: SlotId) -> bool {
        match self.queue.position(slot) {
            Some(index) => self.queue.remove_at(index).is_ok(),
            None => false,
        }
    }

    pub fn contains(&self, slot: SlotId) -> bool {
        self.queue.position(slot).is_some()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = SlotId> + '_ {
        self.queue.iter()
    }
}
