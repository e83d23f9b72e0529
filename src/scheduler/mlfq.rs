use tracing::error;

use crate::core::{ProcState, SimTime, SlotId, SlotTable, queue::SlotQueue};
use crate::error::QueueError;

pub const NUM_LEVELS: usize = 4;

/// The ready side of the scheduler: one FIFO per priority level.
///
/// Level 0 is scanned first and has the smallest quantum; each following level
/// doubles it. A job that uses its whole quantum sinks one level per dispatch
/// until it reaches the last one.
#[derive(Debug, Clone)]
pub struct FeedbackLevels {
    queues: [SlotQueue; NUM_LEVELS],
    quanta: [SimTime; NUM_LEVELS],
}

impl FeedbackLevels {
    pub fn new(base_quantum: SimTime, capacity: usize) -> Self {
        Self {
            queues: std::array::from_fn(|_| SlotQueue::with_capacity(capacity)),
            quanta: std::array::from_fn(|level| base_quantum.scaled(1 << level)),
        }
    }

    pub fn quantum(&self, level: usize) -> SimTime {
        self.quanta[level]
    }

    pub fn enqueue(&mut self, level: usize, slot: SlotId) -> Result<(), QueueError> {
        self.queues[level].enqueue(slot)
    }

    pub fn head(&self, level: usize) -> Option<SlotId> {
        self.queues[level].peek()
    }

    pub fn pop(&mut self, level: usize) -> Option<SlotId> {
        self.queues[level].pop_front()
    }

    pub fn queue(&self, level: usize) -> &SlotQueue {
        &self.queues[level]
    }

    /// Highest-priority level whose head is Ready.
    ///
    /// A head in any other state means the tables are out of sync; that level
    /// is skipped.
    pub fn select_ready(&self, slots: &SlotTable, now: SimTime) -> Option<usize> {
        (0..NUM_LEVELS).find(|&level| {
            let Some(slot) = self.head(level) else {
                return false;
            };
            match slots.get(slot).map(|record| record.state) {
                Some(ProcState::Ready) => true,
                state => {
                    error!(level, slot, ?state, %now, "queue head is not ready");
                    debug_assert!(false, "head of level {level} (slot {slot}) is {state:?}");
                    false
                }
            }
        })
    }

    /// Level a job returns to after a Ready reply.
    pub fn next_level(&self, level: usize, used: SimTime) -> usize {
        if used == self.quanta[level] {
            (level + 1).min(NUM_LEVELS - 1)
        } else {
            level
        }
    }

    pub fn level_of(&self, slot: SlotId) -> Option<usize> {
        self.queues.iter().position(|q| q.position(slot).is_some())
    }

    pub fn remove(&mut self, slot: SlotId) -> bool {
        for queue in &mut self.queues {
            if let Some(index) = queue.position(slot) {
                return queue.remove_at(index).is_ok();
            }
        }
        false
    }

    pub fn is_empty(&self) -> bool {
        self.queues.iter().all(SlotQueue::is_empty)
    }

    pub fn len(&self) -> usize {
        self.queues.iter().map(SlotQueue::len).sum()
    }
}
