use bitvec::prelude::*;
use rustc_hash::FxHashMap;

use super::time::SimTime;
use crate::scheduler::{BlockedSet, FeedbackLevels};
use crate::sim::WorkerHandle;

// Index into the slot table
pub type SlotId = usize;
// Spawn-order identity, only used for reporting
pub type SeqId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    Ready,
    Blocked,
    Terminated,
}

impl ProcState {
    /// Whether `self -> next` is a legal lifecycle edge.
    pub fn can_become(self, next: ProcState) -> bool {
        matches!(
            (self, next),
            (ProcState::Ready, ProcState::Ready)
                | (ProcState::Ready, ProcState::Blocked)
                | (ProcState::Ready, ProcState::Terminated)
                | (ProcState::Blocked, ProcState::Ready)
        )
    }
}

#[derive(Debug, Clone)]
pub struct ProcessRecord {
    pub slot: SlotId,
    pub handle: WorkerHandle,
    pub seq: SeqId,
    pub state: ProcState,
    /// Feedback level the job was last queued at.
    pub level: usize,
    pub cpu: SimTime,
    pub sys: SimTime,
    pub last_burst: SimTime,
    pub forked_at: SimTime,
    pub blocked_until: SimTime,
    pub ready_at: SimTime,
}

impl ProcessRecord {
    fn new(slot: SlotId, handle: WorkerHandle, seq: SeqId, now: SimTime) -> Self {
        Self {
            slot,
            handle,
            seq,
            state: ProcState::Ready,
            level: 0,
            cpu: SimTime::ZERO,
            sys: SimTime::ZERO,
            last_burst: SimTime::ZERO,
            forked_at: now,
            blocked_until: SimTime::ZERO,
            ready_at: now,
        }
    }

    pub fn set_state(&mut self, next: ProcState) {
        debug_assert!(
            self.state.can_become(next),
            "job {} cannot go from {:?} to {:?}",
            self.seq,
            self.state,
            next
        );
        self.state = next;
    }
}

/// Fixed-capacity record storage with a bitmap allocator.
#[derive(Debug)]
pub struct SlotTable {
    used: BitVec,
    records: Vec<Option<ProcessRecord>>,
}

impl SlotTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            used: bitvec![0; capacity],
            records: vec![None; capacity],
        }
    }

    pub fn capacity(&self) -> usize {
        self.records.len()
    }

    pub fn occupied_count(&self) -> usize {
        self.used.count_ones()
    }

    /// Lowest unoccupied slot, if any.
    pub fn lowest_free(&self) -> Option<SlotId> {
        self.used.first_zero()
    }

    pub fn is_occupied(&self, slot: SlotId) -> bool {
        self.used.get(slot).is_some_and(|bit| *bit)
    }

    fn occupy(&mut self, record: ProcessRecord) {
        let slot = record.slot;
        debug_assert!(!self.is_occupied(slot), "slot {slot} already occupied");
        self.used.set(slot, true);
        self.records[slot] = Some(record);
    }

    fn free(&mut self, slot: SlotId) -> Option<ProcessRecord> {
        if !self.is_occupied(slot) {
            return None;
        }
        self.used.set(slot, false);
        self.records[slot].take()
    }

    pub fn get(&self, slot: SlotId) -> Option<&ProcessRecord> {
        self.records.get(slot).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, slot: SlotId) -> Option<&mut ProcessRecord> {
        self.records.get_mut(slot).and_then(Option::as_mut)
    }

    pub fn occupied(&self) -> impl Iterator<Item = &ProcessRecord> + '_ {
        self.used.iter_ones().filter_map(|slot| self.get(slot))
    }

    pub(crate) fn bitmap(&self) -> &BitSlice {
        &self.used
    }
}

/// Two-state idle flag plus the accumulated idle total.
#[derive(Debug, Default, Clone)]
pub struct IdleTracker {
    since: Option<SimTime>,
    total: SimTime,
}

impl IdleTracker {
    /// Returns `true` if this call started a new idle period.
    pub fn on(&mut self, now: SimTime) -> bool {
        if self.since.is_some() {
            return false;
        }
        self.since = Some(now);
        true
    }

    /// Ends the current idle period and returns how long it lasted.
    pub fn off(&mut self, now: SimTime) -> Option<SimTime> {
        let since = self.since.take()?;
        let lasted = now - since;
        self.total += lasted;
        Some(lasted)
    }

    pub fn is_idle(&self) -> bool {
        self.since.is_some()
    }

    pub fn total(&self) -> SimTime {
        self.total
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Totals {
    pub turnaround: SimTime,
    pub wait: SimTime,
    pub sleep: SimTime,
}

/// Everything the coordinator mutates while scheduling.
#[derive(Debug)]
pub struct SchedulerState {
    pub clock: SimTime,
    pub slots: SlotTable,
    pub levels: FeedbackLevels,
    pub blocked: BlockedSet,
    pub idle: IdleTracker,
    pub totals: Totals,
    /// `None` once spawning has stopped for good.
    pub next_spawn: Option<SimTime>,
    pub spawned: u64,
    pub completed: u64,
    pub lost: u64,
    pub exited: u64,
    by_handle: FxHashMap<WorkerHandle, SlotId>,
}

impl SchedulerState {
    pub fn new(num_slots: usize, base_quantum: SimTime) -> Self {
        Self {
            clock: SimTime::ZERO,
            slots: SlotTable::new(num_slots),
            levels: FeedbackLevels::new(base_quantum, num_slots),
            blocked: BlockedSet::with_capacity(num_slots),
            idle: IdleTracker::default(),
            totals: Totals::default(),
            next_spawn: Some(SimTime::ZERO),
            spawned: 0,
            completed: 0,
            lost: 0,
            exited: 0,
            by_handle: FxHashMap::default(),
        }
    }

    pub fn now(&self) -> SimTime {
        self.clock
    }

    pub fn advance_time(&mut self, delta: SimTime) {
        self.clock += delta;
    }

    /// Jump the clock forward. Targets in the past leave it unchanged.
    pub fn jump_to(&mut self, to: SimTime) -> bool {
        if to <= self.clock {
            return false;
        }
        self.clock = to;
        true
    }

    /// Install a freshly spawned job in `slot` and return its sequence id.
    /// The caller queues it.
    pub fn admit(&mut self, slot: SlotId, handle: WorkerHandle) -> SeqId {
        let seq = self.spawned;
        self.spawned += 1;
        self.by_handle.insert(handle, slot);
        self.slots
            .occupy(ProcessRecord::new(slot, handle, seq, self.clock));
        seq
    }

    /// Clear a slot and forget its handle.
    pub fn release_slot(&mut self, slot: SlotId) -> Option<ProcessRecord> {
        let record = self.slots.free(slot)?;
        self.by_handle.remove(&record.handle);
        Some(record)
    }

    /// Pull a slot out of whatever queue holds it. Returns whether it was queued.
    pub fn detach(&mut self, slot: SlotId) -> bool {
        self.levels.remove(slot) || self.blocked.remove(slot)
    }

    pub fn slot_of(&self, handle: WorkerHandle) -> Option<SlotId> {
        self.by_handle.get(&handle).copied()
    }

    pub fn record(&self, slot: SlotId) -> Option<&ProcessRecord> {
        self.slots.get(slot)
    }

    pub fn record_mut(&mut self, slot: SlotId) -> Option<&mut ProcessRecord> {
        self.slots.get_mut(slot)
    }

    pub fn handles(&self) -> impl Iterator<Item = (WorkerHandle, SlotId)> + '_ {
        self.by_handle.iter().map(|(&h, &s)| (h, s))
    }
}
