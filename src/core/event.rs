use crate::core::{SeqId, SimTime, SlotId};
use crate::sim::WorkerHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Terminated,
    Blocked { until: SimTime },
    Requeued { level: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedEvent {
    Spawned {
        slot: SlotId,
        job: SeqId,
        at: SimTime,
    },
    SpawnFailed {
        at: SimTime,
    },
    // No free slot when a spawn was due
    SlotsExhausted {
        at: SimTime,
    },
    SpawnQuotaExhausted {
        at: SimTime,
    },
    Unblocked {
        slot: SlotId,
        job: SeqId,
        slept: SimTime,
        at: SimTime,
    },
    Dispatched {
        slot: SlotId,
        job: SeqId,
        level: usize,
        used: SimTime,
        at: SimTime,
        outcome: DispatchOutcome,
    },
    // Job dropped from every queue and its slot freed
    JobLost {
        slot: SlotId,
        job: SeqId,
        at: SimTime,
    },
    // Nothing ready; `jumped_to` is where the clock was moved, if anywhere
    Idle {
        from: SimTime,
        jumped_to: Option<SimTime>,
    },
    WorkerExited {
        handle: WorkerHandle,
        slot: Option<SlotId>,
    },
}
