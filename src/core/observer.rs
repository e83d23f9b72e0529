use super::state::{ProcState, SchedulerState};
use super::time::SimTime;
use crate::scheduler::NUM_LEVELS;

/// Cross-checks the scheduler tables after every tick.
#[derive(Debug, Default)]
pub struct Observer {
    step: u64,
    last_clock: SimTime,
}

impl Observer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn steps(&self) -> u64 {
        self.step
    }

    pub fn observe(&mut self, state: &SchedulerState) {
        self.step += 1;

        debug_assert!(
            state.clock >= self.last_clock,
            "clock went backwards: {} -> {}",
            self.last_clock,
            state.clock
        );
        self.last_clock = state.clock;

        if cfg!(debug_assertions) {
            let problems = violations(state);
            debug_assert!(
                problems.is_empty(),
                "step {}: {}",
                self.step,
                problems.join("; ")
            );
        }
    }
}

/// Every way the tables currently disagree with each other.
pub fn violations(state: &SchedulerState) -> Vec<String> {
    let mut problems = Vec::new();
    let mut seen = vec![false; state.slots.capacity()];

    let mut claim = |slot: usize, place: &str, problems: &mut Vec<String>| {
        match seen.get_mut(slot) {
            Some(true) => problems.push(format!("slot {slot} queued twice (again in {place})")),
            Some(flag) => *flag = true,
            None => problems.push(format!("slot {slot} in {place} is out of range")),
        }
    };

    for level in 0..NUM_LEVELS {
        for slot in state.levels.queue(level).iter() {
            claim(slot, "a ready level", &mut problems);
            match state.record(slot).map(|r| r.state) {
                Some(ProcState::Ready) => {}
                other => problems.push(format!("slot {slot} on level {level} is {other:?}")),
            }
        }
    }

    for slot in state.blocked.iter() {
        claim(slot, "the blocked set", &mut problems);
        match state.record(slot).map(|r| r.state) {
            Some(ProcState::Blocked) => {}
            other => problems.push(format!("blocked slot {slot} is {other:?}")),
        }
    }

    for record in state.slots.occupied() {
        if !seen.get(record.slot).copied().unwrap_or(false) {
            problems.push(format!(
                "occupied slot {} (job {}) is in no queue",
                record.slot, record.seq
            ));
        }
    }

    if state.slots.bitmap().count_ones() != state.slots.occupied().count() {
        problems.push("slot bitmap disagrees with stored records".to_string());
    }

    problems
}
