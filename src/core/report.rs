use std::fmt;

use super::driver::StopReason;
use super::state::SchedulerState;
use super::time::SimTime;

/// End-of-run statistics. Averages are taken over every job spawned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub time_taken: SimTime,
    pub avg_turnaround: SimTime,
    pub avg_wait: SimTime,
    pub avg_sleep: SimTime,
    pub idle_total: SimTime,
    pub spawned: u64,
    pub completed: u64,
    pub lost: u64,
    pub reason: StopReason,
}

impl Report {
    pub fn new(state: &SchedulerState, reason: StopReason) -> Self {
        let totals = state.totals;
        Self {
            time_taken: state.now(),
            avg_turnaround: totals.turnaround.div_by(state.spawned),
            avg_wait: totals.wait.div_by(state.spawned),
            avg_sleep: totals.sleep.div_by(state.spawned),
            idle_total: state.idle.total(),
            spawned: state.spawned,
            completed: state.completed,
            lost: state.lost,
            reason,
        }
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Time taken: {}", self.time_taken)?;
        writeln!(f, "Turnaround time (average): {}", self.avg_turnaround)?;
        writeln!(f, "Wait time (average): {}", self.avg_wait)?;
        writeln!(f, "I/O time (average): {}", self.avg_sleep)?;
        writeln!(f, "CPU idle time (total): {}", self.idle_total)?;
        writeln!(
            f,
            "Jobs: {} spawned, {} completed, {} lost",
            self.spawned, self.completed, self.lost
        )?;
        write!(f, "Stopped: {}", self.reason)
    }
}
