pub mod driver;
pub mod event;
pub mod observer;
pub mod queue;
pub mod report;
pub mod state;
pub mod time;

pub use driver::{Coordinator, Phase, StopReason};
pub use event::{DispatchOutcome, SchedEvent};
pub use observer::Observer;
pub use report::Report;
pub use state::{
    IdleTracker, ProcState, ProcessRecord, SchedulerState, SeqId, SlotId, SlotTable, Totals,
};
pub use time::SimTime;
