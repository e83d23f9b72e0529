use slotmap::new_key_type;

use crate::core::SimTime;
use crate::error::TransportError;

new_key_type! {
    /// Routing identity of a live worker. Generation-checked, so a handle
    /// is never mistaken for a later worker that reuses its storage.
    pub struct WorkerHandle;
}

/// What a worker decided to do with its allotment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Ready,
    Blocked,
    Terminated,
}

/// Coordinator to worker. A zero allotment tells the worker to exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    pub allotment: SimTime,
}

impl Request {
    pub const STOP: Request = Request {
        allotment: SimTime::ZERO,
    };

    pub fn is_stop(&self) -> bool {
        self.allotment.is_zero()
    }
}

/// Worker to coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    pub sender: WorkerHandle,
    pub decision: Decision,
    pub used: SimTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Clean,
    Crashed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerExit {
    pub handle: WorkerHandle,
    pub status: ExitStatus,
}

/// Process-spawn and message-channel capabilities the coordinator relies on.
pub trait Transport {
    fn spawn(&mut self) -> Result<WorkerHandle, TransportError>;

    fn send(&mut self, to: WorkerHandle, request: Request) -> Result<(), TransportError>;

    /// Block until `from` replies.
    fn receive(&mut self, from: WorkerHandle) -> Result<Reply, TransportError>;

    /// Collect workers that have exited since the last call. Never blocks.
    fn reap(&mut self) -> Vec<WorkerExit>;

    /// Wait for every remaining worker to go away.
    fn release(&mut self) {}
}
