use thiserror::Error;

use crate::core::SlotId;
use crate::sim::WorkerHandle;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue is full (capacity {capacity})")]
    CapacityExceeded { capacity: usize },
    #[error("index {index} out of range for queue of length {len}")]
    OutOfRange { index: usize, len: usize },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to spawn worker: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("worker {0:?} is not known to the transport")]
    UnknownWorker(WorkerHandle),
    #[error("failed to send request to worker {0:?}")]
    Send(WorkerHandle),
    #[error("reply channel disconnected")]
    Disconnected,
    #[error("worker {0:?} exited without replying")]
    WorkerGone(WorkerHandle),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("protocol violation from slot {slot}: {reason}")]
    Protocol { slot: SlotId, reason: String },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("slot count must be between 1 and {max}, got {got}")]
    Slots { got: usize, max: usize },
    #[error("base quantum must be non-zero")]
    ZeroQuantum,
    #[error("timestep must be non-zero")]
    ZeroTimestep,
}
