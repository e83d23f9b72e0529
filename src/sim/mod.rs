pub mod threads;
pub mod transport;
pub mod worker;

pub use threads::ThreadTransport;
pub use transport::{Decision, ExitStatus, Reply, Request, Transport, WorkerExit, WorkerHandle};
