pub mod config;
pub mod core;
pub mod error;
pub mod scheduler;
pub mod sim;

pub use config::SimConfig;
pub use core::{Coordinator, Report, SchedEvent, SimTime, StopReason};
pub use sim::{ThreadTransport, Transport};
