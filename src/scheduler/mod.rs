pub mod blocked;
pub mod mlfq;

pub use blocked::BlockedSet;
pub use mlfq::{FeedbackLevels, NUM_LEVELS};
