//! Detection Counter Polling
//!
//! Keeps at most one recurring task alive that fetches the backend's
//! detection counters and renders them onto the display board.

mod scheduler;

pub use scheduler::{PollCounters, PollSnapshot, PollingScheduler, SchedulerConfig};
