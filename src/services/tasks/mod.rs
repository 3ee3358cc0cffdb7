//! Task Scheduler
//!
//! Long-running commands as persisted background tasks.

pub mod registry;
pub mod scheduler;
pub mod store;

pub use registry::{MokaTaskRegistry, TaskHandle, TaskRegistry};
pub use scheduler::TaskScheduler;
pub use store::{TaskStore, INTERRUPTED_ERROR};
