pub mod debounce;
pub mod inflight;
pub mod processor;
pub mod scheduler;

pub use processor::{PassSummary, TimelineProcessor};
pub use scheduler::{ChangeScheduler, PageEvent};
