pub mod driver;
pub mod event;
pub mod observer;
pub mod state;

pub use driver::SchedCore;
pub use event::{Event, EventKey, EventKind, Timeline};
pub use observer::Observer;
pub use state::{Job, JobId, JobState, SimCtx, Ticks};
