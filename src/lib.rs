pub mod core;
pub mod error;
pub mod scheduler;
pub mod sim;

use average::{Estimate, Mean};

pub use crate::core::{JobId, JobState, Ticks};
pub use error::SimError;
pub use scheduler::{
    MlfqConfig, MlfqScheduler, Policy, PolicyReport, RoundRobinScheduler, SchedError, Scheduler,
};
pub use sim::{JobSpec, RunOutcome, Sim, SimReport};

/// Mean of the samples, 0 when there are none.
pub(crate) fn avg(iter: impl Iterator<Item = f64>) -> f64 {
    iter.collect::<Mean>().estimate()
}
