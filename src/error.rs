use thiserror::Error;

use crate::core::state::{JobId, JobState, Ticks};
use crate::scheduler::SchedError;

/// Fatal engine errors. Any of these halts the run without a report.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SimError {
    #[error("job {0} is defined more than once")]
    DuplicateJob(JobId),

    #[error("job {job} is invalid: {reason}")]
    InvalidJob { job: JobId, reason: String },

    #[error("job {0} does not exist")]
    UnknownJob(JobId),

    #[error("scheduler picked job {job} in state {state}")]
    NotReady { job: JobId, state: JobState },

    #[error("job {job} burst went negative at t={now}")]
    BurstUnderflow { job: JobId, now: Ticks },

    #[error("job {job} schedules an event past the end of time at t={now}")]
    TimeOverflow { job: JobId, now: Ticks },

    #[error("job {job} has no burst left to run")]
    NoBurst { job: JobId },

    #[error("job {job} already has a pending event")]
    PendingEvent { job: JobId },

    #[error("scheduler protocol violation: {0}")]
    Scheduler(#[from] SchedError),
}
