pub mod mlfq;
pub mod rr;

use std::collections::BTreeMap;
use thiserror::Error;

use crate::core::state::{JobId, Ticks};
pub use mlfq::{MlfqConfig, MlfqScheduler};
pub use rr::RoundRobinScheduler;

/// Protocol violations between the engine and a scheduling policy.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedError {
    #[error("job {0} is unknown to the scheduler")]
    UnknownJob(JobId),

    #[error("job {0} was already created")]
    AlreadyKnown(JobId),

    #[error("job {0} is already queued")]
    AlreadyQueued(JobId),

    #[error("job {job} was not dispatched by the scheduler (dispatched: {dispatched:?})")]
    NotDispatched {
        job: JobId,
        dispatched: Option<JobId>,
    },

    #[error("invalid scheduler configuration: {0}")]
    Config(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dispatch {
    pub job: JobId,
    pub quantum: Ticks,
}

/// Average and peak of a sampled ready-queue length.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct QueueStats {
    pub samples: usize,
    pub avg_len: f64,
    pub max_len: usize,
}

impl QueueStats {
    pub fn from_samples(samples: &[usize]) -> Self {
        Self {
            samples: samples.len(),
            avg_len: crate::avg(samples.iter().map(|&len| len as f64)),
            max_len: samples.iter().copied().max().unwrap_or(0),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LevelReport {
    pub quantum: Ticks,
    pub queue: QueueStats,
}

/// Policy-specific statistics, produced once the run is over.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyReport {
    RoundRobin {
        quantum: Ticks,
        preemptions: BTreeMap<JobId, u64>,
        queue: QueueStats,
    },
    Mlfq {
        levels: Vec<LevelReport>,
        overflows: u64,
        expansions: usize,
    },
}

/// A scheduling policy driven by the simulator.
///
/// The engine reports every job transition exactly once and in order.
/// `job_quantum_expired`, `job_preempted`, `job_blocked` and `job_terminated`
/// only ever name the job most recently returned by `next_job_and_quantum`.
pub trait Scheduler {
    /// First appearance of a job; it is ready.
    fn job_created(&mut self, job: JobId) -> Result<(), SchedError>;

    /// Job finished an I/O burst and is ready again.
    fn job_ready(&mut self, job: JobId) -> Result<(), SchedError>;

    fn job_quantum_expired(&mut self, job: JobId) -> Result<(), SchedError>;

    /// Evicted because `needs_resched` returned true; still ready.
    fn job_preempted(&mut self, job: JobId) -> Result<(), SchedError>;

    fn job_terminated(&mut self, job: JobId) -> Result<(), SchedError>;

    /// Finished its CPU burst within the quantum and moved to I/O.
    fn job_blocked(&mut self, job: JobId) -> Result<(), SchedError>;

    fn needs_resched(&self) -> bool {
        false
    }

    fn next_job_and_quantum(&mut self) -> Option<Dispatch>;

    fn report(&self) -> PolicyReport;
}

/// The policies selectable at startup.
#[derive(Debug)]
pub enum Policy {
    RoundRobin(RoundRobinScheduler),
    Mlfq(MlfqScheduler),
}

impl From<RoundRobinScheduler> for Policy {
    fn from(sched: RoundRobinScheduler) -> Self {
        Self::RoundRobin(sched)
    }
}

impl From<MlfqScheduler> for Policy {
    fn from(sched: MlfqScheduler) -> Self {
        Self::Mlfq(sched)
    }
}

macro_rules! delegate {
    ($self:ident, $s:ident => $call:expr) => {
        match $self {
            Policy::RoundRobin($s) => $call,
            Policy::Mlfq($s) => $call,
        }
    };
}

impl Scheduler for Policy {
    fn job_created(&mut self, job: JobId) -> Result<(), SchedError> {
        delegate!(self, s => s.job_created(job))
    }

    fn job_ready(&mut self, job: JobId) -> Result<(), SchedError> {
        delegate!(self, s => s.job_ready(job))
    }

    fn job_quantum_expired(&mut self, job: JobId) -> Result<(), SchedError> {
        delegate!(self, s => s.job_quantum_expired(job))
    }

    fn job_preempted(&mut self, job: JobId) -> Result<(), SchedError> {
        delegate!(self, s => s.job_preempted(job))
    }

    fn job_terminated(&mut self, job: JobId) -> Result<(), SchedError> {
        delegate!(self, s => s.job_terminated(job))
    }

    fn job_blocked(&mut self, job: JobId) -> Result<(), SchedError> {
        delegate!(self, s => s.job_blocked(job))
    }

    fn needs_resched(&self) -> bool {
        delegate!(self, s => s.needs_resched())
    }

    fn next_job_and_quantum(&mut self) -> Option<Dispatch> {
        delegate!(self, s => s.next_job_and_quantum())
    }

    fn report(&self) -> PolicyReport {
        delegate!(self, s => s.report())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_stats_of_no_samples_are_zero() {
        let stats = QueueStats::from_samples(&[]);
        assert_eq!(stats.samples, 0);
        assert_eq!(stats.max_len, 0);
        assert_eq!(stats.avg_len, 0.0);
    }

    #[test]
    fn queue_stats_average_and_peak() {
        let stats = QueueStats::from_samples(&[0, 2, 4, 2]);
        assert_eq!(stats.samples, 4);
        assert_eq!(stats.max_len, 4);
        assert!((stats.avg_len - 2.0).abs() < 1e-9);
    }

    #[test]
    fn policy_forwards_to_the_selected_variant() {
        let mut policy = Policy::from(RoundRobinScheduler::new(3).unwrap());
        policy.job_created(4).unwrap();
        assert!(!policy.needs_resched());
        assert_eq!(
            policy.next_job_and_quantum(),
            Some(Dispatch { job: 4, quantum: 3 })
        );
        assert!(matches!(policy.report(), PolicyReport::RoundRobin { .. }));
    }
}
