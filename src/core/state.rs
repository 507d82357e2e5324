use rustc_hash::FxHashMap;
use std::collections::VecDeque;
use std::fmt;

use super::event::EventKey;
use crate::error::SimError;

pub type JobId = u64;
pub type Ticks = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Ready,
    Running,
    Blocked,
    Terminated,
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ready => "Ready",
            Self::Running => "Running",
            Self::Blocked => "Blocked",
            Self::Terminated => "Terminated",
        };
        f.write_str(name)
    }
}

/// One simulated process.
///
/// `bursts` alternates CPU and I/O lengths starting with CPU; the front entry is
/// the burst in progress and is decremented in place while the job runs.
#[derive(Debug)]
pub struct Job {
    pub id: JobId,
    pub state: JobState,
    pub bursts: VecDeque<Ticks>,
    pub arrival_time: Ticks,
    pub wait_time: Ticks,
    pub last_ready: Ticks,
    pub completion_time: Option<Ticks>,
    /// Set once the arrival event has been handled.
    pub arrived: bool,

    // Baseline stats, fixed at creation
    pub n_bursts: usize,
    pub run_time: Ticks,
    pub io_time: Ticks,

    pub(crate) pending: Option<EventKey>,
}

impl Job {
    pub fn is_terminated(&self) -> bool {
        self.state == JobState::Terminated
    }
}

/// Clock, job table and the single CPU slot.
#[derive(Debug, Default)]
pub struct SimCtx {
    pub now: Ticks,
    pub current: Option<JobId>,
    pub jobs: FxHashMap<JobId, Job>,
    pub num_terminated: usize,
}

impl SimCtx {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a job that has not arrived yet. It is held as `Blocked` with
    /// `arrived` unset until its arrival event marks it ready.
    pub fn create_job(
        &mut self,
        id: JobId,
        arrival_time: Ticks,
        bursts: VecDeque<Ticks>,
    ) -> Result<(), SimError> {
        if self.jobs.contains_key(&id) {
            return Err(SimError::DuplicateJob(id));
        }

        let (run_time, io_time) = bursts
            .iter()
            .enumerate()
            .fold((0, 0), |(cpu, io), (i, &b)| {
                if i % 2 == 0 { (cpu + b, io) } else { (cpu, io + b) }
            });

        let job = Job {
            id,
            state: JobState::Blocked,
            n_bursts: bursts.len(),
            bursts,
            arrival_time,
            wait_time: 0,
            last_ready: arrival_time,
            completion_time: None,
            arrived: false,
            run_time,
            io_time,
            pending: None,
        };
        self.jobs.insert(id, job);
        Ok(())
    }

    pub fn advance_time(&mut self, delta: Ticks) {
        self.now = self.now.saturating_add(delta);
    }

    pub fn job(&self, id: JobId) -> Result<&Job, SimError> {
        self.jobs.get(&id).ok_or(SimError::UnknownJob(id))
    }

    pub fn job_mut(&mut self, id: JobId) -> Result<&mut Job, SimError> {
        self.jobs.get_mut(&id).ok_or(SimError::UnknownJob(id))
    }

    pub fn cpu_is_idle(&self) -> bool {
        self.current.is_none()
    }

    pub fn all_terminated(&self) -> bool {
        self.num_terminated == self.jobs.len()
    }

    pub fn mark_ready(&mut self, id: JobId) -> Result<(), SimError> {
        let now = self.now;
        let job = self.job_mut(id)?;
        debug_assert!(
            job.state != JobState::Terminated,
            "Terminated job {id} cannot become ready"
        );
        job.state = JobState::Ready;
        job.last_ready = now;
        if self.current == Some(id) {
            self.current = None;
        }
        Ok(())
    }

    pub fn mark_blocked(&mut self, id: JobId) -> Result<(), SimError> {
        self.job_mut(id)?.state = JobState::Blocked;
        if self.current == Some(id) {
            self.current = None;
        }
        Ok(())
    }

    pub fn mark_terminated(&mut self, id: JobId) -> Result<(), SimError> {
        let now = self.now;
        let job = self.job_mut(id)?;
        debug_assert!(
            job.state == JobState::Running,
            "Job {id} must have been running before it terminates"
        );
        job.state = JobState::Terminated;
        job.completion_time = Some(now);
        self.num_terminated += 1;
        if self.current == Some(id) {
            self.current = None;
        }
        Ok(())
    }

    /// Puts a ready job on the CPU and charges the time it spent waiting.
    pub fn set_running(&mut self, id: JobId) -> Result<(), SimError> {
        debug_assert!(self.current.is_none(), "CPU already running a job");

        let now = self.now;
        let job = self.job_mut(id)?;
        if job.state != JobState::Ready {
            return Err(SimError::NotReady {
                job: id,
                state: job.state,
            });
        }
        job.state = JobState::Running;
        job.wait_time += now - job.last_ready;
        self.current = Some(id);
        Ok(())
    }

    pub fn ready_count(&self) -> usize {
        self.jobs
            .values()
            .filter(|job| job.state == JobState::Ready)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_with(id: JobId, bursts: &[Ticks]) -> SimCtx {
        let mut ctx = SimCtx::new();
        ctx.create_job(id, 0, bursts.iter().copied().collect())
            .unwrap();
        ctx
    }

    #[test]
    fn baseline_stats_split_cpu_and_io() {
        let ctx = ctx_with(1, &[3, 10, 4, 2, 5]);
        let job = ctx.job(1).unwrap();
        assert_eq!(job.n_bursts, 5);
        assert_eq!(job.run_time, 12);
        assert_eq!(job.io_time, 12);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut ctx = ctx_with(7, &[1]);
        let err = ctx.create_job(7, 3, [2].into_iter().collect()).unwrap_err();
        assert!(matches!(err, SimError::DuplicateJob(7)));
    }

    #[test]
    fn running_charges_wait_since_last_ready() {
        let mut ctx = ctx_with(1, &[4]);
        ctx.now = 2;
        ctx.mark_ready(1).unwrap();
        ctx.now = 9;
        ctx.set_running(1).unwrap();
        assert_eq!(ctx.job(1).unwrap().wait_time, 7);
        assert_eq!(ctx.current, Some(1));
    }

    #[test]
    fn only_ready_jobs_can_run() {
        let mut ctx = ctx_with(1, &[4]);
        let err = ctx.set_running(1).unwrap_err();
        assert!(matches!(
            err,
            SimError::NotReady {
                job: 1,
                state: JobState::Blocked
            }
        ));
    }

    #[test]
    fn termination_frees_the_cpu() {
        let mut ctx = ctx_with(1, &[4]);
        ctx.mark_ready(1).unwrap();
        ctx.set_running(1).unwrap();
        ctx.now = 4;
        ctx.mark_terminated(1).unwrap();
        assert!(ctx.cpu_is_idle());
        assert!(ctx.all_terminated());
        assert_eq!(ctx.job(1).unwrap().completion_time, Some(4));
    }
}
