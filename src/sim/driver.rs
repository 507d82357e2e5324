use log::warn;

use super::{
    job::JobSpec,
    report::{JobOutcome, SimReport},
};
use crate::{
    core::{
        driver::SchedCore,
        state::{Job, JobId, Ticks},
    },
    error::SimError,
    scheduler::Scheduler,
};

/// How a call to [`Sim::advance`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every job terminated; `at` is the last completion time.
    Completed { at: Ticks },
    /// The time bound ran out first.
    Truncated { unfinished: Vec<JobId> },
}

pub struct Sim<S: Scheduler> {
    pub core: SchedCore<S>,
    // Input order, kept for reporting
    job_ids: Vec<JobId>,
}

impl<S: Scheduler> Sim<S> {
    /// Builds the job table and schedules every arrival. Rejects the whole
    /// workload if any job is malformed.
    pub fn new(jobs: Vec<JobSpec>, scheduler: S) -> Result<Self, SimError> {
        let mut core = SchedCore::new(scheduler);
        let mut job_ids = Vec::with_capacity(jobs.len());

        for job in jobs {
            job.validate()?;
            core.ctx
                .create_job(job.id, job.arrival_time, job.bursts.into())?;
            core.schedule_arrival(job.id, job.arrival_time)?;
            job_ids.push(job.id);
        }

        Ok(Self { core, job_ids })
    }

    pub fn step(&mut self) -> Result<(), SimError> {
        self.core.tick()
    }

    /// Runs from the current time until every job has terminated or the
    /// clock passes `max_time`.
    pub fn advance(&mut self, max_time: Ticks) -> Result<RunOutcome, SimError> {
        while self.core.now() <= max_time && !self.all_jobs_completed() {
            self.step()?;
        }

        if self.all_jobs_completed() {
            let at = self
                .jobs()
                .filter_map(|job| job.completion_time)
                .max()
                .unwrap_or(0);
            return Ok(RunOutcome::Completed { at });
        }

        let unfinished = self.unfinished();
        warn!(
            "{} job(s) did not complete by t={max_time}; consider increasing the simulation time",
            unfinished.len()
        );
        Ok(RunOutcome::Truncated { unfinished })
    }

    pub fn all_jobs_completed(&self) -> bool {
        self.core.ctx.all_terminated()
    }

    /// Jobs in input order.
    pub fn jobs(&self) -> impl Iterator<Item = &Job> + '_ {
        self.job_ids
            .iter()
            .filter_map(|id| self.core.ctx.jobs.get(id))
    }

    pub fn job(&self, id: JobId) -> Option<&Job> {
        self.core.ctx.jobs.get(&id)
    }

    pub fn unfinished(&self) -> Vec<JobId> {
        let mut ids: Vec<_> = self
            .jobs()
            .filter(|job| !job.is_terminated())
            .map(|job| job.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn scheduler(&self) -> &S {
        &self.core.scheduler
    }

    pub fn report(&self) -> SimReport {
        let mut jobs: Vec<JobOutcome> = self.jobs().map(JobOutcome::from_job).collect();
        jobs.sort_by_key(JobOutcome::id);
        SimReport::new(jobs, self.core.observer(), self.core.scheduler.report())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{MlfqConfig, MlfqScheduler, RoundRobinScheduler};

    fn rr(quantum: Ticks) -> RoundRobinScheduler {
        RoundRobinScheduler::new(quantum).unwrap()
    }

    #[test]
    fn invalid_workloads_never_start() {
        let dup = vec![JobSpec::new(1, 0, [2]), JobSpec::new(1, 1, [3])];
        assert!(matches!(
            Sim::new(dup, rr(2)),
            Err(SimError::DuplicateJob(1))
        ));

        let even = vec![JobSpec::new(1, 0, [2, 2])];
        assert!(matches!(
            Sim::new(even, rr(2)),
            Err(SimError::InvalidJob { job: 1, .. })
        ));
    }

    #[test]
    fn empty_workload_completes_immediately() {
        let mut sim = Sim::new(Vec::new(), rr(2)).unwrap();
        assert_eq!(sim.advance(10).unwrap(), RunOutcome::Completed { at: 0 });
        assert_eq!(sim.core.now(), 0);
    }

    #[test]
    fn idle_gap_before_late_arrival() {
        let mut sim = Sim::new(vec![JobSpec::new(1, 6, [3])], rr(5)).unwrap();
        assert_eq!(sim.advance(100).unwrap(), RunOutcome::Completed { at: 9 });
        let job = sim.job(1).unwrap();
        assert_eq!(job.wait_time, 0);
        // Idle from t=0 to t=5, and again at t=9 once the job is gone
        assert_eq!(sim.core.observer().idle_steps(), 7);
    }

    #[test]
    fn truncation_lists_unfinished_jobs() {
        let jobs = vec![JobSpec::new(2, 0, [50]), JobSpec::new(1, 0, [3])];
        let mut sim = Sim::new(jobs, rr(3)).unwrap();
        assert_eq!(
            sim.advance(10).unwrap(),
            RunOutcome::Truncated {
                unfinished: vec![2]
            }
        );
        // Picking up where it left off
        assert!(matches!(
            sim.advance(100).unwrap(),
            RunOutcome::Completed { at: 53 }
        ));
    }

    #[test]
    fn io_burst_blocks_then_resumes() {
        let mut sim = Sim::new(vec![JobSpec::new(1, 0, [2, 5, 3])], rr(4)).unwrap();
        for _ in 0..=2 {
            sim.step().unwrap();
        }
        assert_eq!(sim.core.running(), None);
        assert_eq!(sim.core.pending_events(), 1);

        assert_eq!(sim.advance(100).unwrap(), RunOutcome::Completed { at: 10 });
        let job = sim.job(1).unwrap();
        assert_eq!(job.wait_time, 0);
        assert!(job.bursts.is_empty());
    }

    #[test]
    fn mlfq_preempts_lower_level_job() {
        // Job 1 is demoted to level 1 at t=2; job 2 arrives at t=3 on level 0
        let jobs = vec![JobSpec::new(1, 0, [10]), JobSpec::new(2, 3, [2])];
        let mlfq = MlfqScheduler::new(MlfqConfig::new(vec![2, 8])).unwrap();
        let mut sim = Sim::new(jobs, mlfq).unwrap();

        for _ in 0..=3 {
            sim.step().unwrap();
        }
        assert_eq!(sim.core.running(), Some(2));
        assert_eq!(sim.job(1).unwrap().bursts[0], 7);

        assert_eq!(sim.advance(100).unwrap(), RunOutcome::Completed { at: 12 });
        assert_eq!(sim.job(2).unwrap().completion_time, Some(5));
        assert_eq!(sim.job(1).unwrap().wait_time, 2);
    }
}
