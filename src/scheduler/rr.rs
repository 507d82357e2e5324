use std::collections::{BTreeMap, VecDeque};

use super::{Dispatch, PolicyReport, QueueStats, SchedError, Scheduler};
use crate::core::state::{JobId, Ticks};

/// Single FIFO, fixed quantum. Never asks for preemption.
#[derive(Debug)]
pub struct RoundRobinScheduler {
    quantum: Ticks,
    ready: VecDeque<JobId>,
    running: Option<JobId>,
    preemptions: BTreeMap<JobId, u64>,
    queue_lengths: Vec<usize>,
}

impl RoundRobinScheduler {
    pub fn new(quantum: Ticks) -> Result<Self, SchedError> {
        if quantum == 0 {
            return Err(SchedError::Config("quantum must be positive".into()));
        }
        Ok(Self {
            quantum,
            ready: VecDeque::new(),
            running: None,
            preemptions: BTreeMap::new(),
            queue_lengths: Vec::new(),
        })
    }

    pub fn quantum(&self) -> Ticks {
        self.quantum
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    fn take_running(&mut self, job: JobId) -> Result<(), SchedError> {
        if self.running != Some(job) {
            return Err(SchedError::NotDispatched {
                job,
                dispatched: self.running,
            });
        }
        self.running = None;
        Ok(())
    }

    fn requeue(&mut self, job: JobId, front: bool) -> Result<(), SchedError> {
        if self.ready.contains(&job) {
            return Err(SchedError::AlreadyQueued(job));
        }
        self.queue_lengths.push(self.ready.len());
        if front {
            self.ready.push_front(job);
        } else {
            self.ready.push_back(job);
        }
        Ok(())
    }

    fn count_preemption(&mut self, job: JobId) -> Result<(), SchedError> {
        *self
            .preemptions
            .get_mut(&job)
            .ok_or(SchedError::UnknownJob(job))? += 1;
        Ok(())
    }
}

impl Scheduler for RoundRobinScheduler {
    fn job_created(&mut self, job: JobId) -> Result<(), SchedError> {
        if self.preemptions.insert(job, 0).is_some() {
            return Err(SchedError::AlreadyKnown(job));
        }
        self.ready.push_back(job);
        Ok(())
    }

    fn job_ready(&mut self, job: JobId) -> Result<(), SchedError> {
        if !self.preemptions.contains_key(&job) {
            return Err(SchedError::UnknownJob(job));
        }
        self.requeue(job, false)
    }

    fn job_quantum_expired(&mut self, job: JobId) -> Result<(), SchedError> {
        self.take_running(job)?;
        self.count_preemption(job)?;
        self.requeue(job, false)
    }

    // Preempted jobs go back to the head of the line.
    fn job_preempted(&mut self, job: JobId) -> Result<(), SchedError> {
        self.take_running(job)?;
        self.count_preemption(job)?;
        self.requeue(job, true)
    }

    fn job_terminated(&mut self, job: JobId) -> Result<(), SchedError> {
        self.take_running(job)
    }

    fn job_blocked(&mut self, job: JobId) -> Result<(), SchedError> {
        self.take_running(job)
    }

    fn next_job_and_quantum(&mut self) -> Option<Dispatch> {
        debug_assert!(self.running.is_none(), "Dispatch while a job is running");
        let job = self.ready.pop_front()?;
        self.running = Some(job);
        Some(Dispatch {
            job,
            quantum: self.quantum,
        })
    }

    fn report(&self) -> PolicyReport {
        PolicyReport::RoundRobin {
            quantum: self.quantum,
            preemptions: self.preemptions.clone(),
            queue: QueueStats::from_samples(&self.queue_lengths),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_quantum_is_rejected() {
        assert!(matches!(
            RoundRobinScheduler::new(0),
            Err(SchedError::Config(_))
        ));
    }

    #[test]
    fn dispatches_in_arrival_order() {
        let mut rr = RoundRobinScheduler::new(2).unwrap();
        for job in [3, 1, 2] {
            rr.job_created(job).unwrap();
        }
        let d = rr.next_job_and_quantum().unwrap();
        assert_eq!(d, Dispatch { job: 3, quantum: 2 });
        rr.job_quantum_expired(3).unwrap();

        let order: Vec<_> = std::iter::from_fn(|| {
            let d = rr.next_job_and_quantum()?;
            rr.job_blocked(d.job).unwrap();
            Some(d.job)
        })
        .collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn preempted_job_returns_to_the_front() {
        let mut rr = RoundRobinScheduler::new(4).unwrap();
        rr.job_created(1).unwrap();
        rr.job_created(2).unwrap();
        rr.next_job_and_quantum().unwrap();
        rr.job_preempted(1).unwrap();
        assert_eq!(rr.next_job_and_quantum().unwrap().job, 1);
    }

    #[test]
    fn callbacks_for_undispatched_jobs_are_violations() {
        let mut rr = RoundRobinScheduler::new(4).unwrap();
        rr.job_created(1).unwrap();
        rr.job_created(2).unwrap();
        rr.next_job_and_quantum().unwrap();
        assert_eq!(
            rr.job_quantum_expired(2),
            Err(SchedError::NotDispatched {
                job: 2,
                dispatched: Some(1)
            })
        );
        assert_eq!(rr.job_ready(9), Err(SchedError::UnknownJob(9)));
        assert_eq!(rr.job_created(1), Err(SchedError::AlreadyKnown(1)));
    }

    #[test]
    fn report_counts_expiries_and_queue_lengths() {
        let mut rr = RoundRobinScheduler::new(1).unwrap();
        rr.job_created(1).unwrap();
        rr.job_created(2).unwrap();

        rr.next_job_and_quantum().unwrap();
        rr.job_quantum_expired(1).unwrap(); // queue held [2]
        rr.next_job_and_quantum().unwrap();
        rr.job_blocked(2).unwrap();
        rr.next_job_and_quantum().unwrap();
        rr.job_terminated(1).unwrap();
        rr.job_ready(2).unwrap(); // queue empty

        match rr.report() {
            PolicyReport::RoundRobin {
                quantum,
                preemptions,
                queue,
            } => {
                assert_eq!(quantum, 1);
                assert_eq!(preemptions[&1], 1);
                assert_eq!(preemptions[&2], 0);
                assert_eq!(queue.samples, 2);
                assert_eq!(queue.max_len, 1);
            }
            other => panic!("unexpected report {other:?}"),
        }
    }
}
