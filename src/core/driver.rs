use log::info;

use super::{
    event::{Event, EventKind, Timeline},
    observer::Observer,
    state::{JobId, JobState, SimCtx, Ticks},
};
use crate::{error::SimError, scheduler::Scheduler};

pub struct SchedCore<S: Scheduler> {
    pub ctx: SimCtx,
    pub scheduler: S,
    timeline: Timeline,
    observer: Observer,
}

impl<S: Scheduler> SchedCore<S> {
    pub fn new(scheduler: S) -> Self {
        Self {
            ctx: SimCtx::new(),
            scheduler,
            timeline: Timeline::new(),
            observer: Observer::new(),
        }
    }

    /// Runs one simulated time unit at `ctx.now` and then advances the clock.
    pub fn tick(&mut self) -> Result<(), SimError> {
        self.consume_cpu()?;
        self.dispatch_events()?;

        if self.ctx.cpu_is_idle() {
            self.run_new_job()?;
        } else if self.scheduler.needs_resched() {
            self.preempt_current()?;
            self.run_new_job()?;
        }

        self.observer.observe(&self.ctx);
        self.ctx.advance_time(1);
        Ok(())
    }

    /// Arrival events are scheduled by the owner before the first tick.
    pub fn schedule_arrival(&mut self, job: JobId, time: Ticks) -> Result<(), SimError> {
        self.schedule_for(job, time, EventKind::Arrival)
    }

    fn schedule_for(&mut self, job: JobId, time: Ticks, kind: EventKind) -> Result<(), SimError> {
        let pending = self.ctx.job(job)?.pending;
        if pending.is_some_and(|key| self.timeline.is_pending(key)) {
            return Err(SimError::PendingEvent { job });
        }
        let key = self.timeline.schedule(time, job, kind);
        self.ctx.job_mut(job)?.pending = Some(key);
        Ok(())
    }

    fn consume_cpu(&mut self) -> Result<(), SimError> {
        let Some(id) = self.ctx.current else {
            return Ok(());
        };
        let now = self.ctx.now;
        let job = self.ctx.job_mut(id)?;
        let burst = job.bursts.front_mut().ok_or(SimError::NoBurst { job: id })?;
        *burst = burst
            .checked_sub(1)
            .ok_or(SimError::BurstUnderflow { job: id, now })?;
        Ok(())
    }

    fn dispatch_events(&mut self) -> Result<(), SimError> {
        let now = self.ctx.now;
        let mut logged = false;
        while let Some((key, event)) = self.timeline.pop_due(now) {
            if !logged {
                info!("Time {now}");
                logged = true;
            }
            let job = self.ctx.job_mut(event.job)?;
            if job.pending == Some(key) {
                job.pending = None;
            }
            self.handle_event(event)?;
        }
        Ok(())
    }

    fn handle_event(&mut self, event: Event) -> Result<(), SimError> {
        let id = event.job;
        match event.kind {
            EventKind::Arrival => {
                info!(" - Arrival of job {id}");
                self.ctx.job_mut(id)?.arrived = true;
                self.ctx.mark_ready(id)?;
                self.scheduler.job_created(id)?;
            }
            EventKind::CpuBurstComplete => {
                let job = self.ctx.job_mut(id)?;
                let done = job.bursts.pop_front();
                debug_assert_eq!(done, Some(0), "Job {id} completed a burst early");

                match job.bursts.pop_front() {
                    Some(io_len) => {
                        info!(" - Job {id} CPU burst complete");
                        info!(" - Blocking job {id} for {io_len}");
                        self.ctx.mark_blocked(id)?;
                        let at = self.after(id, io_len)?;
                        self.schedule_for(id, at, EventKind::IoBurstComplete)?;
                        self.scheduler.job_blocked(id)?;
                    }
                    None => {
                        info!(" - Job {id} terminated");
                        self.ctx.mark_terminated(id)?;
                        self.scheduler.job_terminated(id)?;
                    }
                }
            }
            EventKind::QuantumExpired => {
                info!(" - Job {id} quantum expired");
                self.ctx.mark_ready(id)?;
                self.scheduler.job_quantum_expired(id)?;
            }
            EventKind::IoBurstComplete => {
                info!(" - Job {id} completed I/O");
                self.ctx.mark_ready(id)?;
                self.scheduler.job_ready(id)?;
            }
        }
        Ok(())
    }

    // Ask the scheduler for work and arrange the event that will end the run
    fn run_new_job(&mut self) -> Result<(), SimError> {
        let Some(dispatch) = self.scheduler.next_job_and_quantum() else {
            return Ok(());
        };
        let (id, quantum) = (dispatch.job, dispatch.quantum);

        self.ctx.set_running(id)?;
        let job = self.ctx.job(id)?;
        let burst = *job.bursts.front().ok_or(SimError::NoBurst { job: id })?;
        info!(
            " - Scheduling job {id} (burst len = {burst}, total wait = {}) with q={quantum}",
            job.wait_time
        );

        if burst <= quantum {
            let at = self.after(id, burst)?;
            self.schedule_for(id, at, EventKind::CpuBurstComplete)
        } else {
            let at = self.after(id, quantum)?;
            self.schedule_for(id, at, EventKind::QuantumExpired)
        }
    }

    fn after(&self, job: JobId, delta: Ticks) -> Result<Ticks, SimError> {
        let now = self.ctx.now;
        now.checked_add(delta)
            .ok_or(SimError::TimeOverflow { job, now })
    }

    fn preempt_current(&mut self) -> Result<(), SimError> {
        let Some(id) = self.ctx.current else {
            return Ok(());
        };
        info!(" - Preempting job {id}");
        self.ctx.mark_ready(id)?;
        self.scheduler.job_preempted(id)?;
        if let Some(key) = self.ctx.job_mut(id)?.pending.take() {
            let cancelled = self.timeline.cancel(key);
            debug_assert!(cancelled, "Preempted job {id} had no live event");
        }
        Ok(())
    }

    pub fn now(&self) -> Ticks {
        self.ctx.now
    }

    pub fn running(&self) -> Option<JobId> {
        self.ctx.current
    }

    /// `None` for unknown jobs and for jobs whose arrival has not been handled.
    pub fn job_state(&self, id: JobId) -> Option<JobState> {
        self.ctx
            .jobs
            .get(&id)
            .filter(|job| job.arrived)
            .map(|job| job.state)
    }

    pub fn pending_events(&self) -> usize {
        self.timeline.len()
    }

    pub fn observer(&self) -> &Observer {
        &self.observer
    }
}
