use average::{Estimate, Mean};

use super::state::{JobState, SimCtx};

/// Per-tick invariant checks and engine-wide samples.
#[derive(Debug, Clone)]
pub struct Observer {
    step: u64,
    idle_steps: u64,
    ready_depth: Mean,
    max_ready_depth: usize,
}

impl Observer {
    pub fn new() -> Self {
        Self {
            step: 0,
            idle_steps: 0,
            ready_depth: Mean::new(),
            max_ready_depth: 0,
        }
    }

    pub fn observe(&mut self, ctx: &SimCtx) {
        self.step += 1;

        let running = ctx
            .jobs
            .values()
            .filter(|job| job.state == JobState::Running)
            .count();
        debug_assert!(running <= 1, "{running} jobs Running at t={}", ctx.now);

        match ctx.current {
            Some(id) => {
                let job = ctx.jobs.get(&id);
                debug_assert!(
                    job.is_some_and(|job| job.state == JobState::Running),
                    "cpu.current job {id} must be Running"
                );
                debug_assert!(
                    job.is_some_and(|job| job.pending.is_some()),
                    "Running job {id} has no terminating event"
                );
            }
            None => {
                debug_assert_eq!(running, 0, "Running job off the CPU at t={}", ctx.now);
                self.idle_steps += 1;
            }
        }

        for job in ctx.jobs.values() {
            debug_assert_eq!(
                job.bursts.is_empty(),
                job.state == JobState::Terminated,
                "Job {} burst list out of sync with state {}",
                job.id,
                job.state
            );
        }

        let ready = ctx.ready_count();
        self.ready_depth.add(ready as f64);
        self.max_ready_depth = self.max_ready_depth.max(ready);
    }

    pub fn steps(&self) -> u64 {
        self.step
    }

    pub fn idle_steps(&self) -> u64 {
        self.idle_steps
    }

    pub fn avg_ready_depth(&self) -> f64 {
        self.ready_depth.estimate()
    }

    pub fn max_ready_depth(&self) -> usize {
        self.max_ready_depth
    }
}

impl Default for Observer {
    fn default() -> Self {
        Self::new()
    }
}
