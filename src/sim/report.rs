use std::fmt;

use crate::{
    avg,
    core::{
        observer::Observer,
        state::{Job, JobId, Ticks},
    },
    scheduler::PolicyReport,
};

/// Per-job figures for a job that terminated.
#[derive(Debug, Clone, PartialEq)]
pub struct JobReport {
    pub id: JobId,
    pub arrival_time: Ticks,
    pub completion_time: Ticks,
    pub cpu_bursts: usize,
    pub run_time: Ticks,
    pub io_time: Ticks,
    pub wait_time: Ticks,
    pub avg_cpu: f64,
    pub avg_wait: f64,
    /// Approximated as average wait plus average CPU burst.
    pub avg_response: f64,
    pub turnaround: Ticks,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed(JobReport),
    Incomplete(JobId),
}

impl JobOutcome {
    pub fn from_job(job: &Job) -> Self {
        let Some(completion_time) = job.completion_time else {
            return Self::Incomplete(job.id);
        };

        let cpu_bursts = job.n_bursts / 2 + 1;
        let avg_cpu = job.run_time as f64 / cpu_bursts as f64;
        let avg_wait = job.wait_time as f64 / cpu_bursts as f64;
        Self::Completed(JobReport {
            id: job.id,
            arrival_time: job.arrival_time,
            completion_time,
            cpu_bursts,
            run_time: job.run_time,
            io_time: job.io_time,
            wait_time: job.wait_time,
            avg_cpu,
            avg_wait,
            avg_response: avg_cpu + avg_wait,
            turnaround: completion_time - job.arrival_time,
        })
    }

    pub fn id(&self) -> JobId {
        match self {
            Self::Completed(report) => report.id,
            Self::Incomplete(id) => *id,
        }
    }

    pub fn completed(&self) -> Option<&JobReport> {
        match self {
            Self::Completed(report) => Some(report),
            Self::Incomplete(_) => None,
        }
    }
}

/// Means over completed jobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Averages {
    pub avg_cpu: f64,
    pub avg_wait: f64,
    pub avg_response: f64,
    pub turnaround: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineStats {
    pub ticks: u64,
    pub idle_ticks: u64,
    pub avg_ready: f64,
    pub max_ready: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimReport {
    pub jobs: Vec<JobOutcome>,
    pub averages: Option<Averages>,
    pub engine: EngineStats,
    pub policy: PolicyReport,
}

impl SimReport {
    pub fn new(jobs: Vec<JobOutcome>, observer: &Observer, policy: PolicyReport) -> Self {
        let done: Vec<&JobReport> = jobs.iter().filter_map(JobOutcome::completed).collect();
        let averages = (!done.is_empty()).then(|| Averages {
            avg_cpu: avg(done.iter().map(|j| j.avg_cpu)),
            avg_wait: avg(done.iter().map(|j| j.avg_wait)),
            avg_response: avg(done.iter().map(|j| j.avg_response)),
            turnaround: avg(done.iter().map(|j| j.turnaround as f64)),
        });

        Self {
            jobs,
            averages,
            engine: EngineStats {
                ticks: observer.steps(),
                idle_ticks: observer.idle_steps(),
                avg_ready: observer.avg_ready_depth(),
                max_ready: observer.max_ready_depth(),
            },
            policy,
        }
    }

    pub fn incomplete(&self) -> impl Iterator<Item = JobId> + '_ {
        self.jobs.iter().filter_map(|outcome| match outcome {
            JobOutcome::Incomplete(id) => Some(*id),
            JobOutcome::Completed(_) => None,
        })
    }
}

const RULE: usize = 57;

impl fmt::Display for SimReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f)?;
        writeln!(
            f,
            "{:>5} | {:>10} | {:>10} | {:>10} | {:>10}",
            "JID", "Avg CPU", "Avg wait", "Avg rspnse", "Turnaround"
        )?;
        writeln!(f, "{}", "-".repeat(RULE))?;
        for outcome in &self.jobs {
            match outcome {
                JobOutcome::Completed(j) => writeln!(
                    f,
                    "{:5} | {:10.2} | {:10.2} | {:10.2} | {:10}",
                    j.id, j.avg_cpu, j.avg_wait, j.avg_response, j.turnaround
                )?,
                JobOutcome::Incomplete(id) => writeln!(
                    f,
                    "Job {id} didn't complete. Consider increasing simulation time."
                )?,
            }
        }
        writeln!(f, "{}", "-".repeat(RULE))?;
        if let Some(a) = &self.averages {
            writeln!(
                f,
                "  Avg | {:10.2} | {:10.2} | {:10.2} | {:10.2}",
                a.avg_cpu, a.avg_wait, a.avg_response, a.turnaround
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "Ticks = {} (idle {}), ready jobs avg = {:.2}, max = {}",
            self.engine.ticks, self.engine.idle_ticks, self.engine.avg_ready, self.engine.max_ready
        )?;
        writeln!(f)?;
        write!(f, "{}", self.policy)
    }
}

impl fmt::Display for PolicyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyReport::RoundRobin {
                quantum,
                preemptions,
                queue,
            } => {
                writeln!(f, "Round robin, quantum = {quantum}")?;
                writeln!(f, "  JID | # Preempts")?;
                writeln!(f, "{}", "-".repeat(18))?;
                for (jid, count) in preemptions {
                    writeln!(f, "{jid:5} | {count:10}")?;
                }
                writeln!(f)?;
                writeln!(f, "Avg queue length = {:.2}", queue.avg_len)?;
                writeln!(f, "Max queue length = {}", queue.max_len)
            }
            PolicyReport::Mlfq {
                levels,
                overflows,
                expansions,
            } => {
                writeln!(
                    f,
                    "MLFQ, {} levels ({expansions} added), {overflows} overflows",
                    levels.len()
                )?;
                writeln!(f, "Level | {:>7} | {:>9} | {:>9}", "Quantum", "Avg qlen", "Max qlen")?;
                writeln!(f, "{}", "-".repeat(40))?;
                for (idx, level) in levels.iter().enumerate() {
                    writeln!(
                        f,
                        "{idx:5} | {:7} | {:9.2} | {:9}",
                        level.quantum, level.queue.avg_len, level.queue.max_len
                    )?;
                }
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::{QueueStats, RoundRobinScheduler, Scheduler};
    use crate::sim::{JobSpec, Sim};

    #[test]
    fn per_job_figures_follow_burst_counts() {
        let jobs = vec![JobSpec::new(1, 2, [4, 3, 2])];
        let mut sim = Sim::new(jobs, RoundRobinScheduler::new(10).unwrap()).unwrap();
        sim.advance(100).unwrap();

        let report = sim.report();
        let job = report.jobs[0].completed().unwrap();
        assert_eq!(job.cpu_bursts, 2);
        assert_eq!(job.avg_cpu, 3.0);
        assert_eq!(job.avg_wait, 0.0);
        assert_eq!(job.turnaround, 9);
        assert_eq!(report.averages.unwrap().turnaround, 9.0);
    }

    #[test]
    fn incomplete_jobs_are_flagged_and_left_out_of_averages() {
        let jobs = vec![JobSpec::new(3, 0, [100]), JobSpec::new(1, 0, [2])];
        let mut sim = Sim::new(jobs, RoundRobinScheduler::new(2).unwrap()).unwrap();
        sim.advance(20).unwrap();

        let report = sim.report();
        assert_eq!(report.jobs.iter().map(JobOutcome::id).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(report.incomplete().collect::<Vec<_>>(), vec![3]);
        let averages = report.averages.unwrap();
        assert_eq!(averages.turnaround, 4.0);

        let text = report.to_string();
        assert!(text.contains("Job 3 didn't complete"));
        assert!(text.contains("Avg queue length"));
    }

    #[test]
    fn mlfq_section_lists_every_level() {
        let policy = PolicyReport::Mlfq {
            levels: vec![
                crate::scheduler::LevelReport {
                    quantum: 2,
                    queue: QueueStats::from_samples(&[0, 1]),
                },
                crate::scheduler::LevelReport {
                    quantum: 4,
                    queue: QueueStats::default(),
                },
            ],
            overflows: 3,
            expansions: 0,
        };
        let text = policy.to_string();
        assert!(text.contains("2 levels"));
        assert_eq!(text.lines().count(), 5);
    }

    #[test]
    fn rr_report_lists_preemptions() {
        let mut rr = RoundRobinScheduler::new(1).unwrap();
        rr.job_created(1).unwrap();
        let text = rr.report().to_string();
        assert!(text.contains("quantum = 1"));
    }
}
