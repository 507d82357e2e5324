use log::debug;
use rustc_hash::FxHashMap;
use std::collections::VecDeque;

use super::{Dispatch, LevelReport, PolicyReport, QueueStats, SchedError, Scheduler};
use crate::core::state::{JobId, Ticks};

pub const DEFAULT_OVERFLOW_THRESHOLD: u64 = 10;

/// Immutable MLFQ parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MlfqConfig {
    /// Quantum per initial level, highest priority first.
    pub quanta: Vec<Ticks>,
    /// Expiries at the lowest level tolerated before a new level is appended.
    pub overflow_threshold: u64,
    pub expand: bool,
}

impl MlfqConfig {
    pub fn new(quanta: Vec<Ticks>) -> Self {
        Self {
            quanta,
            overflow_threshold: DEFAULT_OVERFLOW_THRESHOLD,
            expand: true,
        }
    }

    pub fn with_overflow_threshold(mut self, threshold: u64) -> Self {
        self.overflow_threshold = threshold;
        self
    }

    pub fn with_expansion(mut self, expand: bool) -> Self {
        self.expand = expand;
        self
    }
}

#[derive(Debug)]
struct Level {
    quantum: Ticks,
    ready: VecDeque<JobId>,
    dispatched: Option<JobId>,
    // Ready-FIFO length seen by each arriving job
    lengths: Vec<usize>,
}

impl Level {
    fn new(quantum: Ticks) -> Self {
        Self {
            quantum,
            ready: VecDeque::new(),
            dispatched: None,
            lengths: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    level: usize,
    // Set when the current burst ran out a whole quantum
    spent_quantum: bool,
}

#[derive(Debug)]
pub struct MlfqScheduler {
    config: MlfqConfig,
    levels: Vec<Level>,
    // Single source of truth for each job's level
    jobs: FxHashMap<JobId, Entry>,
    overflows: u64,
    overflows_at_expansion: u64,
    expansions: usize,
}

impl MlfqScheduler {
    pub fn new(config: MlfqConfig) -> Result<Self, SchedError> {
        if config.quanta.is_empty() {
            return Err(SchedError::Config(
                "at least one level quantum is required".into(),
            ));
        }
        if config.quanta.contains(&0) {
            return Err(SchedError::Config("quanta must be positive".into()));
        }

        let levels = config.quanta.iter().map(|&q| Level::new(q)).collect();
        Ok(Self {
            config,
            levels,
            jobs: FxHashMap::default(),
            overflows: 0,
            overflows_at_expansion: 0,
            expansions: 0,
        })
    }

    pub fn config(&self) -> &MlfqConfig {
        &self.config
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn quanta(&self) -> Vec<Ticks> {
        self.levels.iter().map(|level| level.quantum).collect()
    }

    pub fn level_of(&self, job: JobId) -> Option<usize> {
        self.jobs.get(&job).map(|entry| entry.level)
    }

    pub fn ready_len(&self, level: usize) -> usize {
        self.levels.get(level).map_or(0, |level| level.ready.len())
    }

    pub fn overflows(&self) -> u64 {
        self.overflows
    }

    /// Level and id of the job currently on the CPU, if any.
    pub fn dispatched(&self) -> Option<(usize, JobId)> {
        self.levels
            .iter()
            .enumerate()
            .find_map(|(idx, level)| level.dispatched.map(|job| (idx, job)))
    }

    fn entry(&self, job: JobId) -> Result<Entry, SchedError> {
        self.jobs.get(&job).copied().ok_or(SchedError::UnknownJob(job))
    }

    fn entry_mut(&mut self, job: JobId) -> Result<&mut Entry, SchedError> {
        self.jobs.get_mut(&job).ok_or(SchedError::UnknownJob(job))
    }

    /// Clears the dispatched slot held by `job`, returning its record.
    fn end_run(&mut self, job: JobId) -> Result<Entry, SchedError> {
        let entry = self
            .jobs
            .get(&job)
            .copied()
            .filter(|entry| self.levels[entry.level].dispatched == Some(job));
        let Some(entry) = entry else {
            return Err(SchedError::NotDispatched {
                job,
                dispatched: self.dispatched().map(|(_, j)| j),
            });
        };

        self.levels[entry.level].dispatched = None;
        Ok(entry)
    }

    fn enqueue(&mut self, job: JobId) -> Result<(), SchedError> {
        let level = self.entry(job)?.level;
        let level = &mut self.levels[level];
        if level.ready.contains(&job) || level.dispatched == Some(job) {
            return Err(SchedError::AlreadyQueued(job));
        }
        level.lengths.push(level.ready.len());
        level.ready.push_back(job);
        Ok(())
    }

    /// Records an expiry at the lowest level. Returns the index of a freshly
    /// appended level when the overflow threshold is crossed.
    fn overflow(&mut self) -> Option<usize> {
        self.overflows += 1;
        if !self.config.expand
            || self.overflows - self.overflows_at_expansion <= self.config.overflow_threshold
        {
            return None;
        }

        let lowest = self.levels.last()?.quantum;
        let quantum = lowest.saturating_mul(2);
        self.levels.push(Level::new(quantum));
        self.overflows_at_expansion = self.overflows;
        self.expansions += 1;
        debug!(
            "mlfq: expanded to {} levels (quantum {quantum}) after {} overflows",
            self.levels.len(),
            self.overflows
        );
        Some(self.levels.len() - 1)
    }
}

impl Scheduler for MlfqScheduler {
    fn job_created(&mut self, job: JobId) -> Result<(), SchedError> {
        let fresh = Entry {
            level: 0,
            spent_quantum: false,
        };
        if self.jobs.insert(job, fresh).is_some() {
            return Err(SchedError::AlreadyKnown(job));
        }
        self.enqueue(job)
    }

    fn job_ready(&mut self, job: JobId) -> Result<(), SchedError> {
        self.enqueue(job)
    }

    fn job_quantum_expired(&mut self, job: JobId) -> Result<(), SchedError> {
        let entry = self.end_run(job)?;
        let lowest = self.levels.len() - 1;

        let level = if entry.level < lowest {
            debug!("mlfq: job {job} demoted to level {}", entry.level + 1);
            entry.level + 1
        } else if let Some(new_level) = self.overflow() {
            debug!("mlfq: job {job} moved to new level {new_level}");
            new_level
        } else {
            entry.level
        };

        let entry = self.entry_mut(job)?;
        entry.level = level;
        entry.spent_quantum = true;
        self.enqueue(job)
    }

    fn job_preempted(&mut self, job: JobId) -> Result<(), SchedError> {
        self.end_run(job)?;
        self.enqueue(job)
    }

    fn job_terminated(&mut self, job: JobId) -> Result<(), SchedError> {
        self.end_run(job)?;
        self.jobs.remove(&job);
        Ok(())
    }

    // Promotion is only earned by a burst that never ran out a quantum.
    fn job_blocked(&mut self, job: JobId) -> Result<(), SchedError> {
        let entry = self.end_run(job)?;
        let entry_mut = self.entry_mut(job)?;
        if !entry.spent_quantum && entry.level > 0 {
            entry_mut.level = entry.level - 1;
            debug!("mlfq: job {job} promoted to level {}", entry_mut.level);
        }
        entry_mut.spent_quantum = false;
        Ok(())
    }

    fn needs_resched(&self) -> bool {
        match self.dispatched() {
            Some((level, _)) => self.levels[..level]
                .iter()
                .any(|higher| !higher.ready.is_empty()),
            None => false,
        }
    }

    fn next_job_and_quantum(&mut self) -> Option<Dispatch> {
        debug_assert!(self.dispatched().is_none(), "Dispatch while a job is running");
        self.levels.iter_mut().find_map(|level| {
            let job = level.ready.pop_front()?;
            level.dispatched = Some(job);
            Some(Dispatch {
                job,
                quantum: level.quantum,
            })
        })
    }

    fn report(&self) -> PolicyReport {
        PolicyReport::Mlfq {
            levels: self
                .levels
                .iter()
                .map(|level| LevelReport {
                    quantum: level.quantum,
                    queue: QueueStats::from_samples(&level.lengths),
                })
                .collect(),
            overflows: self.overflows,
            expansions: self.expansions,
        }
    }
}
