//! Workload input: the line-oriented job file and a seeded synthetic generator.
//!
//! File format: the first line holds the job count `N`; each of the next `N`
//! lines is `id arrival burst_count burst_1 .. burst_k`.

use rand::prelude::*;
use rustc_hash::FxHashSet;
use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;
use thiserror::Error;

use super::job::JobSpec;
use crate::core::state::Ticks;
use crate::error::SimError;

#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("failed to read workload: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("expected {expected} jobs, found {found}")]
    MissingJobs { expected: usize, found: usize },

    #[error("line {line}: unexpected input after the last job")]
    TrailingInput { line: usize },

    #[error(transparent)]
    Invalid(#[from] SimError),
}

pub fn load(path: impl AsRef<Path>) -> Result<Vec<JobSpec>, WorkloadError> {
    parse(&fs::read_to_string(path)?)
}

/// Parses a whole workload. Nothing is returned unless every job is valid.
pub fn parse(text: &str) -> Result<Vec<JobSpec>, WorkloadError> {
    let mut lines = text
        .lines()
        .enumerate()
        .map(|(idx, line)| (idx + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty());

    let Some((line, header)) = lines.next() else {
        return Err(WorkloadError::Parse {
            line: 1,
            reason: "missing job count".into(),
        });
    };
    let expected: usize = parse_field(header, line, "job count")?;

    let mut jobs = Vec::with_capacity(expected);
    let mut seen = FxHashSet::default();
    for (line, text) in lines.by_ref().take(expected) {
        let job = parse_job(text, line)?;
        job.validate()?;
        if !seen.insert(job.id) {
            return Err(SimError::DuplicateJob(job.id).into());
        }
        jobs.push(job);
    }

    if jobs.len() < expected {
        return Err(WorkloadError::MissingJobs {
            expected,
            found: jobs.len(),
        });
    }
    if let Some((line, _)) = lines.next() {
        return Err(WorkloadError::TrailingInput { line });
    }
    Ok(jobs)
}

fn parse_job(text: &str, line: usize) -> Result<JobSpec, WorkloadError> {
    let fields: Vec<&str> = text.split_whitespace().collect();
    if fields.len() < 3 {
        return Err(WorkloadError::Parse {
            line,
            reason: "expected `id arrival burst_count bursts..`".into(),
        });
    }

    let id = parse_field(fields[0], line, "job id")?;
    let arrival_time = parse_field(fields[1], line, "arrival time")?;
    let count: usize = parse_field(fields[2], line, "burst count")?;
    let bursts = fields[3..]
        .iter()
        .map(|field| parse_field(field, line, "burst length"))
        .collect::<Result<Vec<Ticks>, _>>()?;

    if bursts.len() != count {
        return Err(WorkloadError::Parse {
            line,
            reason: format!("burst count is {count} but {} bursts follow", bursts.len()),
        });
    }
    Ok(JobSpec::new(id, arrival_time, bursts))
}

fn parse_field<T: std::str::FromStr>(
    field: &str,
    line: usize,
    what: &str,
) -> Result<T, WorkloadError> {
    field.parse().map_err(|_| WorkloadError::Parse {
        line,
        reason: format!("invalid {what} `{field}`"),
    })
}

/// Renders jobs back into the workload file format.
pub fn to_text(jobs: &[JobSpec]) -> String {
    let mut out = format!("{}\n", jobs.len());
    for job in jobs {
        out.push_str(&format!(
            "{} {} {}",
            job.id,
            job.arrival_time,
            job.bursts.len()
        ));
        for burst in &job.bursts {
            out.push_str(&format!(" {burst}"));
        }
        out.push('\n');
    }
    out
}

/// Parameters for [`generate`].
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub jobs: usize,
    /// Chance that a job arrives on any given tick.
    pub p_arrival: f64,
    pub cpu_burst: RangeInclusive<Ticks>,
    pub io_burst: RangeInclusive<Ticks>,
    pub max_cpu_bursts: usize,
    pub seed: u64,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            jobs: 20,
            p_arrival: 0.3,
            cpu_burst: 1..=12,
            io_burst: 1..=20,
            max_cpu_bursts: 4,
            seed: 0,
        }
    }
}

/// Bernoulli arrivals with uniformly drawn bursts. Ids are assigned from 1 in
/// arrival order. The same config always yields the same workload.
///
/// # Panics
/// If a burst range is empty.
pub fn generate(config: &GeneratorConfig) -> Vec<JobSpec> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let p_arrival = config.p_arrival.clamp(f64::MIN_POSITIVE, 1.0);
    let max_cpu_bursts = config.max_cpu_bursts.max(1);
    let mut jobs = Vec::with_capacity(config.jobs);

    let mut t = 0;
    while jobs.len() < config.jobs {
        if rng.random::<f64>() < p_arrival {
            let cpu_bursts = rng.random_range(1..=max_cpu_bursts);
            let mut bursts = Vec::with_capacity(cpu_bursts * 2 - 1);
            for i in 0..cpu_bursts {
                if i > 0 {
                    bursts.push(rng.random_range(config.io_burst.clone()).max(1));
                }
                bursts.push(rng.random_range(config.cpu_burst.clone()).max(1));
            }
            jobs.push(JobSpec::new(jobs.len() as u64 + 1, t, bursts));
        }
        t += 1;
    }

    jobs
}
