use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use env_logger::Builder;
use log::{LevelFilter, error};
use sched_sim::{
    MlfqConfig, MlfqScheduler, Policy, RoundRobinScheduler, Sim, Ticks,
    scheduler::mlfq::DEFAULT_OVERFLOW_THRESHOLD,
    sim::{
        JobSpec,
        workload::{self, GeneratorConfig},
    },
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Algorithm {
    Rr,
    Mlfq,
}

/// CPU scheduling simulator
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// Workload file
    #[arg(short, long, default_value = "jobs.conf", value_name = "FILENAME")]
    conf: PathBuf,

    /// Trace every event
    #[arg(short, long)]
    verbose: bool,

    #[arg(short, long, value_enum, default_value_t = Algorithm::Rr, value_name = "ALG")]
    sched: Algorithm,

    /// Maximum simulated time
    #[arg(short, long, default_value_t = 50_000, value_name = "TIME")]
    maxtime: Ticks,

    /// Time quantum, or one quantum per level for mlfq
    #[arg(short, long, num_args = 1.., default_values_t = vec![5], value_name = "Q")]
    quanta: Vec<Ticks>,

    /// Lowest-level expiries tolerated before mlfq adds a level
    #[arg(long, default_value_t = DEFAULT_OVERFLOW_THRESHOLD)]
    overflow_threshold: u64,

    /// Never add mlfq levels beyond the configured quanta
    #[arg(long)]
    no_expand: bool,

    /// Simulate N generated jobs instead of reading --conf
    #[arg(long, value_name = "N")]
    random: Option<usize>,

    /// Seed for --random
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

impl Args {
    fn policy(&self) -> Result<Policy, sched_sim::SchedError> {
        Ok(match self.sched {
            Algorithm::Rr => RoundRobinScheduler::new(self.quanta[0])?.into(),
            Algorithm::Mlfq => {
                let config = MlfqConfig::new(self.quanta.clone())
                    .with_overflow_threshold(self.overflow_threshold)
                    .with_expansion(!self.no_expand);
                MlfqScheduler::new(config)?.into()
            }
        })
    }

    /// Generated jobs when `--random` is given, otherwise the `--conf` file.
    fn jobs(&self) -> Result<Vec<JobSpec>, String> {
        match self.random {
            Some(jobs) => Ok(workload::generate(&GeneratorConfig {
                jobs,
                seed: self.seed,
                ..GeneratorConfig::default()
            })),
            None => workload::load(&self.conf)
                .map_err(|err| format!("{}: {err}", self.conf.display())),
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();

    let mut logger = Builder::from_default_env();
    logger.format(|buf, record| writeln!(buf, "{}", record.args()));
    if args.verbose {
        logger.filter_level(LevelFilter::Info);
    }
    logger.init();

    let jobs = match args.jobs() {
        Ok(jobs) => jobs,
        Err(err) => {
            error!("{err}");
            return ExitCode::from(2);
        }
    };
    let policy = match args.policy() {
        Ok(policy) => policy,
        Err(err) => {
            error!("{err}");
            return ExitCode::from(2);
        }
    };

    let mut sim = match Sim::new(jobs, policy) {
        Ok(sim) => sim,
        Err(err) => {
            error!("{err}");
            return ExitCode::from(2);
        }
    };

    match sim.advance(args.maxtime) {
        // Unfinished jobs are flagged in the report itself
        Ok(_) => {
            print!("{}", sim.report());
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("simulation aborted at t={}: {err}", sim.core.now());
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.conf");
        let args = Args::parse_from(["sched_sim", "--conf", path.to_str().unwrap()]);
        let err = args.jobs().unwrap_err();
        assert!(err.starts_with(&path.display().to_string()));
    }

    #[test]
    fn random_mode_ignores_the_conf_path() {
        let args = Args::parse_from(["sched_sim", "--conf", "/nonexistent", "--random", "3"]);
        assert_eq!(args.jobs().unwrap().len(), 3);
    }

    #[test]
    fn quanta_select_the_policy() {
        let args = Args::parse_from(["sched_sim", "-s", "mlfq", "-q", "2", "4"]);
        assert!(matches!(args.policy(), Ok(Policy::Mlfq(_))));
        let args = Args::parse_from(["sched_sim", "-q", "0"]);
        assert!(args.policy().is_err());
    }
}
