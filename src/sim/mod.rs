pub mod driver;
pub mod job;
pub mod report;
pub mod workload;

pub use driver::{RunOutcome, Sim};
pub use job::JobSpec;
pub use report::{Averages, EngineStats, JobOutcome, JobReport, SimReport};
pub use workload::{GeneratorConfig, WorkloadError};
