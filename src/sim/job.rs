use crate::core::state::{JobId, Ticks};
use crate::error::SimError;

/// A job as described by a workload: arrival time plus alternating CPU/I/O
/// bursts, CPU first and last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub id: JobId,
    pub arrival_time: Ticks,
    pub bursts: Vec<Ticks>,
}

impl JobSpec {
    pub fn new(id: JobId, arrival_time: Ticks, bursts: impl Into<Vec<Ticks>>) -> Self {
        Self {
            id,
            arrival_time,
            bursts: bursts.into(),
        }
    }

    pub fn validate(&self) -> Result<(), SimError> {
        let invalid = |reason: &str| SimError::InvalidJob {
            job: self.id,
            reason: reason.to_string(),
        };

        if self.bursts.is_empty() {
            return Err(invalid("no bursts"));
        }
        if self.bursts.len() % 2 == 0 {
            return Err(invalid("burst list must start and end with a CPU burst"));
        }
        if self.bursts.contains(&0) {
            return Err(invalid("bursts must be at least one tick long"));
        }
        self.bursts
            .iter()
            .try_fold(self.arrival_time, |end, &b| end.checked_add(b))
            .ok_or_else(|| invalid("arrival plus bursts exceeds the time range"))?;
        Ok(())
    }

    pub fn cpu_bursts(&self) -> usize {
        self.bursts.len() / 2 + 1
    }

    pub fn run_time(&self) -> Ticks {
        self.bursts.iter().step_by(2).sum()
    }

    pub fn io_time(&self) -> Ticks {
        self.bursts.iter().skip(1).step_by(2).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_and_io_totals() {
        let job = JobSpec::new(1, 0, [4, 10, 2]);
        assert_eq!(job.cpu_bursts(), 2);
        assert_eq!(job.run_time(), 6);
        assert_eq!(job.io_time(), 10);
    }

    #[test]
    fn malformed_burst_lists_are_rejected() {
        assert!(JobSpec::new(1, 0, Vec::new()).validate().is_err());
        assert!(JobSpec::new(1, 0, [3, 4]).validate().is_err());
        assert!(JobSpec::new(1, 0, [3, 0, 1]).validate().is_err());
        assert!(JobSpec::new(1, 0, [3, 1, 1]).validate().is_ok());
    }

    #[test]
    fn bursts_past_the_end_of_time_are_rejected() {
        let job = JobSpec::new(1, 1, [3, 1, Ticks::MAX - 4, 1, 1]);
        assert!(matches!(job.validate(), Err(SimError::InvalidJob { job: 1, .. })));
        assert!(JobSpec::new(1, Ticks::MAX, [1]).validate().is_err());
        assert!(JobSpec::new(1, 0, [Ticks::MAX]).validate().is_ok());
    }
}
