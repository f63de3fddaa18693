use crate::comm::{CommError, CommSpec};

/// Collective operations over all workers of a [`CommWorld`](super::CommWorld).
///
/// Every worker has to call the same collectives in the same order.
#[derive(Debug, Clone)]
pub struct Communicator {
    comm_spec: CommSpec,
}

impl Communicator {
    pub fn new(comm_spec: &CommSpec) -> Self {
        Self {
            comm_spec: comm_spec.clone(),
        }
    }

    pub fn barrier(&self) -> Result<(), CommError> {
        self.comm_spec.world().barrier.wait()
    }

    fn all_reduce(&self, value: u64, op: impl Fn(u64, u64) -> u64) -> Result<u64, CommError> {
        let world = self.comm_spec.world();
        world.slots.lock()[self.comm_spec.worker_id()] = value;
        world.barrier.wait()?;
        let reduced = world.slots.lock().iter().copied().reduce(op).unwrap_or(value);
        // nobody may overwrite a slot before everyone has read it
        world.barrier.wait()?;
        Ok(reduced)
    }

    pub fn sum(&self, value: usize) -> Result<usize, CommError> {
        Ok(self.all_reduce(value as u64, |a, b| a + b)? as usize)
    }

    /// `true` on every worker iff `flag` is set on at least one.
    pub fn any(&self, flag: bool) -> Result<bool, CommError> {
        Ok(self.all_reduce(flag as u64, |a, b| a | b)? != 0)
    }
}

#[cfg(test)]
mod communicator_tests {
    use super::*;
    use crate::comm::CommWorld;
    use std::thread;

    fn on_every_worker<T, F>(n: usize, f: F) -> Vec<T>
    where
        T: Send + 'static,
        F: Fn(usize, Communicator) -> T + Send + Sync + Copy + 'static,
    {
        let world = CommWorld::new(n);
        world
            .comm_specs()
            .into_iter()
            .map(|spec| thread::spawn(move || f(spec.worker_id(), Communicator::new(&spec))))
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect()
    }

    #[test]
    fn sum_over_repeated_rounds() {
        let results = on_every_worker(4, |id, comm| {
            (0..10)
                .map(|round| comm.sum(id + round).unwrap())
                .collect::<Vec<_>>()
        });
        for per_worker in results {
            for (round, sum) in per_worker.into_iter().enumerate() {
                assert_eq!(sum, 6 + 4 * round);
            }
        }
    }

    #[test]
    fn any_is_a_logical_or() {
        let results = on_every_worker(3, |id, comm| {
            (comm.any(id == 2).unwrap(), comm.any(false).unwrap())
        });
        assert!(results.iter().all(|r| *r == (true, false)));
    }
}
