//! Communication between the fragments of a cluster.
//!
//! Every fragment runs on its own thread. Collectives go through a shared
//! [`CommWorld`]: an abortable barrier plus one reduce slot per worker. Vertex
//! messages travel as bincode-encoded batches over one unbounded inbox per
//! fragment.

mod communicator;
mod message_manager;

pub use communicator::Communicator;
pub use message_manager::{ParallelMessageManager, ThreadLocalMessageBuffer};

use crossbeam_channel::{Receiver, Sender};
use incgraph_api::core::entities::FragmentId;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;

/// The worker that logs progress for the whole cluster.
pub const COORDINATOR: FragmentId = 0;

#[derive(thiserror::Error, Debug)]
pub enum CommError {
    #[error("Communication aborted because another worker failed")]
    Aborted,
    #[error("Failed to encode or decode a message: {0}")]
    Codec(#[from] bincode::Error),
    #[error("Inbox of worker {0} is closed")]
    Disconnected(FragmentId),
}

/// One batch of messages from `from`, `count` records back to back.
#[derive(Debug)]
pub(crate) struct Envelope {
    pub(crate) from: FragmentId,
    pub(crate) count: usize,
    pub(crate) bytes: Vec<u8>,
}

#[derive(Debug, Default)]
struct BarrierState {
    arrived: usize,
    generation: u64,
    aborted: bool,
}

/// A reusable barrier that can be torn down.
///
/// After [`abort`](AbortableBarrier::abort) every waiter, present or future,
/// gets [`CommError::Aborted`].
#[derive(Debug)]
pub(crate) struct AbortableBarrier {
    parties: usize,
    state: Mutex<BarrierState>,
    cvar: Condvar,
}

impl AbortableBarrier {
    fn new(parties: usize) -> Self {
        Self {
            parties,
            state: Mutex::new(BarrierState::default()),
            cvar: Condvar::new(),
        }
    }

    pub(crate) fn wait(&self) -> Result<(), CommError> {
        let mut state = self.state.lock();
        if state.aborted {
            return Err(CommError::Aborted);
        }
        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == self.parties {
            state.arrived = 0;
            state.generation += 1;
            self.cvar.notify_all();
            return Ok(());
        }
        while state.generation == generation && !state.aborted {
            self.cvar.wait(&mut state);
        }
        if state.generation == generation {
            Err(CommError::Aborted)
        } else {
            Ok(())
        }
    }

    fn abort(&self) {
        self.state.lock().aborted = true;
        self.cvar.notify_all();
    }

    fn is_aborted(&self) -> bool {
        self.state.lock().aborted
    }
}

#[derive(Debug)]
pub(crate) struct WorldInner {
    pub(crate) barrier: AbortableBarrier,
    pub(crate) slots: Mutex<Vec<u64>>,
    pub(crate) inboxes: Vec<Sender<Envelope>>,
    pub(crate) receivers: Vec<Receiver<Envelope>>,
}

/// Shared state of an in-process cluster of `worker_num` fragments.
#[derive(Debug, Clone)]
pub struct CommWorld {
    inner: Arc<WorldInner>,
}

impl CommWorld {
    pub fn new(worker_num: usize) -> Self {
        let (inboxes, receivers) = (0..worker_num)
            .map(|_| crossbeam_channel::unbounded())
            .unzip();
        Self {
            inner: Arc::new(WorldInner {
                barrier: AbortableBarrier::new(worker_num),
                slots: Mutex::new(vec![0; worker_num]),
                inboxes,
                receivers,
            }),
        }
    }

    pub fn worker_num(&self) -> usize {
        self.inner.inboxes.len()
    }

    pub fn comm_spec(&self, worker_id: FragmentId) -> CommSpec {
        debug_assert!(worker_id < self.worker_num());
        CommSpec {
            worker_id,
            world: self.inner.clone(),
        }
    }

    pub fn comm_specs(&self) -> Vec<CommSpec> {
        (0..self.worker_num()).map(|id| self.comm_spec(id)).collect()
    }

    /// Release every worker blocked in a collective.
    pub fn abort(&self) {
        self.inner.barrier.abort();
    }
}

/// Identity of one worker inside a [`CommWorld`].
///
/// Workers and fragments are one to one, so the worker id doubles as the
/// fragment id.
#[derive(Debug, Clone)]
pub struct CommSpec {
    worker_id: FragmentId,
    world: Arc<WorldInner>,
}

impl CommSpec {
    pub fn worker_id(&self) -> FragmentId {
        self.worker_id
    }

    pub fn worker_num(&self) -> usize {
        self.world.inboxes.len()
    }

    pub fn fid(&self) -> FragmentId {
        self.worker_id
    }

    pub fn fnum(&self) -> usize {
        self.worker_num()
    }

    pub fn is_coordinator(&self) -> bool {
        self.worker_id == COORDINATOR
    }

    pub fn abort(&self) {
        self.world.barrier.abort();
    }

    pub fn is_aborted(&self) -> bool {
        self.world.barrier.is_aborted()
    }

    pub(crate) fn world(&self) -> &Arc<WorldInner> {
        &self.world
    }
}

#[cfg(test)]
mod comm_tests {
    use super::*;
    use std::thread;

    #[test]
    fn barrier_is_reusable() {
        let world = CommWorld::new(4);
        let handles = world
            .comm_specs()
            .into_iter()
            .map(|spec| {
                thread::spawn(move || {
                    for _ in 0..100 {
                        spec.world().barrier.wait()?;
                    }
                    Ok::<_, CommError>(())
                })
            })
            .collect::<Vec<_>>();
        for h in handles {
            h.join().unwrap().unwrap();
        }
    }

    #[test]
    fn abort_releases_waiters() {
        let world = CommWorld::new(3);
        let specs = world.comm_specs();
        let waiters = specs[1..]
            .iter()
            .cloned()
            .map(|spec| thread::spawn(move || spec.world().barrier.wait()))
            .collect::<Vec<_>>();
        specs[0].abort();
        for w in waiters {
            assert!(matches!(w.join().unwrap(), Err(CommError::Aborted)));
        }
        assert!(specs[0].is_aborted());
        assert!(matches!(
            specs[0].world().barrier.wait(),
            Err(CommError::Aborted)
        ));
    }
}
