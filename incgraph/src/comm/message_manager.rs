//! Round-based vertex messaging.
//!
//! A round looks like
//!
//! ```text
//! start_a_round -> parallel_process -> (compute, sync_state_on_outer_vertex)*
//!               -> force_continue? -> finish_a_round -> to_terminate
//! ```
//!
//! Messages written during round `r` are delivered at the start of round
//! `r + 1`. Every message is addressed to the mirror of a vertex on its owning
//! fragment, and carries that vertex's gid so the receiver can resolve its
//! own local id.

use crate::{
    comm::{CommError, CommSpec, Communicator, Envelope},
    errors::WorkerError,
    parallel::ParallelEngine,
};
use crossbeam_channel::{Receiver, Sender};
use incgraph_api::core::entities::{FragmentId, Gid, VID};
use incgraph_core::{entities::fragment::Fragment, utils::errors::GraphError};
use parking_lot::Mutex;
use rayon::prelude::*;
use serde::{de::DeserializeOwned, Serialize};
use tracing::trace;

/// Per-thread outgoing buffers, one per destination fragment.
#[derive(Debug)]
pub struct ThreadLocalMessageBuffer {
    buffers: Vec<Vec<u8>>,
    counts: Vec<usize>,
}

impl ThreadLocalMessageBuffer {
    fn new(fnum: usize) -> Self {
        Self {
            buffers: vec![vec![]; fnum],
            counts: vec![0; fnum],
        }
    }

    /// Queue `msg` for the owner of the outer vertex `v`.
    pub fn sync_state_on_outer_vertex<M: Serialize>(
        &mut self,
        fragment: &Fragment,
        v: VID,
        msg: &M,
    ) -> Result<(), CommError> {
        let fid = fragment.get_frag_id(v);
        let gid = fragment.vertex2gid(v);
        bincode::serialize_into(&mut self.buffers[fid], &(gid, msg))?;
        self.counts[fid] += 1;
        Ok(())
    }

    fn take(&mut self) -> impl Iterator<Item = (FragmentId, usize, Vec<u8>)> + '_ {
        self.buffers
            .iter_mut()
            .zip(self.counts.iter_mut())
            .enumerate()
            .filter(|(_, (_, count))| **count > 0)
            .map(|(fid, (bytes, count))| (fid, std::mem::take(count), std::mem::take(bytes)))
    }
}

#[derive(Debug)]
pub struct ParallelMessageManager {
    comm_spec: CommSpec,
    communicator: Communicator,
    inbox: Receiver<Envelope>,
    outboxes: Vec<Sender<Envelope>>,
    channels: Vec<Mutex<ThreadLocalMessageBuffer>>,
    to_process: Vec<Envelope>,
    sent: usize,
    force_continue: bool,
    round: usize,
}

impl ParallelMessageManager {
    pub fn new(comm_spec: &CommSpec) -> Self {
        let world = comm_spec.world();
        Self {
            comm_spec: comm_spec.clone(),
            communicator: Communicator::new(comm_spec),
            inbox: world.receivers[comm_spec.worker_id()].clone(),
            outboxes: world.inboxes.clone(),
            channels: vec![],
            to_process: vec![],
            sent: 0,
            force_continue: false,
            round: 0,
        }
    }

    /// Allocate one outgoing buffer per compute thread.
    pub fn init_channels(&mut self, thread_num: usize) {
        let fnum = self.comm_spec.fnum();
        self.channels = (0..thread_num.max(1))
            .map(|_| Mutex::new(ThreadLocalMessageBuffer::new(fnum)))
            .collect();
    }

    /// The buffer owned by compute thread `tid`.
    pub fn channel(&self, tid: usize) -> &Mutex<ThreadLocalMessageBuffer> {
        &self.channels[tid % self.channels.len()]
    }

    pub fn start(&mut self) {
        self.round = 0;
    }

    /// Collect everything delivered by the previous round.
    pub fn start_a_round(&mut self) {
        self.round += 1;
        self.sent = 0;
        self.force_continue = false;
        self.to_process.extend(self.inbox.try_iter());
        trace!(
            fid = self.comm_spec.fid(),
            round = self.round,
            batches = self.to_process.len(),
            "Start round"
        );
    }

    /// Decode the received messages and hand each to `f(tid, v, msg)` in
    /// parallel, `v` being the local id of the addressed vertex.
    pub fn parallel_process<M, F>(
        &mut self,
        engine: &ParallelEngine,
        fragment: &Fragment,
        f: F,
    ) -> Result<(), WorkerError>
    where
        M: DeserializeOwned,
        F: Fn(usize, VID, M) + Send + Sync,
    {
        let envelopes = std::mem::take(&mut self.to_process);
        engine.install(|| {
            envelopes.par_iter().try_for_each(|envelope| {
                let tid = rayon::current_thread_index().unwrap_or(0);
                let mut bytes = envelope.bytes.as_slice();
                for _ in 0..envelope.count {
                    let (gid, msg): (Gid, M) =
                        bincode::deserialize_from(&mut bytes).map_err(CommError::from)?;
                    let v = fragment
                        .gid2vertex(gid)
                        .ok_or(GraphError::UnresolvedGid {
                            gid,
                            fid: fragment.fid(),
                        })?;
                    f(tid, v, msg);
                }
                trace!(from = envelope.from, count = envelope.count, "Processed batch");
                Ok(())
            })
        })
    }

    /// Signal that this worker still has local work, even if it sent nothing.
    pub fn force_continue(&mut self) {
        self.force_continue = true;
    }

    /// Flush every buffered message between two barriers, so all workers
    /// leave the round together and nothing of round `r` leaks into `r`'s
    /// processing.
    pub fn finish_a_round(&mut self) -> Result<(), CommError> {
        self.communicator.barrier()?;
        let from = self.comm_spec.fid();
        for channel in self.channels.iter() {
            let mut channel = channel.lock();
            for (fid, count, bytes) in channel.take() {
                self.sent += count;
                self.outboxes[fid]
                    .send(Envelope { from, count, bytes })
                    .map_err(|_| CommError::Disconnected(fid))?;
            }
        }
        self.communicator.barrier()
    }

    /// `true` on every worker once a whole round passed without messages and
    /// without anyone forcing another round.
    pub fn to_terminate(&mut self) -> Result<bool, CommError> {
        let more = self.sent > 0 || self.force_continue;
        Ok(!self.communicator.any(more)?)
    }

    pub fn finalize(&mut self) -> Result<(), CommError> {
        self.to_process.clear();
        self.communicator.barrier()
    }
}

#[cfg(test)]
mod message_manager_tests {
    use super::*;
    use crate::{comm::CommWorld, parallel::ParallelStrategy};
    use incgraph_core::entities::vertex_map::VertexMap;
    use itertools::Itertools;
    use std::{sync::Arc, thread};

    // a ring 0 -> 1 -> 2 -> 3 -> 0 split over two fragments
    fn ring_fragment(fid: usize) -> Fragment {
        let vm = Arc::new(VertexMap::from_oids(2, 0..4));
        let edges = (0..4u64)
            .map(|i| {
                (
                    vm.get_gid(i).unwrap(),
                    vm.get_gid((i + 1) % 4).unwrap(),
                    1.0,
                )
            })
            .collect_vec();
        Fragment::new(fid, vm, true, edges)
    }

    #[test]
    fn messages_arrive_in_the_next_round_only() {
        let world = CommWorld::new(2);
        let handles = world
            .comm_specs()
            .into_iter()
            .map(|spec| {
                thread::spawn(move || {
                    let fragment = ring_fragment(spec.fid());
                    let engine = ParallelEngine::new(Some(2), ParallelStrategy::Simple).unwrap();
                    let mut mm = ParallelMessageManager::new(&spec);
                    mm.init_channels(engine.thread_num());
                    mm.start();

                    mm.start_a_round();
                    for v in fragment.outer_vertices() {
                        let value = fragment.get_id(v) * 10;
                        mm.channel(0)
                            .lock()
                            .sync_state_on_outer_vertex(&fragment, v, &value)
                            .unwrap();
                    }
                    mm.finish_a_round().unwrap();
                    assert!(!mm.to_terminate().unwrap());

                    mm.start_a_round();
                    let received = Mutex::new(vec![]);
                    mm.parallel_process::<u64, _>(&engine, &fragment, |_, v, msg| {
                        received.lock().push((fragment.get_id(v), msg));
                    })
                    .unwrap();
                    mm.finish_a_round().unwrap();
                    let terminated = mm.to_terminate().unwrap();
                    mm.finalize().unwrap();
                    (received.into_inner().into_iter().sorted().collect_vec(), terminated)
                })
            })
            .collect_vec();

        let results = handles.into_iter().map(|h| h.join().unwrap()).collect_vec();
        // fragment 0 owns 0 and 2 and mirrors 1 and 3
        assert_eq!(results[0], (vec![(0, 0), (2, 20)], true));
        assert_eq!(results[1], (vec![(1, 10), (3, 30)], true));
    }

    #[test]
    fn force_continue_keeps_everyone_running() {
        let world = CommWorld::new(3);
        let handles = world
            .comm_specs()
            .into_iter()
            .map(|spec| {
                thread::spawn(move || {
                    let mut mm = ParallelMessageManager::new(&spec);
                    mm.init_channels(1);
                    mm.start_a_round();
                    if spec.fid() == 1 {
                        mm.force_continue();
                    }
                    mm.finish_a_round().unwrap();
                    let first = mm.to_terminate().unwrap();
                    mm.start_a_round();
                    mm.finish_a_round().unwrap();
                    (first, mm.to_terminate().unwrap())
                })
            })
            .collect_vec();
        for h in handles {
            assert_eq!(h.join().unwrap(), (false, true));
        }
    }
}
