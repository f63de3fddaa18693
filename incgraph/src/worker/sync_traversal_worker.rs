//! The superstep driver of one fragment.
//!
//! `query` runs a batch traversal to quiescence, then applies the configured
//! update file through `delta_compute` and runs the traversal again from the
//! reseeded frontier until the cluster is quiescent a second time.

use crate::{
    app::{DependencyData, TraversalApp, VertexStateStore},
    comm::{CommError, CommSpec, Communicator, ParallelMessageManager},
    config::WorkerConfig,
    errors::WorkerError,
    parallel::ParallelEngine,
    worker::RunStats,
};
use incgraph_api::core::entities::{Gid, Oid};
use incgraph_core::{
    entities::fragment::Fragment, loader::inc_builder::IncFragmentBuilder,
    storage::vertex_set::DenseVertexSet, utils::errors::GraphError,
};
use rustc_hash::FxHashSet;
use std::{
    io::{self, Write},
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, Instant},
};
use tracing::{debug, error, info};

pub struct SyncTraversalWorker<A: TraversalApp> {
    app: Arc<A>,
    fragment: Arc<Fragment>,
    state: VertexStateStore<A::Value>,
    curr_modified: DenseVertexSet,
    next_modified: DenseVertexSet,
    comm_spec: CommSpec,
    communicator: Communicator,
    messages: ParallelMessageManager,
    engine: ParallelEngine,
    efile_update: Option<PathBuf>,
    delimiter: String,
}

impl<A: TraversalApp> SyncTraversalWorker<A> {
    pub fn new(
        app: Arc<A>,
        fragment: Arc<Fragment>,
        comm_spec: &CommSpec,
        config: &WorkerConfig,
    ) -> Result<Self, WorkerError> {
        let engine = ParallelEngine::new(config.thread_num, config.parallel_strategy())?;
        let state = VertexStateStore::new(&fragment, app.identity_element());
        let vertices = fragment.vertices();
        Ok(Self {
            app,
            fragment,
            state,
            curr_modified: DenseVertexSet::new(vertices),
            next_modified: DenseVertexSet::new(vertices),
            comm_spec: comm_spec.clone(),
            communicator: Communicator::new(comm_spec),
            messages: ParallelMessageManager::new(comm_spec),
            engine,
            efile_update: config.efile_update.clone(),
            delimiter: config.delimiter.clone(),
        })
    }

    pub fn init(&mut self) -> Result<(), WorkerError> {
        self.communicator.barrier()?;
        self.messages.init_channels(self.engine.thread_num());
        if self.comm_spec.is_coordinator() {
            info!(
                app = self.app.name(),
                fnum = self.comm_spec.fnum(),
                strategy = ?self.engine.strategy(),
                "Thread num: {}",
                self.engine.thread_num()
            );
        }
        Ok(())
    }

    pub fn fragment(&self) -> &Arc<Fragment> {
        &self.fragment
    }

    pub fn state(&self) -> &VertexStateStore<A::Value> {
        &self.state
    }

    fn init_app_state(&mut self) {
        let vertices = self.fragment.vertices();
        self.state = VertexStateStore::new(&self.fragment, self.app.identity_element());
        self.curr_modified.init(vertices);
        self.next_modified.init(vertices);
        self.app.init(&self.fragment, &self.state, &self.curr_modified);
    }

    /// Batch traversal, then one incremental pass over the update file.
    pub fn query(&mut self) -> Result<RunStats, WorkerError> {
        self.communicator.barrier()?;
        self.init_app_state();

        let mut stats = RunStats::default();
        let mut batch_stage = true;
        let mut step = 1;
        let mut exec_time = Duration::ZERO;
        self.messages.start();

        loop {
            let round_start = Instant::now();
            self.superstep(step)?;
            exec_time += round_start.elapsed();

            if self.messages.to_terminate()? {
                if batch_stage {
                    batch_stage = false;
                    stats.batch_steps = step;
                    stats.batch_time = exec_time;
                    if self.comm_spec.is_coordinator() {
                        info!(steps = step, "Batch time: {:.6} sec", exec_time.as_secs_f64());
                    }

                    let Some(efile_update) = self.efile_update.clone() else {
                        error!(
                            fid = self.comm_spec.fid(),
                            "Batch phase finished but efile_update is not set"
                        );
                        return Err(WorkerError::MissingUpdateFile);
                    };
                    let started = Instant::now();
                    let (local_reset, global_reset) = self.delta_compute(&efile_update)?;
                    stats.delta_compute_time = started.elapsed();
                    stats.local_reset = local_reset;
                    stats.global_reset = global_reset;

                    exec_time = Duration::ZERO;
                    step = 0;
                } else {
                    stats.inc_steps = step;
                    stats.inc_time = exec_time;
                    if self.comm_spec.is_coordinator() {
                        info!(steps = step, "Inc time: {:.6} sec", exec_time.as_secs_f64());
                    }
                    break;
                }
            }
            step += 1;
            self.curr_modified.swap(&mut self.next_modified);
        }

        self.communicator.barrier()?;
        Ok(stats)
    }

    fn superstep(&mut self, step: usize) -> Result<(), WorkerError> {
        let Self {
            app,
            fragment,
            state,
            curr_modified,
            next_modified,
            messages,
            engine,
            ..
        } = self;
        let (app, fragment, state, engine) = (&**app, &**fragment, &*state, &*engine);
        let (curr_modified, next_modified) = (&*curr_modified, &*next_modified);

        messages.start_a_round();
        engine.install(|| next_modified.parallel_clear());

        messages.parallel_process::<DependencyData<A::Value>, _>(engine, fragment, |_, v, delta| {
            if app.accumulate_to(state, v, &delta) {
                curr_modified.insert(v);
            }
        })?;

        engine.for_each(curr_modified, fragment.inner_vertices(), |_, u| {
            let (last_value, delta, changed) = {
                let mut value = state.values().lock(u);
                let last_value = *value;
                let delta = state.delta(u);
                let changed = app.combine_value_delta(&mut value, &delta);
                (last_value, delta, changed)
            };
            if changed {
                app.compute(fragment, u, &last_value, &delta, state, next_modified);
            }
        });

        sync_outer_deltas(app, fragment, state, next_modified, engine, messages)?;

        if !next_modified.is_empty() {
            messages.force_continue();
        }
        debug!(
            fid = fragment.fid(),
            step,
            next = next_modified.count(),
            "Finished superstep"
        );
        messages.finish_a_round()?;
        Ok(())
    }

    /// Apply the update file: invalidate, rebuild, carry state over and
    /// reseed `next_modified` for the incremental traversal.
    ///
    /// Returns the local and the cluster wide number of reset vertices.
    fn delta_compute(&mut self, efile_update: &Path) -> Result<(usize, usize), WorkerError> {
        self.communicator.barrier()?;
        let is_coordinator = self.comm_spec.is_coordinator();
        if is_coordinator {
            info!("Parsing update file {}", efile_update.display());
        }
        let mut builder =
            IncFragmentBuilder::new(self.fragment.clone()).set_delimiter(&self.delimiter);
        builder.init(efile_update)?;
        if is_coordinator {
            info!(
                added = builder.num_added(),
                deleted = builder.num_deleted(),
                "Parsed update file"
            );
        }

        if is_coordinator {
            info!("Resetting");
        }
        let deleted_edges = builder.deleted_edges_gid();
        let local_reset = self.invalidate(&deleted_edges)?;
        let global_reset = self.communicator.sum(local_reset)?;
        if is_coordinator {
            let total = self.fragment.total_vertices_num().max(1);
            info!(
                "# of reset vertices: {} reset percent: {}",
                global_reset,
                global_reset as f32 / total as f32
            );
            info!("Start a round from all vertices");
        }

        let snapshot = self.state.snapshot(&self.fragment);
        self.fragment = builder.build()?;
        self.init_app_state();
        let restored = self.state.restore(&self.fragment, &snapshot);
        debug!(
            fid = self.fragment.fid(),
            restored,
            inner = self.fragment.inner_vertices_num(),
            outer = self.fragment.outer_vertices_num(),
            "Rebuilt fragment"
        );

        self.reseed()?;
        self.communicator.barrier()?;
        Ok((local_reset, global_reset))
    }

    /// Reset every vertex whose delta was derived through a deleted edge,
    /// transitively and across fragments. Returns the local reset count.
    ///
    /// A reset vertex `u` sends its gid along every edge to an outer vertex;
    /// the owner resets the target only if its own parent is `u`.
    fn invalidate(&mut self, deleted_edges: &[(Gid, Gid)]) -> Result<usize, WorkerError> {
        let Self {
            app,
            fragment,
            state,
            messages,
            engine,
            ..
        } = self;
        let (app, fragment, state, engine) = (&**app, &**fragment, &*state, &*engine);
        let inner = fragment.inner_vertices();

        let local_gids: FxHashSet<Gid> = fragment
            .vertices()
            .into_iter()
            .map(|v| fragment.vertex2gid(v))
            .collect();

        let mut curr = DenseVertexSet::new(inner);
        let mut next = DenseVertexSet::new(inner);
        let reset_vertices = DenseVertexSet::new(inner);

        for (u_gid, v_gid) in deleted_edges {
            if !local_gids.contains(u_gid) || !fragment.is_inner_gid(*v_gid) {
                continue;
            }
            let v = fragment
                .gid2vertex(*v_gid)
                .ok_or(GraphError::UnresolvedGid {
                    gid: *v_gid,
                    fid: fragment.fid(),
                })?;
            if app.delta_parent_gid(state, v) == *u_gid {
                curr.insert(v);
            }
        }
        debug!(
            fid = fragment.fid(),
            deleted = deleted_edges.len(),
            invalidated = curr.count(),
            "Direct invalidations"
        );

        messages.start();
        loop {
            messages.start_a_round();
            {
                let curr = &curr;
                messages.parallel_process::<Gid, _>(engine, fragment, |_, v, parent_gid| {
                    if app.delta_parent_gid(state, v) == parent_gid {
                        curr.insert(v);
                    }
                })?;
            }

            {
                let (messages, next) = (&*messages, &next);
                engine.try_for_each(&curr, inner, |tid, u| {
                    let u_gid = fragment.vertex2gid(u);
                    for e in fragment.outgoing_adj_list(u) {
                        if fragment.is_inner_vertex(e.neighbor) {
                            if app.delta_parent_gid(state, e.neighbor) == u_gid {
                                next.insert(e.neighbor);
                            }
                        } else {
                            messages
                                .channel(tid)
                                .lock()
                                .sync_state_on_outer_vertex(fragment, e.neighbor, &u_gid)?;
                        }
                    }
                    Ok::<_, CommError>(())
                })?;
            }

            engine.for_each(&curr, inner, |_, u| {
                state.reset(u);
                reset_vertices.insert(u);
            });

            if !next.is_empty() {
                messages.force_continue();
            }
            messages.finish_a_round()?;

            curr.clear();
            curr.swap(&mut next);
            if messages.to_terminate()? {
                break;
            }
        }

        Ok(reset_vertices.count())
    }

    /// One round over every inner vertex holding a delta, filling
    /// `next_modified` with the frontier of the incremental traversal.
    fn reseed(&mut self) -> Result<(), WorkerError> {
        let Self {
            app,
            fragment,
            state,
            next_modified,
            messages,
            engine,
            ..
        } = self;
        let (app, fragment, state, engine) = (&**app, &**fragment, &*state, &*engine);
        let next_modified = &*next_modified;
        let identity = app.identity_element();

        messages.start_a_round();
        engine.for_each_vertex(fragment.inner_vertices(), |_, u| {
            let (value, delta) = {
                let mut value = state.values().lock(u);
                let delta = state.delta(u);
                if delta.value == identity {
                    return;
                }
                app.combine_value_delta(&mut value, &delta);
                (*value, delta)
            };
            app.compute(fragment, u, &value, &delta, state, next_modified);
        });

        sync_outer_deltas(app, fragment, state, next_modified, engine, messages)?;
        debug!(
            fid = fragment.fid(),
            seeds = next_modified.count(),
            "Reseeded"
        );
        messages.finish_a_round()?;
        Ok(())
    }

    /// Write `<oid> <value>` for every inner vertex.
    pub fn output<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        for v in self.fragment.inner_vertices() {
            writeln!(writer, "{} {}", self.fragment.get_id(v), self.state.value(v))?;
        }
        Ok(())
    }

    /// Final values of the inner vertices, in local order.
    pub fn results(&self) -> Vec<(Oid, A::Value)> {
        self.fragment
            .inner_vertices()
            .into_iter()
            .map(|v| (self.fragment.get_id(v), self.state.value(v)))
            .collect()
    }

    pub fn finalize(&mut self) -> Result<(), WorkerError> {
        self.messages.finalize()?;
        Ok(())
    }
}

/// Ship the deltas of the outer vertices in `set` to their owners.
fn sync_outer_deltas<A: TraversalApp>(
    app: &A,
    fragment: &Fragment,
    state: &VertexStateStore<A::Value>,
    set: &DenseVertexSet,
    engine: &ParallelEngine,
    messages: &ParallelMessageManager,
) -> Result<(), CommError> {
    let identity = app.identity_element();
    engine.try_for_each(set, fragment.outer_vertices(), |tid, v| {
        let delta = state.delta(v);
        if delta.value == identity {
            return Ok(());
        }
        messages
            .channel(tid)
            .lock()
            .sync_state_on_outer_vertex(fragment, v, &delta)
    })
}
