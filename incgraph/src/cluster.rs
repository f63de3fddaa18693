//! Running a whole cluster inside one process, one thread per fragment.

use crate::{
    app::{AppKind, Bfs, Sssp, TraversalApp},
    comm::{CommSpec, CommWorld},
    config::WorkerConfig,
    errors::WorkerError,
    worker::{RunStats, SyncTraversalWorker},
};
use incgraph_api::core::entities::{FragmentId, Oid};
use incgraph_core::loader::EdgeFileLoader;
use itertools::Itertools;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    sync::Arc,
    thread,
};
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq)]
pub struct WorkerOutput<V> {
    pub fid: FragmentId,
    pub values: Vec<(Oid, V)>,
    pub stats: RunStats,
}

/// Final values of every fragment, concatenated and sorted by oid.
pub fn merged_values<V: Copy>(outputs: &[WorkerOutput<V>]) -> Vec<(Oid, V)> {
    outputs
        .iter()
        .flat_map(|out| out.values.iter().copied())
        .sorted_by_key(|(oid, _)| *oid)
        .collect()
}

pub fn result_file(out_prefix: &Path, fid: FragmentId) -> PathBuf {
    out_prefix.join(format!("result_frag_{fid}"))
}

/// Releases the other workers if this one stops early, by error or by panic.
struct AbortOnDrop {
    comm_spec: CommSpec,
    armed: bool,
}

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        if self.armed {
            self.comm_spec.abort();
        }
    }
}

fn run_worker<A: TraversalApp>(
    app: Arc<A>,
    comm_spec: &CommSpec,
    config: &WorkerConfig,
) -> Result<WorkerOutput<A::Value>, WorkerError> {
    let fragment = EdgeFileLoader::new(&config.efile)
        .set_directed(config.directed)
        .set_delimiter(&config.delimiter)
        .with_vertex_file(config.vfile.as_ref())
        .load(comm_spec.fid(), comm_spec.fnum())?;

    let mut worker = SyncTraversalWorker::new(app, Arc::new(fragment), comm_spec, config)?;
    worker.init()?;
    let stats = worker.query()?;

    if let Some(out_prefix) = &config.out_prefix {
        let mut writer = BufWriter::new(File::create(result_file(out_prefix, comm_spec.fid()))?);
        worker.output(&mut writer)?;
        writer.flush()?;
    }
    let values = worker.results();
    worker.finalize()?;

    Ok(WorkerOutput {
        fid: comm_spec.fid(),
        values,
        stats,
    })
}

/// Run `app` on `config.fnum` fragments and wait for all of them.
///
/// If a worker fails, the cluster is aborted and the first error that is not
/// a consequence of the abort is returned.
pub fn run_cluster<A: TraversalApp>(
    config: &WorkerConfig,
    app: A,
) -> Result<Vec<WorkerOutput<A::Value>>, WorkerError> {
    config.validate()?;
    let world = CommWorld::new(config.fnum);
    let app = Arc::new(app);
    info!(
        app = app.name(),
        fnum = config.fnum,
        efile = %config.efile.display(),
        "Starting cluster"
    );

    let mut handles = Vec::with_capacity(config.fnum);
    for comm_spec in world.comm_specs() {
        let app = app.clone();
        let config = config.clone();
        let spawned = thread::Builder::new()
            .name(format!("worker-{}", comm_spec.fid()))
            .spawn(move || {
                let mut guard = AbortOnDrop {
                    comm_spec: comm_spec.clone(),
                    armed: true,
                };
                let result = run_worker(app, &comm_spec, &config);
                if let Err(err) = &result {
                    if !err.is_aborted() {
                        error!(fid = comm_spec.fid(), "Worker failed: {err}");
                    }
                } else {
                    guard.armed = false;
                }
                result
            });
        match spawned {
            Ok(handle) => handles.push(handle),
            Err(err) => {
                world.abort();
                for handle in handles {
                    let _ = handle.join();
                }
                return Err(err.into());
            }
        }
    }

    let results = handles
        .into_iter()
        .enumerate()
        .map(|(fid, handle)| {
            handle
                .join()
                .unwrap_or(Err(WorkerError::WorkerPanicked(fid)))
        })
        .collect_vec();

    let mut outputs = Vec::with_capacity(results.len());
    let mut aborted = None;
    for result in results {
        match result {
            Ok(output) => outputs.push(output),
            Err(err) if err.is_aborted() => aborted = Some(err),
            Err(err) => return Err(err),
        }
    }
    match aborted {
        Some(err) => Err(err),
        None => Ok(outputs),
    }
}

/// Run the application named in `config`, returning the merged results
/// rendered as `<oid> <value>` lines.
pub fn run_configured(config: &WorkerConfig) -> Result<Vec<String>, WorkerError> {
    fn render<V: std::fmt::Display + Copy>(outputs: &[WorkerOutput<V>]) -> Vec<String> {
        merged_values(outputs)
            .into_iter()
            .map(|(oid, value)| format!("{oid} {value}"))
            .collect()
    }

    let lines = match config.application {
        AppKind::Sssp => render(&run_cluster(config, Sssp::new(config.sssp_source))?),
        AppKind::Bfs => render(&run_cluster(config, Bfs::new(config.bfs_source))?),
    };
    Ok(lines)
}
