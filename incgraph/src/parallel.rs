//! Thread pools and parallel iteration over active sets.

use incgraph_api::core::entities::{VertexRange, VID};
use incgraph_core::storage::vertex_set::DenseVertexSet;
use once_cell::sync::Lazy;
use rayon::{prelude::*, ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Vertices handed out at once under [`ParallelStrategy::Wide`].
const WIDE_CHUNK: usize = 1024;

pub static POOL: Lazy<Arc<ThreadPool>> = Lazy::new(|| {
    let num_threads = std::env::var("INCGRAPH_MAX_THREADS")
        .ok()
        .and_then(|s| s.parse::<usize>().ok())
        .unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        });

    let pool = ThreadPoolBuilder::new()
        .num_threads(num_threads)
        .thread_name(|idx| format!("incgraph-{idx}"))
        .build()
        .expect("failed to build the global thread pool");

    Arc::new(pool)
});

pub fn custom_pool(n_threads: usize) -> Result<Arc<ThreadPool>, ThreadPoolBuildError> {
    let pool = ThreadPoolBuilder::new().num_threads(n_threads).build()?;
    Ok(Arc::new(pool))
}

/// How a vertex range is split between threads.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParallelStrategy {
    /// One contiguous block per thread.
    #[default]
    Simple,
    /// Many small blocks, balanced by work stealing.
    Wide,
}

#[derive(Debug, Clone)]
pub struct ParallelEngine {
    pool: Arc<ThreadPool>,
    strategy: ParallelStrategy,
}

impl ParallelEngine {
    /// `None` shares the global [`POOL`].
    pub fn new(
        thread_num: Option<usize>,
        strategy: ParallelStrategy,
    ) -> Result<Self, ThreadPoolBuildError> {
        let pool = match thread_num {
            Some(n) => custom_pool(n)?,
            None => POOL.clone(),
        };
        Ok(Self { pool, strategy })
    }

    pub fn thread_num(&self) -> usize {
        self.pool.current_num_threads()
    }

    pub fn strategy(&self) -> ParallelStrategy {
        self.strategy
    }

    pub fn install<R: Send>(&self, f: impl FnOnce() -> R + Send) -> R {
        self.pool.install(f)
    }

    fn chunks(&self, range: VertexRange) -> Vec<VertexRange> {
        if range.is_empty() {
            return vec![];
        }
        let size = match self.strategy {
            ParallelStrategy::Simple => range.len().div_ceil(self.thread_num()),
            ParallelStrategy::Wide => WIDE_CHUNK,
        };
        let (begin, end) = (range.begin().0, range.end().0);
        (begin..end)
            .step_by(size.max(1))
            .map(|start| VertexRange::new(start, (start + size).min(end)))
            .collect()
    }

    /// Run `f(tid, v)` for every member of `set` inside `range`.
    pub fn for_each<F>(&self, set: &DenseVertexSet, range: VertexRange, f: F)
    where
        F: Fn(usize, VID) + Send + Sync,
    {
        let _ = self.try_for_each(set, range, |tid, v| {
            f(tid, v);
            Ok::<_, std::convert::Infallible>(())
        });
    }

    /// Like [`for_each`](Self::for_each), stopping at the first error.
    pub fn try_for_each<F, E>(&self, set: &DenseVertexSet, range: VertexRange, f: F) -> Result<(), E>
    where
        F: Fn(usize, VID) -> Result<(), E> + Send + Sync,
        E: Send,
    {
        let chunks = self.chunks(set.range().intersect(&range));
        self.install(|| {
            chunks.par_iter().try_for_each(|chunk| {
                let tid = rayon::current_thread_index().unwrap_or(0);
                set.iter_range(*chunk).try_for_each(|v| f(tid, v))
            })
        })
    }

    /// Run `f(tid, v)` for every vertex of `range`.
    pub fn for_each_vertex<F>(&self, range: VertexRange, f: F)
    where
        F: Fn(usize, VID) + Send + Sync,
    {
        let chunks = self.chunks(range);
        self.install(|| {
            chunks.par_iter().for_each(|chunk| {
                let tid = rayon::current_thread_index().unwrap_or(0);
                chunk.iter().for_each(|v| f(tid, v))
            })
        })
    }
}
