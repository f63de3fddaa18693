//! # incgraph
//!
//! A vertex-centric graph engine that keeps traversal results up to date
//! under edge insertions and deletions.
//!
//! Each fragment of the graph is driven by a
//! [`SyncTraversalWorker`](worker::SyncTraversalWorker) through synchronous
//! supersteps. After the batch traversal reaches global quiescence, the worker
//! reads an update file, resets exactly the vertices whose results were derived
//! through a deleted edge, rebuilds its fragment and resumes from the smallest
//! frontier that yields the same results as a full recomputation.
//!
//! ## Example
//!
//! ```no_run
//! use incgraph::{app::Sssp, cluster::run_cluster, config::WorkerConfigBuilder};
//!
//! let config = WorkerConfigBuilder::new()
//!     .with_efile("graph.e")
//!     .with_efile_update("graph.update")
//!     .with_fnum(4)
//!     .build();
//! let outputs = run_cluster(&config, Sssp::new(0)).unwrap();
//! for (oid, distance) in incgraph::cluster::merged_values(&outputs) {
//!     println!("{oid} {distance}");
//! }
//! ```

#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;

pub mod app;
pub mod cluster;
pub mod comm;
pub mod config;
pub mod errors;
pub mod parallel;
pub mod worker;

pub mod prelude {
    pub use crate::{
        app::{AppKind, Bfs, DependencyData, Sssp, TraversalApp, VertexStateStore},
        cluster::{merged_values, run_cluster, WorkerOutput},
        config::{load_config, WorkerConfig, WorkerConfigBuilder},
        errors::WorkerError,
        worker::{RunStats, SyncTraversalWorker},
    };
    pub use incgraph_api::core::entities::{Gid, Oid, VID};
}
