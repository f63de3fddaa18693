//! # incgraph-core
//!
//! Partition-level building blocks for the incgraph worker: the vertex map that
//! assigns stable global ids, the [`Fragment`](entities::fragment::Fragment)
//! holding one shard of the graph, the dense active sets and vertex arenas the
//! supersteps run over, and the loaders that build fragments from edge files and
//! rebuild them from update files.
//!
//! **Note** this crate is not meant to be used on its own, the driver lives in the
//! `incgraph` crate.

#[cfg(test)]
#[macro_use(quickcheck)]
extern crate quickcheck_macros;

pub mod entities;
pub mod loader;
pub mod storage;
pub mod utils;

pub use incgraph_api::core::entities::{FragmentId, Gid, IdParser, Oid, VertexRange, VID};
