//! Incremental traversal algorithms.
//!
//! A [`TraversalApp`] keeps, for every vertex, a converged *value* and a
//! pending *delta*. The delta remembers which vertex produced it (its
//! dependency parent), which is what lets a deletion invalidate exactly the
//! values that were derived through a removed edge.

pub mod bfs;
pub mod sssp;

pub use bfs::Bfs;
pub use sssp::Sssp;

use incgraph_api::core::entities::{Gid, Oid, VID};
use incgraph_core::{
    entities::fragment::Fragment,
    storage::{vertex_array::VertexArray, vertex_set::DenseVertexSet},
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt::{Debug, Display};
use tracing::warn;

/// The traversal to run, as named in configuration.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AppKind {
    #[default]
    Sssp,
    Bfs,
}

impl AppKind {
    pub fn name(&self) -> &'static str {
        match self {
            AppKind::Sssp => "sssp",
            AppKind::Bfs => "bfs",
        }
    }
}

/// A candidate value together with the vertex it was derived from.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DependencyData<V> {
    pub parent_gid: Gid,
    pub value: V,
}

impl<V: Copy> DependencyData<V> {
    pub fn new(parent_gid: Gid, value: V) -> Self {
        Self { parent_gid, value }
    }

    /// The "no information" delta.
    pub fn identity(identity: V) -> Self {
        Self::new(Gid::NONE, identity)
    }

    pub fn reset(&mut self, identity: V) {
        *self = Self::identity(identity);
    }
}

/// Values of the inner vertices and deltas of every local vertex.
#[derive(Debug)]
pub struct VertexStateStore<V> {
    identity: V,
    values: VertexArray<V>,
    deltas: VertexArray<DependencyData<V>>,
}

impl<V: Copy + PartialEq> VertexStateStore<V> {
    pub fn new(fragment: &Fragment, identity: V) -> Self {
        Self {
            identity,
            values: VertexArray::new(fragment.inner_vertices(), identity),
            deltas: VertexArray::new(fragment.vertices(), DependencyData::identity(identity)),
        }
    }

    pub fn identity(&self) -> V {
        self.identity
    }

    pub fn values(&self) -> &VertexArray<V> {
        &self.values
    }

    pub fn deltas(&self) -> &VertexArray<DependencyData<V>> {
        &self.deltas
    }

    /// Whether `v` carries a value, i.e. is an inner vertex.
    pub fn is_inner(&self, v: VID) -> bool {
        self.values.range().contains(v)
    }

    pub fn value(&self, v: VID) -> V {
        self.values.get(v)
    }

    pub fn delta(&self, v: VID) -> DependencyData<V> {
        self.deltas.get(v)
    }

    /// Forget everything known about the inner vertex `v`.
    pub fn reset(&self, v: VID) {
        self.values.set(v, self.identity);
        self.deltas.lock(v).reset(self.identity);
    }

    /// Value and delta of every inner vertex that carries information, keyed
    /// by gid so they survive a rebuild of the fragment.
    pub fn snapshot(&self, fragment: &Fragment) -> Vec<(Gid, V, DependencyData<V>)> {
        fragment
            .inner_vertices()
            .into_iter()
            .filter_map(|v| {
                let value = self.value(v);
                let delta = self.delta(v);
                (value != self.identity || delta.value != self.identity)
                    .then(|| (fragment.vertex2gid(v), value, delta))
            })
            .collect()
    }

    /// Copy a snapshot onto the inner vertices of `fragment`.
    ///
    /// Entries for vertices this fragment does not own are skipped. Returns
    /// the number of restored vertices.
    pub fn restore(&self, fragment: &Fragment, snapshot: &[(Gid, V, DependencyData<V>)]) -> usize {
        let mut restored = 0;
        for (gid, value, delta) in snapshot {
            if let Some(v) = fragment.gid2vertex(*gid).filter(|v| fragment.is_inner_vertex(*v)) {
                self.values.set(v, *value);
                self.deltas.set(v, *delta);
                restored += 1;
            }
        }
        restored
    }
}

/// Value types a traversal can carry between workers.
pub trait TraversalValue:
    Copy + PartialEq + PartialOrd + Debug + Display + Send + Sync + Serialize + DeserializeOwned + 'static
{
}

impl<T> TraversalValue for T where
    T: Copy
        + PartialEq
        + PartialOrd
        + Debug
        + Display
        + Send
        + Sync
        + Serialize
        + DeserializeOwned
        + 'static
{
}

pub trait TraversalApp: Send + Sync + 'static {
    type Value: TraversalValue;

    fn name(&self) -> &'static str;

    /// The value of a vertex nothing has reached yet.
    fn identity_element(&self) -> Self::Value;

    /// Seed a freshly allocated store: every slot is expected to hold the
    /// identity, sources get their initial delta and are inserted in `active`.
    fn init(
        &self,
        fragment: &Fragment,
        state: &VertexStateStore<Self::Value>,
        active: &DenseVertexSet,
    );

    /// Whether `candidate` is strictly better than `current`.
    fn is_better(&self, candidate: &Self::Value, current: &Self::Value) -> bool {
        candidate < current
    }

    /// Fold a pending delta into a converged value, `true` if it changed.
    fn combine_value_delta(
        &self,
        value: &mut Self::Value,
        delta: &DependencyData<Self::Value>,
    ) -> bool {
        if self.is_better(&delta.value, value) {
            *value = delta.value;
            true
        } else {
            false
        }
    }

    /// Merge `delta` into the pending delta of `v`, `true` if it changed.
    ///
    /// Equal values are broken by the smaller parent gid while the delta is
    /// pending, so the result does not depend on the order in which candidates
    /// arrive. Once an inner vertex folded its delta into its value the parent
    /// is fixed: a tie from a descendant would otherwise close a parent cycle
    /// over zero weight edges.
    fn accumulate_to(
        &self,
        state: &VertexStateStore<Self::Value>,
        v: VID,
        delta: &DependencyData<Self::Value>,
    ) -> bool {
        let folded = state.is_inner(v).then(|| state.value(v));
        state.deltas().update(v, |current| {
            let better = self.is_better(&delta.value, &current.value)
                || (delta.value == current.value
                    && delta.parent_gid < current.parent_gid
                    && folded != Some(current.value));
            if better {
                *current = *delta;
            }
            better
        })
    }

    /// Propagate the freshly combined `delta` of the inner vertex `u` to its
    /// out-neighbours, inserting every neighbour whose delta changed into
    /// `next`. `last_value` is the value of `u` before the combine.
    fn compute(
        &self,
        fragment: &Fragment,
        u: VID,
        last_value: &Self::Value,
        delta: &DependencyData<Self::Value>,
        state: &VertexStateStore<Self::Value>,
        next: &DenseVertexSet,
    );

    /// The vertex the current delta of `v` was derived from.
    fn delta_parent_gid(&self, state: &VertexStateStore<Self::Value>, v: VID) -> Gid {
        state.deltas().lock(v).parent_gid
    }
}

/// Seed `source` with `zero` on the fragment that owns it.
pub(crate) fn seed_source<V: TraversalValue>(
    fragment: &Fragment,
    state: &VertexStateStore<V>,
    active: &DenseVertexSet,
    source: Oid,
    zero: V,
) -> bool {
    let Some(gid) = fragment.vertex_map().get_gid(source) else {
        if fragment.fid() == 0 {
            warn!(source, "Source vertex is not part of the graph");
        }
        return false;
    };
    match fragment.gid2vertex(gid).filter(|v| fragment.is_inner_vertex(*v)) {
        Some(v) => {
            state.deltas().set(v, DependencyData::new(gid, zero));
            active.insert(v);
            true
        }
        None => false,
    }
}
