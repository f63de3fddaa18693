use crate::app::{seed_source, DependencyData, TraversalApp, VertexStateStore};
use incgraph_api::core::entities::{Oid, VID};
use incgraph_core::{entities::fragment::Fragment, storage::vertex_set::DenseVertexSet};
use tracing::debug;

/// Single source shortest paths over the edge weights.
#[derive(Debug, Clone)]
pub struct Sssp {
    source: Oid,
}

impl Sssp {
    pub fn new(source: Oid) -> Self {
        Self { source }
    }

    pub fn source(&self) -> Oid {
        self.source
    }
}

impl TraversalApp for Sssp {
    type Value = f64;

    fn name(&self) -> &'static str {
        "sssp"
    }

    fn identity_element(&self) -> f64 {
        f64::INFINITY
    }

    fn init(&self, fragment: &Fragment, state: &VertexStateStore<f64>, active: &DenseVertexSet) {
        if seed_source(fragment, state, active, self.source, 0.0) {
            debug!(fid = fragment.fid(), source = self.source, "Seeded source");
        }
    }

    fn compute(
        &self,
        fragment: &Fragment,
        u: VID,
        _last_value: &f64,
        delta: &DependencyData<f64>,
        state: &VertexStateStore<f64>,
        next: &DenseVertexSet,
    ) {
        let u_gid = fragment.vertex2gid(u);
        for e in fragment.outgoing_adj_list(u) {
            let candidate = DependencyData::new(u_gid, delta.value + e.data);
            if self.accumulate_to(state, e.neighbor, &candidate) {
                next.insert(e.neighbor);
            }
        }
    }
}
