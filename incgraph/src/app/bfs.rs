use crate::app::{seed_source, DependencyData, TraversalApp, VertexStateStore};
use incgraph_api::core::entities::{Oid, VID};
use incgraph_core::{entities::fragment::Fragment, storage::vertex_set::DenseVertexSet};

/// Hop distance from a source, edge weights are ignored.
#[derive(Debug, Clone)]
pub struct Bfs {
    source: Oid,
}

impl Bfs {
    pub fn new(source: Oid) -> Self {
        Self { source }
    }
}

impl TraversalApp for Bfs {
    type Value = u32;

    fn name(&self) -> &'static str {
        "bfs"
    }

    fn identity_element(&self) -> u32 {
        u32::MAX
    }

    fn init(&self, fragment: &Fragment, state: &VertexStateStore<u32>, active: &DenseVertexSet) {
        seed_source(fragment, state, active, self.source, 0);
    }

    fn compute(
        &self,
        fragment: &Fragment,
        u: VID,
        _last_value: &u32,
        delta: &DependencyData<u32>,
        state: &VertexStateStore<u32>,
        next: &DenseVertexSet,
    ) {
        let u_gid = fragment.vertex2gid(u);
        let candidate = DependencyData::new(u_gid, delta.value.saturating_add(1));
        for e in fragment.outgoing_adj_list(u) {
            if self.accumulate_to(state, e.neighbor, &candidate) {
                next.insert(e.neighbor);
            }
        }
    }
}
