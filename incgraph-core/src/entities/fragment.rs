//! One shard of the distributed graph.
//!
//! A fragment owns its *inner* vertices and keeps a mirror of every *outer*
//! vertex that shares an edge with one of them. Local ids are laid out as
//! inner vertices `[0, ivnum)` followed by outer vertices `[ivnum, ivnum + ovnum)`.
//!
//! Both the outgoing and the incoming edges of inner vertices are kept, so the
//! source of any edge pointing at an inner vertex is always present locally.

use crate::entities::vertex_map::VertexMap;
use incgraph_api::core::entities::{FragmentId, Gid, Oid, VertexRange, VID};
use itertools::Itertools;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Edge weight type carried by every fragment.
pub type EdgeData = f64;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Nbr {
    pub neighbor: VID,
    pub data: EdgeData,
}

#[derive(Debug, Default, Clone)]
struct Csr {
    offsets: Vec<usize>,
    nbrs: Vec<Nbr>,
}

impl Csr {
    fn new(num_rows: usize, mut entries: Vec<(usize, Nbr)>) -> Self {
        entries.sort_by_key(|(row, nbr)| (*row, nbr.neighbor));
        let mut offsets = vec![0; num_rows + 1];
        for (row, _) in entries.iter() {
            offsets[*row + 1] += 1;
        }
        for i in 0..num_rows {
            offsets[i + 1] += offsets[i];
        }
        let nbrs = entries.into_iter().map(|(_, nbr)| nbr).collect();
        Self { offsets, nbrs }
    }

    #[inline]
    fn row(&self, row: usize) -> &[Nbr] {
        match (self.offsets.get(row), self.offsets.get(row + 1)) {
            (Some(start), Some(end)) => &self.nbrs[*start..*end],
            _ => &[],
        }
    }

    fn len(&self) -> usize {
        self.nbrs.len()
    }
}

#[derive(Debug, Clone)]
pub struct Fragment {
    fid: FragmentId,
    directed: bool,
    vertex_map: Arc<VertexMap>,
    ivnum: usize,
    ovgid: Vec<Gid>,
    ovg2l: FxHashMap<Gid, VID>,
    oids: Vec<Oid>,
    oe: Csr,
    ie: Csr,
}

impl Fragment {
    /// Build fragment `fid` from a stream of directed edges given as global ids.
    ///
    /// Edges with no inner endpoint are dropped, so every worker can be handed
    /// the full edge list. Undirected graphs must already contain both directions.
    pub fn new<I>(fid: FragmentId, vertex_map: Arc<VertexMap>, directed: bool, edges: I) -> Self
    where
        I: IntoIterator<Item = (Gid, Gid, EdgeData)>,
    {
        let parser = *vertex_map.id_parser();
        let ivnum = vertex_map.inner_vertex_num(fid);
        let is_inner = |gid: Gid| parser.fid(gid) == fid;

        let local_edges = edges
            .into_iter()
            .filter(|(src, dst, _)| is_inner(*src) || is_inner(*dst))
            .collect_vec();

        let ovgid = local_edges
            .iter()
            .flat_map(|(src, dst, _)| [*src, *dst])
            .filter(|gid| !is_inner(*gid))
            .sorted()
            .dedup()
            .collect_vec();
        let ovg2l: FxHashMap<Gid, VID> = ovgid
            .iter()
            .enumerate()
            .map(|(i, gid)| (*gid, VID(ivnum + i)))
            .collect();

        let to_local = |gid: Gid| -> VID {
            if is_inner(gid) {
                VID(parser.lid(gid))
            } else {
                ovg2l[&gid]
            }
        };

        let mut oe_entries = Vec::new();
        let mut ie_entries = Vec::new();
        for (src, dst, data) in local_edges {
            let (u, v) = (to_local(src), to_local(dst));
            if is_inner(src) {
                oe_entries.push((u.0, Nbr { neighbor: v, data }));
            }
            if is_inner(dst) {
                ie_entries.push((v.0, Nbr { neighbor: u, data }));
            }
        }

        let oids = (0..ivnum)
            .map(|lid| parser.gid(fid, lid))
            .chain(ovgid.iter().copied())
            .map(|gid| vertex_map.get_oid(gid).unwrap_or(gid.0))
            .collect();

        Self {
            fid,
            directed,
            ivnum,
            oe: Csr::new(ivnum, oe_entries),
            ie: Csr::new(ivnum, ie_entries),
            ovgid,
            ovg2l,
            oids,
            vertex_map,
        }
    }

    pub fn fid(&self) -> FragmentId {
        self.fid
    }

    pub fn fnum(&self) -> usize {
        self.vertex_map.fnum()
    }

    pub fn directed(&self) -> bool {
        self.directed
    }

    pub fn vertex_map(&self) -> &Arc<VertexMap> {
        &self.vertex_map
    }

    pub fn inner_vertices(&self) -> VertexRange {
        VertexRange::new(0, self.ivnum)
    }

    pub fn outer_vertices(&self) -> VertexRange {
        VertexRange::new(self.ivnum, self.ivnum + self.ovgid.len())
    }

    pub fn vertices(&self) -> VertexRange {
        VertexRange::new(0, self.ivnum + self.ovgid.len())
    }

    pub fn inner_vertices_num(&self) -> usize {
        self.ivnum
    }

    pub fn outer_vertices_num(&self) -> usize {
        self.ovgid.len()
    }

    pub fn total_vertices_num(&self) -> usize {
        self.vertex_map.total_vertex_num()
    }

    pub fn edge_num(&self) -> usize {
        self.oe.len()
    }

    #[inline]
    pub fn is_inner_vertex(&self, v: VID) -> bool {
        v.0 < self.ivnum
    }

    #[inline]
    pub fn is_outer_vertex(&self, v: VID) -> bool {
        self.outer_vertices().contains(v)
    }

    /// Outgoing edges of an inner vertex, empty for outer vertices.
    #[inline]
    pub fn outgoing_adj_list(&self, v: VID) -> &[Nbr] {
        self.oe.row(v.0)
    }

    /// Incoming edges of an inner vertex, empty for outer vertices.
    #[inline]
    pub fn incoming_adj_list(&self, v: VID) -> &[Nbr] {
        self.ie.row(v.0)
    }

    #[inline]
    pub fn vertex2gid(&self, v: VID) -> Gid {
        if self.is_inner_vertex(v) {
            self.vertex_map.id_parser().gid(self.fid, v.0)
        } else {
            self.ovgid[v.0 - self.ivnum]
        }
    }

    #[inline]
    pub fn gid2vertex(&self, gid: Gid) -> Option<VID> {
        if self.is_inner_gid(gid) {
            let lid = self.vertex_map.id_parser().lid(gid);
            (lid < self.ivnum).then_some(VID(lid))
        } else {
            self.ovg2l.get(&gid).copied()
        }
    }

    #[inline]
    pub fn is_inner_gid(&self, gid: Gid) -> bool {
        !gid.is_none() && self.vertex_map.id_parser().fid(gid) == self.fid
    }

    /// Fragment owning `v`.
    #[inline]
    pub fn get_frag_id(&self, v: VID) -> FragmentId {
        self.vertex_map.id_parser().fid(self.vertex2gid(v))
    }

    /// External id of a local vertex.
    #[inline]
    pub fn get_id(&self, v: VID) -> Oid {
        self.oids[v.0]
    }

    /// Every local edge as global ids, each exactly once.
    ///
    /// Edges out of inner vertices come from the outgoing lists, edges from an
    /// outer vertex into an inner one from the incoming lists.
    pub fn edges(&self) -> impl Iterator<Item = (Gid, Gid, EdgeData)> + '_ {
        let out_edges = self.inner_vertices().into_iter().flat_map(move |u| {
            let u_gid = self.vertex2gid(u);
            self.outgoing_adj_list(u)
                .iter()
                .map(move |e| (u_gid, self.vertex2gid(e.neighbor), e.data))
        });
        let in_from_outer = self.inner_vertices().into_iter().flat_map(move |v| {
            let v_gid = self.vertex2gid(v);
            self.incoming_adj_list(v)
                .iter()
                .filter(move |e| self.is_outer_vertex(e.neighbor))
                .map(move |e| (self.vertex2gid(e.neighbor), v_gid, e.data))
        });
        out_edges.chain(in_from_outer)
    }
}
