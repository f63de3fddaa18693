//! Assignment of external ids to global ids.
//!
//! Every worker derives the same map from the same input, so no exchange is
//! needed: owners come from a modulo partitioner and local offsets from the
//! sorted order in which oids are first seen.

use incgraph_api::core::entities::{FragmentId, Gid, IdParser, Oid};
use itertools::Itertools;
use rustc_hash::FxHashMap;

#[derive(Debug, Clone)]
pub struct VertexMap {
    fnum: usize,
    id_parser: IdParser,
    oid_to_gid: FxHashMap<Oid, Gid>,
    lid_to_oid: Vec<Vec<Oid>>,
}

impl VertexMap {
    pub fn new(fnum: usize) -> Self {
        Self {
            fnum,
            id_parser: IdParser::new(fnum),
            oid_to_gid: FxHashMap::default(),
            lid_to_oid: vec![vec![]; fnum],
        }
    }

    pub fn from_oids<I: IntoIterator<Item = Oid>>(fnum: usize, oids: I) -> Self {
        let mut vm = Self::new(fnum);
        vm.extend(oids);
        vm
    }

    /// Add the oids that are not mapped yet, in sorted order. Existing gids never move.
    pub fn extend<I: IntoIterator<Item = Oid>>(&mut self, oids: I) {
        let new_oids = oids
            .into_iter()
            .filter(|oid| !self.oid_to_gid.contains_key(oid))
            .sorted()
            .dedup()
            .collect_vec();
        for oid in new_oids {
            self.add_vertex(oid);
        }
    }

    pub fn add_vertex(&mut self, oid: Oid) -> Gid {
        if let Some(gid) = self.oid_to_gid.get(&oid) {
            return *gid;
        }
        let fid = self.partition(oid);
        let lid = self.lid_to_oid[fid].len();
        let gid = self.id_parser.gid(fid, lid);
        self.lid_to_oid[fid].push(oid);
        self.oid_to_gid.insert(oid, gid);
        gid
    }

    #[inline]
    pub fn partition(&self, oid: Oid) -> FragmentId {
        (oid % self.fnum as u64) as FragmentId
    }

    pub fn get_gid(&self, oid: Oid) -> Option<Gid> {
        self.oid_to_gid.get(&oid).copied()
    }

    pub fn get_oid(&self, gid: Gid) -> Option<Oid> {
        let fid = self.id_parser.fid(gid);
        self.lid_to_oid
            .get(fid)
            .and_then(|oids| oids.get(self.id_parser.lid(gid)))
            .copied()
    }

    pub fn fnum(&self) -> usize {
        self.fnum
    }

    pub fn id_parser(&self) -> &IdParser {
        &self.id_parser
    }

    pub fn inner_vertex_num(&self, fid: FragmentId) -> usize {
        self.lid_to_oid.get(fid).map_or(0, |oids| oids.len())
    }

    pub fn total_vertex_num(&self) -> usize {
        self.oid_to_gid.len()
    }
}
