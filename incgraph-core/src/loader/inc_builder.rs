//! Rebuilding a fragment from an update file.
//!
//! Update files hold `a src dst [weight]` lines for inserted edges and
//! `d src dst` lines for deleted ones. Deletions are applied before insertions,
//! so an edge both deleted and re-added survives with the new weight.

use crate::{
    entities::{
        fragment::{EdgeData, Fragment},
        vertex_map::VertexMap,
    },
    loader::{expand_directions, for_each_record, parse_edge},
    utils::errors::GraphError,
};
use incgraph_api::core::entities::{Gid, Oid};
use itertools::Itertools;
use rustc_hash::FxHashSet;
use std::{path::Path, sync::Arc};
use tracing::debug;

#[derive(Debug, Clone)]
pub struct IncFragmentBuilder {
    fragment: Arc<Fragment>,
    directed: bool,
    delimiter: u8,
    added: Vec<(Oid, Oid, EdgeData)>,
    deleted: Vec<(Oid, Oid)>,
}

impl IncFragmentBuilder {
    pub fn new(fragment: Arc<Fragment>) -> Self {
        let directed = fragment.directed();
        Self {
            fragment,
            directed,
            delimiter: b' ',
            added: vec![],
            deleted: vec![],
        }
    }

    pub fn set_delimiter(mut self, delimiter: &str) -> Self {
        self.delimiter = delimiter.as_bytes().first().copied().unwrap_or(b' ');
        self
    }

    /// Parse the update file. Deleting an edge that names an unknown vertex is an error.
    pub fn init<P: AsRef<Path>>(&mut self, path: P) -> Result<(), GraphError> {
        let path = path.as_ref();
        let vertex_map = self.fragment.vertex_map().clone();
        let mut added = vec![];
        let mut deleted = vec![];

        for_each_record(path, self.delimiter, |line, fields| {
            let Some((op, edge)) = fields.split_first() else {
                return Ok(());
            };
            match *op {
                "a" => added.push(parse_edge(path, line, edge)?),
                "d" => {
                    let (src, dst, _) = parse_edge(path, line, edge)?;
                    for oid in [src, dst] {
                        if vertex_map.get_gid(oid).is_none() {
                            return Err(GraphError::UnknownVertex(oid));
                        }
                    }
                    deleted.push((src, dst));
                }
                other => {
                    return Err(GraphError::Parse {
                        path: path.to_path_buf(),
                        line,
                        reason: format!("unknown update kind '{other}', expected 'a' or 'd'"),
                    })
                }
            }
            Ok(())
        })?;

        debug!(
            fid = self.fragment.fid(),
            added = added.len(),
            deleted = deleted.len(),
            "Parsed update file"
        );
        self.added = added;
        self.deleted = deleted;
        Ok(())
    }

    pub fn num_added(&self) -> usize {
        self.added.len()
    }

    pub fn num_deleted(&self) -> usize {
        self.deleted.len()
    }

    fn deleted_gid_pairs(&self) -> impl Iterator<Item = (Gid, Gid)> + '_ {
        let vertex_map = self.fragment.vertex_map();
        let edges = self.deleted.iter().map(|(s, d)| (*s, *d, ())).collect_vec();
        expand_directions(edges, self.directed).filter_map(move |(src, dst, _)| {
            Some((vertex_map.get_gid(src)?, vertex_map.get_gid(dst)?))
        })
    }

    /// Deleted edges touching this fragment, as `(src_gid, dst_gid)`.
    ///
    /// Undirected graphs report both directions.
    pub fn deleted_edges_gid(&self) -> Vec<(Gid, Gid)> {
        self.deleted_gid_pairs()
            .filter(|(src, dst)| {
                self.fragment.is_inner_gid(*src) || self.fragment.is_inner_gid(*dst)
            })
            .collect()
    }

    /// Materialize the fragment of the updated graph.
    ///
    /// Vertices only named by inserted edges are appended to the vertex map, so
    /// every surviving vertex keeps its gid.
    pub fn build(&self) -> Result<Arc<Fragment>, GraphError> {
        let mut vertex_map: VertexMap = self.fragment.vertex_map().as_ref().clone();
        vertex_map.extend(self.added.iter().flat_map(|(src, dst, _)| [*src, *dst]));

        let deleted: FxHashSet<(Gid, Gid)> = self.deleted_gid_pairs().collect();

        let mut edges = self
            .fragment
            .edges()
            .filter(|(src, dst, _)| !deleted.contains(&(*src, *dst)))
            .collect_vec();

        for (src, dst, data) in expand_directions(self.added.clone(), self.directed) {
            match (vertex_map.get_gid(src), vertex_map.get_gid(dst)) {
                (Some(src), Some(dst)) => edges.push((src, dst, data)),
                _ => return Err(GraphError::UnknownVertex(src)),
            }
        }

        Ok(Arc::new(Fragment::new(
            self.fragment.fid(),
            Arc::new(vertex_map),
            self.directed,
            edges,
        )))
    }
}
