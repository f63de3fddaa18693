#![allow(dead_code)]

use incgraph::config::{WorkerConfig, WorkerConfigBuilder};
use incgraph_api::core::entities::Oid;
use itertools::Itertools;
use proptest::prelude::*;
use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    io::Write,
    path::Path,
};
use tempfile::NamedTempFile;

pub fn write_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

pub fn worker_config(
    efile: &Path,
    efile_update: &Path,
    fnum: usize,
    threads: usize,
) -> WorkerConfig {
    WorkerConfigBuilder::new()
        .with_efile(efile)
        .with_efile_update(efile_update)
        .with_fnum(fnum)
        .with_thread_num(threads)
        .build()
}

/// A graph plus one batch of updates.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub edges: Vec<(Oid, Oid, u8)>,
    pub deleted: Vec<(Oid, Oid)>,
    pub added: Vec<(Oid, Oid, u8)>,
}

impl Scenario {
    pub fn source(&self) -> Oid {
        self.edges.first().map_or(0, |e| e.0)
    }

    pub fn edge_file(&self) -> NamedTempFile {
        write_file(
            &self
                .edges
                .iter()
                .map(|(s, d, w)| format!("{s} {d} {w}\n"))
                .join(""),
        )
    }

    pub fn update_file(&self) -> NamedTempFile {
        let deletions = self.deleted.iter().map(|(s, d)| format!("d {s} {d}\n"));
        let insertions = self.added.iter().map(|(s, d, w)| format!("a {s} {d} {w}\n"));
        write_file(&deletions.chain(insertions).join(""))
    }

    pub fn vertices(&self) -> BTreeSet<Oid> {
        self.edges
            .iter()
            .chain(self.added.iter())
            .flat_map(|(s, d, _)| [*s, *d])
            .collect()
    }

    /// The directed edge list of the graph after the update.
    pub fn updated_edges(&self, directed: bool) -> Vec<(Oid, Oid, f64)> {
        let deleted: HashSet<(Oid, Oid)> = self
            .deleted
            .iter()
            .flat_map(|&(s, d)| {
                if directed {
                    vec![(s, d)]
                } else {
                    vec![(s, d), (d, s)]
                }
            })
            .collect();
        expand(&self.edges, directed)
            .into_iter()
            .filter(|(s, d, _)| !deleted.contains(&(*s, *d)))
            .chain(expand(&self.added, directed))
            .collect()
    }
}

fn expand(edges: &[(Oid, Oid, u8)], directed: bool) -> Vec<(Oid, Oid, f64)> {
    edges
        .iter()
        .flat_map(|&(s, d, w)| {
            let reverse = (!directed && s != d).then_some((d, s, w as f64));
            std::iter::once((s, d, w as f64)).chain(reverse)
        })
        .collect()
}

/// Plain Bellman-Ford.
pub fn reference_sssp(
    vertices: &BTreeSet<Oid>,
    edges: &[(Oid, Oid, f64)],
    source: Oid,
) -> BTreeMap<Oid, f64> {
    let mut dist: BTreeMap<Oid, f64> = vertices.iter().map(|v| (*v, f64::INFINITY)).collect();
    if let Some(d) = dist.get_mut(&source) {
        *d = 0.0;
    }
    loop {
        let mut changed = false;
        for (s, d, w) in edges {
            let candidate = dist[s] + w;
            if candidate < dist[d] {
                dist.insert(*d, candidate);
                changed = true;
            }
        }
        if !changed {
            return dist;
        }
    }
}

pub fn reference_bfs(
    vertices: &BTreeSet<Oid>,
    edges: &[(Oid, Oid, f64)],
    source: Oid,
) -> BTreeMap<Oid, u32> {
    let unit = edges.iter().map(|(s, d, _)| (*s, *d, 1.0)).collect_vec();
    reference_sssp(vertices, &unit, source)
        .into_iter()
        .map(|(v, d)| (v, if d.is_finite() { d as u32 } else { u32::MAX }))
        .collect()
}

pub fn scenario() -> impl Strategy<Value = Scenario> {
    prop::collection::vec((0u64..12, 0u64..12, 0u8..5), 1..40)
        .prop_flat_map(|edges| {
            let n = edges.len();
            (
                Just(edges),
                prop::collection::vec(0..n, 0..6),
                prop::collection::vec((0u64..16, 0u64..16, 0u8..5), 0..6),
            )
        })
        .prop_map(|(edges, deleted, added)| {
            let deleted = deleted
                .into_iter()
                .map(|i| (edges[i].0, edges[i].1))
                .collect();
            Scenario {
                edges,
                deleted,
                added,
            }
        })
}
