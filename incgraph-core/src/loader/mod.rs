//! Building fragments from edge files.
//!
//! Edge files hold one `src dst [weight]` record per line, vertex files one
//! `oid` per line. Lines starting with `#` are comments, runs of the delimiter
//! are collapsed. Every worker reads the full file and keeps what touches its
//! own vertices.

pub mod inc_builder;

use crate::{
    entities::{
        fragment::{EdgeData, Fragment},
        vertex_map::VertexMap,
    },
    utils::errors::GraphError,
};
use incgraph_api::core::entities::{FragmentId, Oid};
use itertools::Itertools;
use std::{
    fs::File,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::debug;

pub const DEFAULT_EDGE_DATA: EdgeData = 1.0;

#[derive(Debug, Clone)]
pub struct EdgeFileLoader {
    efile: PathBuf,
    vfile: Option<PathBuf>,
    directed: bool,
    delimiter: u8,
}

impl EdgeFileLoader {
    pub fn new<P: AsRef<Path>>(efile: P) -> Self {
        Self {
            efile: efile.as_ref().to_path_buf(),
            vfile: None,
            directed: true,
            delimiter: b' ',
        }
    }

    pub fn set_directed(mut self, directed: bool) -> Self {
        self.directed = directed;
        self
    }

    pub fn set_delimiter(mut self, delimiter: &str) -> Self {
        self.delimiter = delimiter.as_bytes().first().copied().unwrap_or(b' ');
        self
    }

    pub fn with_vertex_file<P: AsRef<Path>>(mut self, vfile: Option<P>) -> Self {
        self.vfile = vfile.map(|p| p.as_ref().to_path_buf());
        self
    }

    pub fn read_edges(&self) -> Result<Vec<(Oid, Oid, EdgeData)>, GraphError> {
        let mut edges = vec![];
        for_each_record(&self.efile, self.delimiter, |line, fields| {
            let (src, dst, data) = parse_edge(&self.efile, line, fields)?;
            edges.push((src, dst, data));
            Ok(())
        })?;
        Ok(edges)
    }

    pub fn read_vertices(&self) -> Result<Vec<Oid>, GraphError> {
        let mut vertices = vec![];
        if let Some(vfile) = &self.vfile {
            for_each_record(vfile, self.delimiter, |line, fields| {
                let oid = fields.first().copied().unwrap_or_default();
                vertices.push(parse_field(vfile, line, oid, "vertex id")?);
                Ok(())
            })?;
        }
        Ok(vertices)
    }

    /// Load the fragment owned by `fid` out of `fnum`.
    pub fn load(&self, fid: FragmentId, fnum: usize) -> Result<Fragment, GraphError> {
        if fid >= fnum {
            return Err(GraphError::InvalidFragmentId { fid, fnum });
        }
        let edges = self.read_edges()?;
        let vertices = self.read_vertices()?;

        let vertex_map = Arc::new(VertexMap::from_oids(
            fnum,
            vertices
                .into_iter()
                .chain(edges.iter().flat_map(|(src, dst, _)| [*src, *dst])),
        ));

        let gid_edges = expand_directions(edges, self.directed)
            .filter_map(|(src, dst, data)| {
                Some((vertex_map.get_gid(src)?, vertex_map.get_gid(dst)?, data))
            })
            .collect_vec();

        let fragment = Fragment::new(fid, vertex_map, self.directed, gid_edges);
        debug!(
            fid,
            inner = fragment.inner_vertices_num(),
            outer = fragment.outer_vertices_num(),
            edges = fragment.edge_num(),
            "Loaded fragment"
        );
        Ok(fragment)
    }
}

/// Undirected graphs are stored as two directed edges.
pub(crate) fn expand_directions<E: Copy>(
    edges: Vec<(Oid, Oid, E)>,
    directed: bool,
) -> impl Iterator<Item = (Oid, Oid, E)> {
    edges.into_iter().flat_map(move |(src, dst, data)| {
        let reverse = (!directed && src != dst).then_some((dst, src, data));
        std::iter::once((src, dst, data)).chain(reverse)
    })
}

pub(crate) fn for_each_record<F>(path: &Path, delimiter: u8, mut f: F) -> Result<(), GraphError>
where
    F: FnMut(u64, &[&str]) -> Result<(), GraphError>,
{
    let file = File::open(path).map_err(|err| GraphError::ReadFile {
        path: path.to_path_buf(),
        source: err.into(),
    })?;
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .comment(Some(b'#'))
        .trim(csv::Trim::All)
        .delimiter(delimiter)
        .from_reader(file);

    for record in reader.records() {
        let record = record?;
        let line = record.position().map_or(0, |p| p.line());
        let fields = record.iter().filter(|f| !f.is_empty()).collect_vec();
        if fields.is_empty() {
            continue;
        }
        f(line, &fields)?;
    }
    Ok(())
}

pub(crate) fn parse_field<T: std::str::FromStr>(
    path: &Path,
    line: u64,
    field: &str,
    what: &str,
) -> Result<T, GraphError> {
    field.parse::<T>().map_err(|_| GraphError::Parse {
        path: path.to_path_buf(),
        line,
        reason: format!("invalid {what} '{field}'"),
    })
}

pub(crate) fn parse_edge(
    path: &Path,
    line: u64,
    fields: &[&str],
) -> Result<(Oid, Oid, EdgeData), GraphError> {
    match fields {
        [src, dst] => Ok((
            parse_field(path, line, src, "source")?,
            parse_field(path, line, dst, "target")?,
            DEFAULT_EDGE_DATA,
        )),
        [src, dst, data, ..] => Ok((
            parse_field(path, line, src, "source")?,
            parse_field(path, line, dst, "target")?,
            parse_field(path, line, data, "edge weight")?,
        )),
        _ => Err(GraphError::Parse {
            path: path.to_path_buf(),
            line,
            reason: "expected 'src dst [weight]'".to_string(),
        }),
    }
}
