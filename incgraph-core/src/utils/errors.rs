use incgraph_api::core::entities::{FragmentId, Gid, Oid};
use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum GraphError {
    #[error("Failed to read {path}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("Csv error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Malformed line {line} in {path}: {reason}")]
    Parse {
        path: PathBuf,
        line: u64,
        reason: String,
    },
    #[error("Update references unknown vertex {0}")]
    UnknownVertex(Oid),
    #[error("Global id {gid} does not resolve to a local vertex of fragment {fid}")]
    UnresolvedGid { gid: Gid, fid: FragmentId },
    #[error("Fragment id {fid} is out of range for {fnum} fragments")]
    InvalidFragmentId { fid: FragmentId, fnum: usize },
}
