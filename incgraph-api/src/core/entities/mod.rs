use serde::{Deserialize, Serialize};
use std::{fmt, ops::Range};

/// External vertex id as it appears in the input files.
pub type Oid = u64;

/// Index of a fragment (one process / worker) in the cluster.
pub type FragmentId = usize;

/// Process-local dense vertex index.
///
/// Only valid for the fragment that produced it, and only until that fragment
/// is rebuilt. Never persist a `VID` across a rebuild, use the [`Gid`] instead.
#[repr(transparent)]
#[derive(
    Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize, Default,
)]
pub struct VID(pub usize);

impl VID {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl From<usize> for VID {
    fn from(id: usize) -> Self {
        VID(id)
    }
}

impl From<VID> for usize {
    fn from(id: VID) -> Self {
        id.0
    }
}

/// Global vertex id, stable across fragment rebuilds and processes.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize)]
pub struct Gid(pub u64);

impl Gid {
    /// Marker for "no vertex", used as the parent of an identity delta.
    pub const NONE: Gid = Gid(u64::MAX);

    pub fn is_none(&self) -> bool {
        *self == Gid::NONE
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for Gid {
    fn default() -> Self {
        Gid::NONE
    }
}

impl fmt::Display for Gid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            write!(f, "none")
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Packs a fragment id and a fragment-local offset into a [`Gid`].
///
/// The fragment id lives in the high bits so the owner of any gid can be read
/// off without a lookup.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdParser {
    fid_offset: u32,
    lid_mask: u64,
}

impl IdParser {
    pub fn new(fnum: usize) -> Self {
        let mut fid_bits = 1;
        while (1usize << fid_bits) < fnum {
            fid_bits += 1;
        }
        let fid_offset = 64 - fid_bits;
        Self {
            fid_offset,
            lid_mask: (1u64 << fid_offset) - 1,
        }
    }

    #[inline]
    pub fn gid(&self, fid: FragmentId, lid: usize) -> Gid {
        Gid(((fid as u64) << self.fid_offset) | lid as u64)
    }

    #[inline]
    pub fn fid(&self, gid: Gid) -> FragmentId {
        (gid.0 >> self.fid_offset) as FragmentId
    }

    #[inline]
    pub fn lid(&self, gid: Gid) -> usize {
        (gid.0 & self.lid_mask) as usize
    }
}

/// Half-open range `[begin, end)` of local vertex ids.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VertexRange {
    begin: usize,
    end: usize,
}

impl VertexRange {
    pub fn new(begin: usize, end: usize) -> Self {
        debug_assert!(begin <= end);
        Self { begin, end }
    }

    pub fn begin(&self) -> VID {
        VID(self.begin)
    }

    pub fn end(&self) -> VID {
        VID(self.end)
    }

    pub fn len(&self) -> usize {
        self.end - self.begin
    }

    pub fn is_empty(&self) -> bool {
        self.begin == self.end
    }

    #[inline]
    pub fn contains(&self, v: VID) -> bool {
        self.begin <= v.0 && v.0 < self.end
    }

    pub fn as_range(&self) -> Range<usize> {
        self.begin..self.end
    }

    pub fn iter(&self) -> impl Iterator<Item = VID> {
        self.as_range().map(VID)
    }

    /// The overlap of two ranges, empty if they are disjoint.
    pub fn intersect(&self, other: &VertexRange) -> VertexRange {
        let begin = self.begin.max(other.begin);
        let end = self.end.min(other.end).max(begin);
        VertexRange { begin, end }
    }
}

impl IntoIterator for VertexRange {
    type Item = VID;
    type IntoIter = std::iter::Map<Range<usize>, fn(usize) -> VID>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_range().map(VID as fn(usize) -> VID)
    }
}
