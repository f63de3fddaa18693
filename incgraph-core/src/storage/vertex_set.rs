//! Dense active set over a range of local vertices.
//!
//! One bit per vertex, stored in atomic words so that many compute threads can
//! insert into the same set during a round. Draining only happens after the
//! round boundary, so readers never race with writers.

use incgraph_api::core::entities::{VertexRange, VID};
use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};

const WORD_BITS: usize = 64;

#[derive(Debug, Default)]
pub struct DenseVertexSet {
    range: VertexRange,
    words: Box<[AtomicU64]>,
}

impl DenseVertexSet {
    pub fn new(range: VertexRange) -> Self {
        let words = (0..range.len().div_ceil(WORD_BITS))
            .map(|_| AtomicU64::new(0))
            .collect();
        Self { range, words }
    }

    /// Re-allocate for a new domain, dropping every member.
    pub fn init(&mut self, range: VertexRange) {
        *self = Self::new(range);
    }

    pub fn range(&self) -> VertexRange {
        self.range
    }

    /// Mark `v`; returns `true` if it was not a member yet.
    ///
    /// `v` must lie inside the set's range.
    #[inline]
    pub fn insert(&self, v: VID) -> bool {
        debug_assert!(self.range.contains(v), "{v:?} outside {:?}", self.range);
        let offset = v.0 - self.range.begin().0;
        let mask = 1u64 << (offset % WORD_BITS);
        self.words[offset / WORD_BITS].fetch_or(mask, Ordering::Relaxed) & mask == 0
    }

    #[inline]
    pub fn exist(&self, v: VID) -> bool {
        if !self.range.contains(v) {
            return false;
        }
        let offset = v.0 - self.range.begin().0;
        self.words[offset / WORD_BITS].load(Ordering::Relaxed) & (1u64 << (offset % WORD_BITS))
            != 0
    }

    pub fn count(&self) -> usize {
        self.words
            .iter()
            .map(|w| w.load(Ordering::Relaxed).count_ones() as usize)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| w.load(Ordering::Relaxed) == 0)
    }

    pub fn clear(&self) {
        for w in self.words.iter() {
            w.store(0, Ordering::Relaxed);
        }
    }

    pub fn parallel_clear(&self) {
        self.words
            .par_iter()
            .with_min_len(1024)
            .for_each(|w| w.store(0, Ordering::Relaxed));
    }

    pub fn swap(&mut self, other: &mut DenseVertexSet) {
        std::mem::swap(self, other);
    }

    pub fn iter(&self) -> impl Iterator<Item = VID> + '_ {
        self.iter_range(self.range)
    }

    /// Members that also lie inside `range`, in ascending order.
    pub fn iter_range(&self, range: VertexRange) -> impl Iterator<Item = VID> + '_ {
        let range = self.range.intersect(&range);
        let base = self.range.begin().0;
        let begin = range.begin().0 - base;
        let end = range.end().0 - base;
        let words = if begin < end {
            begin / WORD_BITS..end.div_ceil(WORD_BITS)
        } else {
            0..0
        };
        words.flat_map(move |w| {
            let word_start = w * WORD_BITS;
            let lo = begin.saturating_sub(word_start);
            let hi = (end - word_start).min(WORD_BITS);
            let upper = if hi == WORD_BITS {
                u64::MAX
            } else {
                (1u64 << hi) - 1
            };
            let mask = upper & !((1u64 << lo) - 1);
            Bits(self.words[w].load(Ordering::Relaxed) & mask)
                .map(move |bit| VID(base + word_start + bit))
        })
    }
}

struct Bits(u64);

impl Iterator for Bits {
    type Item = usize;

    #[inline]
    fn next(&mut self) -> Option<usize> {
        if self.0 == 0 {
            return None;
        }
        let bit = self.0.trailing_zeros() as usize;
        self.0 &= self.0 - 1;
        Some(bit)
    }
}

#[cfg(test)]
mod vertex_set_tests {
    use super::*;
    use itertools::Itertools;

    #[test]
    fn insert_reports_new_members() {
        let set = DenseVertexSet::new(VertexRange::new(0, 100));
        assert!(set.insert(VID(3)));
        assert!(!set.insert(VID(3)));
        assert!(set.insert(VID(64)));
        assert_eq!(set.count(), 2);
        assert!(set.exist(VID(64)));
        assert!(!set.exist(VID(65)));
        assert!(!set.exist(VID(1000)));
    }

    #[test]
    fn iter_range_respects_both_ranges() {
        let set = DenseVertexSet::new(VertexRange::new(10, 200));
        for v in [10, 63, 64, 73, 74, 130, 199] {
            set.insert(VID(v));
        }
        let inner = VertexRange::new(0, 74);
        assert_eq!(
            set.iter_range(inner).map(|v| v.0).collect_vec(),
            vec![10, 63, 64, 73]
        );
        let outer = VertexRange::new(74, 300);
        assert_eq!(
            set.iter_range(outer).map(|v| v.0).collect_vec(),
            vec![74, 130, 199]
        );
        assert_eq!(set.iter_range(VertexRange::new(300, 400)).count(), 0);
    }

    #[test]
    fn swap_and_clear() {
        let mut curr = DenseVertexSet::new(VertexRange::new(0, 10));
        let mut next = DenseVertexSet::new(VertexRange::new(0, 10));
        next.insert(VID(4));
        curr.insert(VID(1));
        curr.clear();
        curr.swap(&mut next);
        assert_eq!(curr.iter().collect_vec(), vec![VID(4)]);
        assert!(next.is_empty());
        curr.parallel_clear();
        assert!(curr.is_empty());
    }

    #[test]
    fn concurrent_inserts_count_once() {
        let set = DenseVertexSet::new(VertexRange::new(0, 4096));
        (0..8 * 4096usize)
            .into_par_iter()
            .for_each(|i| {
                set.insert(VID(i % 4096));
            });
        assert_eq!(set.count(), 4096);
    }

    #[quickcheck]
    fn count_matches_distinct_inserts(vs: Vec<u16>) -> bool {
        let set = DenseVertexSet::new(VertexRange::new(0, u16::MAX as usize + 1));
        for v in vs.iter() {
            set.insert(VID(*v as usize));
        }
        let expected = vs.iter().sorted().dedup().map(|v| VID(*v as usize)).collect_vec();
        set.count() == expected.len() && set.iter().collect_vec() == expected
    }
}
