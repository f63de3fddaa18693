use incgraph_api::core::entities::{VertexRange, VID};
use parking_lot::{Mutex, MutexGuard};

/// Arena of per-vertex slots indexed by local vertex id.
///
/// Slots sit behind their own lock so a compute step may update a neighbour
/// while other threads work on other vertices. The arena is tied to the
/// fragment it was sized for and must be rebuilt with it.
#[derive(Debug)]
pub struct VertexArray<T> {
    range: VertexRange,
    data: Box<[Mutex<T>]>,
}

impl<T: Clone> VertexArray<T> {
    pub fn new(range: VertexRange, init: T) -> Self {
        let data = range.iter().map(|_| Mutex::new(init.clone())).collect();
        Self { range, data }
    }

    #[inline]
    pub fn get(&self, v: VID) -> T {
        self.lock(v).clone()
    }
}

impl<T> VertexArray<T> {
    pub fn range(&self) -> VertexRange {
        self.range
    }

    #[inline]
    pub fn lock(&self, v: VID) -> MutexGuard<'_, T> {
        debug_assert!(self.range.contains(v), "{v:?} outside {:?}", self.range);
        self.data[v.0 - self.range.begin().0].lock()
    }

    #[inline]
    pub fn set(&self, v: VID, value: T) {
        *self.lock(v) = value;
    }

    #[inline]
    pub fn update<R>(&self, v: VID, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.lock(v))
    }
}
