mod sync_traversal_worker;

pub use sync_traversal_worker::SyncTraversalWorker;

use std::time::Duration;

/// Diagnostics of one `query` run on one worker.
///
/// Steps and timings are local, the reset count is cluster wide.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunStats {
    pub batch_steps: usize,
    pub batch_time: Duration,
    pub inc_steps: usize,
    pub inc_time: Duration,
    pub delta_compute_time: Duration,
    /// Inner vertices this fragment reset during invalidation.
    pub local_reset: usize,
    /// Vertices reset over all fragments.
    pub global_reset: usize,
}
