use crate::comm::CommError;
use incgraph_api::core::entities::FragmentId;
pub use incgraph_core::utils::errors::GraphError;

#[derive(thiserror::Error, Debug)]
pub enum WorkerError {
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Comm(#[from] CommError),
    #[error("Batch phase terminated but no update file (efile_update) is configured")]
    MissingUpdateFile,
    #[error("Failed to build thread pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
    #[error("Io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid configuration: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Worker {0} panicked")]
    WorkerPanicked(FragmentId),
}

impl WorkerError {
    /// Errors caused by another worker failing first.
    pub fn is_aborted(&self) -> bool {
        matches!(self, WorkerError::Comm(CommError::Aborted))
    }
}
