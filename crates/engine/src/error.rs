use meshsync_core::{CoreError, ResourceKind};
use meshsync_storage::StorageError;
use thiserror::Error;

/// Failure reported by a [`RemoteSource`](crate::RemoteSource) fetch.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("transport error: {0}")]
    Transport(String),

    #[error("{url} returned HTTP {status}")]
    Status { status: u16, url: String },

    #[error("could not decode response: {0}")]
    Decode(String),

    #[error("source unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("core error: {0}")]
    Core(#[from] CoreError),

    #[error("fetching {kind} failed: {source}")]
    Fetch {
        kind: ResourceKind,
        #[source]
        source: SourceError,
    },

    #[error("network not found: {0}")]
    NetworkNotFound(String),
}
