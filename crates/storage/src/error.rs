use meshsync_core::{ResourceKind, SyncStatus};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("failed to upsert {kind} {key}: {source}")]
    Upsert {
        kind: ResourceKind,
        key: String,
        #[source]
        source: Box<StorageError>,
    },

    #[error("sync run {run_id} cannot go from {from} to {to}")]
    RunTransition {
        run_id: String,
        from: SyncStatus,
        to: SyncStatus,
    },

    #[error("core error: {0}")]
    Core(#[from] meshsync_core::CoreError),
}
