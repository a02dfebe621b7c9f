use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error("unknown resource kind: {0}")]
    UnknownResourceKind(String),

    #[error("unknown sync status: {0}")]
    UnknownSyncStatus(String),
}
