pub mod acl;
pub mod error;
pub mod orchestrator;
pub mod schedule;
pub mod source;
pub mod sync;

pub use acl::reconcile;
pub use error::{EngineError, SourceError};
pub use orchestrator::{StepReport, SyncAllReport};
pub use schedule::Scheduler;
pub use source::RemoteSource;
pub use sync::{AclMode, SyncOptions, SyncService};
