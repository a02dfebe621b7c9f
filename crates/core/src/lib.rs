pub mod acl;
pub mod attributes;
pub mod error;
pub mod ids;
pub mod model;
pub mod sync_run;

pub use acl::AclMatrix;
pub use attributes::AttributeBag;
pub use error::CoreError;
pub use ids::*;
pub use model::{Acl, DnsEntry, ExtClient, Host, Network, Node, RecordMeta, Versioned};
pub use sync_run::{ResourceKind, RunCounts, SyncRun, SyncStatus};
