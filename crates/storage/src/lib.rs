pub mod error;
pub mod ledger;
pub mod records;
pub mod schema;
pub mod sqlite;
pub mod traits;
pub mod versioned;

pub use error::StorageError;
pub use sqlite::SqliteStore;
pub use traits::*;
pub use versioned::{NetworkScoped, UpsertOutcome, VersionedRecord};
