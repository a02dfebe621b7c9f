use std::path::Path;

use meshsync_core::{DnsEntry, EntityKey, Host, Network, Node, Versioned};
use meshsync_engine::{SyncOptions, SyncService};
use meshsync_storage::{SqliteStore, Storage, StorageError, VersionedRecord};

use crate::source::FakeSource;

/// A [`SyncService`] over a scripted source and a fresh store.
pub struct TestBed {
    pub service: SyncService<FakeSource>,
}

impl TestBed {
    pub fn new() -> Result<Self, StorageError> {
        Self::with_options(SyncOptions::default())
    }

    pub fn with_options(options: SyncOptions) -> Result<Self, StorageError> {
        let store = SqliteStore::open_in_memory()?;
        Ok(Self {
            service: SyncService::with_options(store, FakeSource::new(), options),
        })
    }

    pub fn on_disk(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let store = SqliteStore::open(path)?;
        Ok(Self {
            service: SyncService::new(store, FakeSource::new()),
        })
    }

    pub fn source(&mut self) -> &mut FakeSource {
        self.service.source_mut()
    }

    pub fn store(&self) -> &SqliteStore {
        self.service.store()
    }

    /// Every stored version of one identity, oldest first.
    pub fn versions<R: VersionedRecord>(
        &self,
        key: impl Into<EntityKey>,
    ) -> Result<Vec<i64>, StorageError> {
        let mut history: Vec<R> = self.store().history(&key.into())?;
        history.reverse();
        Ok(history.iter().map(|r| r.version()).collect())
    }

    /// Rows flagged current for `id` in `table`.
    pub fn current_rows(&self, table: &str, id: impl Into<EntityKey>) -> Result<i64, StorageError> {
        let id = id.into().to_string();
        let count: i64 = self.store().conn().query_row(
            &format!("SELECT COUNT(*) FROM {table} WHERE CAST(id AS TEXT) = ?1 AND is_current = 1"),
            [id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    pub fn total_rows(&self, table: &str) -> Result<i64, StorageError> {
        let count: i64 = self
            .store()
            .conn()
            .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
        Ok(count)
    }
}

pub fn network(id: &str, address_range: &str) -> Network {
    Network {
        address_range: address_range.to_string(),
        ..Network::new(id)
    }
}

pub fn node(id: &str, network_id: &str, name: &str) -> Node {
    Node {
        name: name.to_string(),
        ..Node::new(id, network_id)
    }
}

pub fn dns(network_id: &str, name: &str, address: &str) -> DnsEntry {
    DnsEntry {
        address: address.to_string(),
        ..DnsEntry::new(network_id, name)
    }
}

pub fn host(id: &str, mtu: i64) -> Host {
    Host { mtu, ..Host::new(id) }
}
