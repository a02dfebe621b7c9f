use std::collections::BTreeMap;

use meshsync_core::{
    Acl, DnsEntry, EntityKey, ExtClient, Host, Network, Node, ResourceKind, RunCounts, SyncRun,
    SyncRunId, SyncStatus,
};

use crate::error::StorageError;
use crate::versioned::{NetworkScoped, UpsertOutcome, VersionedRecord};

/// Identity of every ACL ever written for a network, keyed by its
/// (source node name, destination node name) pair.
pub type AclIndex = BTreeMap<(String, String), i64>;

pub trait Storage {
    fn upsert<R: VersionedRecord>(&mut self, candidate: &R) -> Result<UpsertOutcome, StorageError>;

    fn current<R: VersionedRecord>(&self, key: &EntityKey) -> Result<Option<R>, StorageError>;

    /// Every version of one identity, newest first.
    fn history<R: VersionedRecord>(&self, key: &EntityKey) -> Result<Vec<R>, StorageError>;

    fn list_current<R: VersionedRecord>(&self) -> Result<Vec<R>, StorageError>;

    fn current_in_network<R: NetworkScoped>(
        &self,
        network_id: &str,
    ) -> Result<Vec<R>, StorageError>;

    fn get_networks(&self) -> Result<Vec<Network>, StorageError>;

    fn get_network(&self, network_id: &str) -> Result<Network, StorageError>;

    /// Physically remove a network and, through the schema, everything it owns.
    fn delete_network(&mut self, network_id: &str) -> Result<usize, StorageError>;

    fn acl_index(&self, network_id: &str) -> Result<AclIndex, StorageError>;

    /// `max(existing ACL id) + 1`, across all networks.
    fn next_acl_id(&self) -> Result<i64, StorageError>;

    fn delete_acls(&mut self, network_id: &str) -> Result<usize, StorageError>;

    fn begin_run(
        &mut self,
        kind: ResourceKind,
        scope: Option<&str>,
    ) -> Result<SyncRun, StorageError>;

    fn finish_run(
        &mut self,
        run: &mut SyncRun,
        status: SyncStatus,
        message: Option<String>,
        counts: RunCounts,
    ) -> Result<(), StorageError>;

    fn get_run(&self, run_id: SyncRunId) -> Result<Option<SyncRun>, StorageError>;

    fn recent_runs(&self, limit: usize) -> Result<Vec<SyncRun>, StorageError>;

    fn runs_for_kind(&self, kind: ResourceKind) -> Result<Vec<SyncRun>, StorageError>;

    fn nodes_in_network(&self, network_id: &str) -> Result<Vec<Node>, StorageError> {
        self.current_in_network(network_id)
    }

    fn ext_clients_in_network(&self, network_id: &str) -> Result<Vec<ExtClient>, StorageError> {
        self.current_in_network(network_id)
    }

    fn dns_entries_in_network(&self, network_id: &str) -> Result<Vec<DnsEntry>, StorageError> {
        self.current_in_network(network_id)
    }

    fn acls_in_network(&self, network_id: &str) -> Result<Vec<Acl>, StorageError> {
        self.current_in_network(network_id)
    }

    fn get_hosts(&self) -> Result<Vec<Host>, StorageError> {
        self.list_current()
    }
}
