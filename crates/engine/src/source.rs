//! The remote side of a sync: something that can list every resource kind.

use meshsync_core::{AclMatrix, DnsEntry, ExtClient, Host, Network, Node};

use crate::error::SourceError;

/// Read-only view of a network-management API, already translated into the
/// entity model. Every call is one fetch; implementations do not retry.
pub trait RemoteSource {
    fn fetch_networks(&self) -> Result<Vec<Network>, SourceError>;

    fn fetch_nodes(&self, network_id: &str) -> Result<Vec<Node>, SourceError>;

    fn fetch_ext_clients(&self, network_id: &str) -> Result<Vec<ExtClient>, SourceError>;

    fn fetch_dns_entries(&self, network_id: &str) -> Result<Vec<DnsEntry>, SourceError>;

    /// The network's permission matrix, keyed by node names.
    fn fetch_acls(&self, network_id: &str) -> Result<AclMatrix, SourceError>;

    fn fetch_hosts(&self) -> Result<Vec<Host>, SourceError>;
}
