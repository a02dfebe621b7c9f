use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use meshsync_core::{AclMatrix, DnsEntry, ExtClient, Host, Network, Node, ResourceKind};
use meshsync_engine::{RemoteSource, SourceError};

/// Scripted in-memory [`RemoteSource`]. Every fetch is logged; any
/// (kind, network) pair can be made to fail until healed.
#[derive(Debug, Default)]
pub struct FakeSource {
    pub networks: Vec<Network>,
    pub nodes: BTreeMap<String, Vec<Node>>,
    pub ext_clients: BTreeMap<String, Vec<ExtClient>>,
    pub dns_entries: BTreeMap<String, Vec<DnsEntry>>,
    pub acls: BTreeMap<String, AclMatrix>,
    pub hosts: Vec<Host>,
    failing: Vec<(ResourceKind, Option<String>)>,
    fetches: RefCell<Vec<(ResourceKind, Option<String>)>>,
    raise_on: Vec<(ResourceKind, Arc<AtomicBool>)>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make fetches of `kind` fail. `scope` limits the failure to one network.
    pub fn fail(&mut self, kind: ResourceKind, scope: Option<&str>) {
        self.failing.push((kind, scope.map(str::to_string)));
    }

    pub fn heal(&mut self, kind: ResourceKind) {
        self.failing.retain(|(k, _)| *k != kind);
    }

    /// Set `flag` whenever `kind` is fetched, e.g. to stop a scheduler mid-run.
    pub fn raise_on_fetch(&mut self, kind: ResourceKind, flag: Arc<AtomicBool>) {
        self.raise_on.push((kind, flag));
    }

    pub fn fetch_log(&self) -> Vec<(ResourceKind, Option<String>)> {
        self.fetches.borrow().clone()
    }

    pub fn clear_log(&self) {
        self.fetches.borrow_mut().clear();
    }

    fn fetch(&self, kind: ResourceKind, scope: Option<&str>) -> Result<(), SourceError> {
        self.fetches.borrow_mut().push((kind, scope.map(str::to_string)));
        for (_, flag) in self.raise_on.iter().filter(|(k, _)| *k == kind) {
            flag.store(true, Ordering::SeqCst);
        }
        let failing = self
            .failing
            .iter()
            .any(|(k, s)| *k == kind && (s.is_none() || s.as_deref() == scope));
        if failing {
            return Err(SourceError::Unavailable(format!(
                "scripted {kind} failure{}",
                scope.map(|s| format!(" for {s}")).unwrap_or_default()
            )));
        }
        Ok(())
    }
}

impl RemoteSource for FakeSource {
    fn fetch_networks(&self) -> Result<Vec<Network>, SourceError> {
        self.fetch(ResourceKind::Network, None)?;
        Ok(self.networks.clone())
    }

    fn fetch_nodes(&self, network_id: &str) -> Result<Vec<Node>, SourceError> {
        self.fetch(ResourceKind::Node, Some(network_id))?;
        Ok(self.nodes.get(network_id).cloned().unwrap_or_default())
    }

    fn fetch_ext_clients(&self, network_id: &str) -> Result<Vec<ExtClient>, SourceError> {
        self.fetch(ResourceKind::ExtClient, Some(network_id))?;
        Ok(self.ext_clients.get(network_id).cloned().unwrap_or_default())
    }

    fn fetch_dns_entries(&self, network_id: &str) -> Result<Vec<DnsEntry>, SourceError> {
        self.fetch(ResourceKind::Dns, Some(network_id))?;
        Ok(self.dns_entries.get(network_id).cloned().unwrap_or_default())
    }

    fn fetch_acls(&self, network_id: &str) -> Result<AclMatrix, SourceError> {
        self.fetch(ResourceKind::Acl, Some(network_id))?;
        Ok(self.acls.get(network_id).cloned().unwrap_or_default())
    }

    fn fetch_hosts(&self) -> Result<Vec<Host>, SourceError> {
        self.fetch(ResourceKind::Host, None)?;
        Ok(self.hosts.clone())
    }
}
