use std::time::Duration;

use meshsync_core::{AclMatrix, DnsEntry, ExtClient, Host, Network, Node};
use meshsync_engine::{RemoteSource, SourceError};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::ClientError;
use crate::wire::{
    self, WireAclMatrix, WireDnsEntry, WireExtClient, WireHost, WireNetwork, WireNode,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub api_key: String,
    pub timeout: Duration,
}

/// Blocking client for the Netmaker REST API. One request per fetch, no retries.
pub struct NetmakerClient {
    agent: ureq::Agent,
    base_url: String,
    api_key: String,
}

impl NetmakerClient {
    pub fn new(config: ClientConfig) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(config.timeout))
            .build()
            .new_agent();
        Self {
            agent,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let url = self.url(path);
        debug!(%url, "GET");
        let mut request = self.agent.get(&url).header("Accept", "application/json");
        if !self.api_key.is_empty() {
            request = request.header("Authorization", format!("Bearer {}", self.api_key));
        }
        request
            .call()
            .map_err(|e| ClientError::from_ureq(&url, e))?
            .body_mut()
            .read_json()
            .map_err(|e| ClientError::from_ureq(&url, e))
    }

    fn get_list<W, T>(&self, path: &str) -> Result<Vec<T>, ClientError>
    where
        W: DeserializeOwned + Into<T>,
    {
        // Netmaker answers an empty collection with `null`.
        let wire: Option<Vec<W>> = self.get_json(path)?;
        Ok(wire.unwrap_or_default().into_iter().map(Into::into).collect())
    }
}

impl RemoteSource for NetmakerClient {
    fn fetch_networks(&self) -> Result<Vec<Network>, SourceError> {
        Ok(self.get_list::<WireNetwork, _>("/api/networks")?)
    }

    fn fetch_nodes(&self, network_id: &str) -> Result<Vec<Node>, SourceError> {
        Ok(self.get_list::<WireNode, _>(&format!("/api/nodes/{network_id}"))?)
    }

    fn fetch_ext_clients(&self, network_id: &str) -> Result<Vec<ExtClient>, SourceError> {
        Ok(self.get_list::<WireExtClient, _>(&format!("/api/extclients/{network_id}"))?)
    }

    fn fetch_dns_entries(&self, network_id: &str) -> Result<Vec<DnsEntry>, SourceError> {
        let wire: Option<Vec<WireDnsEntry>> = self.get_json(&format!("/api/dns/{network_id}"))?;
        Ok(wire
            .unwrap_or_default()
            .into_iter()
            .map(|entry| entry.into_model(network_id))
            .collect())
    }

    fn fetch_acls(&self, network_id: &str) -> Result<AclMatrix, SourceError> {
        let wire: Option<WireAclMatrix> =
            self.get_json(&format!("/api/networks/{network_id}/acls"))?;
        Ok(wire::acl_matrix(wire.unwrap_or_default()))
    }

    fn fetch_hosts(&self) -> Result<Vec<Host>, SourceError> {
        Ok(self.get_list::<WireHost, _>("/api/hosts")?)
    }
}
