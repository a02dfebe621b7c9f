//! Typed records for each resource kind.
//!
//! Every record carries a [`RecordMeta`] (version, current flag, timestamps)
//! that the store owns, and business fields that the remote source owns. The
//! [`Versioned`] trait exposes the identity and the per-kind equality
//! predicate used to decide whether a snapshot is a new version.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attributes::AttributeBag;
use crate::ids::EntityKey;
use crate::sync_run::ResourceKind;

pub const ACL_SOURCE_NODE: &str = "source_node";
pub const ACL_DEST_NODE: &str = "dest_node";
pub const ACL_IS_ALLOWED: &str = "is_allowed";

/// Store-owned bookkeeping. Never part of an equality check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    pub version: i64,
    pub is_current: bool,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

pub trait Versioned {
    const KIND: ResourceKind;

    fn key(&self) -> EntityKey;

    fn meta(&self) -> &RecordMeta;

    fn version(&self) -> i64 {
        self.meta().version
    }

    /// True when `other` carries no change the remote source could have made.
    fn same_content(&self, other: &Self) -> bool;
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Network {
    pub id: String,
    pub name: String,
    pub address_range: String,
    pub address_range6: String,
    pub local_range: String,
    pub is_dual_stack: bool,
    pub is_ipv4: bool,
    pub is_ipv6: bool,
    pub is_local: bool,
    pub default_acl: String,
    pub default_udp_hole_punching: bool,
    pub default_ext_client_dns: String,
    pub default_mtu: i64,
    pub default_keepalive: i64,
    pub default_interface: String,
    pub node_limit: i64,
    pub data: AttributeBag,
    #[serde(flatten)]
    pub meta: RecordMeta,
}

impl Network {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            ..Default::default()
        }
    }
}

impl Versioned for Network {
    const KIND: ResourceKind = ResourceKind::Network;

    fn key(&self) -> EntityKey {
        EntityKey::from(&self.id)
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn same_content(&self, other: &Self) -> bool {
        self.name == other.name
            && self.address_range == other.address_range
            && self.address_range6 == other.address_range6
            && self.local_range == other.local_range
            && self.is_dual_stack == other.is_dual_stack
            && self.is_ipv4 == other.is_ipv4
            && self.is_ipv6 == other.is_ipv6
            && self.is_local == other.is_local
            && self.default_acl == other.default_acl
            && self.default_udp_hole_punching == other.default_udp_hole_punching
            && self.default_ext_client_dns == other.default_ext_client_dns
            && self.default_mtu == other.default_mtu
            && self.default_keepalive == other.default_keepalive
            && self.default_interface == other.default_interface
            && self.node_limit == other.node_limit
            && self.data == other.data
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub network_id: String,
    pub name: String,
    pub address: String,
    pub address6: String,
    pub public_key: String,
    pub endpoint: String,
    pub is_egress_gateway: bool,
    pub is_ingress_gateway: bool,
    pub is_relay: bool,
    pub connected: bool,
    pub data: AttributeBag,
    #[serde(flatten)]
    pub meta: RecordMeta,
}

impl Node {
    pub fn new(id: impl Into<String>, network_id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            network_id: network_id.into(),
            ..Default::default()
        }
    }
}

impl Versioned for Node {
    const KIND: ResourceKind = ResourceKind::Node;

    fn key(&self) -> EntityKey {
        EntityKey::from(&self.id)
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn same_content(&self, other: &Self) -> bool {
        self.network_id == other.network_id
            && self.name == other.name
            && self.address == other.address
            && self.address6 == other.address6
            && self.public_key == other.public_key
            && self.endpoint == other.endpoint
            && self.is_egress_gateway == other.is_egress_gateway
            && self.is_ingress_gateway == other.is_ingress_gateway
            && self.is_relay == other.is_relay
            && self.connected == other.connected
            && self.data == other.data
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtClient {
    pub id: String,
    pub network_id: String,
    pub name: String,
    pub address: String,
    pub address6: String,
    pub public_key: String,
    pub enabled: bool,
    pub data: AttributeBag,
    #[serde(flatten)]
    pub meta: RecordMeta,
}

impl ExtClient {
    pub fn new(id: impl Into<String>, network_id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            network_id: network_id.into(),
            enabled: true,
            ..Default::default()
        }
    }
}

impl Versioned for ExtClient {
    const KIND: ResourceKind = ResourceKind::ExtClient;

    fn key(&self) -> EntityKey {
        EntityKey::from(&self.id)
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn same_content(&self, other: &Self) -> bool {
        self.network_id == other.network_id
            && self.name == other.name
            && self.address == other.address
            && self.address6 == other.address6
            && self.public_key == other.public_key
            && self.enabled == other.enabled
            && self.data == other.data
    }
}

/// A DNS record. The remote source assigns no id, so the identity is the
/// `"{network}/{name}"` pair.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DnsEntry {
    pub id: String,
    pub network_id: String,
    pub name: String,
    pub address: String,
    pub address6: String,
    pub data: AttributeBag,
    #[serde(flatten)]
    pub meta: RecordMeta,
}

impl DnsEntry {
    pub fn new(network_id: impl Into<String>, name: impl Into<String>) -> Self {
        let network_id = network_id.into();
        let name = name.into();
        Self {
            id: Self::identity(&network_id, &name),
            network_id,
            name,
            ..Default::default()
        }
    }

    pub fn identity(network_id: &str, name: &str) -> String {
        format!("{network_id}/{name}")
    }
}

impl Versioned for DnsEntry {
    const KIND: ResourceKind = ResourceKind::Dns;

    fn key(&self) -> EntityKey {
        EntityKey::from(&self.id)
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn same_content(&self, other: &Self) -> bool {
        self.network_id == other.network_id
            && self.name == other.name
            && self.address == other.address
            && self.address6 == other.address6
            && self.data == other.data
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub id: String,
    pub name: String,
    pub endpoint_ip: String,
    pub endpoint_ipv6: String,
    pub public_key: String,
    pub listen_port: i64,
    pub mtu: i64,
    pub persistent_keepalive: i64,
    pub data: AttributeBag,
    #[serde(flatten)]
    pub meta: RecordMeta,
}

impl Host {
    pub fn new(id: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            ..Default::default()
        }
    }
}

impl Versioned for Host {
    const KIND: ResourceKind = ResourceKind::Host;

    fn key(&self) -> EntityKey {
        EntityKey::from(&self.id)
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    fn same_content(&self, other: &Self) -> bool {
        self.name == other.name
            && self.endpoint_ip == other.endpoint_ip
            && self.endpoint_ipv6 == other.endpoint_ipv6
            && self.public_key == other.public_key
            && self.listen_port == other.listen_port
            && self.mtu == other.mtu
            && self.persistent_keepalive == other.persistent_keepalive
            && self.data == other.data
    }
}

/// One (source node, destination node) cell of a network's permission
/// matrix. The pair and the allow flag live in the attribute bag; `node_id`
/// is the resolved identity of the source node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Acl {
    pub id: i64,
    pub network_id: String,
    pub node_id: String,
    pub data: AttributeBag,
    #[serde(flatten)]
    pub meta: RecordMeta,
}

impl Acl {
    pub fn entry(
        id: i64,
        network_id: impl Into<String>,
        node_id: impl Into<String>,
        source_node: &str,
        dest_node: &str,
        allowed: bool,
    ) -> Self {
        Self {
            id,
            network_id: network_id.into(),
            node_id: node_id.into(),
            data: AttributeBag::new()
                .with(ACL_SOURCE_NODE, source_node)
                .with(ACL_DEST_NODE, dest_node)
                .with(ACL_IS_ALLOWED, allowed),
            meta: RecordMeta::default(),
        }
    }

    pub fn source_node(&self) -> Option<&str> {
        self.data.get_str(ACL_SOURCE_NODE)
    }

    pub fn dest_node(&self) -> Option<&str> {
        self.data.get_str(ACL_DEST_NODE)
    }

    pub fn is_allowed(&self) -> bool {
        self.data.get_bool(ACL_IS_ALLOWED).unwrap_or(false)
    }

    pub fn pair(&self) -> Option<(&str, &str)> {
        Some((self.source_node()?, self.dest_node()?))
    }
}

impl Versioned for Acl {
    const KIND: ResourceKind = ResourceKind::Acl;

    fn key(&self) -> EntityKey {
        EntityKey::from(self.id)
    }

    fn meta(&self) -> &RecordMeta {
        &self.meta
    }

    // The (source, destination) pair is the identity, not a compared field.
    fn same_content(&self, other: &Self) -> bool {
        self.is_allowed() == other.is_allowed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn network() -> Network {
        Network {
            address_range: "10.0.0.0/24".into(),
            default_mtu: 1420,
            data: AttributeBag::new().with("a", 1).with("b", "two"),
            ..Network::new("net1")
        }
    }

    #[test]
    fn metadata_is_ignored_by_equality() {
        let a = network();
        let mut b = network();
        b.meta = RecordMeta {
            version: 7,
            is_current: true,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            last_modified: Utc::now(),
        };
        assert!(a.same_content(&b));
    }

    #[test]
    fn every_business_field_is_compared() {
        let base = network();
        let variants: Vec<Network> = vec![
            Network {
                name: "other".into(),
                ..network()
            },
            Network {
                address_range: "10.0.1.0/24".into(),
                ..network()
            },
            Network {
                is_ipv6: true,
                ..network()
            },
            Network {
                default_mtu: 1280,
                ..network()
            },
            Network {
                node_limit: 5,
                ..network()
            },
            Network {
                data: AttributeBag::new().with("a", 2).with("b", "two"),
                ..network()
            },
        ];
        for variant in variants {
            assert!(!base.same_content(&variant), "expected difference: {variant:?}");
        }
    }

    #[test]
    fn bag_key_order_is_irrelevant_for_records() {
        let a = Host {
            data: AttributeBag::from_json(Some(r#"{"os": "linux", "arch": "amd64"}"#)).unwrap(),
            ..Host::new("h1")
        };
        let b = Host {
            data: AttributeBag::from_json(Some(r#"{"arch": "amd64", "os": "linux"}"#)).unwrap(),
            ..Host::new("h1")
        };
        assert!(a.same_content(&b));
    }

    #[test]
    fn node_and_client_predicates() {
        let node = Node {
            connected: true,
            ..Node::new("n1", "net1")
        };
        assert!(node.same_content(&node.clone()));

        let mut offline = node.clone();
        offline.connected = false;
        assert!(!node.same_content(&offline));

        let mut moved = node.clone();
        moved.network_id = "net2".into();
        assert!(!node.same_content(&moved));

        let client = ExtClient::new("c1", "net1");
        assert!(client.enabled);
        let mut disabled = client.clone();
        disabled.enabled = false;
        assert!(!client.same_content(&disabled));
    }

    #[test]
    fn dns_identity_is_network_and_name() {
        let entry = DnsEntry::new("net1", "gw.example");
        assert_eq!(entry.id, "net1/gw.example");
        assert_eq!(entry.key(), EntityKey::from("net1/gw.example"));
    }

    #[test]
    fn acl_compares_only_allow_flag() {
        let a = Acl::entry(1, "net1", "n1", "alpha", "beta", true);
        let moved = Acl::entry(9, "net1", "n7", "alpha", "gamma", true);
        let flipped = Acl::entry(1, "net1", "n1", "alpha", "beta", false);
        assert!(a.same_content(&moved));
        assert!(!a.same_content(&flipped));
        assert_eq!(a.pair(), Some(("alpha", "beta")));
        assert_eq!(a.key(), EntityKey::from(1));
    }
}
