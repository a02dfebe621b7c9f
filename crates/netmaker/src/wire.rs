//! Response shapes of the Netmaker REST API and their translation into the
//! entity model.
//!
//! Fields the model has a column for are read into typed fields. Everything
//! else the API sends lands in the entity's attribute bag, minus the keys in
//! [`VOLATILE_KEYS`], which change on every check-in and would otherwise mint
//! a new version on every poll.

use std::collections::BTreeMap;

use meshsync_core::{AclMatrix, AttributeBag, DnsEntry, ExtClient, Host, Network, Node, RecordMeta};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

pub const VOLATILE_KEYS: &[&str] = &[
    "lastcheckin",
    "lastmodified",
    "lastpeerupdate",
    "networklastmodified",
    "nodeslastmodified",
];

/// ACL matrix cell value meaning "allowed".
pub const ACL_ALLOWED: i64 = 1;

fn bag(mut extra: Map<String, Value>) -> AttributeBag {
    for key in VOLATILE_KEYS {
        extra.remove(*key);
    }
    AttributeBag::from_map(extra)
}

/// Netmaker encodes several network flags as `"yes"` / `"no"`.
fn yes_no<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Bool(b) => Ok(b),
        Value::Null => Ok(false),
        Value::String(s) => match s.as_str() {
            "yes" | "true" => Ok(true),
            "no" | "false" | "" => Ok(false),
            other => Err(D::Error::custom(format!("expected \"yes\" or \"no\", got {other:?}"))),
        },
        other => Err(D::Error::custom(format!("expected \"yes\" or \"no\", got {other}"))),
    }
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct WireNetwork {
    pub netid: String,
    #[serde(default)]
    pub addressrange: String,
    #[serde(default)]
    pub addressrange6: String,
    #[serde(default)]
    pub localrange: String,
    #[serde(default, deserialize_with = "yes_no")]
    pub isipv4: bool,
    #[serde(default, deserialize_with = "yes_no")]
    pub isipv6: bool,
    #[serde(default, deserialize_with = "yes_no")]
    pub islocal: bool,
    #[serde(default)]
    pub defaultacl: String,
    #[serde(default, deserialize_with = "yes_no")]
    pub defaultudpholepunch: bool,
    #[serde(default)]
    pub defaultextclientdns: String,
    #[serde(default)]
    pub defaultmtu: i64,
    #[serde(default)]
    pub defaultkeepalive: i64,
    #[serde(default)]
    pub defaultinterface: String,
    #[serde(default)]
    pub nodelimit: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<WireNetwork> for Network {
    fn from(wire: WireNetwork) -> Self {
        Network {
            name: wire.netid.clone(),
            id: wire.netid,
            address_range: wire.addressrange,
            address_range6: wire.addressrange6,
            local_range: wire.localrange,
            is_dual_stack: wire.isipv4 && wire.isipv6,
            is_ipv4: wire.isipv4,
            is_ipv6: wire.isipv6,
            is_local: wire.islocal,
            default_acl: wire.defaultacl,
            default_udp_hole_punching: wire.defaultudpholepunch,
            default_ext_client_dns: wire.defaultextclientdns,
            default_mtu: wire.defaultmtu,
            default_keepalive: wire.defaultkeepalive,
            default_interface: wire.defaultinterface,
            node_limit: wire.nodelimit,
            data: bag(wire.extra),
            meta: RecordMeta::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WireNode {
    pub id: String,
    pub network: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub address6: String,
    #[serde(default)]
    pub publickey: String,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default)]
    pub isegressgateway: bool,
    #[serde(default)]
    pub isingressgateway: bool,
    #[serde(default)]
    pub isrelay: bool,
    #[serde(default)]
    pub connected: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<WireNode> for Node {
    fn from(wire: WireNode) -> Self {
        Node {
            name: wire.name.unwrap_or_else(|| wire.id.clone()),
            id: wire.id,
            network_id: wire.network,
            address: wire.address,
            address6: wire.address6,
            public_key: wire.publickey,
            endpoint: wire.endpoint,
            is_egress_gateway: wire.isegressgateway,
            is_ingress_gateway: wire.isingressgateway,
            is_relay: wire.isrelay,
            connected: wire.connected,
            data: bag(wire.extra),
            meta: RecordMeta::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WireExtClient {
    pub clientid: String,
    pub network: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub address6: String,
    #[serde(default)]
    pub publickey: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<WireExtClient> for ExtClient {
    fn from(wire: WireExtClient) -> Self {
        ExtClient {
            name: wire.clientid.clone(),
            id: wire.clientid,
            network_id: wire.network,
            address: wire.address,
            address6: wire.address6,
            public_key: wire.publickey,
            enabled: wire.enabled,
            data: bag(wire.extra),
            meta: RecordMeta::default(),
        }
    }
}

/// DNS entries carry no id of their own.
#[derive(Debug, Deserialize)]
pub struct WireDnsEntry {
    pub name: String,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub address6: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl WireDnsEntry {
    /// `network_id` is the network the entry was listed under, used when the
    /// payload omits its own.
    pub fn into_model(self, network_id: &str) -> DnsEntry {
        let network = self
            .network
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| network_id.to_string());
        DnsEntry {
            address: self.address,
            address6: self.address6,
            data: bag(self.extra),
            ..DnsEntry::new(network, self.name)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct WireHost {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub endpointip: String,
    #[serde(default)]
    pub endpointipv6: String,
    #[serde(default)]
    pub publickey: String,
    #[serde(default)]
    pub listenport: i64,
    #[serde(default)]
    pub mtu: i64,
    #[serde(default)]
    pub persistentkeepalive: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl From<WireHost> for Host {
    fn from(wire: WireHost) -> Self {
        let name = if wire.name.is_empty() { wire.id.clone() } else { wire.name };
        Host {
            id: wire.id,
            name,
            endpoint_ip: wire.endpointip,
            endpoint_ipv6: wire.endpointipv6,
            public_key: wire.publickey,
            listen_port: wire.listenport,
            mtu: wire.mtu,
            persistent_keepalive: wire.persistentkeepalive,
            data: bag(wire.extra),
            meta: RecordMeta::default(),
        }
    }
}

pub type WireAclMatrix = BTreeMap<String, BTreeMap<String, i64>>;

pub fn acl_matrix(wire: WireAclMatrix) -> AclMatrix {
    let mut matrix = AclMatrix::new();
    for (source, row) in wire {
        for (dest, value) in row {
            matrix.set(source.clone(), dest, value == ACL_ALLOWED);
        }
    }
    matrix
}
