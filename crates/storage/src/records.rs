use meshsync_core::{Acl, DnsEntry, ExtClient, Host, Network, Node};
use rusqlite::Row;
use rusqlite::types::Value;

use crate::error::StorageError;
use crate::versioned::{NetworkScoped, VersionedRecord, bag, flag, read_bag, read_meta, text};

impl VersionedRecord for Network {
    const TABLE: &'static str = "networks";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "address_range",
        "address_range6",
        "local_range",
        "is_dual_stack",
        "is_ipv4",
        "is_ipv6",
        "is_local",
        "default_acl",
        "default_udp_hole_punching",
        "default_ext_client_dns",
        "default_mtu",
        "default_keepalive",
        "default_interface",
        "node_limit",
        "data",
    ];

    fn column_values(&self) -> Result<Vec<Value>, StorageError> {
        Ok(vec![
            text(&self.id),
            text(&self.name),
            text(&self.address_range),
            text(&self.address_range6),
            text(&self.local_range),
            flag(self.is_dual_stack),
            flag(self.is_ipv4),
            flag(self.is_ipv6),
            flag(self.is_local),
            text(&self.default_acl),
            flag(self.default_udp_hole_punching),
            text(&self.default_ext_client_dns),
            Value::Integer(self.default_mtu),
            Value::Integer(self.default_keepalive),
            text(&self.default_interface),
            Value::Integer(self.node_limit),
            bag(&self.data)?,
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            address_range: row.get("address_range")?,
            address_range6: row.get("address_range6")?,
            local_range: row.get("local_range")?,
            is_dual_stack: row.get("is_dual_stack")?,
            is_ipv4: row.get("is_ipv4")?,
            is_ipv6: row.get("is_ipv6")?,
            is_local: row.get("is_local")?,
            default_acl: row.get("default_acl")?,
            default_udp_hole_punching: row.get("default_udp_hole_punching")?,
            default_ext_client_dns: row.get("default_ext_client_dns")?,
            default_mtu: row.get("default_mtu")?,
            default_keepalive: row.get("default_keepalive")?,
            default_interface: row.get("default_interface")?,
            node_limit: row.get("node_limit")?,
            data: read_bag(row, "data")?,
            meta: read_meta(row)?,
        })
    }
}

impl VersionedRecord for Node {
    const TABLE: &'static str = "nodes";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "network_id",
        "name",
        "address",
        "address6",
        "public_key",
        "endpoint",
        "is_egress_gateway",
        "is_ingress_gateway",
        "is_relay",
        "connected",
        "data",
    ];

    fn column_values(&self) -> Result<Vec<Value>, StorageError> {
        Ok(vec![
            text(&self.id),
            text(&self.network_id),
            text(&self.name),
            text(&self.address),
            text(&self.address6),
            text(&self.public_key),
            text(&self.endpoint),
            flag(self.is_egress_gateway),
            flag(self.is_ingress_gateway),
            flag(self.is_relay),
            flag(self.connected),
            bag(&self.data)?,
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            network_id: row.get("network_id")?,
            name: row.get("name")?,
            address: row.get("address")?,
            address6: row.get("address6")?,
            public_key: row.get("public_key")?,
            endpoint: row.get("endpoint")?,
            is_egress_gateway: row.get("is_egress_gateway")?,
            is_ingress_gateway: row.get("is_ingress_gateway")?,
            is_relay: row.get("is_relay")?,
            connected: row.get("connected")?,
            data: read_bag(row, "data")?,
            meta: read_meta(row)?,
        })
    }
}

impl NetworkScoped for Node {
    fn network_id(&self) -> &str {
        &self.network_id
    }
}

impl VersionedRecord for ExtClient {
    const TABLE: &'static str = "ext_clients";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "network_id",
        "name",
        "address",
        "address6",
        "public_key",
        "enabled",
        "data",
    ];

    fn column_values(&self) -> Result<Vec<Value>, StorageError> {
        Ok(vec![
            text(&self.id),
            text(&self.network_id),
            text(&self.name),
            text(&self.address),
            text(&self.address6),
            text(&self.public_key),
            flag(self.enabled),
            bag(&self.data)?,
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            network_id: row.get("network_id")?,
            name: row.get("name")?,
            address: row.get("address")?,
            address6: row.get("address6")?,
            public_key: row.get("public_key")?,
            enabled: row.get("enabled")?,
            data: read_bag(row, "data")?,
            meta: read_meta(row)?,
        })
    }
}

impl NetworkScoped for ExtClient {
    fn network_id(&self) -> &str {
        &self.network_id
    }
}

impl VersionedRecord for DnsEntry {
    const TABLE: &'static str = "dns_entries";
    const COLUMNS: &'static [&'static str] =
        &["id", "network_id", "name", "address", "address6", "data"];

    fn column_values(&self) -> Result<Vec<Value>, StorageError> {
        Ok(vec![
            text(&self.id),
            text(&self.network_id),
            text(&self.name),
            text(&self.address),
            text(&self.address6),
            bag(&self.data)?,
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            network_id: row.get("network_id")?,
            name: row.get("name")?,
            address: row.get("address")?,
            address6: row.get("address6")?,
            data: read_bag(row, "data")?,
            meta: read_meta(row)?,
        })
    }
}

impl NetworkScoped for DnsEntry {
    fn network_id(&self) -> &str {
        &self.network_id
    }
}

impl VersionedRecord for Host {
    const TABLE: &'static str = "hosts";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "name",
        "endpoint_ip",
        "endpoint_ipv6",
        "public_key",
        "listen_port",
        "mtu",
        "persistent_keepalive",
        "data",
    ];

    fn column_values(&self) -> Result<Vec<Value>, StorageError> {
        Ok(vec![
            text(&self.id),
            text(&self.name),
            text(&self.endpoint_ip),
            text(&self.endpoint_ipv6),
            text(&self.public_key),
            Value::Integer(self.listen_port),
            Value::Integer(self.mtu),
            Value::Integer(self.persistent_keepalive),
            bag(&self.data)?,
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            endpoint_ip: row.get("endpoint_ip")?,
            endpoint_ipv6: row.get("endpoint_ipv6")?,
            public_key: row.get("public_key")?,
            listen_port: row.get("listen_port")?,
            mtu: row.get("mtu")?,
            persistent_keepalive: row.get("persistent_keepalive")?,
            data: read_bag(row, "data")?,
            meta: read_meta(row)?,
        })
    }
}

impl VersionedRecord for Acl {
    const TABLE: &'static str = "acls";
    const COLUMNS: &'static [&'static str] = &["id", "network_id", "node_id", "data"];

    fn column_values(&self) -> Result<Vec<Value>, StorageError> {
        Ok(vec![
            Value::Integer(self.id),
            text(&self.network_id),
            text(&self.node_id),
            bag(&self.data)?,
        ])
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get("id")?,
            network_id: row.get("network_id")?,
            node_id: row.get("node_id")?,
            data: read_bag(row, "data")?,
            meta: read_meta(row)?,
        })
    }
}

impl NetworkScoped for Acl {
    fn network_id(&self) -> &str {
        &self.network_id
    }
}
