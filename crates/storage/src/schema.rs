use rusqlite::Connection;

use crate::error::StorageError;

pub const SCHEMA_VERSION: i32 = 1;

/// Create every table, index and trigger if absent. Safe to run on every open.
pub fn init_schema(conn: &Connection) -> Result<(), StorageError> {
    conn.execute_batch(
        "
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA foreign_keys = ON;
        PRAGMA cache_size = -32000;
        PRAGMA busy_timeout = 5000;
    ",
    )?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

pub fn schema_version(conn: &Connection) -> Result<i32, StorageError> {
    let version: i32 =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |row| {
            row.get(0)
        })?;
    Ok(version)
}

// Versioned tables key on (id, version). Children reference a parent identity,
// not a parent row, so parent links and cascades are enforced with triggers:
// a row may only point at an identity that has at least one version, and
// removing the last version of an identity removes its children.
const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);
INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, unixepoch());

CREATE TABLE IF NOT EXISTS networks (
    id TEXT NOT NULL,
    version INTEGER NOT NULL CHECK (version >= 1),
    name TEXT NOT NULL,
    address_range TEXT NOT NULL DEFAULT '',
    address_range6 TEXT NOT NULL DEFAULT '',
    local_range TEXT NOT NULL DEFAULT '',
    is_dual_stack INTEGER NOT NULL DEFAULT 0,
    is_ipv4 INTEGER NOT NULL DEFAULT 1,
    is_ipv6 INTEGER NOT NULL DEFAULT 0,
    is_local INTEGER NOT NULL DEFAULT 0,
    default_acl TEXT NOT NULL DEFAULT '',
    default_udp_hole_punching INTEGER NOT NULL DEFAULT 1,
    default_ext_client_dns TEXT NOT NULL DEFAULT '',
    default_mtu INTEGER NOT NULL DEFAULT 0,
    default_keepalive INTEGER NOT NULL DEFAULT 0,
    default_interface TEXT NOT NULL DEFAULT '',
    node_limit INTEGER NOT NULL DEFAULT 0,
    data TEXT,
    is_current INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    last_modified TEXT NOT NULL,
    PRIMARY KEY (id, version)
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_networks_current ON networks (id) WHERE is_current = 1;

CREATE TABLE IF NOT EXISTS nodes (
    id TEXT NOT NULL,
    version INTEGER NOT NULL CHECK (version >= 1),
    network_id TEXT NOT NULL,
    name TEXT NOT NULL,
    address TEXT NOT NULL DEFAULT '',
    address6 TEXT NOT NULL DEFAULT '',
    public_key TEXT NOT NULL DEFAULT '',
    endpoint TEXT NOT NULL DEFAULT '',
    is_egress_gateway INTEGER NOT NULL DEFAULT 0,
    is_ingress_gateway INTEGER NOT NULL DEFAULT 0,
    is_relay INTEGER NOT NULL DEFAULT 0,
    connected INTEGER NOT NULL DEFAULT 0,
    data TEXT,
    is_current INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    last_modified TEXT NOT NULL,
    PRIMARY KEY (id, version)
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_nodes_current ON nodes (id) WHERE is_current = 1;
CREATE INDEX IF NOT EXISTS idx_nodes_network ON nodes (network_id, is_current);

CREATE TABLE IF NOT EXISTS ext_clients (
    id TEXT NOT NULL,
    version INTEGER NOT NULL CHECK (version >= 1),
    network_id TEXT NOT NULL,
    name TEXT NOT NULL,
    address TEXT NOT NULL DEFAULT '',
    address6 TEXT NOT NULL DEFAULT '',
    public_key TEXT NOT NULL DEFAULT '',
    enabled INTEGER NOT NULL DEFAULT 1,
    data TEXT,
    is_current INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    last_modified TEXT NOT NULL,
    PRIMARY KEY (id, version)
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_ext_clients_current ON ext_clients (id) WHERE is_current = 1;
CREATE INDEX IF NOT EXISTS idx_ext_clients_network ON ext_clients (network_id, is_current);

CREATE TABLE IF NOT EXISTS dns_entries (
    id TEXT NOT NULL,
    version INTEGER NOT NULL CHECK (version >= 1),
    network_id TEXT NOT NULL,
    name TEXT NOT NULL,
    address TEXT NOT NULL DEFAULT '',
    address6 TEXT NOT NULL DEFAULT '',
    data TEXT,
    is_current INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    last_modified TEXT NOT NULL,
    PRIMARY KEY (id, version)
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_dns_entries_current ON dns_entries (id) WHERE is_current = 1;
CREATE INDEX IF NOT EXISTS idx_dns_entries_network ON dns_entries (network_id, is_current);

CREATE TABLE IF NOT EXISTS hosts (
    id TEXT NOT NULL,
    version INTEGER NOT NULL CHECK (version >= 1),
    name TEXT NOT NULL,
    endpoint_ip TEXT NOT NULL DEFAULT '',
    endpoint_ipv6 TEXT NOT NULL DEFAULT '',
    public_key TEXT NOT NULL DEFAULT '',
    listen_port INTEGER NOT NULL DEFAULT 0,
    mtu INTEGER NOT NULL DEFAULT 0,
    persistent_keepalive INTEGER NOT NULL DEFAULT 0,
    data TEXT,
    is_current INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    last_modified TEXT NOT NULL,
    PRIMARY KEY (id, version)
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_hosts_current ON hosts (id) WHERE is_current = 1;

CREATE TABLE IF NOT EXISTS acls (
    id INTEGER NOT NULL,
    version INTEGER NOT NULL CHECK (version >= 1),
    network_id TEXT NOT NULL,
    node_id TEXT NOT NULL,
    data TEXT NOT NULL,
    is_current INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    last_modified TEXT NOT NULL,
    PRIMARY KEY (id, version)
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_acls_current ON acls (id) WHERE is_current = 1;
CREATE INDEX IF NOT EXISTS idx_acls_network ON acls (network_id, is_current);

CREATE TABLE IF NOT EXISTS sync_runs (
    run_id TEXT PRIMARY KEY,
    resource_kind TEXT NOT NULL,
    scope TEXT,
    status TEXT NOT NULL CHECK (status IN ('pending', 'completed', 'failed')),
    message TEXT,
    created_count INTEGER NOT NULL DEFAULT 0,
    updated_count INTEGER NOT NULL DEFAULT 0,
    unchanged_count INTEGER NOT NULL DEFAULT 0,
    failed_count INTEGER NOT NULL DEFAULT 0,
    started_at TEXT NOT NULL,
    completed_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_sync_runs_kind ON sync_runs (resource_kind, started_at);

CREATE TRIGGER IF NOT EXISTS nodes_network_ref BEFORE INSERT ON nodes
WHEN NOT EXISTS (SELECT 1 FROM networks WHERE id = NEW.network_id)
BEGIN
    SELECT RAISE(ABORT, 'node references unknown network');
END;

CREATE TRIGGER IF NOT EXISTS ext_clients_network_ref BEFORE INSERT ON ext_clients
WHEN NOT EXISTS (SELECT 1 FROM networks WHERE id = NEW.network_id)
BEGIN
    SELECT RAISE(ABORT, 'external client references unknown network');
END;

CREATE TRIGGER IF NOT EXISTS dns_entries_network_ref BEFORE INSERT ON dns_entries
WHEN NOT EXISTS (SELECT 1 FROM networks WHERE id = NEW.network_id)
BEGIN
    SELECT RAISE(ABORT, 'dns entry references unknown network');
END;

CREATE TRIGGER IF NOT EXISTS acls_network_ref BEFORE INSERT ON acls
WHEN NOT EXISTS (SELECT 1 FROM networks WHERE id = NEW.network_id)
BEGIN
    SELECT RAISE(ABORT, 'acl references unknown network');
END;

CREATE TRIGGER IF NOT EXISTS acls_node_ref BEFORE INSERT ON acls
WHEN NOT EXISTS (SELECT 1 FROM nodes WHERE id = NEW.node_id)
BEGIN
    SELECT RAISE(ABORT, 'acl references unknown node');
END;

CREATE TRIGGER IF NOT EXISTS networks_cascade AFTER DELETE ON networks
WHEN NOT EXISTS (SELECT 1 FROM networks WHERE id = OLD.id)
BEGIN
    DELETE FROM acls WHERE network_id = OLD.id;
    DELETE FROM dns_entries WHERE network_id = OLD.id;
    DELETE FROM ext_clients WHERE network_id = OLD.id;
    DELETE FROM nodes WHERE network_id = OLD.id;
END;

CREATE TRIGGER IF NOT EXISTS nodes_cascade AFTER DELETE ON nodes
WHEN NOT EXISTS (SELECT 1 FROM nodes WHERE id = OLD.id)
BEGIN
    DELETE FROM acls WHERE node_id = OLD.id;
END;
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();
        assert_eq!(schema_version(&conn).unwrap(), SCHEMA_VERSION);

        let markers: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(markers, 1);
    }

    #[test]
    fn every_table_exists() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        let tables = [
            "networks",
            "nodes",
            "ext_clients",
            "dns_entries",
            "hosts",
            "acls",
            "sync_runs",
        ];
        for table in tables {
            let found: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(found, 1, "missing table {table}");
        }
    }
}
