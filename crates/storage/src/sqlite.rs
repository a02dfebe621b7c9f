use std::path::Path;

use chrono::Utc;
use rusqlite::Connection;
use tracing::info;

use meshsync_core::{
    Acl, EntityKey, Network, ResourceKind, RunCounts, SyncRun, SyncRunId, SyncStatus,
};

use crate::error::StorageError;
use crate::ledger;
use crate::traits::{AclIndex, Storage};
use crate::versioned::{self, NetworkScoped, UpsertOutcome, VersionedRecord};

pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

impl Storage for SqliteStore {
    fn upsert<R: VersionedRecord>(&mut self, candidate: &R) -> Result<UpsertOutcome, StorageError> {
        versioned::upsert(&mut self.conn, candidate, Utc::now())
    }

    fn current<R: VersionedRecord>(&self, key: &EntityKey) -> Result<Option<R>, StorageError> {
        versioned::select_current(&self.conn, key)
    }

    fn history<R: VersionedRecord>(&self, key: &EntityKey) -> Result<Vec<R>, StorageError> {
        versioned::select_history(&self.conn, key)
    }

    fn list_current<R: VersionedRecord>(&self) -> Result<Vec<R>, StorageError> {
        versioned::select_all_current(&self.conn)
    }

    fn current_in_network<R: NetworkScoped>(
        &self,
        network_id: &str,
    ) -> Result<Vec<R>, StorageError> {
        versioned::select_current_in_network(&self.conn, network_id)
    }

    fn get_networks(&self) -> Result<Vec<Network>, StorageError> {
        self.list_current()
    }

    fn get_network(&self, network_id: &str) -> Result<Network, StorageError> {
        self.current(&EntityKey::from(network_id))?
            .ok_or_else(|| StorageError::NotFound(format!("network {network_id}")))
    }

    fn delete_network(&mut self, network_id: &str) -> Result<usize, StorageError> {
        let tx = self.conn.transaction()?;
        let removed = tx.execute("DELETE FROM networks WHERE id = ?1", [network_id])?;
        tx.commit()?;
        if removed > 0 {
            info!(network = network_id, versions = removed, "deleted network and its children");
        }
        Ok(removed)
    }

    fn acl_index(&self, network_id: &str) -> Result<AclIndex, StorageError> {
        let mut stmt = self.conn.prepare(
            "SELECT * FROM acls WHERE network_id = ?1 ORDER BY id, version DESC",
        )?;
        let rows = stmt
            .query_map([network_id], Acl::from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut index = AclIndex::new();
        for acl in rows {
            if let Some((source, dest)) = acl.pair() {
                index
                    .entry((source.to_string(), dest.to_string()))
                    .or_insert(acl.id);
            }
        }
        Ok(index)
    }

    fn next_acl_id(&self) -> Result<i64, StorageError> {
        let next: i64 =
            self.conn
                .query_row("SELECT COALESCE(MAX(id), 0) + 1 FROM acls", [], |row| row.get(0))?;
        Ok(next)
    }

    fn delete_acls(&mut self, network_id: &str) -> Result<usize, StorageError> {
        let removed = self
            .conn
            .execute("DELETE FROM acls WHERE network_id = ?1", [network_id])?;
        Ok(removed)
    }

    fn begin_run(
        &mut self,
        kind: ResourceKind,
        scope: Option<&str>,
    ) -> Result<SyncRun, StorageError> {
        let run = SyncRun {
            run_id: SyncRunId::new(),
            resource_kind: kind,
            scope: scope.map(str::to_string),
            status: SyncStatus::Pending,
            message: None,
            counts: RunCounts::default(),
            started_at: Utc::now(),
            completed_at: None,
        };
        ledger::insert_run(&self.conn, &run)?;
        Ok(run)
    }

    fn finish_run(
        &mut self,
        run: &mut SyncRun,
        status: SyncStatus,
        message: Option<String>,
        counts: RunCounts,
    ) -> Result<(), StorageError> {
        if run.status.is_terminal() || !status.is_terminal() {
            return Err(StorageError::RunTransition {
                run_id: run.run_id.to_string(),
                from: run.status,
                to: status,
            });
        }
        run.status = status;
        run.message = message;
        run.counts = counts;
        run.completed_at = Some(Utc::now());
        ledger::update_run(&self.conn, run)
    }

    fn get_run(&self, run_id: SyncRunId) -> Result<Option<SyncRun>, StorageError> {
        ledger::select_run(&self.conn, run_id)
    }

    fn recent_runs(&self, limit: usize) -> Result<Vec<SyncRun>, StorageError> {
        ledger::select_recent(&self.conn, limit)
    }

    fn runs_for_kind(&self, kind: ResourceKind) -> Result<Vec<SyncRun>, StorageError> {
        ledger::select_by_kind(&self.conn, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshsync_core::{AttributeBag, DnsEntry, ExtClient, Host, Node, Versioned};

    fn network(id: &str, range: &str) -> Network {
        Network {
            address_range: range.to_string(),
            ..Network::new(id)
        }
    }

    fn current_count(store: &SqliteStore, table: &str, id: &str) -> i64 {
        store
            .conn()
            .query_row(
                &format!("SELECT COUNT(*) FROM {table} WHERE id = ?1 AND is_current = 1"),
                [id],
                |row| row.get(0),
            )
            .unwrap()
    }

    #[test]
    fn first_upsert_creates_version_one() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let outcome = store.upsert(&network("net1", "10.0.0.0/24")).unwrap();
        assert_eq!(outcome, UpsertOutcome::Created);

        let stored = store.get_network("net1").unwrap();
        assert_eq!(stored.version(), 1);
        assert!(stored.meta.is_current);
        assert_eq!(stored.address_range, "10.0.0.0/24");
        assert_eq!(stored.meta.created_at, stored.meta.last_modified);
    }

    #[test]
    fn change_retires_previous_and_appends_next_version() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.upsert(&network("net1", "10.0.0.0/24")).unwrap();
        let outcome = store.upsert(&network("net1", "10.0.1.0/24")).unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated { version: 2 });

        let history: Vec<Network> = store.history(&EntityKey::from("net1")).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].version(), 2);
        assert!(history[0].meta.is_current);
        assert_eq!(history[0].address_range, "10.0.1.0/24");
        assert_eq!(history[1].version(), 1);
        assert!(!history[1].meta.is_current);
        assert_eq!(history[1].address_range, "10.0.0.0/24");

        // Creation time is carried forward, modification time is not.
        assert_eq!(history[0].meta.created_at, history[1].meta.created_at);
        assert!(history[0].meta.last_modified >= history[1].meta.last_modified);
    }

    #[test]
    fn identical_payload_is_a_no_op() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.upsert(&network("net1", "10.0.0.0/24")).unwrap();
        store.upsert(&network("net1", "10.0.1.0/24")).unwrap();
        let outcome = store.upsert(&network("net1", "10.0.1.0/24")).unwrap();
        assert_eq!(outcome, UpsertOutcome::Unchanged { version: 2 });

        let history: Vec<Network> = store.history(&EntityKey::from("net1")).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(store.get_network("net1").unwrap().version(), 2);
    }

    #[test]
    fn bag_key_order_does_not_create_versions() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let first = Host {
            data: AttributeBag::from_json(Some(r#"{"os": "linux", "arch": "amd64"}"#)).unwrap(),
            ..Host::new("h1")
        };
        let reordered = Host {
            data: AttributeBag::from_json(Some(r#"{"arch": "amd64", "os": "linux"}"#)).unwrap(),
            ..Host::new("h1")
        };
        store.upsert(&first).unwrap();
        assert_eq!(
            store.upsert(&reordered).unwrap(),
            UpsertOutcome::Unchanged { version: 1 }
        );
    }

    #[test]
    fn versions_stay_contiguous_over_many_changes() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        for mtu in [1280, 1280, 1420, 1500, 1500, 9000] {
            let host = Host { mtu, ..Host::new("h1") };
            store.upsert(&host).unwrap();
        }
        let history: Vec<Host> = store.history(&EntityKey::from("h1")).unwrap();
        let versions: Vec<i64> = history.iter().rev().map(|h| h.version()).collect();
        assert_eq!(versions, vec![1, 2, 3, 4]);
        assert_eq!(current_count(&store, "hosts", "h1"), 1);
    }

    #[test]
    fn missing_current_row_is_recovered_with_next_version() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.upsert(&network("net1", "10.0.0.0/24")).unwrap();
        store
            .conn()
            .execute("UPDATE networks SET is_current = 0 WHERE id = 'net1'", [])
            .unwrap();
        assert!(store.current::<Network>(&EntityKey::from("net1")).unwrap().is_none());

        // Same content: with no current row to compare against, a version is still written.
        let outcome = store.upsert(&network("net1", "10.0.0.0/24")).unwrap();
        assert_eq!(outcome, UpsertOutcome::Updated { version: 2 });
        assert_eq!(current_count(&store, "networks", "net1"), 1);
    }

    #[test]
    fn failed_insert_rolls_back_the_retirement() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.upsert(&network("net1", "10.0.0.0/24")).unwrap();
        store
            .conn()
            .execute_batch(
                "CREATE TRIGGER reject_v2 BEFORE INSERT ON networks WHEN NEW.version = 2
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let err = store.upsert(&network("net1", "10.0.1.0/24")).unwrap_err();
        match err {
            StorageError::Upsert { kind, key, .. } => {
                assert_eq!(kind, ResourceKind::Network);
                assert_eq!(key, "net1");
            }
            other => panic!("unexpected error: {other}"),
        }

        let current = store.get_network("net1").unwrap();
        assert_eq!(current.version(), 1);
        assert_eq!(current.address_range, "10.0.0.0/24");
        assert_eq!(current_count(&store, "networks", "net1"), 1);
    }

    #[test]
    fn child_rows_require_a_known_network() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let err = store.upsert(&Node::new("n1", "ghost")).unwrap_err();
        assert!(matches!(err, StorageError::Upsert { kind: ResourceKind::Node, .. }));

        store.upsert(&Network::new("net1")).unwrap();
        assert_eq!(store.upsert(&Node::new("n1", "net1")).unwrap(), UpsertOutcome::Created);
    }

    #[test]
    fn deleting_a_network_cascades_to_children() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.upsert(&network("net1", "10.0.0.0/24")).unwrap();
        store.upsert(&network("net1", "10.0.1.0/24")).unwrap();
        store.upsert(&Network::new("net2")).unwrap();
        store.upsert(&Node::new("n1", "net1")).unwrap();
        store.upsert(&Node::new("n2", "net2")).unwrap();
        store.upsert(&ExtClient::new("c1", "net1")).unwrap();
        store.upsert(&DnsEntry::new("net1", "gw")).unwrap();
        store.upsert(&Acl::entry(1, "net1", "n1", "n1", "n1", true)).unwrap();

        assert_eq!(store.delete_network("net1").unwrap(), 2);

        assert!(store.current_in_network::<Node>("net1").unwrap().is_empty());
        assert!(store.current_in_network::<ExtClient>("net1").unwrap().is_empty());
        assert!(store.current_in_network::<DnsEntry>("net1").unwrap().is_empty());
        assert!(store.current_in_network::<Acl>("net1").unwrap().is_empty());
        assert_eq!(store.current_in_network::<Node>("net2").unwrap().len(), 1);
        assert!(matches!(store.get_network("net1"), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn acl_index_and_next_id() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        assert_eq!(store.next_acl_id().unwrap(), 1);
        store.upsert(&Network::new("net1")).unwrap();
        store.upsert(&Node::new("n1", "net1")).unwrap();
        store.upsert(&Acl::entry(4, "net1", "n1", "alpha", "beta", true)).unwrap();
        store.upsert(&Acl::entry(4, "net1", "n1", "alpha", "beta", false)).unwrap();
        store.upsert(&Acl::entry(7, "net1", "n1", "alpha", "gamma", true)).unwrap();

        let index = store.acl_index("net1").unwrap();
        assert_eq!(index.len(), 2);
        assert_eq!(index[&("alpha".to_string(), "beta".to_string())], 4);
        assert_eq!(index[&("alpha".to_string(), "gamma".to_string())], 7);
        assert_eq!(store.next_acl_id().unwrap(), 8);
        assert!(store.acl_index("net2").unwrap().is_empty());

        assert_eq!(store.delete_acls("net1").unwrap(), 3);
        assert_eq!(store.next_acl_id().unwrap(), 1);
    }

    #[test]
    fn ledger_records_lifecycle() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut run = store.begin_run(ResourceKind::Node, Some("net1")).unwrap();
        let pending = store.get_run(run.run_id).unwrap().unwrap();
        assert_eq!(pending.status, SyncStatus::Pending);
        assert!(pending.completed_at.is_none());
        assert_eq!(pending.scope.as_deref(), Some("net1"));

        let counts = RunCounts {
            created: 2,
            updated: 1,
            unchanged: 4,
            failed: 1,
        };
        store
            .finish_run(&mut run, SyncStatus::Completed, None, counts)
            .unwrap();
        let done = store.get_run(run.run_id).unwrap().unwrap();
        assert_eq!(done.status, SyncStatus::Completed);
        assert_eq!(done.counts, counts);
        assert!(done.completed_at.is_some());
        assert!(done.completed_at.unwrap() >= done.started_at);

        let mut failed = store.begin_run(ResourceKind::Host, None).unwrap();
        store
            .finish_run(
                &mut failed,
                SyncStatus::Failed,
                Some("connection refused".into()),
                RunCounts::default(),
            )
            .unwrap();

        let recent = store.recent_runs(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].run_id, failed.run_id);
        assert_eq!(recent[0].message.as_deref(), Some("connection refused"));
        assert_eq!(store.runs_for_kind(ResourceKind::Node).unwrap().len(), 1);
    }

    #[test]
    fn finished_runs_stay_finished() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        let mut run = store.begin_run(ResourceKind::Host, None).unwrap();
        assert!(matches!(
            store.finish_run(&mut run, SyncStatus::Pending, None, RunCounts::default()),
            Err(StorageError::RunTransition { .. })
        ));

        store
            .finish_run(&mut run, SyncStatus::Completed, None, RunCounts::default())
            .unwrap();
        let err = store
            .finish_run(&mut run, SyncStatus::Failed, Some("late".into()), RunCounts::default())
            .unwrap_err();
        assert!(matches!(err, StorageError::RunTransition { .. }));

        let stored = store.get_run(run.run_id).unwrap().unwrap();
        assert_eq!(stored.status, SyncStatus::Completed);
        assert_eq!(stored.message, None);
    }

    #[test]
    fn store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("meshsync.db");
        {
            let mut store = SqliteStore::open(&path).unwrap();
            store.upsert(&network("net1", "10.0.0.0/24")).unwrap();
        }
        let mut store = SqliteStore::open(&path).unwrap();
        assert_eq!(
            store.upsert(&network("net1", "10.0.0.0/24")).unwrap(),
            UpsertOutcome::Unchanged { version: 1 }
        );
        assert_eq!(store.get_network("net1").unwrap().version(), 1);
    }
}
