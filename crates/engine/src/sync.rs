use meshsync_core::{Network, ResourceKind, RunCounts, SyncRun, SyncStatus, Versioned};
use meshsync_storage::{SqliteStore, Storage, StorageError, UpsertOutcome, VersionedRecord};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::{EngineError, SourceError};
use crate::source::RemoteSource;

/// How ACL synchronization treats rows already stored for a network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AclMode {
    /// Reuse identities by (source, destination) pair and version in place.
    #[default]
    Reconcile,
    /// Delete every ACL row of the network, then write the matrix afresh.
    Replace,
}

impl AclMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reconcile => "reconcile",
            Self::Replace => "replace",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    pub acl_mode: AclMode,
}

pub(crate) fn tally(counts: &mut RunCounts, outcome: UpsertOutcome) {
    match outcome {
        UpsertOutcome::Created => counts.created += 1,
        UpsertOutcome::Updated { .. } => counts.updated += 1,
        UpsertOutcome::Unchanged { .. } => counts.unchanged += 1,
    }
}

/// Drives fetched batches from a [`RemoteSource`] through the versioned
/// upsert and records every attempt in the sync run ledger.
pub struct SyncService<S> {
    pub(crate) store: SqliteStore,
    pub(crate) source: S,
    pub(crate) options: SyncOptions,
}

impl<S: RemoteSource> SyncService<S> {
    pub fn new(store: SqliteStore, source: S) -> Self {
        Self::with_options(store, source, SyncOptions::default())
    }

    pub fn with_options(store: SqliteStore, source: S, options: SyncOptions) -> Self {
        Self {
            store,
            source,
            options,
        }
    }

    pub fn store(&self) -> &SqliteStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut SqliteStore {
        &mut self.store
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn sync_networks(&mut self) -> Result<RunCounts, EngineError> {
        self.run_batch(ResourceKind::Network, None, |source| source.fetch_networks())
    }

    pub fn sync_nodes(&mut self, network_id: &str) -> Result<RunCounts, EngineError> {
        self.run_batch(ResourceKind::Node, Some(network_id), |source| {
            source.fetch_nodes(network_id)
        })
    }

    pub fn sync_ext_clients(&mut self, network_id: &str) -> Result<RunCounts, EngineError> {
        self.run_batch(ResourceKind::ExtClient, Some(network_id), |source| {
            source.fetch_ext_clients(network_id)
        })
    }

    pub fn sync_dns_entries(&mut self, network_id: &str) -> Result<RunCounts, EngineError> {
        self.run_batch(ResourceKind::Dns, Some(network_id), |source| {
            source.fetch_dns_entries(network_id)
        })
    }

    pub fn sync_hosts(&mut self) -> Result<RunCounts, EngineError> {
        self.run_batch(ResourceKind::Host, None, |source| source.fetch_hosts())
    }

    pub fn get_networks(&self) -> Result<Vec<Network>, EngineError> {
        Ok(self.store.get_networks()?)
    }

    pub fn get_network(&self, network_id: &str) -> Result<Network, EngineError> {
        match self.store.get_network(network_id) {
            Ok(network) => Ok(network),
            Err(StorageError::NotFound(_)) => {
                Err(EngineError::NetworkNotFound(network_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Close `run` as failed with the fetch error's text and hand the error back.
    pub(crate) fn fail_run(
        &mut self,
        run: &mut SyncRun,
        kind: ResourceKind,
        err: SourceError,
    ) -> EngineError {
        error!(%kind, scope = ?run.scope, error = %err, "fetch failed");
        let message = Some(err.to_string());
        if let Err(ledger_err) =
            self.store.finish_run(run, SyncStatus::Failed, message, RunCounts::default())
        {
            return ledger_err.into();
        }
        EngineError::Fetch { kind, source: err }
    }

    pub(crate) fn complete_run(
        &mut self,
        run: &mut SyncRun,
        counts: RunCounts,
    ) -> Result<(), EngineError> {
        let message =
            (counts.failed > 0).then(|| format!("{} item(s) failed to persist", counts.failed));
        self.store.finish_run(run, SyncStatus::Completed, message, counts)?;
        info!(
            kind = %run.resource_kind,
            scope = ?run.scope,
            created = counts.created,
            updated = counts.updated,
            unchanged = counts.unchanged,
            failed = counts.failed,
            "sync run completed"
        );
        Ok(())
    }

    fn run_batch<R, F>(
        &mut self,
        kind: ResourceKind,
        scope: Option<&str>,
        fetch: F,
    ) -> Result<RunCounts, EngineError>
    where
        R: VersionedRecord,
        F: FnOnce(&S) -> Result<Vec<R>, SourceError>,
    {
        let mut run = self.store.begin_run(kind, scope)?;

        let items = match fetch(&self.source) {
            Ok(items) => items,
            Err(err) => return Err(self.fail_run(&mut run, kind, err)),
        };

        let mut counts = RunCounts::default();
        for item in &items {
            match self.store.upsert(item) {
                Ok(outcome) => tally(&mut counts, outcome),
                Err(err) => {
                    counts.failed += 1;
                    warn!(
                        %kind,
                        key = %item.key(),
                        error = %err,
                        "upsert failed, continuing batch"
                    );
                }
            }
        }

        self.complete_run(&mut run, counts)?;
        Ok(counts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acl_mode_names_match_the_config_values() -> Result<(), serde_json::Error> {
        assert_eq!(AclMode::default(), AclMode::Reconcile);
        for mode in [AclMode::Reconcile, AclMode::Replace] {
            assert_eq!(serde_json::to_value(mode)?, mode.as_str());
        }
        Ok(())
    }

    #[test]
    fn tally_counts_each_outcome() {
        let mut counts = RunCounts::default();
        tally(&mut counts, UpsertOutcome::Created);
        tally(&mut counts, UpsertOutcome::Updated { version: 2 });
        tally(&mut counts, UpsertOutcome::Unchanged { version: 2 });
        tally(&mut counts, UpsertOutcome::Unchanged { version: 5 });
        assert_eq!(
            counts,
            RunCounts {
                created: 1,
                updated: 1,
                unchanged: 2,
                failed: 0
            }
        );
    }
}
