//! Reconciliation of a network's permission matrix against stored ACL rows.
//!
//! The remote side serves a source -> destination -> allowed matrix keyed by
//! node names. Every cell becomes one ACL identity: the id already stored for
//! that (source, destination) pair, or the next free id.

use std::collections::BTreeMap;

use meshsync_core::{Acl, AclMatrix, ResourceKind, RunCounts, SyncStatus};
use meshsync_storage::{SqliteStore, Storage, StorageError};
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::source::RemoteSource;
use crate::sync::{AclMode, SyncService, tally};

impl<S: RemoteSource> SyncService<S> {
    pub fn sync_acls(&mut self, network_id: &str) -> Result<RunCounts, EngineError> {
        let mut run = self.store.begin_run(ResourceKind::Acl, Some(network_id))?;

        let matrix = match self.source.fetch_acls(network_id) {
            Ok(matrix) => matrix,
            Err(err) => return Err(self.fail_run(&mut run, ResourceKind::Acl, err)),
        };

        let counts = match reconcile(&mut self.store, network_id, &matrix, self.options.acl_mode) {
            Ok(counts) => counts,
            Err(err) => {
                self.store.finish_run(
                    &mut run,
                    SyncStatus::Failed,
                    Some(err.to_string()),
                    RunCounts::default(),
                )?;
                return Err(err.into());
            }
        };

        self.complete_run(&mut run, counts)?;
        Ok(counts)
    }
}

/// Apply `matrix` to the stored ACLs of `network_id`.
///
/// Errors are only returned for reads that the whole matrix depends on;
/// a cell that fails to persist is counted and skipped.
pub fn reconcile(
    store: &mut SqliteStore,
    network_id: &str,
    matrix: &AclMatrix,
    mode: AclMode,
) -> Result<RunCounts, StorageError> {
    if mode == AclMode::Replace {
        let removed = store.delete_acls(network_id)?;
        info!(network = network_id, removed, "cleared acl rows before replace");
    }

    let nodes = store.nodes_in_network(network_id)?;
    let mut node_ids: BTreeMap<&str, &str> = BTreeMap::new();
    for node in &nodes {
        node_ids.insert(node.id.as_str(), node.id.as_str());
    }
    // Names win over ids when both match.
    for node in &nodes {
        node_ids.insert(node.name.as_str(), node.id.as_str());
    }

    let index = store.acl_index(network_id)?;
    let mut next_id = store.next_acl_id()?;
    let mut counts = RunCounts::default();
    debug!(
        network = network_id,
        mode = mode.as_str(),
        cells = matrix.cell_count(),
        known_pairs = index.len(),
        next_id,
        "reconciling acl matrix"
    );

    for (source, row) in matrix.rows() {
        let Some(&node_id) = node_ids.get(source) else {
            warn!(
                network = network_id,
                source,
                cells = row.len(),
                "acl source node not found, skipping row"
            );
            counts.failed += u32::try_from(row.len()).unwrap_or(u32::MAX);
            continue;
        };

        for (dest, &allowed) in row {
            let id = match index.get(&(source.to_string(), dest.clone())) {
                Some(&id) => id,
                None => {
                    let id = next_id;
                    next_id += 1;
                    id
                }
            };

            let acl = Acl::entry(id, network_id, node_id, source, dest, allowed);
            match store.upsert(&acl) {
                Ok(outcome) => tally(&mut counts, outcome),
                Err(err) => {
                    counts.failed += 1;
                    warn!(
                        network = network_id,
                        source,
                        dest = %dest,
                        error = %err,
                        "acl upsert failed"
                    );
                }
            }
        }
    }

    Ok(counts)
}
