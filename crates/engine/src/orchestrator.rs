use meshsync_core::{ResourceKind, RunCounts};
use serde::Serialize;
use tracing::{error, info};

use crate::error::EngineError;
use crate::source::RemoteSource;
use crate::sync::SyncService;

/// Outcome of one synchronizer invocation inside a [`SyncService::sync_all`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    pub kind: ResourceKind,
    pub scope: Option<String>,
    pub counts: Option<RunCounts>,
    pub error: Option<String>,
}

impl StepReport {
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncAllReport {
    pub steps: Vec<StepReport>,
}

impl SyncAllReport {
    pub fn failures(&self) -> impl Iterator<Item = &StepReport> {
        self.steps.iter().filter(|step| step.failed())
    }

    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }

    /// Counts summed over every step that ran to completion.
    pub fn totals(&self) -> RunCounts {
        let mut totals = RunCounts::default();
        for counts in self.steps.iter().filter_map(|step| step.counts) {
            totals.absorb(counts);
        }
        totals
    }

    fn record(
        &mut self,
        kind: ResourceKind,
        scope: Option<&str>,
        result: Result<RunCounts, EngineError>,
    ) -> Result<RunCounts, EngineError> {
        let (counts, error) = match &result {
            Ok(counts) => (Some(*counts), None),
            Err(err) => {
                error!(%kind, scope, error = %err, "sync step failed, continuing");
                (None, Some(err.to_string()))
            }
        };
        self.steps.push(StepReport {
            kind,
            scope: scope.map(str::to_string),
            counts,
            error,
        });
        result
    }
}

impl<S: RemoteSource> SyncService<S> {
    /// Networks first, then every stored network's children, then hosts.
    ///
    /// Per-network failures are logged and reported but never stop the sweep.
    /// When the network sync itself fails, hosts still run and the network
    /// error is returned.
    pub fn sync_all(&mut self, include_acls: bool) -> Result<SyncAllReport, EngineError> {
        let mut report = SyncAllReport::default();

        let networks = self.sync_networks();
        let networks = report.record(ResourceKind::Network, None, networks);

        if networks.is_ok() {
            match self.get_networks() {
                Ok(stored) => {
                    for network in &stored {
                        self.sync_network_children(&network.id, include_acls, &mut report);
                    }
                }
                Err(err) => {
                    error!(error = %err, "could not list stored networks");
                    report.steps.push(StepReport {
                        kind: ResourceKind::Network,
                        scope: None,
                        counts: None,
                        error: Some(err.to_string()),
                    });
                }
            }
        }

        let hosts = self.sync_hosts();
        let _ = report.record(ResourceKind::Host, None, hosts);

        let totals = report.totals();
        info!(
            steps = report.steps.len(),
            failed_steps = report.failures().count(),
            created = totals.created,
            updated = totals.updated,
            written = totals.written(),
            failed_items = totals.failed,
            "sync all finished"
        );

        networks.map(|_| report)
    }

    fn sync_network_children(
        &mut self,
        network_id: &str,
        include_acls: bool,
        report: &mut SyncAllReport,
    ) {
        let scope = Some(network_id);

        let nodes = self.sync_nodes(network_id);
        let _ = report.record(ResourceKind::Node, scope, nodes);

        let clients = self.sync_ext_clients(network_id);
        let _ = report.record(ResourceKind::ExtClient, scope, clients);

        let dns = self.sync_dns_entries(network_id);
        let _ = report.record(ResourceKind::Dns, scope, dns);

        if include_acls {
            let acls = self.sync_acls(network_id);
            let _ = report.record(ResourceKind::Acl, scope, acls);
        }
    }
}
