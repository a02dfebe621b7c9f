use std::sync::atomic::Ordering;
use std::time::Duration;

use meshsync_core::{AclMatrix, ExtClient, ResourceKind, SyncStatus};
use meshsync_engine::{EngineError, Scheduler};
use meshsync_harness::{TestBed, dns, host, network, node};
use meshsync_storage::Storage;

fn two_networks() -> Result<TestBed, Box<dyn std::error::Error>> {
    let mut bed = TestBed::new()?;
    let source = bed.source();
    source.networks = vec![network("net1", "10.0.0.0/24"), network("net2", "10.1.0.0/24")];
    source.nodes.insert(
        "net1".into(),
        vec![node("n1", "net1", "alpha"), node("n2", "net1", "beta")],
    );
    source.nodes.insert("net2".into(), vec![node("n3", "net2", "gamma")]);
    source
        .ext_clients
        .insert("net1".into(), vec![ExtClient::new("laptop", "net1")]);
    source.dns_entries.insert("net2".into(), vec![dns("net2", "gw", "10.1.0.1")]);
    source
        .acls
        .insert("net1".into(), AclMatrix::new().with("alpha", "beta", true));
    source.hosts = vec![host("h1", 1420), host("h2", 1280)];
    Ok(bed)
}

// ============================================================================
// SyncAll
// ============================================================================

#[test]
fn sync_all_runs_networks_first_and_hosts_last() -> Result<(), Box<dyn std::error::Error>> {
    let mut bed = two_networks()?;
    let report = bed.service.sync_all(false)?;
    assert!(report.is_clean());

    let log = bed.source().fetch_log();
    let kinds: Vec<ResourceKind> = log.iter().map(|(kind, _)| *kind).collect();
    assert_eq!(
        kinds,
        vec![
            ResourceKind::Network,
            ResourceKind::Node,
            ResourceKind::ExtClient,
            ResourceKind::Dns,
            ResourceKind::Node,
            ResourceKind::ExtClient,
            ResourceKind::Dns,
            ResourceKind::Host,
        ]
    );
    assert_eq!(log[1].1.as_deref(), Some("net1"));
    assert_eq!(log[4].1.as_deref(), Some("net2"));

    let totals = report.totals();
    assert_eq!(totals.created, 2 + 3 + 1 + 1 + 2);
    assert_eq!(bed.store().nodes_in_network("net1")?.len(), 2);
    assert_eq!(bed.store().get_hosts()?.len(), 2);
    Ok(())
}

#[test]
fn acls_only_when_requested() -> Result<(), Box<dyn std::error::Error>> {
    let mut bed = two_networks()?;
    bed.service.sync_all(false)?;
    assert!(bed.store().acls_in_network("net1")?.is_empty());

    let report = bed.service.sync_all(true)?;
    assert!(report.is_clean());
    assert_eq!(bed.store().acls_in_network("net1")?.len(), 1);
    let acl_steps = report
        .steps
        .iter()
        .filter(|step| step.kind == ResourceKind::Acl)
        .count();
    assert_eq!(acl_steps, 2);
    Ok(())
}

#[test]
fn second_sync_all_is_a_no_op() -> Result<(), Box<dyn std::error::Error>> {
    let mut bed = two_networks()?;
    bed.service.sync_all(true)?;
    let report = bed.service.sync_all(true)?;
    let totals = report.totals();
    assert_eq!(totals.written(), 0);
    assert_eq!(totals.failed, 0);
    assert!(totals.unchanged > 0);
    Ok(())
}

#[test]
fn per_network_failure_does_not_stop_the_sweep() -> Result<(), Box<dyn std::error::Error>> {
    let mut bed = two_networks()?;
    bed.source().fail(ResourceKind::Node, Some("net1"));

    let report = bed.service.sync_all(false)?;
    assert!(!report.is_clean());
    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, ResourceKind::Node);
    assert_eq!(failures[0].scope.as_deref(), Some("net1"));

    assert!(bed.store().nodes_in_network("net1")?.is_empty());
    assert_eq!(bed.store().ext_clients_in_network("net1")?.len(), 1);
    assert_eq!(bed.store().nodes_in_network("net2")?.len(), 1);
    assert_eq!(bed.store().get_hosts()?.len(), 2);

    let node_runs = bed.store().runs_for_kind(ResourceKind::Node)?;
    let statuses: Vec<SyncStatus> = node_runs.iter().map(|run| run.status).collect();
    assert_eq!(statuses, vec![SyncStatus::Failed, SyncStatus::Completed]);
    Ok(())
}

#[test]
fn network_failure_skips_children_but_not_hosts() -> Result<(), Box<dyn std::error::Error>> {
    let mut bed = two_networks()?;
    bed.source().fail(ResourceKind::Network, None);

    let err = bed.service.sync_all(false).unwrap_err();
    assert!(matches!(err, EngineError::Fetch { kind: ResourceKind::Network, .. }));

    let kinds: Vec<ResourceKind> = bed
        .source()
        .fetch_log()
        .into_iter()
        .map(|(kind, _)| kind)
        .collect();
    assert_eq!(kinds, vec![ResourceKind::Network, ResourceKind::Host]);
    assert_eq!(bed.store().get_hosts()?.len(), 2);
    Ok(())
}

#[test]
fn previously_stored_networks_are_still_swept() -> Result<(), Box<dyn std::error::Error>> {
    let mut bed = two_networks()?;
    bed.service.sync_all(false)?;

    // net2 vanishes upstream; its current row persists and is still visited.
    bed.source().networks.retain(|n| n.id == "net1");
    bed.source().clear_log();
    bed.service.sync_all(false)?;

    let scopes: Vec<Option<String>> = bed
        .source()
        .fetch_log()
        .into_iter()
        .filter(|(kind, _)| *kind == ResourceKind::Node)
        .map(|(_, scope)| scope)
        .collect();
    assert_eq!(scopes, vec![Some("net1".to_string()), Some("net2".to_string())]);
    Ok(())
}

// ============================================================================
// Scheduler
// ============================================================================

#[test]
fn scheduler_stops_after_max_runs() -> Result<(), Box<dyn std::error::Error>> {
    let mut bed = two_networks()?;
    let scheduler = Scheduler::new(Duration::ZERO).with_max_runs(3);

    let runs = scheduler.run(&mut bed.service);
    assert_eq!(runs, 3);
    let network_runs = bed.store().runs_for_kind(ResourceKind::Network)?;
    assert_eq!(network_runs.len(), 3);
    Ok(())
}

#[test]
fn scheduler_keeps_going_when_a_run_fails() -> Result<(), Box<dyn std::error::Error>> {
    let mut bed = two_networks()?;
    bed.source().fail(ResourceKind::Network, None);
    let scheduler = Scheduler::new(Duration::from_millis(1)).with_max_runs(2);

    assert_eq!(scheduler.run(&mut bed.service), 2);
    let failed = bed
        .store()
        .runs_for_kind(ResourceKind::Network)?
        .iter()
        .filter(|run| run.status == SyncStatus::Failed)
        .count();
    assert_eq!(failed, 2);
    Ok(())
}

#[test]
fn stop_during_a_run_lets_it_finish() -> Result<(), Box<dyn std::error::Error>> {
    let mut bed = two_networks()?;
    let scheduler = Scheduler::new(Duration::from_secs(3600)).with_acls(true);
    bed.source().raise_on_fetch(ResourceKind::Node, scheduler.stop_handle());

    assert_eq!(scheduler.run(&mut bed.service), 1);

    let runs = bed.store().recent_runs(50)?;
    assert_eq!(runs.len(), 1 + 4 * 2 + 1);
    assert!(runs.iter().all(|run| run.status.is_terminal()));
    assert!(runs.iter().all(|run| run.completed_at.is_some()));
    assert_eq!(bed.store().get_hosts()?.len(), 2);
    Ok(())
}

#[test]
fn stopped_scheduler_does_not_run() -> Result<(), Box<dyn std::error::Error>> {
    let mut bed = two_networks()?;
    let scheduler = Scheduler::new(Duration::from_secs(3600)).with_acls(true);
    scheduler.stop_handle().store(true, Ordering::SeqCst);

    assert_eq!(scheduler.run(&mut bed.service), 0);
    assert!(bed.store().recent_runs(10)?.is_empty());
    Ok(())
}
