use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result, bail};
use meshsync_core::{
    Acl, DnsEntry, EntityKey, ExtClient, Host, Network, Node, ResourceKind, RunCounts,
};
use meshsync_engine::{EngineError, Scheduler, SyncOptions, SyncService};
use meshsync_netmaker::NetmakerClient;
use meshsync_storage::{SqliteStore, Storage, VersionedRecord};
use serde::Serialize;
use tracing::info;

use crate::config::Config;

fn open_store(config: &Config) -> Result<SqliteStore> {
    SqliteStore::open(&config.database.path)
        .with_context(|| format!("failed to open database {}", config.database.path.display()))
}

fn service(config: &Config) -> Result<SyncService<NetmakerClient>> {
    let store = open_store(config)?;
    let client = NetmakerClient::new(config.client_config());
    let options = SyncOptions {
        acl_mode: config.sync.acl_mode,
    };
    Ok(SyncService::with_options(store, client, options))
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn serve(config: &Config, max_runs: Option<usize>) -> Result<()> {
    let mut service = service(config)?;
    let mut scheduler = Scheduler::new(config.interval()).with_acls(config.sync.include_acls);
    if let Some(max_runs) = max_runs {
        scheduler = scheduler.with_max_runs(max_runs);
    }
    install_shutdown_handler(scheduler.stop_handle())?;
    info!(
        url = %config.netmaker.url,
        interval_secs = config.sync.interval_secs,
        acls = config.sync.include_acls,
        "serving"
    );
    let runs = scheduler.run(&mut service);
    info!(runs, "scheduler stopped");
    Ok(())
}

/// SIGINT and SIGTERM set `stop`; the scheduler finishes the run in progress,
/// so its ledger row is closed, and then returns.
fn install_shutdown_handler(stop: Arc<AtomicBool>) -> Result<()> {
    ctrlc::set_handler(move || {
        if !stop.swap(true, Ordering::SeqCst) {
            info!("shutdown requested, finishing the current run");
        }
    })
    .context("failed to install signal handler")
}

pub fn sync_all(config: &Config, include_acls: bool) -> Result<()> {
    let mut service = service(config)?;
    let report = service.sync_all(include_acls)?;
    print_json(&report)?;
    let failed = report.failures().count();
    if failed > 0 {
        bail!("{failed} sync step(s) failed");
    }
    Ok(())
}

pub fn sync_one<F>(config: &Config, run: F) -> Result<()>
where
    F: FnOnce(&mut SyncService<NetmakerClient>) -> Result<RunCounts, EngineError>,
{
    let mut service = service(config)?;
    let counts = run(&mut service)?;
    print_json(&counts)
}

pub fn networks(config: &Config) -> Result<()> {
    let store = open_store(config)?;
    print_json(&store.get_networks()?)
}

pub fn network(config: &Config, id: &str) -> Result<()> {
    let store = open_store(config)?;
    let network = store.get_network(id).with_context(|| format!("network {id}"))?;
    print_json(&network)
}

fn print_history<R: VersionedRecord + Serialize>(
    store: &SqliteStore,
    key: &EntityKey,
) -> Result<()> {
    let history: Vec<R> = store.history(key)?;
    if history.is_empty() {
        bail!("no {} with id {key}", R::KIND);
    }
    print_json(&history)
}

pub fn history(config: &Config, kind: &str, id: &str) -> Result<()> {
    let kind = ResourceKind::parse(kind)?;
    let store = open_store(config)?;
    match kind {
        ResourceKind::Network => print_history::<Network>(&store, &EntityKey::from(id)),
        ResourceKind::Node => print_history::<Node>(&store, &EntityKey::from(id)),
        ResourceKind::ExtClient => print_history::<ExtClient>(&store, &EntityKey::from(id)),
        ResourceKind::Dns => print_history::<DnsEntry>(&store, &EntityKey::from(id)),
        ResourceKind::Host => print_history::<Host>(&store, &EntityKey::from(id)),
        ResourceKind::Acl => {
            let acl_id: i64 = id
                .parse()
                .with_context(|| format!("acl ids are integers, got {id:?}"))?;
            print_history::<Acl>(&store, &EntityKey::from(acl_id))
        }
    }
}

pub fn runs(config: &Config, limit: usize) -> Result<()> {
    let store = open_store(config)?;
    print_json(&store.recent_runs(limit)?)
}
