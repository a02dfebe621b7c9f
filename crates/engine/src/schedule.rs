use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use tracing::{error, info};

use crate::source::RemoteSource;
use crate::sync::SyncService;

const STOP_POLL: Duration = Duration::from_millis(100);

/// Runs [`SyncService::sync_all`] on a fixed interval until stopped.
#[derive(Debug, Clone)]
pub struct Scheduler {
    interval: Duration,
    include_acls: bool,
    max_runs: Option<usize>,
    stop: Arc<AtomicBool>,
}

impl Scheduler {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            include_acls: false,
            max_runs: None,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_acls(mut self, include_acls: bool) -> Self {
        self.include_acls = include_acls;
        self
    }

    pub fn with_max_runs(mut self, max_runs: usize) -> Self {
        self.max_runs = Some(max_runs);
        self
    }

    /// Setting the returned flag ends the loop before the next run.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Blocks until stopped or `max_runs` is reached. Returns the number of runs.
    pub fn run<S: RemoteSource>(&self, service: &mut SyncService<S>) -> usize {
        let mut runs = 0;
        while !self.stopped() {
            let started = Instant::now();
            match service.sync_all(self.include_acls) {
                Ok(report) if report.is_clean() => {
                    info!(run = runs + 1, "scheduled sync succeeded")
                }
                Ok(report) => info!(
                    run = runs + 1,
                    failed_steps = report.failures().count(),
                    "scheduled sync finished with failures"
                ),
                Err(err) => error!(run = runs + 1, error = %err, "scheduled sync failed"),
            }
            runs += 1;

            if self.max_runs.is_some_and(|max| runs >= max) {
                break;
            }
            self.wait(self.interval.saturating_sub(started.elapsed()));
        }
        runs
    }

    fn wait(&self, total: Duration) {
        let deadline = Instant::now() + total;
        loop {
            let now = Instant::now();
            if self.stopped() || now >= deadline {
                return;
            }
            thread::sleep(STOP_POLL.min(deadline - now));
        }
    }
}
