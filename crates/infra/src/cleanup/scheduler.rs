//! Background scheduler for [`CleanupJob`].

use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info};

use crate::config::CleanupConfig;
use crate::revocation::{RevocationCache, RevocationStore};

use super::job::CleanupJob;

/// Scheduler runtime statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupStats {
    pub runs: u64,
    pub removed_total: u64,
    pub failures: u64,
    pub last_removed: usize,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Handle to control a running scheduler.
#[derive(Debug)]
pub struct CleanupHandle {
    shutdown: mpsc::Sender<()>,
    join: Option<thread::JoinHandle<()>>,
    stats: Arc<Mutex<CleanupStats>>,
}

impl CleanupHandle {
    /// Stop after the current pass and wait for the thread to exit.
    ///
    /// Returns the stats as of the final pass.
    pub fn shutdown(mut self) -> CleanupStats {
        let _ = self.shutdown.send(());
        if let Some(j) = self.join.take() {
            let _ = j.join();
        }
        self.stats()
    }

    pub fn stats(&self) -> CleanupStats {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

/// Runs a [`CleanupJob`] immediately and then once per `interval`.
pub struct CleanupScheduler<S> {
    job: CleanupJob<S>,
    config: CleanupConfig,
}

impl<S: RevocationStore + 'static> CleanupScheduler<S> {
    pub fn new(cache: RevocationCache<S>, config: CleanupConfig) -> Self {
        Self {
            job: CleanupJob::new(cache, config.batch_size),
            config,
        }
    }

    /// Spawn the scheduler on a background thread named after the config.
    pub fn spawn(self) -> std::io::Result<CleanupHandle> {
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();
        let stats = Arc::new(Mutex::new(CleanupStats::default()));
        let stats_clone = stats.clone();

        let join = thread::Builder::new()
            .name(self.config.name.clone())
            .spawn(move || scheduler_loop(self, shutdown_rx, stats_clone))?;

        Ok(CleanupHandle {
            shutdown: shutdown_tx,
            join: Some(join),
            stats,
        })
    }
}

fn scheduler_loop<S: RevocationStore>(
    scheduler: CleanupScheduler<S>,
    shutdown_rx: mpsc::Receiver<()>,
    stats: Arc<Mutex<CleanupStats>>,
) {
    let name = scheduler.config.name.as_str();
    info!(
        scheduler = name,
        interval_secs = scheduler.config.interval.as_secs(),
        batch_size = scheduler.config.batch_size,
        "cleanup scheduler started"
    );

    loop {
        let now = Utc::now();
        let result = scheduler.job.run_once(now);

        {
            let mut s = stats.lock().unwrap_or_else(PoisonError::into_inner);
            s.runs += 1;
            s.last_run_at = Some(now);
            match &result {
                Ok(report) => {
                    s.last_removed = report.removed;
                    s.removed_total += report.removed as u64;
                    s.last_error = None;
                }
                Err(e) => {
                    s.failures += 1;
                    s.last_removed = 0;
                    s.last_error = Some(e.to_string());
                }
            }
        }

        if let Err(e) = result {
            error!(scheduler = name, error = %e, transient = e.is_transient(), "cleanup pass failed");
        }

        match shutdown_rx.recv_timeout(scheduler.config.interval) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    info!(scheduler = name, "cleanup scheduler stopped");
}
