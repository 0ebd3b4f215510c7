//! Category scheduler and worker supervision
//!
//! This module handles:
//! - Fanning the configured categories into the work queue
//! - Launching one supervised worker per category at a fixed pace
//! - Restarting workers that panic, with exponential backoff
//! - Periodic sweeping of the dedup cache
//! - Cooperative shutdown through a shared cancellation token

use crate::config::CrawlerConfig;
use crate::crawler::backoff::RetryBackoff;
use crate::crawler::queue::fan_out;
use crate::crawler::stats::StatsSnapshot;
use crate::crawler::worker::{sleep_or_cancel, WorkerDeps};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Launch pacing and supervision settings
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    /// Pause between two worker launches
    pub launch_interval: Duration,

    /// First delay before restarting a crashed worker
    pub restart_backoff: Duration,

    /// Upper bound for the restart delay
    pub max_restart_backoff: Duration,

    /// How often the dedup cache is swept
    pub sweep_interval: Duration,
}

impl SchedulerSettings {
    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self {
            launch_interval: config.launch_interval(),
            restart_backoff: config.restart_backoff(),
            max_restart_backoff: config.max_backoff().max(config.restart_backoff()),
            sweep_interval: config.sweep_interval(),
        }
    }
}

/// Launches and supervises category workers
pub struct Scheduler {
    deps: WorkerDeps,
    settings: SchedulerSettings,
}

impl Scheduler {
    pub fn new(deps: WorkerDeps, settings: SchedulerSettings) -> Self {
        Self { deps, settings }
    }

    /// Starts one worker per category and returns once all are launched
    ///
    /// Identifiers are pushed into the work queue concurrently and drained one
    /// at a time, with `launch_interval` between launches. The returned
    /// [`Supervisor`] owns every worker; crawling continues after this
    /// returns, until the token is cancelled.
    pub async fn launch(&self, category_ids: &[String], cancel: CancellationToken) -> Supervisor {
        let mut queue = fan_out(category_ids);
        let sweeper = self.spawn_sweeper(cancel.clone());
        let mut workers = Vec::with_capacity(category_ids.len());

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                next = queue.pop() => next,
            };
            let Some(category_id) = next else {
                break;
            };

            tracing::info!(category = %category_id, "Launching worker");
            let handle = self.spawn_supervised(category_id.clone(), cancel.clone());
            workers.push(WorkerHandle {
                category_id,
                handle,
            });

            if !sleep_or_cancel(&cancel, self.settings.launch_interval).await {
                break;
            }
        }

        if cancel.is_cancelled() {
            tracing::warn!(
                launched = workers.len(),
                "Launch interrupted by shutdown"
            );
        } else {
            tracing::info!(launched = workers.len(), "All categories launched");
        }

        Supervisor {
            cancel,
            workers,
            sweeper,
            deps: self.deps.clone(),
        }
    }

    /// Runs a category worker, restarting it whenever it panics
    fn spawn_supervised(&self, category_id: String, cancel: CancellationToken) -> JoinHandle<()> {
        let deps = self.deps.clone();
        let mut restarts = RetryBackoff::new(
            self.settings.restart_backoff,
            self.settings.max_restart_backoff,
        );

        tokio::spawn(async move {
            loop {
                let worker = deps.worker(&category_id);
                match tokio::spawn(worker.run(cancel.clone())).await {
                    Ok(()) => break,
                    Err(e) if e.is_panic() => {
                        deps.stats.worker_restarted();
                        let delay = restarts.record_failure();
                        tracing::error!(
                            category = %category_id,
                            restart_in_ms = delay.as_millis() as u64,
                            "Worker panicked, restarting with a fresh cursor"
                        );
                        if !sleep_or_cancel(&cancel, delay).await {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        })
    }

    fn spawn_sweeper(&self, cancel: CancellationToken) -> JoinHandle<()> {
        let dedup = self.deps.dedup.clone();
        let interval = self.settings.sweep_interval;

        tokio::spawn(async move {
            while sleep_or_cancel(&cancel, interval).await {
                let removed = dedup.sweep();
                tracing::debug!(
                    removed,
                    remaining = dedup.len(),
                    window_hours = dedup.window().num_hours(),
                    "Swept dedup cache"
                );
            }
        })
    }
}

struct WorkerHandle {
    category_id: String,
    handle: JoinHandle<()>,
}

/// Owns every launched worker of a run
///
/// Workers run until [`Supervisor::shutdown`] is called or the token from
/// [`Supervisor::cancellation_token`] is cancelled.
pub struct Supervisor {
    cancel: CancellationToken,
    workers: Vec<WorkerHandle>,
    sweeper: JoinHandle<()>,
    deps: WorkerDeps,
}

impl Supervisor {
    /// Categories that have a running worker, in launch order
    pub fn categories(&self) -> Vec<&str> {
        self.workers
            .iter()
            .map(|w| w.category_id.as_str())
            .collect()
    }

    pub fn worker_count(&self) -> usize {
        self.workers.len()
    }

    /// Token that stops every worker when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.deps.stats.snapshot()
    }

    /// Waits until the run is cancelled from elsewhere and every task has exited
    pub async fn wait(self) -> StatsSnapshot {
        self.cancel.cancelled().await;
        self.join().await
    }

    /// Cancels every worker and waits for them to exit
    pub async fn shutdown(self) -> StatsSnapshot {
        tracing::info!(workers = self.workers.len(), "Shutting down workers");
        self.cancel.cancel();
        self.join().await
    }

    async fn join(self) -> StatsSnapshot {
        for worker in self.workers {
            if let Err(e) = worker.handle.await {
                tracing::warn!(category = %worker.category_id, error = %e, "Worker task failed");
            }
        }
        if let Err(e) = self.sweeper.await {
            tracing::warn!(error = %e, "Sweeper task failed");
        }
        self.deps.stats.snapshot()
    }
}
