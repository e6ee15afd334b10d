//! Named recurring jobs on the tokio runtime
//!
//! Each job runs in its own task driven by `tokio::time::interval` and stops
//! when told to over its shutdown channel. Registration is keyed by name so
//! repeated registration attempts are no-ops.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

/// Bookkeeping for one running job
struct ScheduledJob {
    /// When the job fires next
    next_run: Arc<Mutex<DateTime<Utc>>>,
    /// Signals the job task to stop
    shutdown_tx: mpsc::Sender<()>,
}

/// Registry of recurring jobs
#[derive(Default)]
pub struct Scheduler {
    jobs: Mutex<HashMap<String, ScheduledJob>>,
}

/// Wall-clock time one `interval` from now, saturating far in the future
fn one_interval_from_now(interval: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(interval)
        .ok()
        .and_then(|step| Utc::now().checked_add_signed(step))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `job` to run every `interval` unless `name` is already scheduled
    ///
    /// The first run happens one interval after registration. Must be called
    /// from within a tokio runtime.
    ///
    /// # Returns
    /// * `true` if the job was registered by this call
    /// * `false` if a job with this name already exists
    pub fn schedule_recurring<F, Fut>(&self, name: &str, interval: Duration, job: F) -> bool
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut jobs = self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if jobs.contains_key(name) {
            return false;
        }

        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
        let next_run = Arc::new(Mutex::new(one_interval_from_now(interval)));
        let task_next_run = next_run.clone();
        let job_name = name.to_string();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // Skip the first tick (immediate)
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        tracing::info!(job = %job_name, "running scheduled job");
                        job().await;
                        *task_next_run.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) =
                            one_interval_from_now(interval);
                    }
                    _ = shutdown_rx.recv() => {
                        tracing::debug!(job = %job_name, "scheduled job stopped");
                        break;
                    }
                }
            }
        });

        tracing::info!(job = %name, interval_secs = interval.as_secs(), "scheduled recurring job");
        jobs.insert(
            name.to_string(),
            ScheduledJob {
                next_run,
                shutdown_tx,
            },
        );
        true
    }

    /// When the named job fires next, or `None` if it is not scheduled
    pub fn next_scheduled(&self, name: &str) -> Option<DateTime<Utc>> {
        let jobs = self.jobs.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        jobs.get(name)
            .map(|job| *job.next_run.lock().unwrap_or_else(|poisoned| poisoned.into_inner()))
    }

    /// Stops and removes the named job
    ///
    /// Returns `false` if no such job was scheduled.
    pub fn unschedule(&self, name: &str) -> bool {
        let removed = self
            .jobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(name);

        match removed {
            Some(job) => {
                // A full channel or a finished task both mean the job is stopping
                let _ = job.shutdown_tx.try_send(());
                tracing::info!(job = %name, "unscheduled recurring job");
                true
            }
            None => false,
        }
    }

    /// Stops every job
    pub fn shutdown(&self) {
        let names: Vec<String> = self
            .jobs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .keys()
            .cloned()
            .collect();

        for name in names {
            self.unschedule(&name);
        }
    }
}
