use anyhow::Result;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::time::{Duration, interval};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::config::SchedulerConfig;
use crate::constants::intervals::SCHEDULER_POLL;
use crate::services::batch::BatchService;

/// Which seasons a scheduled run covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sweep {
    /// The upcoming season and the four most recent ones.
    Recent,
    /// Every tracked season.
    Full,
}

impl Sweep {
    #[must_use]
    pub const fn job_name(self) -> &'static str {
        match self {
            Self::Recent => "update_recent_seasons",
            Self::Full => "update_all_seasons",
        }
    }
}

/// Runs one sweep unless the previous run of the same sweep is still going.
async fn run_sweep(batch: &BatchService, sweep: Sweep, gate: &Mutex<()>) {
    let job_name = sweep.job_name();
    let Ok(_running) = gate.try_lock() else {
        warn!(event = "job_skipped", job_name, "Previous run still in progress, skipping");
        return;
    };

    let start = std::time::Instant::now();
    info!(event = "job_started", job_name, "Starting scheduled season update");

    let today = Utc::now().date_naive();
    let result = match sweep {
        Sweep::Recent => batch.update_recent_seasons(today).await,
        Sweep::Full => batch.update_all_seasons(today).await,
    };

    match result {
        Ok(report) => info!(
            event = "job_finished",
            job_name,
            seasons = report.seasons.success.len(),
            failed_seasons = report.seasons.failed.len(),
            subjects = report.subjects.success.len(),
            failed_subjects = report.subjects.failed.len(),
            duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "Scheduled season update finished"
        ),
        Err(e) => error!(
            event = "job_failed",
            job_name,
            error = %e,
            "Scheduled season update failed"
        ),
    }
}

pub struct Scheduler {
    batch: Arc<BatchService>,
    config: SchedulerConfig,
    running: Arc<RwLock<bool>>,
    recent_gate: Arc<Mutex<()>>,
    full_gate: Arc<Mutex<()>>,
}

impl Scheduler {
    #[must_use]
    pub fn new(batch: Arc<BatchService>, config: SchedulerConfig) -> Self {
        Self {
            batch,
            config,
            running: Arc::new(RwLock::new(false)),
            recent_gate: Arc::new(Mutex::new(())),
            full_gate: Arc::new(Mutex::new(())),
        }
    }

    /// Runs until [`Scheduler::stop`] is called.
    pub async fn start(&self) -> Result<()> {
        if !self.config.enabled {
            info!("Scheduler is disabled in config");
            return Ok(());
        }

        *self.running.write().await = true;
        info!("Starting background scheduler");

        if self.config.recent_cron.is_some() || self.config.full_cron.is_some() {
            self.run_with_cron().await
        } else {
            self.run_with_interval().await
        }
    }

    fn cron_job(&self, expr: &str, sweep: Sweep) -> Result<Job> {
        let batch = Arc::clone(&self.batch);
        let running = Arc::clone(&self.running);
        let gate = match sweep {
            Sweep::Recent => Arc::clone(&self.recent_gate),
            Sweep::Full => Arc::clone(&self.full_gate),
        };

        let job = Job::new_async(expr, move |_uuid, _lock| {
            let batch = Arc::clone(&batch);
            let running = Arc::clone(&running);
            let gate = Arc::clone(&gate);
            Box::pin(async move {
                if !*running.read().await {
                    return;
                }
                run_sweep(&batch, sweep, &gate).await;
            })
        })?;

        Ok(job)
    }

    async fn run_with_cron(&self) -> Result<()> {
        let mut sched = JobScheduler::new().await?;

        if let Some(expr) = &self.config.recent_cron {
            sched.add(self.cron_job(expr, Sweep::Recent)?).await?;
            info!(job_name = Sweep::Recent.job_name(), cron = %expr, "Job scheduled");
        }
        if let Some(expr) = &self.config.full_cron {
            sched.add(self.cron_job(expr, Sweep::Full)?).await?;
            info!(job_name = Sweep::Full.job_name(), cron = %expr, "Job scheduled");
        }

        sched.start().await?;

        while *self.running.read().await {
            tokio::time::sleep(SCHEDULER_POLL).await;
        }

        sched.shutdown().await?;
        info!("Scheduler stopped");
        Ok(())
    }

    /// Without cron expressions every tick runs a full sweep; the staleness
    /// policy keeps older seasons from being refetched each time.
    async fn run_with_interval(&self) -> Result<()> {
        let interval_mins = self.config.check_interval_minutes.max(1);
        info!("Scheduler running: full sweep every {}m", interval_mins);

        let mut ticker = interval(Duration::from_secs(u64::from(interval_mins) * 60));
        let mut poll = interval(SCHEDULER_POLL);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if !*self.running.read().await {
                        break;
                    }
                    run_sweep(&self.batch, Sweep::Full, &self.full_gate).await;
                }
                _ = poll.tick() => {
                    if !*self.running.read().await {
                        break;
                    }
                }
            }
        }

        info!("Scheduler stopped");
        Ok(())
    }

    pub async fn stop(&self) {
        info!("Stopping scheduler...");
        *self.running.write().await = false;
    }

    pub async fn is_running(&self) -> bool {
        *self.running.read().await
    }

    /// Runs one sweep now, sharing the overlap guard with scheduled runs.
    pub async fn run_once(&self, sweep: Sweep) {
        let gate = match sweep {
            Sweep::Recent => &self.recent_gate,
            Sweep::Full => &self.full_gate,
        };
        run_sweep(&self.batch, sweep, gate).await;
    }
}
