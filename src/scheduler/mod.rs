//! Periodic job loops and the in-memory record of their runs.

mod schedule;

pub use schedule::Schedule;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{info, warn};
use uuid::Uuid;

use crate::jobs::{run_job, JobKind, JobReport};
use crate::{AppState, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobOutcome {
    Succeeded { report: JobReport },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub job: JobKind,
    pub schedule: String,
    pub enabled: bool,
    pub running: bool,
    pub run_count: u64,
    pub last_run_id: Option<Uuid>,
    pub last_started: Option<DateTime<Utc>>,
    pub last_finished: Option<DateTime<Utc>>,
    pub last_outcome: Option<JobOutcome>,
}

impl JobStatus {
    fn new(job: JobKind, schedule: &Schedule, enabled: bool) -> Self {
        Self {
            job,
            schedule: schedule.to_string(),
            enabled,
            running: false,
            run_count: 0,
            last_run_id: None,
            last_started: None,
            last_finished: None,
            last_outcome: None,
        }
    }
}

#[derive(Default)]
pub struct JobRegistry {
    jobs: Arc<RwLock<HashMap<JobKind, JobStatus>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, job: JobKind, schedule: &Schedule, enabled: bool) {
        self.jobs
            .write()
            .await
            .insert(job, JobStatus::new(job, schedule, enabled));
        info!("Registered job {} ({}, enabled: {})", job, schedule, enabled);
    }

    pub async fn start_run(&self, job: JobKind) -> Uuid {
        let run_id = Uuid::new_v4();
        let mut jobs = self.jobs.write().await;

        if let Some(status) = jobs.get_mut(&job) {
            status.running = true;
            status.run_count += 1;
            status.last_run_id = Some(run_id);
            status.last_started = Some(Utc::now());
        } else {
            warn!("Run {} started for unregistered job {}", run_id, job);
        }

        run_id
    }

    pub async fn finish_run(&self, job: JobKind, run_id: Uuid, outcome: JobOutcome) {
        let mut jobs = self.jobs.write().await;

        if let Some(status) = jobs.get_mut(&job) {
            // A manual trigger may overlap a scheduled run; the latest start wins.
            if status.last_run_id == Some(run_id) {
                status.running = false;
            }
            status.last_finished = Some(Utc::now());
            status.last_outcome = Some(outcome);
        }
    }

    pub async fn get(&self, job: JobKind) -> Option<JobStatus> {
        self.jobs.read().await.get(&job).cloned()
    }

    pub async fn snapshot(&self) -> Vec<JobStatus> {
        let mut jobs: Vec<JobStatus> = self.jobs.read().await.values().cloned().collect();
        jobs.sort_by_key(|status| status.job);
        jobs
    }
}

/// Runs `job` every `schedule` period until the task is aborted. The first
/// run happens one period after the call.
pub fn spawn_job(state: AppState, job: JobKind, schedule: Schedule) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = schedule.period();
        info!("Scheduling {} {}", job, schedule);

        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            if let Err(e) = run_job(&state, job).await {
                warn!("Scheduled run of {} failed, retrying on next tick: {}", job, e);
            }
        }
    })
}

/// Spawns a loop for every job enabled in the settings.
pub fn spawn_enabled_jobs(state: &AppState) -> Result<Vec<JoinHandle<()>>> {
    let mut handles = Vec::new();

    for job in JobKind::ALL {
        let config = state.config.job(job);
        if !config.enabled {
            info!("Job {} is disabled", job);
            continue;
        }
        let schedule = Schedule::parse(&config.schedule)?;
        handles.push(spawn_job(state.clone(), job, schedule));
    }

    Ok(handles)
}
