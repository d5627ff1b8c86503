//! The two scheduled jobs and the runner that executes and records them.

pub mod daily_reset;
pub mod handlers;
pub mod notifier;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{error, info, info_span, Instrument};

use crate::error::{AppError, JobError};
use crate::scheduler::JobOutcome;
use crate::{AppState, Result};

pub use daily_reset::{run_daily_reset, ResetReport};
pub use notifier::{run_medication_notifier, NotifyReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JobKind {
    DailyReset,
    MedicationNotifier,
}

impl JobKind {
    pub const ALL: [JobKind; 2] = [JobKind::DailyReset, JobKind::MedicationNotifier];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::DailyReset => "daily-reset",
            JobKind::MedicationNotifier => "medication-notifier",
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        JobKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| JobError::UnknownJob(s.to_string()).into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "job", rename_all = "kebab-case")]
pub enum JobReport {
    DailyReset(ResetReport),
    MedicationNotifier(NotifyReport),
}

/// Runs one job to completion and records the outcome in the registry.
pub async fn run_job(state: &AppState, kind: JobKind) -> Result<JobReport> {
    let run_id = state.jobs.start_run(kind).await;
    let span = info_span!("job", job = %kind, run_id = %run_id);

    let result = async {
        info!("Job started");
        match kind {
            JobKind::DailyReset => run_daily_reset(state.store.as_ref())
                .await
                .map(JobReport::DailyReset),
            JobKind::MedicationNotifier => match state.config.notifier.window() {
                Ok(window) => {
                    run_medication_notifier(state.store.as_ref(), state.push.as_ref(), Utc::now(), window)
                        .await
                        .map(JobReport::MedicationNotifier)
                }
                Err(e) => Err(e),
            },
        }
    }
    .instrument(span.clone())
    .await;

    let outcome = span.in_scope(|| match &result {
        Ok(report) => {
            info!("Job finished");
            JobOutcome::Succeeded { report: report.clone() }
        }
        Err(e) => {
            error!("Job failed: {}", e);
            JobOutcome::Failed { error: e.to_string() }
        }
    });
    state.jobs.finish_run(kind, run_id, outcome).await;

    result
}
