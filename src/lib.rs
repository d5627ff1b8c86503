pub mod config;
pub mod db;
pub mod error;
pub mod jobs;
pub mod push;
pub mod scheduler;

use std::sync::Arc;
use std::time::Duration;
use actix_web::{web, HttpResponse};
use tracing::{info, warn};

pub use error::AppError;
pub type Result<T> = std::result::Result<T, AppError>;
pub use crate::config::Settings;

pub use db::{DbOperations, Medicine, MedicineStore, User};
pub use jobs::{run_job, JobKind, JobReport};
pub use push::{FcmClient, PushMessage, PushSender};
pub use scheduler::{JobRegistry, Schedule};

/// Health check endpoint handler
/// Reports store reachability and the last run of every job
pub async fn health_check(state: web::Data<AppState>) -> HttpResponse {
    let store_ok = match state.store.ping().await {
        Ok(()) => true,
        Err(e) => {
            warn!("Health check could not reach the store: {}", e);
            false
        }
    };
    let status = if store_ok { "healthy" } else { "degraded" };

    let mut body = serde_json::json!({
        "status": status,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "store": store_ok,
        "jobs": state.jobs.snapshot().await,
    });
    if let Some(db) = &state.db {
        body["pool"] = serde_json::json!(db.get_pool_status());
    }

    HttpResponse::Ok().json(body)
}

/// Application state shared across all components
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Settings>,
    pub store: Arc<dyn MedicineStore>,
    pub push: Arc<dyn PushSender>,
    pub jobs: Arc<JobRegistry>,
    db: Option<Arc<DbOperations>>,
}

impl AppState {
    pub async fn new(config: Settings) -> Result<Self> {
        let db = DbOperations::new_with_options(
            &config.database.url,
            config.database.max_connections,
            Duration::from_secs(config.database.acquire_timeout_secs),
        )?;
        let db = Arc::new(db);

        if config.database.run_migrations {
            db.run_migrations().await?;
            info!("Database migrations applied");
        }

        let push = FcmClient::from_config(&config.push)?;
        info!("Push notifications go to {}", push.send_url());

        let mut state = Self::from_parts(config, db.clone(), Arc::new(push)).await?;
        state.db = Some(db);
        Ok(state)
    }

    /// Builds state around an existing store and push sender.
    pub async fn from_parts(
        config: Settings,
        store: Arc<dyn MedicineStore>,
        push: Arc<dyn PushSender>,
    ) -> Result<Self> {
        config.notifier.window()?;

        let jobs = JobRegistry::new();
        for job in JobKind::ALL {
            let job_config = config.job(job);
            let schedule = Schedule::parse(&job_config.schedule)?;
            jobs.register(job, &schedule, job_config.enabled).await;
        }

        Ok(Self {
            config: Arc::new(config),
            store,
            push,
            jobs: Arc::new(jobs),
            db: None,
        })
    }

    pub async fn shutdown(&self) -> Result<()> {
        if let Some(db) = &self.db {
            db.close().await;
        }
        Ok(())
    }
}
