use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

use crate::db::models::{Medicine, User};
use crate::error::{AppError, DatabaseError};
use crate::Result;

/// Read/update access to the user and medicine records the jobs scan.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MedicineStore: Send + Sync {
    async fn list_users(&self) -> Result<Vec<User>>;

    async fn list_medicines(&self, user_id: &str) -> Result<Vec<Medicine>>;

    /// Medicines with `from <= next_dose <= to` that are not completed.
    async fn due_medicines(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Medicine>>;

    async fn set_completed(&self, user_id: &str, medicine_id: &str, completed: bool) -> Result<()>;

    async fn ping(&self) -> Result<()>;
}

pub struct DbOperations {
    pool: Arc<PgPool>,
}

impl DbOperations {
    /// Builds a pool that connects on first use.
    pub fn new_with_options(
        url: &str,
        max_connections: u32,
        acquire_timeout: Duration,
    ) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_lazy(url)
            .map_err(|e| AppError::DatabaseError(DatabaseError::ConnectionError(e.to_string())))?;

        Ok(Self { pool: Arc::new(pool) })
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(self.pool.as_ref()).await?;
        Ok(())
    }

    pub fn get_pool_status(&self) -> DbPoolStatus {
        let size = self.pool.size();
        let idle = self.pool.num_idle() as u32;

        DbPoolStatus {
            total_connections: size,
            active_connections: size.saturating_sub(idle),
            idle_connections: idle,
        }
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl MedicineStore for DbOperations {
    async fn list_users(&self) -> Result<Vec<User>> {
        let users = sqlx::query_as::<_, User>("SELECT id, fcm_token FROM users ORDER BY id")
            .fetch_all(self.pool.as_ref())
            .await?;

        Ok(users)
    }

    async fn list_medicines(&self, user_id: &str) -> Result<Vec<Medicine>> {
        let medicines = sqlx::query_as::<_, Medicine>(
            r#"
            SELECT id, user_id, name, next_dose, is_completed
            FROM medicines
            WHERE user_id = $1
            ORDER BY id
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(medicines)
    }

    async fn due_medicines(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<Medicine>> {
        let medicines = sqlx::query_as::<_, Medicine>(
            r#"
            SELECT id, user_id, name, next_dose, is_completed
            FROM medicines
            WHERE user_id = $1
              AND next_dose >= $2
              AND next_dose <= $3
              AND is_completed = FALSE
            ORDER BY next_dose, id
            "#,
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_all(self.pool.as_ref())
        .await?;

        Ok(medicines)
    }

    async fn set_completed(&self, user_id: &str, medicine_id: &str, completed: bool) -> Result<()> {
        let result = sqlx::query(
            "UPDATE medicines SET is_completed = $1 WHERE user_id = $2 AND id = $3",
        )
        .bind(completed)
        .bind(user_id)
        .bind(medicine_id)
        .execute(self.pool.as_ref())
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::DatabaseError(DatabaseError::NotFound));
        }

        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(self.pool.as_ref()).await?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DbPoolStatus {
    pub total_connections: u32,
    pub active_connections: u32,
    pub idle_connections: u32,
}
